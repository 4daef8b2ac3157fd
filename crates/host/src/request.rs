//! The request side of an exchange, as seen by partitions.
//!
//! [`Request`] wraps the transport's [`RequestHeader`] and adds what routing
//! needs: the path string matched against the prefix index, the normalized
//! host name, and whether this is the last request of its connection.

use http::{HeaderMap, Method, Uri, Version};
use micro_transport::protocol::RequestHeader;

/// Path of an `OPTIONS *` request.
pub const ASTERISK: &str = "*";

#[derive(Debug)]
pub struct Request {
    header: RequestHeader,
    host: Option<String>,
    is_final: bool,
}

impl Request {
    pub fn new(header: RequestHeader, is_final: bool) -> Self {
        let host = header.host().and_then(normalize_host);
        Self { header, host, is_final }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    /// The path routed on; `*` for asterisk-form targets.
    pub fn path(&self) -> &str {
        let uri = self.header.uri();
        // `Uri` keeps asterisk-form in the path slot, but be explicit about it
        if uri == "*" { ASTERISK } else { uri.path() }
    }

    /// Host name from the `Host` field, lowercased and without its port.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether the connection closes after this exchange.
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

pub(crate) fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let name = if let Some(rest) = raw.strip_prefix('[') {
        // bracketed ipv6 literal, keep the brackets
        let end = rest.find(']')?;
        &raw[..end + 2]
    } else {
        raw.rsplit_once(':').map_or(raw, |(name, _port)| name)
    };

    if name.is_empty() { None } else { Some(name.to_ascii_lowercase()) }
}
