//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps an `http::Request<()>`: the method, target and
//! header fields of one inbound request, without its entity body. The body
//! travels separately as a [`ReqBody`](crate::protocol::body::ReqBody).

use http::header::{CONNECTION, HOST};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The raw `Host` field, falling back to the authority of an absolute-form target.
    pub fn host(&self) -> Option<&str> {
        self.headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| self.uri().authority().map(http::uri::Authority::as_str))
    }

    /// Whether the client expects the connection to end after this exchange.
    ///
    /// That is the case for an explicit `Connection: close`, and for HTTP/1.0
    /// requests that did not ask for `keep-alive`.
    pub fn wants_close(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.headers().get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',').map(str::trim) {
                if token.eq_ignore_ascii_case("close") {
                    close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        close || (self.version() <= Version::HTTP_10 && !keep_alive)
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
