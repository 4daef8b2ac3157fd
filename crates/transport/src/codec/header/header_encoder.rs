//! Serializes a response head into HTTP/1.1 wire bytes.
//!
//! The status line carries the [`ReasonPhrase`] attached to the head, so
//! custom descriptions such as `204 NO CONTENT` reach the wire verbatim.
//! Framing headers set by the caller are authoritative; the encoder only adds
//! `Content-Length` or `Transfer-Encoding` when they are missing, and never for
//! statuses that forbid a body.

use crate::protocol::{PayloadSize, ReasonPhrase, ResponseHead, SendError, forbids_body};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                write!(FastWrite(dst), "HTTP/1.1 {} ", head.status().as_str())?;
                dst.put_slice(ReasonPhrase::of(&head));
                dst.put_slice(b"\r\n");
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        if !forbids_body(head.status()) {
            let headers = head.headers_mut();
            let framed = headers.contains_key(header::CONTENT_LENGTH) || headers.contains_key(header::TRANSFER_ENCODING);
            if !framed {
                match payload_size {
                    PayloadSize::Length(n) => {
                        headers.insert(header::CONTENT_LENGTH, n.into());
                    }
                    PayloadSize::Chunked => {
                        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                    }
                    PayloadSize::Empty => {
                        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                    }
                }
            }
        }

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer over `BytesMut` for the formatted parts of the status line.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};
    use indoc::indoc;

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap().replace("\r\n", "\n")
    }

    #[test]
    fn custom_reason_phrase_on_status_line() {
        let mut head = Response::builder().status(StatusCode::NO_CONTENT).header(header::ALLOW, "GET,HEAD").body(()).unwrap();
        head.extensions_mut().insert(ReasonPhrase::try_new("NO CONTENT").unwrap());

        let expected = indoc! {"
            HTTP/1.1 204 NO CONTENT
            allow: GET,HEAD

        "};
        assert_eq!(encode(head, PayloadSize::Chunked), expected);
    }

    #[test]
    fn adds_missing_framing_headers() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Length(12)), "HTTP/1.1 200 OK\ncontent-length: 12\n\n");

        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Chunked), "HTTP/1.1 200 OK\ntransfer-encoding: chunked\n\n");
    }

    #[test]
    fn keeps_declared_framing_headers() {
        // a head-only response declares the length of a body it does not send
        let head = Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, "2048").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "HTTP/1.1 200 OK\ncontent-length: 2048\n\n");
    }

    #[test]
    fn rejects_other_versions() {
        let head = Response::builder().version(Version::HTTP_2).body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).is_err());
    }
}
