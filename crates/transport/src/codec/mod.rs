//! Response framing codec.
//!
//! [`ResponseEncoder`] turns a stream of [`Message`](crate::protocol::Message)s
//! (one head, then payload items up to the end marker, per response) into
//! HTTP/1.1 wire bytes. Heads go through the [`header`] encoder; payloads are
//! framed by the [`body`] encoders as either `Content-Length` or chunked.
//!
//! The codec plugs into `tokio_util::codec::FramedWrite`, which is how the
//! connection's [`Catenation`](crate::connection::Catenation) writes responses.

mod body;
mod header;
mod response_encoder;

pub use response_encoder::ResponseEncoder;
