//! Response payload encoding.
//!
//! - [`ChunkedEncoder`](chunked_encoder::ChunkedEncoder): `Transfer-Encoding: chunked` framing
//! - [`LengthEncoder`](length_encoder::LengthEncoder): `Content-Length` framing, never writing past the declared length
//! - [`PayloadEncoder`]: selects one of the above from a [`PayloadSize`](crate::protocol::PayloadSize)

mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use payload_encoder::PayloadEncoder;
