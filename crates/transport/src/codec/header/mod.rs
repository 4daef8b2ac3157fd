//! Response head encoding.
//!
//! [`HeaderEncoder`] writes the status line and header fields of a response,
//! completing the framing headers from the payload size when the caller left
//! them out.

mod header_encoder;

pub use header_encoder::HeaderEncoder;
