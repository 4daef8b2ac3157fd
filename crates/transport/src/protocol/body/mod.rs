//! Request and response entity bodies.
//!
//! - [`ReqBody`]: the inbound body of one request, fed by the transport through
//!   a [`ReqBodySender`] and consumed through `http_body::Body`
//! - [`ResponseBody`]: the outbound body connected to a request's output port,
//!   either a single in-memory payload or a boxed stream of chunks
//!
//! Both sides are bounded channels, so a slow consumer applies backpressure to
//! the producer instead of buffering whole payloads.

mod req_body;
mod response_body;

pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
pub use response_body::ResponseBody;
