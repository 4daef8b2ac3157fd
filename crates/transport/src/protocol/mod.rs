//! Protocol value types shared by the transport and the routing core.
//!
//! - [`RequestHeader`]: method, target and header fields of an inbound request
//! - [`ResponseHead`] / [`ReasonPhrase`]: the framed head of a response
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: what the response encoder consumes
//! - [`body`]: inbound [`ReqBody`](body::ReqBody) and outbound [`ResponseBody`](body::ResponseBody)
//! - [`HttpError`], [`ParseError`], [`SendError`]: transport failures

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::forbids_body;
pub use response::InvalidReasonPhrase;
pub use response::ReasonPhrase;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
