//! Per-connection request admission and ordered response output.
//!
//! # Components
//!
//! - [`Pipeliner`]: admits pipelined requests in arrival order, assigning each a
//!   [`ChannelId`] and reserving its output slot
//! - [`OutputPort`]: the reserved slot of one request, filled exactly once with
//!   an [`Exchange`] (framed head plus body)
//! - [`RequestDescriptor`]: what the routing layer receives for each request
//! - [`Catenation`]: drains the slots onto the socket in reservation order,
//!   however the individual responses complete
//!
//! Wire order is decided at admission, not at completion: a response that is
//! ready early waits behind the responses admitted before it.

mod catenation;

pub use catenation::ChannelId;
pub use catenation::Catenation;
pub use catenation::Exchange;
pub use catenation::OutputPort;
pub use catenation::Pipeline;
pub use catenation::Pipeliner;
pub use catenation::RequestDescriptor;
pub use catenation::pipeline;
