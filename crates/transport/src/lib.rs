//! In-process connection transport for the micro-host routing layer.
//!
//! The routing core decides *what* each response is; this crate decides how it
//! reaches the peer. It provides:
//!
//! - [`protocol`]: request headers, response heads, payload framing types and
//!   the request/response body types
//! - [`codec`]: the HTTP/1.1 response encoder (status line, headers,
//!   `Content-Length` or chunked payloads)
//! - [`connection`]: admission of pipelined requests and the ordered output
//!   multiplexer that writes responses in request order
//!
//! # Example
//!
//! ```no_run
//! use http::Request;
//! use micro_transport::connection::pipeline;
//! use micro_transport::protocol::body::ReqBody;
//!
//! # async fn run(socket: tokio::io::DuplexStream) {
//! let (mut pipeliner, catenation) = pipeline();
//! let writer = tokio::spawn(catenation.run(socket));
//!
//! let header = Request::builder().uri("/").body(()).unwrap().into();
//! let (_port, _descriptor) = pipeliner.admit(header, ReqBody::empty());
//! // hand the pair to the router, which connects a response to the port
//! # drop(writer);
//! # }
//! ```
//!
//! # Limitations
//!
//! - HTTP/1.1 responses only
//! - Request parsing is left to the caller; requests are admitted as already
//!   parsed `http` parts

pub mod codec;
pub mod connection;
pub mod protocol;
