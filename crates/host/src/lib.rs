//! Virtual host routing and response streaming for pipelined HTTP connections.
//!
//! Requests arrive already parsed, as batches of `(output port, descriptor)`
//! pairs from [`micro_transport`]. This crate decides what answers them:
//!
//! - [`Network`] picks the [`Host`] of a connection from the `Host` header of
//!   its first request, falling back to a default host
//! - [`Host`] routes each request by longest mount prefix to a [`Partition`],
//!   and answers `OPTIONS *`, unmatched paths and misconfigured partitions
//!   itself
//! - [`Controller`] carries one request/response exchange and enforces that
//!   exactly one response is connected per request
//! - [`Lifecycle`] tracks the work of every component so that termination
//!   cascades and completes once the last unit of work exits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use micro_host::{Controller, ControllerError, Host, Mount, Network, Partition};
//!
//! struct Hello(Mount);
//!
//! impl Partition for Hello {
//!     fn mount(&self) -> &Mount {
//!         &self.0
//!     }
//!
//!     fn select(&self, _host: &Arc<Host>, mut controller: Controller) -> Result<(), ControllerError> {
//!         controller.accept(None)?;
//!         controller.write_text("hello world")
//!     }
//! }
//!
//! # fn main() -> Result<(), micro_host::ConfigError> {
//! let host = Arc::new(Host::builder().name("example").partition(Hello(Mount::new("/"))).build()?);
//! let network = Network::builder().default_host("example").host(&host).build()?;
//! # drop(network);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod controller;
mod error;
mod host;
mod lifecycle;
mod network;
mod partition;
pub mod prefix;
mod request;
mod status;

pub use controller::{Controller, InputSender, State as ControllerState};
pub use error::{ConfigError, ControllerError, InputError, ProtocolViolation};
pub use host::{DEFAULT_METHODS, Host, HostBuilder, STYLESHEET};
pub use lifecycle::{Lifecycle, State};
pub use network::{Network, NetworkBuilder};
pub use partition::{Mount, Partition};
pub use request::{ASTERISK, Request};
