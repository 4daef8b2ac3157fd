//! Error types of the routing layer.
//!
//! - [`ConfigError`]: detected while hosts and networks are being set up;
//!   fatal to startup
//! - [`ProtocolViolation`]: misuse of a [`Controller`](crate::Controller);
//!   fatal to that exchange, never retried
//! - [`ControllerError`]: everything a controller operation can fail with
//! - [`InputError`]: failures while buffering a request body
//!
//! Routing misses are not errors: they are answered with HTTP responses.

use std::io;

use http::header::InvalidHeaderValue;
use micro_transport::connection::ChannelId;
use micro_transport::protocol::{InvalidReasonPhrase, ParseError, SendError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mount path {path:?} is configured more than once")]
    DuplicateMount { path: String },

    #[error("no default host is configured")]
    NoDefaultHost,

    #[error("default host {name:?} is not registered")]
    UnknownDefaultHost { name: String },

    #[error("host {canonical:?} is already configured")]
    AlreadyConfigured { canonical: Option<String> },

    #[error("invalid http method {method:?}")]
    InvalidMethod { method: String },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("response of channel {0} is already set")]
    ResponseAlreadySet(ChannelId),

    #[error("channel {0} connected before its response was set")]
    ConnectBeforeResponse(ChannelId),

    #[error("response of channel {0} is already connected")]
    AlreadyConnected(ChannelId),

    #[error("request body of channel {0} is already accepted")]
    AlreadyAccepted(ChannelId),

    #[error("interim continue after the final response of channel {0}")]
    ContinueAfterFinal(ChannelId),

    #[error("interim responses are not supported, channel {0} carries exactly one response")]
    InterimUnsupported(ChannelId),

    #[error("channel {0} is faulted by an earlier violation")]
    Faulted(ChannelId),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("protocol violation: {0}")]
    Violation(#[from] ProtocolViolation),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error(transparent)]
    InvalidReason(#[from] InvalidReasonPhrase),

    #[error("transport error: {0}")]
    Transport(#[from] SendError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ControllerError {
    /// Whether the error is a protocol violation; the exchange is then unrecoverable.
    pub fn is_violation(&self) -> bool {
        matches!(self, ControllerError::Violation(_))
    }

    pub fn violation(&self) -> Option<ProtocolViolation> {
        match self {
            ControllerError::Violation(violation) => Some(*violation),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("request body exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("request body failed: {0}")]
    Body(#[from] ParseError),

    #[error("request body read interrupted by termination")]
    Interrupted,
}
