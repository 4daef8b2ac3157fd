//! HTTP response head types.
//!
//! A response head is an `http::Response<()>`; the entity body is attached
//! separately when the response is connected to an output port. A custom
//! status line description travels as a [`ReasonPhrase`] extension.

use bytes::Bytes;
use http::{Response, StatusCode};
use thiserror::Error;

pub type ResponseHead = Response<()>;

/// The description written after the status code on the status line.
///
/// Only horizontal tab, space and visible ASCII are accepted, so the phrase
/// can never break the framing of the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Bytes);

#[derive(Debug, Error)]
#[error("invalid reason phrase: {0:?}")]
pub struct InvalidReasonPhrase(Bytes);

impl ReasonPhrase {
    pub fn try_new(bytes: impl Into<Bytes>) -> Result<Self, InvalidReasonPhrase> {
        let bytes = bytes.into();
        if bytes.iter().all(|&b| b == b'\t' || (b' '..=b'~').contains(&b)) {
            Ok(Self(bytes))
        } else {
            Err(InvalidReasonPhrase(bytes))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The phrase of `head`, or the canonical reason of its status.
    pub fn of(head: &ResponseHead) -> &[u8] {
        match head.extensions().get::<ReasonPhrase>() {
            Some(phrase) => phrase.as_bytes(),
            None => head.status().canonical_reason().unwrap_or("").as_bytes(),
        }
    }
}

/// Statuses whose responses never carry a payload or framing headers.
#[inline]
pub fn forbids_body(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}
