//! Status code texts used on status lines and in error documents.
//!
//! The vocabulary is small and fixed, so both the decimal code and the
//! upper-cased description of every registered status are rendered once into
//! a table.

use std::collections::HashMap;

use bytes::Bytes;
use http::StatusCode;
use once_cell::sync::Lazy;

#[derive(Debug, Clone)]
struct Entry {
    code: Bytes,
    description: Bytes,
}

static TABLE: Lazy<HashMap<u16, Entry>> = Lazy::new(|| {
    (100..600)
        .filter_map(|code| StatusCode::from_u16(code).ok())
        .filter_map(|status| Some((status, status.canonical_reason()?)))
        .map(|(status, reason)| {
            let entry = Entry {
                code: Bytes::copy_from_slice(status.as_str().as_bytes()),
                description: Bytes::from(reason.to_ascii_uppercase()),
            };
            (status.as_u16(), entry)
        })
        .collect()
});

/// Default description of `status`: its canonical reason, upper-cased.
pub fn description(status: StatusCode) -> Bytes {
    match TABLE.get(&status.as_u16()) {
        Some(entry) => entry.description.clone(),
        None => Bytes::new(),
    }
}

/// The three digit code of `status`.
pub fn code(status: StatusCode) -> Bytes {
    match TABLE.get(&status.as_u16()) {
        Some(entry) => entry.code.clone(),
        None => Bytes::copy_from_slice(status.as_str().as_bytes()),
    }
}
