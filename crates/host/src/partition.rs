//! Mount-point handlers attached to a [`Host`].

use std::sync::Arc;

use crate::error::ControllerError;
use crate::{Controller, Host};

/// Where a partition is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    path: String,
    depth: usize,
}

impl Mount {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let depth = path.matches('/').count().saturating_sub(1);
        Self { path, depth }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Nesting level of the mount: `/` is 0, `/api/` and `/api/v1` are 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A handler for every request whose path starts with its mount path.
///
/// `select` must eventually resolve the controller: accept (or discard) the
/// request body and connect a response. A partition that cannot do that should
/// hand the controller to [`Host::misconfigured`], which is what the default
/// implementation does.
///
/// Work that outlives `select` belongs in [`Controller::dispatch`], so that
/// terminating the host waits for it.
pub trait Partition: Send + Sync + 'static {
    fn mount(&self) -> &Mount;

    fn select(&self, host: &Arc<Host>, controller: Controller) -> Result<(), ControllerError> {
        host.misconfigured(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_separators() {
        assert_eq!(Mount::new("/").depth(), 0);
        assert_eq!(Mount::new("/api/").depth(), 1);
        assert_eq!(Mount::new("/api/v1").depth(), 1);
        assert_eq!(Mount::new("/api/v1/users/").depth(), 3);
        assert_eq!(Mount::new("").depth(), 0);
    }
}
