//! Connect/close state shared by the in-memory backends.

use crate::error::{StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Open/closed flag for a backend connection.
#[derive(Debug)]
pub struct Lifecycle {
    name: &'static str,
    open: AtomicBool,
}

impl Lifecycle {
    /// Creates an open connection state for the named backend.
    #[must_use]
    pub const fn open(name: &'static str) -> Self {
        Self {
            name,
            open: AtomicBool::new(true),
        }
    }

    /// Marks the connection closed. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::info!(backend = self.name, "store connection closed");
        }
    }

    /// Re-opens a closed connection.
    pub fn reconnect(&self) {
        if !self.open.swap(true, Ordering::AcqRel) {
            tracing::info!(backend = self.name, "store connection re-opened");
        }
    }

    /// Returns true while the connection is usable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Fails with [`StoreError::Unavailable`] once closed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the connection is closed.
    pub fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("{} is closed", self.name)))
        }
    }
}
