//! Cooperative cancellation for a running session.
//!
//! The session thread checks the token between poll attempts and before each
//! phase. Any other thread (a Ctrl-C handler, a UI) may trip it.

use crate::error::{ProtocolError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return `Err(ProtocolError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ProtocolError::Cancelled)
        } else {
            Ok(())
        }
    }
}
