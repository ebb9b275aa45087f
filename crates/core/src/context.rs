//! Cooperative cancellation for long-running operations
//!
//! Every operation that may wait — the two-phase apply, disproof
//! propagation, journal queries — takes a [`Context`] and checks it at
//! suspension points. Cancellation is cooperative: flipping the flag never
//! interrupts a mutation already underway, it only stops work at the next
//! check.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ambient operation context carrying a cancellation flag and an
/// optional deadline.
///
/// Cloning is cheap; clones share the same flag, so cancelling any
/// handle cancels them all.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// Handle used to cancel an associated [`Context`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the associated context. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Context {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A context with an explicit cancel handle
    pub fn with_cancel() -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Context {
            cancelled: Arc::clone(&flag),
            deadline: None,
        };
        (ctx, CancelHandle { cancelled: flag })
    }

    /// A context that expires after `timeout`
    pub fn with_deadline(timeout: Duration) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Context {
            cancelled: Arc::clone(&flag),
            deadline: Some(Instant::now() + timeout),
        };
        (ctx, CancelHandle { cancelled: flag })
    }

    /// Whether the context has been cancelled or its deadline has passed
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Return `Err(Cancelled)` if the context is no longer live.
    ///
    /// Called at every suspension point.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_cancelled() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_cancel_flips_flag() {
        let (ctx, handle) = Context::with_cancel();
        assert!(ctx.check().is_ok());
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_clones_share_flag() {
        let (ctx, handle) = Context::with_cancel();
        let clone = ctx.clone();
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_deadline_in_past_cancels() {
        let (ctx, _handle) = Context::with_deadline(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(2));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_deadline_in_future_is_live() {
        let (ctx, _handle) = Context::with_deadline(Duration::from_secs(3600));
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_cancel_handle_is_idempotent() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        handle.cancel();
        assert!(ctx.is_cancelled());
    }
}
