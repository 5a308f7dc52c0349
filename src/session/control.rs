//! Deferred teardown requests.
//!
//! A callback cannot call back into its own session (it only has the session
//! mutably borrowed from the outside), so it records a request on a
//! [`SessionControl`] instead. The session honours the request as soon as the
//! callback returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Requests {
    stop: Mutex<Option<u32>>,
    free: AtomicBool,
}

/// Cloneable handle for requesting a stop or free from inside a callback.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    inner: Arc<Requests>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop with `reason`. The first request wins.
    pub fn request_stop(&self, reason: u32) {
        if let Ok(mut stop) = self.inner.stop.lock() {
            stop.get_or_insert(reason);
        }
    }

    /// Ask the session to free itself (stopping first if needed).
    pub fn request_free(&self) {
        self.inner.free.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_stop(&self) -> Option<u32> {
        self.inner.stop.lock().ok().and_then(|mut stop| stop.take())
    }

    pub(crate) fn take_free(&self) -> bool {
        self.inner.free.swap(false, Ordering::SeqCst)
    }

    /// Whether any request is waiting.
    pub fn is_pending(&self) -> bool {
        self.inner.free.load(Ordering::SeqCst)
            || self.inner.stop.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stop_request_wins() {
        let control = SessionControl::new();
        let clone = control.clone();
        clone.request_stop(3);
        control.request_stop(9);

        assert!(control.is_pending());
        assert_eq!(control.take_stop(), Some(3));
        assert_eq!(control.take_stop(), None);
        assert!(!control.is_pending());
    }

    #[test]
    fn test_free_request_is_consumed() {
        let control = SessionControl::new();
        control.request_free();
        assert!(control.take_free());
        assert!(!control.take_free());
    }
}
