//! A settable flag that threads can block on with a timeout.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A cloneable wake/cancel flag.
///
/// Every long wait in the crate is a [`Signal::wait_timeout`] on one of these,
/// so that a newer event can cut a stale wait short. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Signal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Signal {
    /// Create a cleared signal.
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        // A poisoned flag is still a valid bool.
        self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the flag and wake every waiter.
    pub fn set(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    /// Clear the flag.
    pub fn clear(&self) {
        *self.flag() = false;
    }

    /// Whether the flag is currently set.
    pub fn is_set(&self) -> bool {
        *self.flag()
    }

    /// Block until the flag is set.
    pub fn wait(&self) {
        let mut set = self.flag();
        while !*set {
            set = self.inner.1.wait(set).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block until the flag is set or `timeout` elapses.
    ///
    /// Returns `true` if the flag was set. A zero timeout just samples the flag.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.flag();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            set = self
                .inner
                .1
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_timeout_expires_when_unset() {
        let signal = Signal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_set_wakes_waiter_early() {
        let signal = Signal::new();
        let waiter = signal.clone();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        signal.set();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_clear_resets_flag() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.wait_timeout(Duration::ZERO));
        signal.clear();
        assert!(!signal.is_set());
    }
}
