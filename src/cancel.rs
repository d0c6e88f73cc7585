use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative reset request shared between a capture loop and whoever wants to stop it.
///
/// Clones share the same flag, so a UI thread can keep one and request a reset while the
/// device is blocked capturing telegrams. The capture loop checks the flag after every
/// received telegram; it never interrupts a read in progress.
#[derive(Debug, Clone, Default)]
pub struct ResetSignal {
    requested: Arc<AtomicBool>,
}

impl ResetSignal {
    pub fn new() -> ResetSignal {
        ResetSignal::default()
    }

    /// Requests a reset. Safe to call from any thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Clears the flag and reports whether a reset was pending.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::ResetSignal;
    use std::thread;

    #[test]
    fn take_consumes_request_once() {
        let signal = ResetSignal::new();
        assert!(!signal.take());
        signal.request();
        assert!(signal.is_requested());
        assert!(signal.take());
        assert!(!signal.take());
        assert!(!signal.is_requested());
    }

    #[test]
    fn clones_share_the_flag_across_threads() {
        let signal = ResetSignal::new();
        let remote = signal.clone();
        thread::spawn(move || remote.request()).join().unwrap();
        assert!(signal.take());
    }
}
