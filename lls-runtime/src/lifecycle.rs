use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process lifecycle handed to the owning core at startup: the exit flag raised by the
/// signal handler and the clock timers are measured against.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    exiting: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            exiting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_exit(&self) {
        self.exiting.store(true, Ordering::Release);
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
