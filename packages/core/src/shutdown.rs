//! Cooperative shutdown on user interrupt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::transfer::Sleeper;

/// Granularity at which blocking sleeps re-check the shutdown flag.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared flag set by the interrupt handler and observed by the poll loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the poll loop to stop as soon as possible.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Sleeper for Shutdown {
    /// Sleeps for `duration`, returning early once shutdown is requested.
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    fn interrupted(&self) -> bool {
        self.is_requested()
    }
}
