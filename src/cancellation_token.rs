use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Longest stretch a canceled sleeper keeps sleeping.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Inter-thread stop flag. Clone it to hand it to another thread.
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Flips the state of the token to canceled
    #[inline]
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Sleeps for `duration`, waking early once the token is canceled.
    /// Returns whether it was canceled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut left = duration;
        while !left.is_zero() {
            if self.is_canceled() {
                return true;
            }
            let step = left.min(SLEEP_SLICE);
            thread::sleep(step);
            left -= step;
        }
        self.is_canceled()
    }
}
