//! Injectable clock for file timestamps.

use std::fmt;
use std::time::SystemTime;

/// Supplies the current time to file constructors and mutators.
pub trait FileTimeSource: Send + Sync + fmt::Debug {
    /// The current time.
    fn now(&self) -> SystemTime;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl FileTimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeTimeSource;

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use parking_lot::Mutex;

    use super::FileTimeSource;

    /// Deterministic time source that only moves when told to.
    #[derive(Debug)]
    pub struct FakeTimeSource {
        now: Mutex<SystemTime>,
    }

    impl Default for FakeTimeSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeTimeSource {
        /// Start at an arbitrary fixed instant.
        pub fn new() -> Self {
            Self::at(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        }

        /// Start at the given instant.
        pub fn at(now: SystemTime) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        /// Advance the clock.
        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock();
            *now += by;
        }

        /// Jump the clock to the given instant.
        pub fn set(&self, to: SystemTime) {
            *self.now.lock() = to;
        }
    }

    impl FileTimeSource for FakeTimeSource {
        fn now(&self) -> SystemTime {
            *self.now.lock()
        }
    }
}
