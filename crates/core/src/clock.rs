// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so loop timing can be faked in tests.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Source of the current time, injectable so tests can control elapsed time
/// without real sleeps.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, used for elapsed-time measurements (job duration,
    /// backoff windows).
    fn now(&self) -> Instant;

    /// Wall-clock time, used for timestamps that cross the wire (lease
    /// extensions, heartbeat payloads).
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real clock backed by the OS.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Controllable clock for deterministic tests.
    ///
    /// `now()` still advances in real time (it is monotonic and cannot be
    /// rewound), but `utc_now()` is pinned to whatever `set_utc` was last
    /// called with, defaulting to the instant the clock was created.
    #[derive(Debug, Clone)]
    pub struct FakeClock {
        started: Instant,
        utc: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                started: Instant::now(),
                utc: Arc::new(Mutex::new(Utc::now())),
            }
        }

        /// Pin the wall-clock time returned by `utc_now()`.
        pub fn set_utc(&self, at: DateTime<Utc>) {
            *self.utc.lock().unwrap_or_else(|e| e.into_inner()) = at;
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.started
        }

        fn utc_now(&self) -> DateTime<Utc> {
            *self.utc.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;
