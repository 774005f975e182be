// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Sources of the current time.
//!
//! Services never call `OffsetDateTime::now_utc` directly: they receive a `Clock` so that tests can
//! control the timestamps they store.

use time::{Duration, OffsetDateTime};

/// Source of the current time.
pub trait Clock {
    /// Returns the current UTC time, with at most microsecond precision.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Drops the sub-microsecond part of `ts`.
///
/// Databases keep timestamps with microsecond precision, so values read back from them only
/// compare equal to the ones written if those were truncated first.
pub fn truncate_to_micros(ts: OffsetDateTime) -> OffsetDateTime {
    ts - Duration::nanoseconds(i64::from(ts.nanosecond() % 1000))
}

/// Clock backed by the system time.
#[derive(Clone, Default)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        truncate_to_micros(OffsetDateTime::now_utc())
    }
}

/// Test utilities.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;
    use std::sync::Mutex;

    /// Clock that stays at a fixed instant until a test moves it.
    #[derive(Debug)]
    pub struct SettableClock {
        /// The instant returned by `now_utc`.
        now: Mutex<OffsetDateTime>,
    }

    /// Panics if `ts` cannot be represented by a clock.
    fn check_precision(ts: OffsetDateTime) -> OffsetDateTime {
        assert_eq!(ts, truncate_to_micros(ts), "Clocks do not go below microseconds");
        ts
    }

    impl SettableClock {
        /// Creates a clock that returns `now`.
        pub fn new(now: OffsetDateTime) -> Self {
            Self { now: Mutex::new(check_precision(now)) }
        }

        /// Moves the clock to `now`, which may be in the past.
        pub fn set(&self, now: OffsetDateTime) {
            *self.now.lock().unwrap() = check_precision(now);
        }

        /// Moves the clock forward by `delta`.
        pub fn advance(&self, delta: std::time::Duration) {
            let mut now = self.now.lock().unwrap();
            *now = check_precision(*now + delta);
        }
    }

    impl Clock for SettableClock {
        fn now_utc(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::panic::catch_unwind;
        use std::time::Duration as StdDuration;
        use time::macros::datetime;

        #[test]
        fn test_settableclock_set_and_advance() {
            let clock = SettableClock::new(datetime!(2024-03-01 10:15:00.123456 UTC));
            assert_eq!(datetime!(2024-03-01 10:15:00.123456 UTC), clock.now_utc());

            clock.advance(StdDuration::from_micros(544));
            assert_eq!(datetime!(2024-03-01 10:15:00.124 UTC), clock.now_utc());

            clock.set(datetime!(2023-12-31 23:59:59 UTC));
            assert_eq!(datetime!(2023-12-31 23:59:59 UTC), clock.now_utc());
        }

        #[test]
        fn test_settableclock_rejects_nanoseconds() {
            catch_unwind(|| SettableClock::new(datetime!(2024-03-01 10:20:00.000000001 UTC)))
                .unwrap_err();

            let clock = SettableClock::new(datetime!(2024-03-01 10:20:00 UTC));
            catch_unwind(|| clock.set(datetime!(2024-03-01 10:20:00.5000001 UTC))).unwrap_err();
            catch_unwind(|| clock.advance(StdDuration::from_nanos(999))).unwrap_err();
        }
    }
}
