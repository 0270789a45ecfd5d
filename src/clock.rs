use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Wall clock used by every time-dependent operation.
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Converts a millisecond timestamp into a calendar date in `now`'s offset.
pub fn local_date(timestamp_ms: i64, now: &DateTime<FixedOffset>) -> Option<NaiveDate> {
    now.timezone()
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
pub use fixed::FixedClock;

#[cfg(test)]
mod fixed {
    use super::*;
    use std::cell::Cell;

    pub struct FixedClock {
        now: Cell<DateTime<FixedOffset>>,
    }

    impl FixedClock {
        /// `rfc3339` such as "2024-03-10T09:30:00+08:00"
        pub fn at(rfc3339: &str) -> Self {
            FixedClock {
                now: Cell::new(DateTime::parse_from_rfc3339(rfc3339).unwrap()),
            }
        }

        pub fn set_ms(&self, timestamp_ms: i64) {
            let offset = *self.now.get().offset();
            self.now
                .set(offset.timestamp_millis_opt(timestamp_ms).single().unwrap());
        }

        pub fn advance_ms(&self, delta_ms: i64) {
            self.set_ms(self.now.get().timestamp_millis() + delta_ms);
        }

        pub fn advance_secs(&self, secs: i64) {
            self.advance_ms(secs * 1000);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<FixedOffset> {
            self.now.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_uses_offset() {
        let clock = FixedClock::at("2024-03-10T01:00:00+08:00");
        let now = clock.now();
        // 2024-03-09T17:00Z is already the 10th at +08:00
        assert_eq!(
            local_date(now.timestamp_millis(), &now),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::at("2024-03-10T23:59:30+00:00");
        clock.advance_secs(45);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }
}
