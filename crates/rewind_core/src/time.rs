//! Wall-clock time sources.
//!
//! Every component reads time through a [`Clock`] so recording and
//! playback can run against the system clock in production and a
//! [`ManualClock`] in tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// An absolute instant, millisecond resolution on the wire.
pub type Timestamp = DateTime<Utc>;

/// A source of wall-clock instants.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

impl SystemClock {
    /// Create a shared system clock.
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hold one handle while the
/// recorder and player hold others.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at a fixed, arbitrary epoch offset.
    pub fn at_epoch_millis(millis: i64) -> Self {
        Self::new(from_epoch_millis(millis))
    }

    /// Move the clock forward by `millis` milliseconds.
    pub fn advance(&self, millis: i64) {
        let mut now = self.now.lock();
        *now += Duration::milliseconds(millis);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: Timestamp) {
        *self.now.lock() = instant;
    }

    /// Type-erased handle for components.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Milliseconds since the Unix epoch, as a float for clock arithmetic.
pub fn epoch_millis(instant: Timestamp) -> f64 {
    instant.timestamp_micros() as f64 / 1000.0
}

/// Build an instant from epoch milliseconds, or `None` outside chrono's range.
pub fn try_from_epoch_millis(millis: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Build an instant from epoch milliseconds, saturating at chrono's range.
pub fn from_epoch_millis(millis: i64) -> Timestamp {
    try_from_epoch_millis(millis).unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Whole milliseconds from `earlier` to `later`.
pub fn millis_between(earlier: Timestamp, later: Timestamp) -> i64 {
    (later - earlier).num_milliseconds()
}

/// Fractional milliseconds from `earlier` to `later`.
pub fn elapsed_millis(earlier: Timestamp, later: Timestamp) -> f64 {
    let elapsed = later - earlier;
    match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1000.0,
        None => elapsed.num_milliseconds() as f64,
    }
}

/// Add a fractional number of milliseconds to an instant.
pub fn add_millis(instant: Timestamp, millis: f64) -> Timestamp {
    instant + Duration::microseconds((millis * 1000.0).round() as i64)
}

/// Serde adapter for record timestamps.
///
/// Serializes as RFC 3339 with millisecond precision. Deserializes from an
/// RFC 3339 string or from epoch milliseconds (integer or float).
pub mod wire {
    use super::{try_from_epoch_millis, Timestamp};
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(instant: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = Timestamp;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an ISO-8601 timestamp or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Timestamp, E> {
            DateTime::parse_from_rfc3339(value)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| E::custom(format!("bad timestamp `{value}`: {err}")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
            try_from_epoch_millis(value).ok_or_else(|| E::custom(format!("timestamp {value} out of range")))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
            let millis = i64::try_from(value).map_err(|_| E::custom(format!("timestamp {value} out of range")))?;
            self.visit_i64(millis)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Timestamp, E> {
            if !value.is_finite() {
                return Err(E::custom("timestamp must be finite"));
            }
            let millis = value.round();
            if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
                return Err(E::custom(format!("timestamp {value} out of range")));
            }
            self.visit_i64(millis as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::at_epoch_millis(1_000);
        let handle = clock.shared();

        clock.advance(250);
        assert_eq!(millis_between(from_epoch_millis(1_000), handle.now()), 250);
    }

    #[test]
    fn test_add_millis_fractional() {
        let start = from_epoch_millis(0);
        let later = add_millis(start, 1.5);
        assert_eq!((later - start).num_microseconds(), Some(1_500));
    }

    #[test]
    fn test_out_of_range_wire_timestamp_rejected() {
        #[derive(Debug, serde::Deserialize)]
        struct Stamped {
            #[serde(with = "wire")]
            at: Timestamp,
        }

        let parsed: Stamped = serde_json::from_str(r#"{"at": 1500}"#).unwrap();
        assert_eq!(parsed.at, from_epoch_millis(1_500));
        let parsed: Stamped = serde_json::from_str(r#"{"at": 1500.4}"#).unwrap();
        assert_eq!(parsed.at, from_epoch_millis(1_500));

        for json in [r#"{"at": 9223372036854775807}"#, r#"{"at": -9223372036854775807}"#, r#"{"at": 1e300}"#] {
            let err = serde_json::from_str::<Stamped>(json).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{json}: {err}");
        }
        assert_eq!(try_from_epoch_millis(i64::MAX), None);
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(epoch_millis(from_epoch_millis(42)), 42.0);
    }
}
