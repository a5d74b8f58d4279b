use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

/// Convert a `DateTime<Utc>` to epoch seconds.
pub fn to_epoch(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Convert epoch seconds to `DateTime<Utc>`.
/// Out-of-range values fall back to 1970-01-01.
pub fn from_epoch(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Returns the current epoch seconds.
pub fn current_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Source of "now" for every expiry and deadline decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Truncated to whole seconds so that
/// values survive the epoch-second round trip through the store unchanged.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(from_epoch(to_epoch(start))) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = from_epoch(to_epoch(to));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trip_drops_subseconds() {
        let now = Utc::now();
        assert_eq!(to_epoch(from_epoch(to_epoch(now))), now.timestamp());
    }

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::default();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::seconds(301));
        assert_eq!((clock.now() - t0).num_seconds(), 301);
    }
}
