//! A one-shot-per-period interval timer driven by an externally supplied
//! clock reading.

use std::time::{Duration, Instant};

/// Fires once every `interval`, driven by repeated calls to [`Self::update`]
/// with the current time.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    interval: Duration,
    last: Instant,
}

impl IntervalTimer {
    /// Creates a timer for `interval`, synced so it will not fire until a
    /// full interval has elapsed from `now`.
    #[must_use]
    pub const fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, last: now }
    }

    /// Resets the timer's clock to `now` without signalling a fire.
    pub fn sync_now(&mut self, now: Instant) {
        self.last = now;
    }

    /// Checks whether a full interval has elapsed since the timer last
    /// fired or was synced.
    ///
    /// This does *not* reset the timer - callers that want "fire once per
    /// interval" must call [`Self::sync_now`] themselves once they act on a
    /// `true` result, mirroring the two independent timers inside
    /// [`crate::health::HealthChecker`] which reset on different events
    /// (one on every send, one on every receive).
    #[must_use]
    pub fn update(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.interval
    }

    /// The configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_fire_before_interval_elapses() {
        let now = Instant::now();
        let timer = IntervalTimer::new(Duration::from_secs(5), now);
        assert!(!timer.update(now + Duration::from_secs(4)));
    }

    #[test]
    fn fires_once_interval_elapses() {
        let now = Instant::now();
        let timer = IntervalTimer::new(Duration::from_secs(5), now);
        assert!(timer.update(now + Duration::from_secs(5)));
    }

    #[test]
    fn sync_now_resets_the_window() {
        let now = Instant::now();
        let mut timer = IntervalTimer::new(Duration::from_secs(5), now);
        let later = now + Duration::from_secs(5);
        assert!(timer.update(later));
        timer.sync_now(later);
        assert!(!timer.update(later + Duration::from_secs(1)));
    }
}
