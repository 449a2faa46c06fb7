//! Heartbeat send timer and peer-silence detector.
//!
//! Composes two independent [`IntervalTimer`]s: one governing how often this
//! side should send a `Health` keepalive, the other governing how long the
//! peer may stay silent before it is considered gone.

use std::time::{Duration, Instant};

use crate::timer::IntervalTimer;

/// Default interval between outgoing `Health` heartbeats.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(5);

/// Default maximum silence from the peer before it is considered gone.
pub const DEFAULT_RECEIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Tracks when to send a heartbeat and when the peer has gone quiet.
#[derive(Debug, Clone, Copy)]
pub struct HealthChecker {
    send: IntervalTimer,
    receive: IntervalTimer,
}

impl HealthChecker {
    /// Builds a checker with the given send/receive intervals.
    ///
    /// Both timers are synced to `now` at construction, so neither fires on
    /// the very first `update()` call immediately after the connection
    /// becomes ready.
    #[must_use]
    pub const fn new(send_interval: Duration, receive_interval: Duration, now: Instant) -> Self {
        Self { send: IntervalTimer::new(send_interval, now), receive: IntervalTimer::new(receive_interval, now) }
    }

    /// Builds a checker using the default intervals.
    #[must_use]
    pub const fn with_defaults(now: Instant) -> Self {
        Self::new(DEFAULT_SEND_INTERVAL, DEFAULT_RECEIVE_INTERVAL, now)
    }

    /// Whether it is time to send a `Health` heartbeat.
    ///
    /// If this returns `true`, callers must follow up with
    /// [`Self::reset_send_timer`] once the heartbeat is actually enqueued -
    /// this method does not reset the timer itself so a caller can check
    /// without committing to sending (e.g. if the outgoing queue is full).
    #[must_use]
    pub fn should_send(&self, now: Instant) -> bool {
        self.send.update(now)
    }

    /// Marks that a heartbeat (or any outgoing traffic) was just sent.
    pub fn reset_send_timer(&mut self, now: Instant) {
        self.send.sync_now(now);
    }

    /// Whether the peer has been silent longer than the receive interval.
    #[must_use]
    pub fn is_peer_silent(&self, now: Instant) -> bool {
        self.receive.update(now)
    }

    /// Marks that bytes were just received from the peer.
    pub fn reset_receive_timer(&mut self, now: Instant) {
        self.receive.sync_now(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neither_timer_fires_immediately_after_construction() {
        let now = Instant::now();
        let checker = HealthChecker::with_defaults(now);
        assert!(!checker.should_send(now));
        assert!(!checker.is_peer_silent(now));
    }

    #[test]
    fn send_timer_fires_after_interval_then_resets() {
        let now = Instant::now();
        let mut checker = HealthChecker::with_defaults(now);
        let later = now + DEFAULT_SEND_INTERVAL;
        assert!(checker.should_send(later));
        checker.reset_send_timer(later);
        assert!(!checker.should_send(later + Duration::from_millis(1)));
    }

    #[test]
    fn receive_silence_detected_after_interval() {
        let now = Instant::now();
        let checker = HealthChecker::with_defaults(now);
        assert!(checker.is_peer_silent(now + DEFAULT_RECEIVE_INTERVAL));
    }

    #[test]
    fn receiving_bytes_resets_silence_window() {
        let now = Instant::now();
        let mut checker = HealthChecker::with_defaults(now);
        let mid = now + DEFAULT_RECEIVE_INTERVAL - Duration::from_secs(1);
        checker.reset_receive_timer(mid);
        assert!(!checker.is_peer_silent(mid + Duration::from_secs(1)));
    }
}
