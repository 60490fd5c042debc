//! Sliding-window frequency index over source IPs.
//!
//! Maintains, per source IP, the timestamps of recently scored events.
//! Entries expire lazily on read; no sweep thread. The lock is a plain
//! mutex held only across map operations, never across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Weight contributed per prior event within the window.
const WEIGHT_PER_EVENT: u32 = 10;

pub struct FrequencyIndex {
    window: Duration,
    inner: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl FrequencyIndex {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record an event for `src_ip` at `at` and return the frequency weight
    /// derived from the *prior* events still inside the window.
    ///
    /// The first event for an IP therefore weighs 0; the weight grows by 10
    /// per prior event, saturating at 100, and decays back as entries age
    /// out of the window.
    ///
    /// Timestamps come from `occurred_at` and may arrive out of order, so
    /// expiry scans the whole deque and insertion keeps it sorted.
    pub fn record(&self, src_ip: &str, at: DateTime<Utc>) -> u8 {
        let cutoff = at - self.window;
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let entries = map.entry(src_ip.to_string()).or_default();
        entries.retain(|&t| t > cutoff);

        let prior = entries.len() as u32;
        let pos = entries.partition_point(|&t| t <= at);
        entries.insert(pos, at);

        (prior * WEIGHT_PER_EVENT).min(100) as u8
    }

    /// Current weight for `src_ip` without recording an event.
    pub fn weight(&self, src_ip: &str, at: DateTime<Utc>) -> u8 {
        let cutoff = at - self.window;
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let Some(entries) = map.get_mut(src_ip) else {
            return 0;
        };
        entries.retain(|&t| t > cutoff);
        if entries.is_empty() {
            map.remove(src_ip);
            return 0;
        }

        ((entries.len() as u32) * WEIGHT_PER_EVENT).min(100) as u8
    }

    /// Number of IPs currently tracked (expired IPs removed on `weight`).
    pub fn tracked_ips(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset_secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-10-28T00:00:00Z").unwrap().with_timezone(&Utc)
            + Duration::seconds(offset_secs)
    }

    #[test]
    fn first_event_weighs_zero() {
        let index = FrequencyIndex::new(86_400);
        assert_eq!(index.record("10.0.0.5", at(0)), 0);
    }

    #[test]
    fn weight_is_non_decreasing_within_window() {
        let index = FrequencyIndex::new(86_400);
        let mut last = 0;
        for i in 0..12 {
            let w = index.record("10.0.0.5", at(i * 60));
            assert!(w >= last, "weight decreased from {last} to {w}");
            last = w;
        }
        // 11 prior events at the 12th call, saturating at 100.
        assert_eq!(last, 100);
    }

    #[test]
    fn weight_saturates_at_100() {
        let index = FrequencyIndex::new(86_400);
        for i in 0..50 {
            index.record("10.0.0.5", at(i));
        }
        assert_eq!(index.weight("10.0.0.5", at(50)), 100);
    }

    #[test]
    fn entries_decay_out_of_the_window() {
        let index = FrequencyIndex::new(3600);
        index.record("10.0.0.5", at(0));
        index.record("10.0.0.5", at(10));

        assert_eq!(index.weight("10.0.0.5", at(20)), 20);
        // Both events aged out: back to the floor.
        assert_eq!(index.weight("10.0.0.5", at(7200)), 0);
    }

    #[test]
    fn out_of_order_timestamps_still_expire() {
        let index = FrequencyIndex::new(3600);
        // A newer event lands first, then a straggler with an older
        // occurred_at. The straggler must not hide behind the newer entry
        // once it ages out of the window.
        index.record("10.0.0.5", at(5000));
        assert_eq!(index.record("10.0.0.5", at(100)), 10);

        assert_eq!(index.weight("10.0.0.5", at(3600)), 20);
        // Cutoff has passed the straggler but not the newer entry.
        assert_eq!(index.weight("10.0.0.5", at(8000)), 10);
        assert_eq!(index.weight("10.0.0.5", at(9000)), 0);
    }

    #[test]
    fn expired_ips_are_dropped_lazily() {
        let index = FrequencyIndex::new(3600);
        index.record("10.0.0.5", at(0));
        assert_eq!(index.tracked_ips(), 1);

        assert_eq!(index.weight("10.0.0.5", at(7200)), 0);
        assert_eq!(index.tracked_ips(), 0);
    }

    #[test]
    fn ips_are_tracked_independently() {
        let index = FrequencyIndex::new(86_400);
        index.record("10.0.0.5", at(0));
        index.record("10.0.0.5", at(1));
        assert_eq!(index.record("203.0.113.7", at(2)), 0);
        assert_eq!(index.record("10.0.0.5", at(3)), 20);
    }
}
