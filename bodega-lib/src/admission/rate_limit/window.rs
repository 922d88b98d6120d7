use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// An ordered sequence of event timestamps for one scope key.
///
/// Invariant: timestamps are non-decreasing in insertion order and never in
/// the future; `prune` discards everything older than `now - window`.
#[derive(Debug, Default)]
pub struct RateWindow {
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self { stamps: VecDeque::new() }
    }

    /// Drop timestamps that fell out of the trailing window.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.stamps.front() {
            if now.saturating_duration_since(front) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.stamps.front().copied()
    }
}
