//! Per-client log of recent request timestamps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps of a client's recent requests, oldest first.
///
/// After [`ClientWindow::prune`] every stored timestamp is less than the
/// window length older than the `now` it was pruned against.
#[derive(Debug, Clone, Default)]
pub struct ClientWindow {
    timestamps: VecDeque<Instant>,
}

impl ClientWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps that are `window` or more older than `now`.
    ///
    /// Returns how many were dropped.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let mut dropped = 0;
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Record a request at `now`.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }

    pub fn newest(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }

    /// Time until the oldest timestamp leaves the window.
    ///
    /// Saturates to `window` when the expiry is past what `Instant` can hold.
    pub fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        match self.oldest() {
            Some(oldest) => oldest
                .checked_add(window)
                .map_or(window, |expiry| expiry.saturating_duration_since(now)),
            None => Duration::ZERO,
        }
    }
}
