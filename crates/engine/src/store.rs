//! In-memory gating state: event dedup and notification throttling.
//!
//! Dedup is a bounded FIFO of recently processed event ids; when full,
//! the oldest entry is evicted to admit the new one. Throttling tracks
//! the last notification time per `(subject, keyword)` pair. Both are
//! swept periodically by the cleanup task.
//!
//! Every time-sensitive operation has an `_at` variant taking an
//! explicit `now` so tests stay deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sieve_core::EngineConfig;
use tracing::debug;

#[derive(Debug, Clone)]
struct DedupEntry {
    event_id: String,
    first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct GateState {
    dedup: VecDeque<DedupEntry>,
    /// `(subject, keyword)` -> last notification time.
    throttle: HashMap<(String, String), DateTime<Utc>>,
}

/// Shared dedup/throttle store. All methods take `&self`; interior
/// state lives behind a mutex.
#[derive(Debug)]
pub struct GateStore {
    state: Mutex<GateState>,
    dedup_capacity: usize,
    cool_down: chrono::Duration,
    dedup_retention: chrono::Duration,
}

impl GateStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            dedup_capacity: config.dedup_capacity,
            cool_down: config.cool_down(),
            dedup_retention: config.dedup_retention(),
        }
    }

    // ── Dedup ────────────────────────────────────────────────────────

    /// Whether this event id was already processed recently.
    pub fn seen(&self, event_id: &str) -> bool {
        let state = self.state.lock().expect("gate store lock poisoned");
        state.dedup.iter().any(|e| e.event_id == event_id)
    }

    /// Record an event id, evicting the oldest entry when full.
    pub fn mark(&self, event_id: &str) {
        self.mark_at(event_id, Utc::now());
    }

    pub fn mark_at(&self, event_id: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock().expect("gate store lock poisoned");
        if self.dedup_capacity == 0 {
            return;
        }
        while state.dedup.len() >= self.dedup_capacity {
            state.dedup.pop_front();
        }
        state.dedup.push_back(DedupEntry {
            event_id: event_id.to_string(),
            first_seen_at: now,
        });
    }

    /// Atomic seen-check plus mark. Returns `true` when the event is
    /// new and has been recorded, `false` when it is a duplicate.
    pub fn check_and_mark(&self, event_id: &str) -> bool {
        self.check_and_mark_at(event_id, Utc::now())
    }

    pub fn check_and_mark_at(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().expect("gate store lock poisoned");
        if state.dedup.iter().any(|e| e.event_id == event_id) {
            return false;
        }
        if self.dedup_capacity == 0 {
            return true;
        }
        while state.dedup.len() >= self.dedup_capacity {
            state.dedup.pop_front();
        }
        state.dedup.push_back(DedupEntry {
            event_id: event_id.to_string(),
            first_seen_at: now,
        });
        true
    }

    // ── Throttle ─────────────────────────────────────────────────────

    /// Whether a notification for this `(subject, keyword)` pair fired
    /// within the cool-down window.
    pub fn should_suppress(&self, subject: &str, keyword: &str) -> bool {
        self.should_suppress_at(subject, keyword, Utc::now())
    }

    pub fn should_suppress_at(&self, subject: &str, keyword: &str, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().expect("gate store lock poisoned");
        state
            .throttle
            .get(&(subject.to_string(), keyword.to_string()))
            .is_some_and(|last| now - *last < self.cool_down)
    }

    /// Record a notification for this pair, restarting its window.
    pub fn record(&self, subject: &str, keyword: &str) {
        self.record_at(subject, keyword, Utc::now());
    }

    pub fn record_at(&self, subject: &str, keyword: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock().expect("gate store lock poisoned");
        state
            .throttle
            .insert((subject.to_string(), keyword.to_string()), now);
    }

    // ── Cleanup ──────────────────────────────────────────────────────

    /// Drop expired dedup entries and expired throttle records.
    ///
    /// Returns `(dedup_removed, throttle_removed)`.
    pub fn sweep(&self, now: DateTime<Utc>) -> (usize, usize) {
        let mut state = self.state.lock().expect("gate store lock poisoned");

        let before_dedup = state.dedup.len();
        let retention = self.dedup_retention;
        state.dedup.retain(|e| now - e.first_seen_at < retention);
        let dedup_removed = before_dedup - state.dedup.len();

        let before_throttle = state.throttle.len();
        let cool_down = self.cool_down;
        state.throttle.retain(|_, last| now - *last < cool_down);
        let throttle_removed = before_throttle - state.throttle.len();

        if dedup_removed > 0 || throttle_removed > 0 {
            debug!(dedup_removed, throttle_removed, "gate store swept");
        }
        (dedup_removed, throttle_removed)
    }

    #[cfg(test)]
    fn dedup_len(&self) -> usize {
        self.state.lock().expect("gate store lock poisoned").dedup.len()
    }
}
