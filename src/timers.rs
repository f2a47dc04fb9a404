//! Deferred callbacks on the router's single timeline
//!
//! Each [`TimerKind`] has at most one pending deadline. Posting a kind that is
//! already pending replaces it, so a restart can never leave two tick loops
//! running.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    Tick,
    Blink,
    Reset,
    Unhide,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: HashMap<TimerKind, Instant>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending callback of this kind, then post a new one
    pub fn post(&mut self, kind: TimerKind, now: Instant, delay: Duration) {
        let deadline = now + delay;
        if let Some(previous) = self.pending.insert(kind, deadline) {
            trace!(?kind, ?previous, "Replaced pending callback");
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.pending.remove(&kind).is_some()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.pending.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return the earliest callback that is due at `now`.
    /// Ties are broken by kind order so delivery is deterministic.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let kind = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .min_by_key(|(kind, deadline)| (**deadline, **kind))
            .map(|(kind, _)| *kind)?;
        self.pending.remove(&kind);
        Some(kind)
    }
}
