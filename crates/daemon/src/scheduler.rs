// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadline scheduling.
//!
//! A min-heap of monotonic deadlines for the two change windows. The
//! engine polls [`Scheduler::fired`] on its timer tick and posts the
//! resulting events onto the ledger queue; the scheduler never executes
//! anything itself. Monotonic time means wall-clock steps cannot
//! shorten or extend an armed window.

use rvt_core::{ChangeId, TimerKind};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TimerKey {
    change_id: ChangeId,
    kind: TimerKind,
}

/// A deadline that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub change_id: ChangeId,
    pub kind: TimerKind,
}

/// Min-heap of `(deadline, change, kind)` with lazy cancellation: the
/// map holds the authoritative deadline, heap entries that no longer
/// match are skipped on pop.
#[derive(Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    entries: HashMap<TimerKey, (Instant, u64)>,
    by_token: HashMap<u64, TimerKey>,
    next_token: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer.
    pub fn schedule(&mut self, change_id: ChangeId, kind: TimerKind, delay: Duration, now: Instant) {
        let key = TimerKey { change_id, kind };
        let at = now + delay;
        self.next_token += 1;
        let token = self.next_token;
        if let Some((_, old_token)) = self.entries.insert(key.clone(), (at, token)) {
            self.by_token.remove(&old_token);
        }
        self.by_token.insert(token, key);
        self.heap.push(Reverse((at, token)));
    }

    /// Disarm a timer; a no-op if it is not armed.
    pub fn cancel(&mut self, change_id: &ChangeId, kind: TimerKind) {
        let key = TimerKey { change_id: change_id.clone(), kind };
        if let Some((_, token)) = self.entries.remove(&key) {
            self.by_token.remove(&token);
        }
    }

    /// Pop every timer due at `now`, in deadline order.
    pub fn fired(&mut self, now: Instant) -> Vec<Fired> {
        let mut due = Vec::new();
        while let Some(Reverse((at, token))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            // Skip stale heap entries (cancelled or re-armed)
            let Some(key) = self.by_token.remove(&token) else { continue };
            if self.entries.get(&key).is_some_and(|(t, tok)| *t == at && *tok == token) {
                self.entries.remove(&key);
                due.push(Fired { change_id: key.change_id, kind: key.kind });
            }
        }
        due
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|(at, _)| *at).min()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
