//! Scheduled continuations
//!
//! Lifecycle steps that happen "after a while" (conversation pacing, boss
//! pause, elevator doors) are queued here and fired by the tick loop. Ties on
//! the due time fire in scheduling order.

use std::collections::BTreeMap;

use crate::machine::MachineEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    pub agent_id: String,
    pub event: MachineEvent,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: BTreeMap<(u64, u64), Timer>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, agent_id: &str, event: MachineEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(
            (due_ms, seq),
            Timer {
                agent_id: agent_id.to_string(),
                event,
            },
        );
    }

    /// Remove and return every timer due at or before `now_ms`, in order
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<Timer> {
        if self.is_empty() {
            return Vec::new();
        }
        let later = self.timers.split_off(&(now_ms.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.timers, later);
        due.into_values().collect()
    }

    /// Drop all pending timers for an agent
    pub fn cancel(&mut self, agent_id: &str) {
        self.timers.retain(|_, timer| timer.agent_id != agent_id);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    #[cfg(test)]
    pub fn pending_for(&self, agent_id: &str) -> usize {
        self.timers
            .values()
            .filter(|timer| timer.agent_id == agent_id)
            .count()
    }
}
