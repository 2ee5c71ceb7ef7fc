//! Reconciling backend snapshots and history events with the office

use std::collections::BTreeSet;

use super::{Office, SpawnRequest, SpawnVariant};
use crate::event::{
    parse_timestamp, BackendAgentState, BackendMessage, GameState, HistoryEntry, SnapshotAgent,
};
use crate::layout;
use crate::machine::Phase;

impl Office {
    /// Apply one decoded backend message.
    ///
    /// A snapshot stamped earlier than the last one applied for the same
    /// session arrived out of order and is dropped. An event without its own
    /// timestamp takes the message's.
    pub fn apply_message(&mut self, message: BackendMessage) {
        match message {
            BackendMessage::StateUpdate { timestamp, state } => {
                let at = timestamp.as_deref().and_then(parse_timestamp);
                let same_session = self.session_id.as_deref() == Some(state.session_id.as_str());
                if let (Some(at), Some(last), true) = (at, self.last_state_at, same_session) {
                    if at < last {
                        tracing::debug!(%at, %last, "Stale snapshot dropped");
                        return;
                    }
                }
                self.apply_state(&state);
                if at.is_some() {
                    self.last_state_at = at;
                }
            }
            BackendMessage::Event {
                timestamp,
                mut event,
            } => {
                if event.timestamp.is_none() {
                    event.timestamp = timestamp;
                }
                self.apply_event(event);
            }
            BackendMessage::Unknown => {}
        }
    }

    /// Bring the office in line with a full backend snapshot.
    ///
    /// New agents are spawned, known ones get their name, color, task,
    /// bubble and typing flag refreshed, and agents the backend no longer
    /// lists (or lists as leaving) are sent home once idle.
    pub fn apply_state(&mut self, state: &GameState) {
        let reconnect = self.session_id.as_deref() != Some(state.session_id.as_str());
        if reconnect {
            if self.session_id.is_some() {
                tracing::info!(session = %state.session_id, "New session, resetting office");
                self.reset();
            }
            self.session_id = Some(state.session_id.clone());
        }

        self.desk_count = state.office.desk_count.clamp(1, layout::MAX_DESKS);
        self.office_info = state.office.clone();

        for agent in &state.agents {
            if self.machines.contains_key(&agent.id) {
                self.refresh_agent(agent);
            } else {
                let variant = spawn_variant(state, agent, reconnect);
                self.spawn_from_snapshot(agent, variant);
            }
        }

        if let Some(bubble) = &state.boss.bubble {
            self.boss.bubble.push_backend(bubble.clone(), self.now_ms);
        }

        let listed: BTreeSet<&str> = state.agents.iter().map(|a| a.id.as_str()).collect();
        let leaving: BTreeSet<&str> = state.departure_queue.iter().map(String::as_str).collect();
        let ids: Vec<String> = self.agents.keys().cloned().collect();
        for id in ids {
            let wanted_gone = !listed.contains(id.as_str()) || leaving.contains(id.as_str());
            let phase = self.agents.get(&id).map(|a| a.phase);
            if wanted_gone {
                if phase.is_some_and(|p| !p.is_departing()) && self.pending_departures.insert(id.clone()) {
                    tracing::debug!(agent = %id, "Departure requested");
                }
            } else {
                self.pending_departures.remove(&id);
            }
        }

        self.process_pending_departures();
    }

    fn spawn_from_snapshot(&mut self, agent: &SnapshotAgent, variant: SpawnVariant) {
        let request = SpawnRequest {
            id: agent.id.clone(),
            name: agent.name.clone(),
            color: Some(agent.color.clone()),
            desk: agent.desk,
            task: agent.current_task.clone(),
            variant,
        };
        if let Err(e) = self.spawn(request) {
            tracing::warn!(agent = %agent.id, error = %e, "Spawn from snapshot failed");
            return;
        }
        self.refresh_agent(agent);
    }

    fn refresh_agent(&mut self, snapshot: &SnapshotAgent) {
        let now = self.now_ms;
        let Some(agent) = self.agents.get_mut(&snapshot.id) else {
            return;
        };
        if let Some(name) = snapshot.name.as_deref().filter(|n| !n.is_empty()) {
            if agent.name != name {
                agent.name = name.to_string();
            }
        }
        if !snapshot.color.is_empty() && agent.color != snapshot.color {
            agent.color = snapshot.color.clone();
        }
        if snapshot.current_task.is_some() {
            agent.task = snapshot.current_task.clone();
        }
        agent.typing = agent.phase == Phase::Idle && snapshot.state.is_busy();
        if let Some(bubble) = &snapshot.bubble {
            agent.bubble.push_backend(bubble.clone(), now);
        }
    }

    /// Depart agents the backend wants gone as soon as they are idle.
    /// Agents already leaving or gone are forgotten; the rest wait.
    pub(super) fn process_pending_departures(&mut self) {
        if self.pending_departures.is_empty() {
            return;
        }
        let ids: Vec<String> = self.pending_departures.iter().cloned().collect();
        for id in ids {
            match self.phase(&id) {
                Some(Phase::Idle) => {
                    self.pending_departures.remove(&id);
                    if let Err(e) = self.depart(&id) {
                        tracing::warn!(agent = %id, error = %e, "Departure failed");
                    }
                }
                Some(phase) if !phase.is_departing() => {}
                _ => {
                    self.pending_departures.remove(&id);
                }
            }
        }
    }

    /// Apply one history event from the backend
    pub fn apply_event(&mut self, entry: HistoryEntry) {
        match entry.kind.as_str() {
            HistoryEntry::SESSION_START => {
                tracing::info!("Session started, resetting office");
                self.reset();
            }
            HistoryEntry::CONTEXT_COMPACTION => self.start_compaction(),
            HistoryEntry::PRE_TOOL_USE | HistoryEntry::POST_TOOL_USE
                if !entry.agent_id.is_empty() && entry.agent_id != HistoryEntry::MAIN_AGENT =>
            {
                let busy = entry.kind == HistoryEntry::PRE_TOOL_USE;
                match self.agents.get_mut(&entry.agent_id) {
                    Some(agent) => agent.typing = busy && agent.phase == Phase::Idle,
                    None => tracing::warn!(agent = %entry.agent_id, "Tool use for unknown agent"),
                }
            }
            _ => {}
        }
        self.record_event(entry);
    }
}

/// How a newly seen agent should enter
fn spawn_variant(state: &GameState, agent: &SnapshotAgent, reconnect: bool) -> SpawnVariant {
    let position = |line: &[String]| {
        line.iter()
            .position(|id| *id == agent.id)
            .map(|i| i as i32)
    };
    if let Some(index) = position(&state.departure_queue) {
        return SpawnVariant::InDepartureQueue { index };
    }
    let in_arrivals = position(&state.arrival_queue);
    if in_arrivals.is_some() || agent.state == BackendAgentState::Arriving {
        if reconnect {
            return SpawnVariant::InArrivalQueue {
                index: in_arrivals.unwrap_or(state.arrival_queue.len() as i32),
            };
        }
        return SpawnVariant::Arriving;
    }
    SpawnVariant::AtDesk
}
