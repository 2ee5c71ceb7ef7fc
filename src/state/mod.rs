//! Office coordination service
//!
//! [`Office`] owns every agent's lifecycle machine and animation record plus
//! the shared resources they compete for: the two queues, the boss, the two
//! ready spots beside the boss, and the elevator. All mutation happens on the
//! caller's thread; events produced while handling an event are queued and
//! drained in order, so a transition never re-enters another one.

mod agent;
mod coordination;
mod motion;
mod snapshot;
mod sync;

pub use agent::{AgentAnimationState, BubbleState, PathState};
pub use coordination::{BossDesk, Elevator, Queues};
pub use snapshot::OfficeSnapshot;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::{OfficeConfig, MAX_AGENTS};
use crate::errors::{OfficeError, Result};
use crate::event::{HistoryEntry, OfficeInfo};
use crate::layout;
use crate::machine::{apply_effects, AgentMachine, MachineEvent, Phase};
use crate::nav::{CollisionManager, NavigationGrid};
use crate::queue::{queue_position, QueueKind};
use crate::timers::TimerQueue;

/// Phase changes kept for inspection
const MAX_PHASE_LOG: usize = 1000;

/// Backend history entries kept for the snapshot
const MAX_EVENTS: usize = 50;

/// Agent palette, assigned by desk when the backend sends no color
pub const AGENT_COLORS: [&str; 8] = [
    "#3B82F6", "#22C55E", "#A855F7", "#F97316", "#EC4899", "#06B6D4", "#EAB308", "#EF4444",
];

/// How a new agent enters the office
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnVariant {
    /// Steps out of the elevator and walks to the back of the arrival line
    Arriving,
    /// Already standing in the arrival line (reconnect)
    InArrivalQueue { index: i32 },
    /// Already standing in the departure line (reconnect)
    InDepartureQueue { index: i32 },
    /// Already working at its desk
    AtDesk,
}

impl SpawnVariant {
    fn event(self) -> MachineEvent {
        match self {
            SpawnVariant::Arriving => MachineEvent::SpawnArriving,
            SpawnVariant::InArrivalQueue { index } => MachineEvent::SpawnInArrivalQueue { index },
            SpawnVariant::InDepartureQueue { index } => {
                MachineEvent::SpawnInDepartureQueue { index }
            }
            SpawnVariant::AtDesk => MachineEvent::SpawnAtDesk,
        }
    }
}

/// Everything needed to put an agent on the floor
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub id: String,
    pub name: Option<String>,
    pub color: Option<String>,
    /// 1-based desk; the lowest free desk is used when absent
    pub desk: Option<u32>,
    pub task: Option<String>,
    pub variant: SpawnVariant,
}

impl SpawnRequest {
    pub fn new(id: impl Into<String>, variant: SpawnVariant) -> Self {
        Self {
            id: id.into(),
            name: None,
            color: None,
            desk: None,
            task: None,
            variant,
        }
    }
}

/// One entry of the phase transition log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseChange {
    pub at_ms: u64,
    pub agent_id: String,
    pub phase: Phase,
}

/// The coordination service
#[derive(Debug)]
pub struct Office {
    config: OfficeConfig,
    grid: NavigationGrid,
    collisions: CollisionManager,
    agents: BTreeMap<String, AgentAnimationState>,
    machines: BTreeMap<String, AgentMachine>,
    queues: Queues,
    boss: BossDesk,
    elevator: Elevator,
    timers: TimerQueue,
    /// Events waiting to be fed to machines, drained by `pump`
    pending: VecDeque<(String, MachineEvent)>,
    rng: StdRng,
    now_ms: u64,
    last_tick_ms: Option<u64>,
    compaction_until: Option<u64>,
    desk_count: u32,
    session_id: Option<String>,
    /// Agents the backend wants gone, departed once they are idle
    pending_departures: BTreeSet<String>,
    office_info: OfficeInfo,
    phase_log: VecDeque<PhaseChange>,
    events: VecDeque<HistoryEntry>,
    /// Backend time of the newest snapshot applied this session
    last_state_at: Option<DateTime<Utc>>,
    /// Backend time of the newest history event seen
    last_event_at: Option<DateTime<Utc>>,
}

impl Office {
    pub fn new(config: OfficeConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.simulation.seed);
        let collisions = CollisionManager::new(config.collision.clone());
        Self {
            config,
            grid: NavigationGrid::office(),
            collisions,
            agents: BTreeMap::new(),
            machines: BTreeMap::new(),
            queues: Queues::default(),
            boss: BossDesk::default(),
            elevator: Elevator::default(),
            timers: TimerQueue::new(),
            pending: VecDeque::new(),
            rng,
            now_ms: 0,
            last_tick_ms: None,
            compaction_until: None,
            desk_count: layout::DEFAULT_DESK_COUNT,
            session_id: None,
            pending_departures: BTreeSet::new(),
            office_info: OfficeInfo::default(),
            phase_log: VecDeque::new(),
            events: VecDeque::new(),
            last_state_at: None,
            last_event_at: None,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn phase(&self, id: &str) -> Option<Phase> {
        self.machines.get(id).map(AgentMachine::phase)
    }

    pub fn is_compacting(&self) -> bool {
        self.compaction_until.is_some_and(|until| self.now_ms < until)
    }

    /// Phase transitions in the order they happened
    pub fn phase_log(&self) -> impl Iterator<Item = &PhaseChange> {
        self.phase_log.iter()
    }

    /// Put a new agent on the floor and start its lifecycle
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<()> {
        if self.machines.contains_key(&request.id) {
            tracing::warn!(agent = %request.id, "Duplicate spawn ignored");
            return Err(OfficeError::DuplicateSpawn(request.id));
        }
        if self.agents.len() >= MAX_AGENTS {
            tracing::warn!(agent = %request.id, "Office full, spawn rejected");
            return Err(OfficeError::OfficeFull(MAX_AGENTS));
        }

        let desk = self.assign_desk(request.desk);
        let position = match request.variant {
            SpawnVariant::Arriving => layout::ELEVATOR_INSIDE,
            SpawnVariant::InArrivalQueue { index } => queue_position(QueueKind::Arrival, index),
            SpawnVariant::InDepartureQueue { index } => {
                queue_position(QueueKind::Departure, index)
            }
            SpawnVariant::AtDesk => layout::desk_position(desk, self.desk_count),
        };
        let name = request
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Agent {desk}"));
        let color = request
            .color
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| AGENT_COLORS[(desk as usize - 1) % AGENT_COLORS.len()].to_string());

        let mut agent = AgentAnimationState::new(&request.id, &name, &color, desk, position);
        agent.task = request.task;
        self.grid.update_agent_position(&request.id, position);
        self.collisions.register(&request.id, position);
        self.collisions.set_parked(&request.id, true);
        self.agents.insert(request.id.clone(), agent);
        self.machines.insert(request.id.clone(), AgentMachine::new());

        tracing::info!(
            agent = %request.id,
            desk,
            variant = ?request.variant,
            "Agent spawned"
        );
        self.pending
            .push_back((request.id, request.variant.event()));
        self.pump();
        Ok(())
    }

    /// Send an idle agent home
    pub fn depart(&mut self, id: &str) -> Result<()> {
        let Some(machine) = self.machines.get(id) else {
            tracing::warn!(agent = %id, "Departure for unknown agent");
            return Err(OfficeError::UnknownAgent(id.to_string()));
        };
        let phase = machine.phase();
        if phase != Phase::Idle {
            tracing::debug!(agent = %id, %phase, "Departure deferred, agent not idle");
            return Err(OfficeError::NotIdle {
                id: id.to_string(),
                phase: phase.to_string(),
            });
        }
        self.pending.push_back((id.to_string(), MachineEvent::Depart));
        self.pump();
        Ok(())
    }

    /// Tear an agent down immediately, wherever it is
    pub fn remove(&mut self, id: &str) -> Result<()> {
        if !self.machines.contains_key(id) {
            return Err(OfficeError::UnknownAgent(id.to_string()));
        }
        self.teardown(id);
        self.pump();
        Ok(())
    }

    /// Feed an event to one agent's machine
    pub fn send(&mut self, id: &str, event: MachineEvent) -> Result<()> {
        if !self.machines.contains_key(id) {
            tracing::warn!(agent = %id, ?event, "Event for unknown agent");
            return Err(OfficeError::UnknownAgent(id.to_string()));
        }
        self.pending.push_back((id.to_string(), event));
        self.pump();
        Ok(())
    }

    /// Drop every agent and reset shared resources
    pub fn reset(&mut self) {
        let count = self.agents.len();
        self.agents.clear();
        self.machines.clear();
        self.grid.clear_dynamic_obstacles();
        self.collisions.clear();
        self.queues = Queues::default();
        self.boss = BossDesk::default();
        self.elevator = Elevator::default();
        self.timers.clear();
        self.pending.clear();
        self.pending_departures.clear();
        self.compaction_until = None;
        self.last_state_at = None;
        tracing::info!(removed = count, "Office reset");
    }

    /// Open the context-compaction window; the boss serves nobody meanwhile
    pub fn start_compaction(&mut self) {
        let until = self.now_ms + self.config.timing.compaction_ms;
        self.compaction_until = Some(until);
        tracing::info!(until_ms = until, "Context compaction started");
    }

    /// Drain queued machine events until none are left
    fn pump(&mut self) {
        while let Some((id, event)) = self.pending.pop_front() {
            let Some(machine) = self.machines.get_mut(&id) else {
                tracing::debug!(agent = %id, ?event, "Event for removed agent dropped");
                continue;
            };
            let before = machine.phase();
            let Some(effects) = machine.send(event) else {
                tracing::trace!(agent = %id, phase = %before, ?event, "Event ignored");
                continue;
            };
            let after = machine.phase();
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.phase = after;
            }
            if after != before {
                self.record_phase(&id, after);
            }
            apply_effects(self, &id, &effects);
        }
    }

    fn record_phase(&mut self, id: &str, phase: Phase) {
        tracing::debug!(agent = %id, %phase, "Phase change");
        if phase == Phase::InElevator {
            // Inside the car, off the floor
            self.grid.remove_dynamic_obstacle(id);
            self.collisions.unregister(id);
        }
        self.phase_log.push_back(PhaseChange {
            at_ms: self.now_ms,
            agent_id: id.to_string(),
            phase,
        });
        if self.phase_log.len() > MAX_PHASE_LOG {
            self.phase_log.pop_front();
        }
    }

    fn record_event(&mut self, entry: HistoryEntry) {
        if let Some(at) = entry.time() {
            self.last_event_at = Some(self.last_event_at.map_or(at, |last| last.max(at)));
        }
        self.events.push_back(entry);
        if self.events.len() > MAX_EVENTS {
            self.events.pop_front();
        }
    }

    fn assign_desk(&self, requested: Option<u32>) -> u32 {
        if let Some(desk) = requested.filter(|d| *d >= 1) {
            return desk;
        }
        let taken: BTreeSet<u32> = self.agents.values().map(|a| a.desk).collect();
        (1..=self.desk_count)
            .find(|d| !taken.contains(d))
            .unwrap_or_else(|| (self.agents.len() as u32 % self.desk_count.max(1)) + 1)
    }
}

/// Read access for inspecting the office from tests
#[cfg(test)]
impl Office {
    pub fn agent(&self, id: &str) -> Option<&AgentAnimationState> {
        self.agents.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentAnimationState> {
        self.agents.values()
    }

    /// Members standing in a line, front first
    pub fn queue(&self, kind: QueueKind) -> Vec<String> {
        self.queues.line(kind)
    }

    pub fn boss(&self) -> &BossDesk {
        &self.boss
    }

    pub fn elevator(&self) -> &Elevator {
        &self.elevator
    }

    pub fn grid(&self) -> &NavigationGrid {
        &self.grid
    }

    pub fn desk_count(&self) -> u32 {
        self.desk_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FrameScheduler, ManualClock};
    use crate::machine::AgentActions;

    fn office() -> Office {
        Office::new(OfficeConfig::default())
    }

    fn scheduler() -> FrameScheduler<ManualClock> {
        FrameScheduler::new(ManualClock::new(0), 60.0)
    }

    fn phases_of(office: &Office, id: &str) -> Vec<Phase> {
        office
            .phase_log()
            .filter(|c| c.agent_id == id)
            .map(|c| c.phase)
            .collect()
    }

    /// Every line's indices match array order, and only one head per line
    fn assert_queue_invariants(office: &Office) {
        for kind in QueueKind::ALL {
            for (i, id) in office.queue(kind).iter().enumerate() {
                let agent = office.agent(id).unwrap();
                assert_eq!(agent.queue, Some(kind), "{id} in {kind}");
                assert_eq!(agent.queue_index, i as i32, "{id} in {kind}");
            }
            let heads = office
                .agents()
                .filter(|a| a.queue == Some(kind) && a.queue_index == 0)
                .count();
            assert!(heads <= 1, "{heads} heads in {kind}");
        }
    }

    #[test]
    fn test_arrival_lifecycle_end_to_end() {
        let mut office = office();
        let frames = scheduler();
        office
            .spawn(SpawnRequest::new("agent-1", SpawnVariant::Arriving))
            .unwrap();

        let mut joins = 0;
        let mut leaves = 0;
        let mut in_line = false;
        for _ in 0..(60_000 / frames.frame_ms()) {
            frames.clock().advance(frames.frame_ms());
            frames.tick(&mut office);
            let now_in_line = office.queue(QueueKind::Arrival).iter().any(|id| id == "agent-1");
            if now_in_line && !in_line {
                joins += 1;
            }
            if !now_in_line && in_line {
                leaves += 1;
            }
            in_line = now_in_line;
            if office.phase("agent-1") == Some(Phase::Idle) {
                break;
            }
        }

        assert_eq!(
            phases_of(&office, "agent-1"),
            vec![
                Phase::Arriving,
                Phase::InArrivalQueue,
                Phase::WalkingToReady,
                Phase::Conversing,
                Phase::WalkingToBoss,
                Phase::AtBoss,
                Phase::WalkingToDesk,
                Phase::Idle,
            ]
        );
        assert_eq!((joins, leaves), (1, 1));

        let agent = office.agent("agent-1").unwrap();
        assert_eq!(agent.position, layout::desk_position(1, 8));
        assert_eq!(agent.queue, None);
        assert!(office.boss().holder.is_none());
        assert!(!office.elevator().is_open());
    }

    #[test]
    fn test_departure_lifecycle_end_to_end() {
        let mut office = office();
        let frames = scheduler();
        office
            .spawn(SpawnRequest::new("agent-1", SpawnVariant::AtDesk))
            .unwrap();
        office.depart("agent-1").unwrap();

        let removed = frames.run_until(&mut office, 60_000, |o| o.phase("agent-1").is_none());
        assert!(removed);
        assert_eq!(
            phases_of(&office, "agent-1"),
            vec![
                Phase::Idle,
                Phase::Departing,
                Phase::InDepartureQueue,
                Phase::WalkingToReady,
                Phase::Conversing,
                Phase::WalkingToBoss,
                Phase::AtBoss,
                Phase::WalkingToElevator,
                Phase::InElevator,
                Phase::WaitingForDoorClose,
                Phase::ElevatorClosing,
                Phase::Removed,
            ]
        );
        assert!(!office.elevator().is_open());
        assert_eq!(office.elevator().usage(), 0);
        assert!(office.boss().holder.is_none());
        assert_eq!(office.grid().dynamic_obstacle_count(), 0);
    }

    #[test]
    fn test_queue_indices_stay_contiguous() {
        let mut office = office();
        let frames = scheduler();
        for i in 1..=4 {
            office
                .spawn(SpawnRequest::new(format!("agent-{i}"), SpawnVariant::Arriving))
                .unwrap();
            for _ in 0..40 {
                frames.clock().advance(frames.frame_ms());
                frames.tick(&mut office);
                assert_queue_invariants(&office);
            }
        }

        let all_idle = frames.run_until(&mut office, 180_000, |o| {
            assert_queue_invariants(o);
            o.agents().all(|a| a.phase == Phase::Idle)
        });
        assert!(all_idle);
        assert!(office.queue(QueueKind::Arrival).is_empty());
    }

    #[test]
    fn test_simultaneous_departures_all_leave() {
        let mut office = office();
        let frames = scheduler();
        let ids: Vec<String> = (1..=4).map(|i| format!("agent-{i}")).collect();
        for id in &ids {
            office
                .spawn(SpawnRequest::new(id.as_str(), SpawnVariant::AtDesk))
                .unwrap();
        }
        for id in &ids {
            office.depart(id).unwrap();
        }

        let all_removed = frames.run_until(&mut office, 300_000, |o| {
            assert_queue_invariants(o);
            o.agent_count() == 0
        });
        assert!(all_removed, "{}", office.debug_grid());
        for id in &ids {
            assert_eq!(phases_of(&office, id).last(), Some(&Phase::Removed), "{id}");
        }
        assert_eq!(office.elevator().usage(), 0);
        assert!(office.boss().holder.is_none());
        assert_eq!(office.grid().dynamic_obstacle_count(), 0);
    }

    #[test]
    fn test_simultaneous_arrivals_all_settle() {
        let mut office = office();
        let frames = scheduler();
        for i in 1..=6 {
            office
                .spawn(SpawnRequest::new(format!("agent-{i}"), SpawnVariant::Arriving))
                .unwrap();
        }
        assert_eq!(office.elevator().usage(), 6);

        let all_idle = frames.run_until(&mut office, 300_000, |o| {
            assert_queue_invariants(o);
            o.agents().all(|a| a.phase == Phase::Idle)
        });
        assert!(all_idle, "{}", office.debug_grid());
        assert!(office.queue(QueueKind::Arrival).is_empty());
        assert!(!office.elevator().is_open());
        assert!(office.boss().holder.is_none());
        for agent in office.agents() {
            assert_eq!(agent.position, layout::desk_position(agent.desk, 8), "{}", agent.id);
            let visits = phases_of(&office, &agent.id)
                .into_iter()
                .filter(|p| *p == Phase::AtBoss)
                .count();
            assert_eq!(visits, 1, "{}", agent.id);
        }
    }

    #[test]
    fn test_arrival_head_served_before_departure_head() {
        let mut office = office();
        office
            .spawn(SpawnRequest::new("leaver", SpawnVariant::InDepartureQueue { index: 0 }))
            .unwrap();
        office
            .spawn(SpawnRequest::new("newcomer", SpawnVariant::InArrivalQueue { index: 0 }))
            .unwrap();
        office.tick(16);

        assert_eq!(
            office.boss().holder,
            Some(("newcomer".to_string(), QueueKind::Arrival))
        );
        assert_eq!(office.phase("newcomer"), Some(Phase::WalkingToReady));
        assert_eq!(office.phase("leaver"), Some(Phase::InDepartureQueue));
    }

    #[test]
    fn test_departure_head_served_when_no_arrivals() {
        let mut office = office();
        office
            .spawn(SpawnRequest::new("leaver", SpawnVariant::InDepartureQueue { index: 0 }))
            .unwrap();
        office.tick(16);
        assert_eq!(
            office.boss().holder,
            Some(("leaver".to_string(), QueueKind::Departure))
        );
    }

    #[test]
    fn test_elevator_reference_count() {
        let mut office = office();
        office.open_elevator("a");
        office.open_elevator("b");
        office.close_elevator("a");
        assert!(office.elevator().is_open());
        assert_eq!(office.elevator().usage(), 1);

        office.close_elevator("b");
        assert!(!office.elevator().is_open());
        assert_eq!(office.elevator().usage(), 0);
    }

    #[test]
    fn test_compaction_blocks_boss() {
        let mut office = office();
        office.start_compaction();
        office
            .spawn(SpawnRequest::new("newcomer", SpawnVariant::InArrivalQueue { index: 0 }))
            .unwrap();

        office.tick(5_000);
        assert!(office.boss().holder.is_none());
        assert_eq!(office.phase("newcomer"), Some(Phase::InArrivalQueue));

        office.tick(10_001);
        assert_eq!(office.phase("newcomer"), Some(Phase::WalkingToReady));
    }

    #[test]
    fn test_remove_cancels_everything() {
        let mut office = office();
        let frames = scheduler();
        office
            .spawn(SpawnRequest::new("agent-1", SpawnVariant::Arriving))
            .unwrap();
        frames.run_until(&mut office, 500, |_| false);
        assert!(office.elevator().is_open());

        office.remove("agent-1").unwrap();
        assert!(office.agent("agent-1").is_none());
        assert_eq!(office.phase("agent-1"), None);
        assert_eq!(office.timers.pending_for("agent-1"), 0);
        assert_eq!(office.grid().dynamic_obstacle_count(), 0);
        assert_eq!(office.elevator().usage(), 0);
        assert!(office.queue(QueueKind::Arrival).is_empty());

        // Late events are refused
        assert!(matches!(
            office.send("agent-1", MachineEvent::ArrivedAtQueue),
            Err(OfficeError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_remove_mid_conversation_frees_boss() {
        let mut office = office();
        office
            .spawn(SpawnRequest::new("a", SpawnVariant::InArrivalQueue { index: 0 }))
            .unwrap();
        office
            .spawn(SpawnRequest::new("b", SpawnVariant::InArrivalQueue { index: 1 }))
            .unwrap();
        office.tick(16);
        assert_eq!(office.boss().holder.as_ref().map(|h| h.0.as_str()), Some("a"));

        office.remove("a").unwrap();
        assert!(office.boss().holder.is_none());
        assert_eq!(office.agent("b").unwrap().queue_index, 0);
    }

    #[test]
    fn test_spawn_rules() {
        let mut office = office();
        office.spawn(SpawnRequest::new("a", SpawnVariant::AtDesk)).unwrap();
        assert!(matches!(
            office.spawn(SpawnRequest::new("a", SpawnVariant::Arriving)),
            Err(OfficeError::DuplicateSpawn(_))
        ));

        office.spawn(SpawnRequest::new("b", SpawnVariant::AtDesk)).unwrap();
        assert_eq!(office.agent("a").unwrap().desk, 1);
        assert_eq!(office.agent("b").unwrap().desk, 2);
        assert_eq!(office.agent("b").unwrap().color, AGENT_COLORS[1]);
    }

    #[test]
    fn test_depart_requires_idle() {
        let mut office = office();
        office.spawn(SpawnRequest::new("a", SpawnVariant::Arriving)).unwrap();
        assert!(matches!(
            office.depart("a"),
            Err(OfficeError::NotIdle { .. })
        ));
        assert!(matches!(
            office.depart("ghost"),
            Err(OfficeError::UnknownAgent(_))
        ));
        assert_eq!(office.phase("a"), Some(Phase::Arriving));
    }

    #[test]
    fn test_same_seed_same_outcome() {
        fn run() -> String {
            let mut office = Office::new(OfficeConfig::default());
            let frames = FrameScheduler::new(ManualClock::new(0), 60.0);
            for i in 1..=3 {
                office
                    .spawn(SpawnRequest::new(format!("agent-{i}"), SpawnVariant::Arriving))
                    .unwrap();
            }
            frames.run_until(&mut office, 20_000, |_| false);
            serde_json::to_string(&office.snapshot()).unwrap()
        }
        assert_eq!(run(), run());
    }
}
