//! Shared resources and the effect ports the lifecycle machines drive
//!
//! Queues, the boss, the ready spots beside the boss, and the elevator all
//! live here. Every mutation is a method on [`Office`], reached through
//! [`AgentActions`] when a machine transition asks for it.

use rand::Rng;

use super::Office;
use crate::event::BubbleContent;
use crate::layout;
use crate::machine::{AgentActions, Delay, Line, MachineEvent, MoveTarget, Phase, Speaker};
use crate::queue::{queue_position, ready_position, QueueKind};

/// Farewell lines, one picked at random as an agent leaves the boss
const FAREWELLS: [&str; 6] = [
    "See you next sprint!",
    "Heading out. Good luck!",
    "Off to the next job!",
    "Bye everyone!",
    "That was fun. Later!",
    "Logging off!",
];

/// Longest task text quoted in a speech bubble
const MAX_TASK_CHARS: usize = 40;

fn slot(kind: QueueKind) -> usize {
    match kind {
        QueueKind::Arrival => 0,
        QueueKind::Departure => 1,
    }
}

/// One place in a line: a member standing in it, or an agent still walking
/// to the slot it reserved
#[derive(Debug, Clone)]
struct Entry {
    id: String,
    joined: bool,
    /// Slot this entry was last sent to
    slot: i32,
}

/// Both lines, in slot order. Reservations hold their place, so an agent
/// that arrives early still stands behind anyone who reserved ahead of it.
#[derive(Debug, Default)]
pub struct Queues {
    entries: [Vec<Entry>; 2],
}

impl Queues {
    /// Members standing in a line, front first
    pub fn line(&self, kind: QueueKind) -> Vec<String> {
        self.entries[slot(kind)]
            .iter()
            .filter(|e| e.joined)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Physical slot of an agent in a line, member or not
    fn slot_of(&self, kind: QueueKind, id: &str) -> Option<i32> {
        self.entries[slot(kind)]
            .iter()
            .position(|e| e.id == id)
            .map(|i| i as i32)
    }

    /// Whoever holds slot 0, if they are standing in the line
    fn head(&self, kind: QueueKind) -> Option<&str> {
        self.entries[slot(kind)]
            .first()
            .filter(|e| e.joined)
            .map(|e| e.id.as_str())
    }

    /// Drop an agent from a line; true when it was there
    fn remove(&mut self, kind: QueueKind, id: &str) -> bool {
        let entries = &mut self.entries[slot(kind)];
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }
}

/// The boss and the spots beside the boss desk
#[derive(Debug, Default)]
pub struct BossDesk {
    /// Agent being served and the line it came from
    pub holder: Option<(String, QueueKind)>,
    /// Who stands in each ready spot
    pub ready: [Option<String>; 2],
    pub bubble: super::BubbleState,
}

impl BossDesk {
    pub fn in_use(&self) -> bool {
        self.holder.is_some()
    }

    pub fn ready_occupant(&self, kind: QueueKind) -> Option<&str> {
        self.ready[slot(kind)].as_deref()
    }
}

/// Elevator doors, open while anyone holds a claim
#[derive(Debug, Default)]
pub struct Elevator {
    usage: u32,
    /// Outstanding claims per agent, so teardown can return them
    claims: std::collections::BTreeMap<String, u32>,
}

impl Elevator {
    pub fn is_open(&self) -> bool {
        self.usage > 0
    }

    pub fn usage(&self) -> u32 {
        self.usage
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

impl Office {
    /// Offer the boss to a queue head when the boss is free.
    ///
    /// Skipped during compaction. The arrival head is checked first; a head
    /// must hold slot 0, be in line at index 0 and be standing still.
    pub fn notify_boss_available(&mut self) {
        if self.is_compacting() || self.boss.in_use() {
            return;
        }
        let offered = self
            .pending
            .iter()
            .any(|(_, event)| *event == MachineEvent::BossAvailable);
        if offered {
            return;
        }

        for kind in QueueKind::ALL {
            if self.boss.ready_occupant(kind).is_some() {
                continue;
            }
            let Some(head) = self.queues.head(kind) else {
                continue;
            };
            let Some(agent) = self.agents.get(head) else {
                continue;
            };
            let standing = !agent.is_walking() && agent.target.is_none();
            if agent.phase.is_queued() && agent.queue_index == 0 && standing {
                tracing::debug!(agent = %head, queue = %kind, "Boss offered to queue head");
                self.pending
                    .push_back((head.to_string(), MachineEvent::BossAvailable));
                return;
            }
        }
    }

    /// Recompute slots and indices for a line. Members whose slot or index
    /// moved are told; agents still walking to a reservation are sent on to
    /// their new slot.
    fn reindex(&mut self, kind: QueueKind) {
        let mut members = 0;
        let mut retarget = Vec::new();
        for (i, entry) in self.queues.entries[slot(kind)].iter_mut().enumerate() {
            let index = i as i32;
            let moved = entry.slot != index;
            entry.slot = index;
            let Some(agent) = self.agents.get_mut(&entry.id) else {
                continue;
            };
            if entry.joined {
                let member_index = members;
                members += 1;
                agent.queue = Some(kind);
                if moved || agent.queue_index != member_index {
                    agent.queue_index = member_index;
                    self.pending.push_back((
                        entry.id.clone(),
                        MachineEvent::QueuePositionChanged {
                            index: member_index,
                        },
                    ));
                }
            } else {
                agent.reserved = Some((kind, index));
                if moved && agent.target.is_some() {
                    retarget.push((entry.id.clone(), queue_position(kind, index)));
                }
            }
        }
        for (id, destination) in retarget {
            tracing::debug!(agent = %id, queue = %kind, "Reservation moved up");
            self.start_walk(&id, destination);
        }
    }

    /// Pull an agent out of lines and reservations everywhere
    fn forget_queues(&mut self, id: &str) {
        for kind in QueueKind::ALL {
            if self.queues.remove(kind, id) {
                self.reindex(kind);
            }
            if self.boss.ready[slot(kind)].as_deref() == Some(id) {
                self.boss.ready[slot(kind)] = None;
            }
        }
    }

    /// Close doors for good once nobody holds a claim
    fn maybe_close_doors(&mut self) {
        if self.elevator.usage > 0 {
            return;
        }
        let waiting: Vec<String> = self
            .agents
            .values()
            .filter(|a| a.phase == Phase::WaitingForDoorClose)
            .map(|a| a.id.clone())
            .collect();
        for id in waiting {
            self.pending.push_back((id, MachineEvent::DoorClosing));
        }
    }

    /// Remove every trace of an agent in one step
    pub(super) fn teardown(&mut self, id: &str) {
        self.machines.remove(id);
        self.agents.remove(id);
        self.grid.remove_dynamic_obstacle(id);
        self.collisions.unregister(id);
        self.timers.cancel(id);
        self.pending.retain(|(member, _)| member != id);
        self.pending_departures.remove(id);
        self.forget_queues(id);

        if self
            .boss
            .holder
            .as_ref()
            .is_some_and(|(holder, _)| holder == id)
        {
            self.boss.holder = None;
        }
        if let Some(claims) = self.elevator.claims.remove(id) {
            self.elevator.usage = self.elevator.usage.saturating_sub(claims);
            self.maybe_close_doors();
        }

        tracing::info!(agent = %id, "Agent removed");
        self.notify_boss_available();
    }

    /// Bookkeeping shared by both ways of joining a line
    fn joined(&mut self, id: &str, kind: QueueKind) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.reserved = None;
            agent.queue = Some(kind);
            // Force a position event so the machine learns its real index
            agent.queue_index = -1;
        }
        tracing::debug!(agent = %id, queue = %kind, "Joined queue");
        self.reindex(kind);
    }

    fn line_text(&self, id: &str, line: Line) -> String {
        let name = self.agents.get(id).map_or("there", |a| a.name.as_str());
        let task = self
            .agents
            .get(id)
            .and_then(|a| a.task.as_deref())
            .filter(|t| !t.is_empty());
        match (line, task) {
            (Line::Welcome, Some(task)) => {
                format!("Welcome, {name}! Your task: {}", truncate(task, MAX_TASK_CHARS))
            }
            (Line::Welcome, None) => format!("Welcome aboard, {name}!"),
            (Line::Acknowledge, _) => "On it, boss!".to_string(),
            (Line::Report, Some(task)) => format!("Done: {}", truncate(task, MAX_TASK_CHARS)),
            (Line::Report, None) => "All done, boss!".to_string(),
            (Line::Thanks, _) => format!("Great work, {name}!"),
        }
    }

    fn delay_ms(&self, delay: Delay) -> u64 {
        let timing = &self.config.timing;
        match delay {
            Delay::ConversationStep => timing.conversation_step_ms,
            Delay::ConversationDwell => timing.conversation_dwell_ms,
            Delay::BossPause => timing.boss_pause_ms,
            Delay::ElevatorPause => timing.elevator_pause_ms,
            Delay::DoorClose => timing.door_close_ms,
        }
    }
}

impl AgentActions for Office {
    fn move_to(&mut self, id: &str, target: MoveTarget) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let destination = match target {
            MoveTarget::QueueSlot(kind) => {
                let index = self
                    .queues
                    .slot_of(kind, id)
                    .unwrap_or(self.queues.entries[slot(kind)].len() as i32);
                queue_position(kind, index)
            }
            MoveTarget::Ready(kind) => ready_position(kind),
            MoveTarget::Boss => layout::BOSS_APPROACH,
            MoveTarget::Desk => layout::desk_position(agent.desk, self.desk_count),
            MoveTarget::Elevator => layout::ELEVATOR_INSIDE,
        };
        self.start_walk(id, destination);
    }

    fn reserve_queue(&mut self, id: &str, kind: QueueKind) {
        let entries = &mut self.queues.entries[slot(kind)];
        let index = match entries.iter().position(|e| e.id == id) {
            Some(i) => i as i32,
            None => {
                let index = entries.len() as i32;
                entries.push(Entry {
                    id: id.to_string(),
                    joined: false,
                    slot: index,
                });
                index
            }
        };
        if let Some(agent) = self.agents.get_mut(id) {
            agent.reserved = Some((kind, index));
        }
        tracing::debug!(agent = %id, queue = %kind, index, "Queue slot reserved");
    }

    fn join_queue(&mut self, id: &str, kind: QueueKind) {
        let entries = &mut self.queues.entries[slot(kind)];
        match entries.iter().position(|e| e.id == id) {
            Some(i) => entries[i].joined = true,
            None => {
                let index = entries.len() as i32;
                entries.push(Entry {
                    id: id.to_string(),
                    joined: true,
                    slot: index,
                });
            }
        }
        self.joined(id, kind);
    }

    fn join_queue_at(&mut self, id: &str, kind: QueueKind, index: i32) {
        self.queues.remove(kind, id);
        let entries = &mut self.queues.entries[slot(kind)];
        let at = (index.max(0) as usize).min(entries.len());
        entries.insert(
            at,
            Entry {
                id: id.to_string(),
                joined: true,
                slot: at as i32,
            },
        );
        self.joined(id, kind);
    }

    fn leave_queue(&mut self, id: &str, kind: QueueKind) {
        self.queues.remove(kind, id);
        if let Some(agent) = self.agents.get_mut(id) {
            agent.queue_index = -1;
        }
        tracing::debug!(agent = %id, queue = %kind, "Left queue");
        self.reindex(kind);
    }

    fn claim_boss(&mut self, id: &str, kind: QueueKind) {
        if let Some((holder, _)) = &self.boss.holder {
            if holder != id {
                tracing::warn!(agent = %id, holder = %holder, "Boss claimed while in use");
            }
        }
        self.boss.holder = Some((id.to_string(), kind));
        tracing::info!(agent = %id, queue = %kind, "Boss busy");
    }

    fn release_boss(&mut self, id: &str) {
        match &self.boss.holder {
            Some((holder, _)) if holder == id => {
                self.boss.holder = None;
                tracing::info!(agent = %id, "Boss free");
            }
            _ => tracing::debug!(agent = %id, "Release of boss not held"),
        }
        self.notify_boss_available();
    }

    fn occupy_ready(&mut self, id: &str, kind: QueueKind) {
        self.boss.ready[slot(kind)] = Some(id.to_string());
    }

    fn release_ready(&mut self, id: &str, kind: QueueKind) {
        if self.boss.ready[slot(kind)].as_deref() == Some(id) {
            self.boss.ready[slot(kind)] = None;
        }
        self.notify_boss_available();
    }

    fn open_elevator(&mut self, id: &str) {
        self.elevator.usage += 1;
        *self.elevator.claims.entry(id.to_string()).or_default() += 1;
        if self.elevator.usage == 1 {
            tracing::debug!(agent = %id, "Elevator opening");
        }
    }

    fn close_elevator(&mut self, id: &str) {
        match self.elevator.claims.get_mut(id) {
            Some(claims) => {
                *claims -= 1;
                if *claims == 0 {
                    self.elevator.claims.remove(id);
                }
                self.elevator.usage = self.elevator.usage.saturating_sub(1);
            }
            None => tracing::debug!(agent = %id, "Elevator close without a claim"),
        }
        if self.elevator.usage == 0 {
            tracing::debug!(agent = %id, "Elevator closing");
        }
        self.maybe_close_doors();
    }

    fn say(&mut self, id: &str, speaker: Speaker, line: Line) {
        let bubble = BubbleContent::speech(self.line_text(id, line));
        let now = self.now_ms;
        match speaker {
            Speaker::Boss => self.boss.bubble.push_local(bubble, now),
            Speaker::Agent => {
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.bubble.push_local(bubble, now);
                }
            }
        }
    }

    fn farewell(&mut self, id: &str) {
        let line = FAREWELLS[self.rng.gen_range(0..FAREWELLS.len())];
        let now = self.now_ms;
        if let Some(agent) = self.agents.get_mut(id) {
            agent.bubble.push_local(BubbleContent::speech(line), now);
        }
    }

    fn schedule(&mut self, id: &str, delay: Delay, event: MachineEvent) {
        let due = self.now_ms + self.delay_ms(delay);
        self.timers.schedule(due, id, event);
    }

    fn clear_queue_state(&mut self, id: &str) {
        self.forget_queues(id);
        if let Some(agent) = self.agents.get_mut(id) {
            agent.queue = None;
            agent.queue_index = -1;
            agent.reserved = None;
        }
    }

    fn notify_removed(&mut self, id: &str) {
        self.teardown(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use crate::state::{SpawnRequest, SpawnVariant};

    fn office() -> Office {
        Office::new(OfficeConfig::default())
    }

    #[test]
    fn test_reservations_stay_behind_members() {
        let mut office = office();
        office
            .spawn(SpawnRequest::new("m", SpawnVariant::InArrivalQueue { index: 0 }))
            .unwrap();
        for id in ["a", "b", "c"] {
            office.spawn(SpawnRequest::new(id, SpawnVariant::Arriving)).unwrap();
        }
        let reserved: Vec<i32> = ["a", "b", "c"]
            .iter()
            .map(|id| office.agent(id).unwrap().reserved.unwrap().1)
            .collect();
        assert_eq!(reserved, vec![1, 2, 3]);
        assert_eq!(office.queue(QueueKind::Arrival), &["m".to_string()]);
    }

    #[test]
    fn test_early_arrival_keeps_reserved_slot() {
        let mut office = office();
        for id in ["a", "b", "c"] {
            office.spawn(SpawnRequest::new(id, SpawnVariant::Arriving)).unwrap();
        }
        // "c" gets there first but still lines up behind "a" and "b"
        office.send("c", MachineEvent::ArrivedAtQueue).unwrap();

        assert_eq!(office.queue(QueueKind::Arrival), &["c".to_string()]);
        assert_eq!(office.agent("c").unwrap().queue_index, 0);
        assert_eq!(
            office.agent("c").unwrap().target,
            Some(queue_position(QueueKind::Arrival, 2))
        );
        assert_eq!(office.agent("a").unwrap().reserved, Some((QueueKind::Arrival, 0)));

        // Slot 0 is still on its way, so nobody is offered the boss
        office.notify_boss_available();
        office.pump();
        assert!(office.boss().holder.is_none());
        assert_eq!(office.phase("c"), Some(Phase::InArrivalQueue));
    }

    #[test]
    fn test_reservation_moves_up_when_front_leaves() {
        let mut office = office();
        office
            .spawn(SpawnRequest::new("front", SpawnVariant::InArrivalQueue { index: 0 }))
            .unwrap();
        office.spawn(SpawnRequest::new("walker", SpawnVariant::Arriving)).unwrap();
        assert_eq!(
            office.agent("walker").unwrap().target,
            Some(queue_position(QueueKind::Arrival, 1))
        );

        office.remove("front").unwrap();
        let walker = office.agent("walker").unwrap();
        assert_eq!(walker.reserved, Some((QueueKind::Arrival, 0)));
        assert_eq!(walker.target, Some(queue_position(QueueKind::Arrival, 0)));
        assert!(walker.is_walking());
    }

    #[test]
    fn test_leaving_shifts_members_forward() {
        let mut office = office();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            office
                .spawn(SpawnRequest::new(*id, SpawnVariant::InArrivalQueue { index: i as i32 }))
                .unwrap();
        }
        office.leave_queue("a", QueueKind::Arrival);
        office.pump();

        assert_eq!(office.queue(QueueKind::Arrival), &["b".to_string(), "c".to_string()]);
        assert_eq!(office.agent("b").unwrap().queue_index, 0);
        assert_eq!(office.agent("c").unwrap().queue_index, 1);
        assert_eq!(office.agent("a").unwrap().queue_index, -1);
        // New slots are walked to
        assert!(office.agent("b").unwrap().is_walking());
    }

    #[test]
    fn test_close_without_claim_keeps_count() {
        let mut office = office();
        office.open_elevator("a");
        office.close_elevator("stranger");
        assert_eq!(office.elevator().usage(), 1);
    }

    #[test]
    fn test_door_closing_waits_for_last_claim() {
        let mut office = office();
        office.spawn(SpawnRequest::new("newcomer", SpawnVariant::Arriving)).unwrap();
        office.spawn(SpawnRequest::new("leaver", SpawnVariant::AtDesk)).unwrap();
        // Pretend the leaver is already standing in the elevator
        office.agents.get_mut("leaver").unwrap().phase = Phase::WaitingForDoorClose;

        office.maybe_close_doors();
        assert!(office.pending.is_empty());

        office.close_elevator("newcomer");
        assert_eq!(
            office.pending.front(),
            Some(&("leaver".to_string(), MachineEvent::DoorClosing))
        );
    }

    #[test]
    fn test_truncate_long_task() {
        let long = "x".repeat(100);
        let short = truncate(&long, MAX_TASK_CHARS);
        assert_eq!(short.chars().count(), MAX_TASK_CHARS);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short", MAX_TASK_CHARS), "short");
    }
}
