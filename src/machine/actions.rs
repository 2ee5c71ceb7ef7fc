//! Ports through which lifecycle effects reach the office
//!
//! The coordination service implements [`AgentActions`]; the machine only
//! produces [`Effect`] values and [`apply_effects`] routes them here.

use super::{Delay, Effect, Line, MachineEvent, MoveTarget, Speaker};
use crate::queue::QueueKind;

/// Everything a lifecycle transition can ask the office to do
pub trait AgentActions {
    fn move_to(&mut self, id: &str, target: MoveTarget);
    fn reserve_queue(&mut self, id: &str, kind: QueueKind);
    fn join_queue(&mut self, id: &str, kind: QueueKind);
    fn join_queue_at(&mut self, id: &str, kind: QueueKind, index: i32);
    fn leave_queue(&mut self, id: &str, kind: QueueKind);
    fn claim_boss(&mut self, id: &str, kind: QueueKind);
    fn release_boss(&mut self, id: &str);
    fn occupy_ready(&mut self, id: &str, kind: QueueKind);
    fn release_ready(&mut self, id: &str, kind: QueueKind);
    fn open_elevator(&mut self, id: &str);
    fn close_elevator(&mut self, id: &str);
    fn say(&mut self, id: &str, speaker: Speaker, line: Line);
    fn farewell(&mut self, id: &str);
    fn schedule(&mut self, id: &str, delay: Delay, event: MachineEvent);
    fn clear_queue_state(&mut self, id: &str);
    fn notify_removed(&mut self, id: &str);
}

/// Dispatch effects in order
pub fn apply_effects<A: AgentActions + ?Sized>(actions: &mut A, id: &str, effects: &[Effect]) {
    for effect in effects {
        match *effect {
            Effect::MoveTo(target) => actions.move_to(id, target),
            Effect::ReserveQueue(kind) => actions.reserve_queue(id, kind),
            Effect::JoinQueue(kind) => actions.join_queue(id, kind),
            Effect::JoinQueueAt(kind, index) => actions.join_queue_at(id, kind, index),
            Effect::LeaveQueue(kind) => actions.leave_queue(id, kind),
            Effect::ClaimBoss(kind) => actions.claim_boss(id, kind),
            Effect::ReleaseBoss => actions.release_boss(id),
            Effect::OccupyReady(kind) => actions.occupy_ready(id, kind),
            Effect::ReleaseReady(kind) => actions.release_ready(id, kind),
            Effect::OpenElevator => actions.open_elevator(id),
            Effect::CloseElevator => actions.close_elevator(id),
            Effect::Say(speaker, line) => actions.say(id, speaker, line),
            Effect::Farewell => actions.farewell(id),
            Effect::Schedule(delay, event) => actions.schedule(id, delay, event),
            Effect::ClearQueueState => actions.clear_queue_state(id),
            Effect::NotifyRemoved => actions.notify_removed(id),
        }
    }
}
