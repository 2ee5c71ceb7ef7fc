//! Transition table for the lifecycle machine
//!
//! `(state, context, event) -> (state, context, effects)`, with no access to
//! the outside world. Unhandled pairs return `None`.

use super::{
    Delay, Effect, Exit, Line, MachineContext, MachineEvent, MachineState, MoveTarget, Speaker,
    Visit,
};
use crate::queue::{QueueKind, READY_INDEX};

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: MachineState,
    pub context: MachineContext,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: MachineState, context: MachineContext, effects: Vec<Effect>) -> Option<Self> {
        Some(Self {
            state,
            context,
            effects,
        })
    }
}

/// Only the head of a line may go to the boss
pub fn is_at_front(context: MachineContext) -> bool {
    context.queue_index == 0
}

pub fn transition(
    state: MachineState,
    context: MachineContext,
    event: MachineEvent,
) -> Option<Transition> {
    use MachineEvent as E;
    use MachineState as S;

    match (state, event) {
        (S::Waiting, E::SpawnArriving) => Transition::to(
            S::Arrival(Visit::ToQueue),
            context,
            vec![
                Effect::OpenElevator,
                Effect::ReserveQueue(QueueKind::Arrival),
                Effect::MoveTo(MoveTarget::QueueSlot(QueueKind::Arrival)),
            ],
        ),
        (S::Waiting, E::SpawnInArrivalQueue { index }) => Transition::to(
            S::Arrival(Visit::InQueue),
            MachineContext { queue_index: index },
            vec![Effect::JoinQueueAt(QueueKind::Arrival, index)],
        ),
        (S::Waiting, E::SpawnInDepartureQueue { index }) => Transition::to(
            S::Departure(Visit::InQueue),
            MachineContext { queue_index: index },
            vec![Effect::JoinQueueAt(QueueKind::Departure, index)],
        ),
        (S::Waiting, E::SpawnAtDesk) => Transition::to(S::Idle, context, Vec::new()),

        (S::Arrival(visit), event) => visit_step(QueueKind::Arrival, visit, context, event),
        (S::Departure(visit), event) => visit_step(QueueKind::Departure, visit, context, event),

        (S::ToDesk, E::ArrivedAtDesk) => Transition::to(S::Idle, context, Vec::new()),

        (S::Idle, E::Depart) => Transition::to(
            S::Departure(Visit::ToQueue),
            context,
            vec![
                Effect::ReserveQueue(QueueKind::Departure),
                Effect::MoveTo(MoveTarget::QueueSlot(QueueKind::Departure)),
            ],
        ),

        (S::Leaving(Exit::WalkingToElevator), E::ArrivedAtElevator) => Transition::to(
            S::Leaving(Exit::InElevator),
            context,
            vec![Effect::Schedule(
                Delay::ElevatorPause,
                MachineEvent::ElevatorPauseElapsed,
            )],
        ),
        (S::Leaving(Exit::InElevator), E::ElevatorPauseElapsed) => Transition::to(
            S::Leaving(Exit::WaitingForDoorClose),
            context,
            vec![Effect::CloseElevator],
        ),
        (S::Leaving(Exit::WaitingForDoorClose), E::DoorClosing) => Transition::to(
            S::Leaving(Exit::ElevatorClosing),
            context,
            vec![Effect::Schedule(Delay::DoorClose, MachineEvent::DoorClosed)],
        ),
        (S::Leaving(Exit::ElevatorClosing), E::DoorClosed) => Transition::to(
            S::Removed,
            MachineContext::default(),
            vec![Effect::ClearQueueState, Effect::NotifyRemoved],
        ),

        _ => None,
    }
}

/// Shared queue -> boss flow. Arrivals are greeted by the boss; departures
/// speak first and leave through the elevator afterwards.
fn visit_step(
    kind: QueueKind,
    visit: Visit,
    context: MachineContext,
    event: MachineEvent,
) -> Option<Transition> {
    use MachineEvent as E;

    let wrap = |visit: Visit| match kind {
        QueueKind::Arrival => MachineState::Arrival(visit),
        QueueKind::Departure => MachineState::Departure(visit),
    };
    let (opening, reply) = match kind {
        QueueKind::Arrival => ((Speaker::Boss, Line::Welcome), (Speaker::Agent, Line::Acknowledge)),
        QueueKind::Departure => ((Speaker::Agent, Line::Report), (Speaker::Boss, Line::Thanks)),
    };

    match (visit, event) {
        (Visit::ToQueue, E::ArrivedAtQueue) => {
            let mut effects = vec![Effect::JoinQueue(kind)];
            if kind == QueueKind::Arrival {
                // Out of the elevator and in line
                effects.push(Effect::CloseElevator);
            }
            Transition::to(wrap(Visit::InQueue), context, effects)
        }
        (Visit::InQueue, E::QueuePositionChanged { index }) => Transition::to(
            wrap(Visit::InQueue),
            MachineContext { queue_index: index },
            vec![Effect::MoveTo(MoveTarget::QueueSlot(kind))],
        ),
        (Visit::InQueue, E::ArrivedAtQueue) => {
            Transition::to(wrap(Visit::InQueue), context, Vec::new())
        }
        (Visit::InQueue, E::BossAvailable) if is_at_front(context) => Transition::to(
            wrap(Visit::WalkingToReady),
            MachineContext {
                queue_index: READY_INDEX,
            },
            vec![
                Effect::ClaimBoss(kind),
                Effect::LeaveQueue(kind),
                Effect::OccupyReady(kind),
                Effect::MoveTo(MoveTarget::Ready(kind)),
            ],
        ),
        (Visit::WalkingToReady, E::ArrivedAtReady) => Transition::to(
            wrap(Visit::Conversing { replied: false }),
            context,
            vec![
                Effect::Say(opening.0, opening.1),
                Effect::Schedule(Delay::ConversationStep, MachineEvent::ConversationNext),
            ],
        ),
        (Visit::Conversing { replied: false }, E::ConversationNext) => Transition::to(
            wrap(Visit::Conversing { replied: true }),
            context,
            vec![
                Effect::Say(reply.0, reply.1),
                Effect::Schedule(Delay::ConversationDwell, MachineEvent::ConversationDone),
            ],
        ),
        (Visit::Conversing { replied: true }, E::ConversationDone) => Transition::to(
            wrap(Visit::WalkingToBoss),
            context,
            vec![Effect::ReleaseReady(kind), Effect::MoveTo(MoveTarget::Boss)],
        ),
        (Visit::WalkingToBoss, E::ArrivedAtBoss) => Transition::to(
            wrap(Visit::AtBoss),
            context,
            vec![Effect::Schedule(Delay::BossPause, MachineEvent::BossPauseElapsed)],
        ),
        (Visit::AtBoss, E::BossPauseElapsed) => match kind {
            QueueKind::Arrival => Transition::to(
                MachineState::ToDesk,
                MachineContext::default(),
                vec![
                    Effect::ReleaseBoss,
                    Effect::ClearQueueState,
                    Effect::MoveTo(MoveTarget::Desk),
                ],
            ),
            QueueKind::Departure => Transition::to(
                MachineState::Leaving(Exit::WalkingToElevator),
                context,
                vec![
                    Effect::ReleaseBoss,
                    Effect::Farewell,
                    Effect::OpenElevator,
                    Effect::MoveTo(MoveTarget::Elevator),
                ],
            ),
        },
        _ => None,
    }
}
