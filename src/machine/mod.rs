//! Per-agent lifecycle state machine
//!
//! Each agent owns an [`AgentMachine`]. Feeding it a [`MachineEvent`] runs a
//! pure transition (see [`transitions`]) and hands back the [`Effect`]s the
//! coordination layer must carry out. The machine itself never touches the
//! office: effects are dispatched through [`actions::AgentActions`].
//!
//! ```text
//! waiting --spawn--> arrival flow --> idle --depart--> departure flow --> removed
//! ```

pub mod actions;
pub mod transitions;

pub use actions::{apply_effects, AgentActions};
pub use transitions::{transition, Transition};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::queue::{QueueKind, READY_INDEX};

/// Flat, externally visible phase of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Arriving,
    InArrivalQueue,
    WalkingToReady,
    Conversing,
    WalkingToBoss,
    AtBoss,
    WalkingToDesk,
    Idle,
    Departing,
    InDepartureQueue,
    WalkingToElevator,
    InElevator,
    WaitingForDoorClose,
    ElevatorClosing,
    Removed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Arriving => "arriving",
            Phase::InArrivalQueue => "in_arrival_queue",
            Phase::WalkingToReady => "walking_to_ready",
            Phase::Conversing => "conversing",
            Phase::WalkingToBoss => "walking_to_boss",
            Phase::AtBoss => "at_boss",
            Phase::WalkingToDesk => "walking_to_desk",
            Phase::Idle => "idle",
            Phase::Departing => "departing",
            Phase::InDepartureQueue => "in_departure_queue",
            Phase::WalkingToElevator => "walking_to_elevator",
            Phase::InElevator => "in_elevator",
            Phase::WaitingForDoorClose => "waiting_for_door_close",
            Phase::ElevatorClosing => "elevator_closing",
            Phase::Removed => "removed",
        }
    }

    /// Whether the agent is standing in a queue line
    pub fn is_queued(self) -> bool {
        matches!(self, Phase::InArrivalQueue | Phase::InDepartureQueue)
    }

    /// Whether the agent has already started leaving
    pub fn is_departing(self) -> bool {
        matches!(
            self,
            Phase::Departing
                | Phase::InDepartureQueue
                | Phase::WalkingToElevator
                | Phase::InElevator
                | Phase::WaitingForDoorClose
                | Phase::ElevatorClosing
                | Phase::Removed
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps shared by both queue flows, from joining the line to the boss desk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Walking to a reserved slot at the back of the line
    ToQueue,
    InQueue,
    WalkingToReady,
    /// Talking beside the boss; `replied` once the second line is said
    Conversing { replied: bool },
    WalkingToBoss,
    AtBoss,
}

/// Steps after the boss visit on the way out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    WalkingToElevator,
    InElevator,
    WaitingForDoorClose,
    ElevatorClosing,
}

/// Hierarchical machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Waiting,
    Arrival(Visit),
    /// Boss visit done, heading to the desk
    ToDesk,
    Idle,
    Departure(Visit),
    Leaving(Exit),
    Removed,
}

impl MachineState {
    pub fn phase(self) -> Phase {
        match self {
            MachineState::Waiting => Phase::Waiting,
            MachineState::Arrival(visit) => match visit {
                Visit::ToQueue => Phase::Arriving,
                Visit::InQueue => Phase::InArrivalQueue,
                Visit::WalkingToReady => Phase::WalkingToReady,
                Visit::Conversing { .. } => Phase::Conversing,
                Visit::WalkingToBoss => Phase::WalkingToBoss,
                Visit::AtBoss => Phase::AtBoss,
            },
            MachineState::ToDesk => Phase::WalkingToDesk,
            MachineState::Idle => Phase::Idle,
            MachineState::Departure(visit) => match visit {
                Visit::ToQueue => Phase::Departing,
                Visit::InQueue => Phase::InDepartureQueue,
                Visit::WalkingToReady => Phase::WalkingToReady,
                Visit::Conversing { .. } => Phase::Conversing,
                Visit::WalkingToBoss => Phase::WalkingToBoss,
                Visit::AtBoss => Phase::AtBoss,
            },
            MachineState::Leaving(exit) => match exit {
                Exit::WalkingToElevator => Phase::WalkingToElevator,
                Exit::InElevator => Phase::InElevator,
                Exit::WaitingForDoorClose => Phase::WaitingForDoorClose,
                Exit::ElevatorClosing => Phase::ElevatorClosing,
            },
            MachineState::Removed => Phase::Removed,
        }
    }
}

/// Per-agent machine context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineContext {
    /// Position in the current queue, [`READY_INDEX`] when not in a line
    pub queue_index: i32,
}

impl Default for MachineContext {
    fn default() -> Self {
        Self {
            queue_index: READY_INDEX,
        }
    }
}

/// Inputs to the lifecycle machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    SpawnArriving,
    SpawnInArrivalQueue { index: i32 },
    SpawnInDepartureQueue { index: i32 },
    SpawnAtDesk,
    ArrivedAtQueue,
    ArrivedAtReady,
    ArrivedAtBoss,
    ArrivedAtDesk,
    ArrivedAtElevator,
    QueuePositionChanged { index: i32 },
    BossAvailable,
    ConversationNext,
    ConversationDone,
    BossPauseElapsed,
    ElevatorPauseElapsed,
    DoorClosing,
    DoorClosed,
    Depart,
}

impl MachineEvent {
    /// Arrival event matching whatever the agent was walking towards
    pub fn arrival_for(phase: Phase) -> Option<MachineEvent> {
        match phase {
            Phase::Arriving | Phase::Departing | Phase::InArrivalQueue | Phase::InDepartureQueue => {
                Some(MachineEvent::ArrivedAtQueue)
            }
            Phase::WalkingToReady => Some(MachineEvent::ArrivedAtReady),
            Phase::WalkingToBoss => Some(MachineEvent::ArrivedAtBoss),
            Phase::WalkingToDesk => Some(MachineEvent::ArrivedAtDesk),
            Phase::WalkingToElevator => Some(MachineEvent::ArrivedAtElevator),
            _ => None,
        }
    }
}

/// Where a `MoveTo` effect sends the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    /// The agent's own slot (reserved or current index) in a queue
    QueueSlot(QueueKind),
    /// Beside the boss for the given queue
    Ready(QueueKind),
    Boss,
    Desk,
    Elevator,
}

/// Scheduled delays, resolved against the timing config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    ConversationStep,
    ConversationDwell,
    BossPause,
    ElevatorPause,
    DoorClose,
}

/// Who is talking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Boss,
    Agent,
}

/// Conversation lines exchanged beside the boss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Welcome,
    Acknowledge,
    Report,
    Thanks,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    MoveTo(MoveTarget),
    /// Reserve the next slot at the back of a line
    ReserveQueue(QueueKind),
    /// Physically arrived: turn the reservation into membership
    JoinQueue(QueueKind),
    /// Spawned straight into a line
    JoinQueueAt(QueueKind, i32),
    LeaveQueue(QueueKind),
    ClaimBoss(QueueKind),
    ReleaseBoss,
    OccupyReady(QueueKind),
    ReleaseReady(QueueKind),
    OpenElevator,
    CloseElevator,
    Say(Speaker, Line),
    Farewell,
    Schedule(Delay, MachineEvent),
    ClearQueueState,
    NotifyRemoved,
}

/// Lifecycle machine for one agent
#[derive(Debug, Clone)]
pub struct AgentMachine {
    state: MachineState,
    context: MachineContext,
}

impl Default for AgentMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMachine {
    pub fn new() -> Self {
        Self {
            state: MachineState::Waiting,
            context: MachineContext::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[cfg(test)]
    pub fn context(&self) -> MachineContext {
        self.context
    }

    /// Feed an event. `None` means the event does not apply in this state.
    pub fn send(&mut self, event: MachineEvent) -> Option<Vec<Effect>> {
        let Transition {
            state,
            context,
            effects,
        } = transition(self.state, self.context, event)?;
        self.state = state;
        self.context = context;
        Some(effects)
    }
}
