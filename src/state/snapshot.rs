//! Read-only views handed to renderers and the debug surfaces

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Office;
use crate::event::{BubbleContent, HistoryEntry, OfficeInfo};
use crate::machine::Phase;
use crate::nav::Position;
use crate::queue::QueueKind;

/// Everything a renderer needs to draw one frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeSnapshot {
    pub now_ms: u64,
    pub session_id: Option<String>,
    pub agents: Vec<AgentView>,
    pub boss: BossView,
    pub elevator: ElevatorView,
    pub arrival_queue: Vec<String>,
    pub departure_queue: Vec<String>,
    pub compacting: bool,
    pub office: OfficeInfo,
    pub recent_events: Vec<HistoryEntry>,
    /// Backend time of the snapshot this frame reflects
    pub last_state_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub color: String,
    pub desk: u32,
    pub phase: Phase,
    pub position: Position,
    pub target: Option<Position>,
    /// How far along the current path segment, while walking
    pub segment_progress: Option<f32>,
    pub bubble: Option<BubbleContent>,
    pub queue: Option<QueueKind>,
    pub queue_index: i32,
    pub typing: bool,
    pub walking: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BossView {
    pub in_use: bool,
    /// Agent being served
    pub serving: Option<String>,
    /// Line the served agent came from
    pub queue: Option<QueueKind>,
    pub bubble: Option<BubbleContent>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevatorView {
    pub open: bool,
    pub usage: u32,
}

impl Office {
    /// Immutable copy of the current state
    pub fn snapshot(&self) -> OfficeSnapshot {
        let agents = self
            .agents
            .values()
            .map(|a| AgentView {
                id: a.id.clone(),
                name: a.name.clone(),
                color: a.color.clone(),
                desk: a.desk,
                phase: a.phase,
                position: a.position,
                target: a.target,
                segment_progress: a.path.as_ref().map(|p| p.progress),
                bubble: a.bubble.current.clone(),
                queue: a.queue,
                queue_index: a.queue_index,
                typing: a.typing,
                walking: a.is_walking(),
            })
            .collect();

        OfficeSnapshot {
            now_ms: self.now_ms,
            session_id: self.session_id.clone(),
            agents,
            boss: BossView {
                in_use: self.boss.in_use(),
                serving: self.boss.holder.as_ref().map(|(id, _)| id.clone()),
                queue: self.boss.holder.as_ref().map(|(_, kind)| *kind),
                bubble: self.boss.bubble.current.clone(),
            },
            elevator: ElevatorView {
                open: self.elevator.is_open(),
                usage: self.elevator.usage(),
            },
            arrival_queue: self.queues.line(QueueKind::Arrival),
            departure_queue: self.queues.line(QueueKind::Departure),
            compacting: self.is_compacting(),
            office: self.office_info.clone(),
            recent_events: self.events.iter().cloned().collect(),
            last_state_at: self.last_state_at,
            last_event_at: self.last_event_at,
        }
    }

    /// Static tiles with agents overlaid, one text row per grid row
    pub fn debug_grid(&self) -> String {
        self.grid.render_ascii()
    }
}
