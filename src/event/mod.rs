pub mod socket;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Message from the backend (boxed to reduce enum size)
    Backend(Box<BackendMessage>),
}

/// Message streamed from the backend, tagged by `type`
///
/// # Variants
/// - `state_update`: full game snapshot to reconcile against
/// - `event`: a single history entry (tool use, compaction, session start)
///
/// Anything else deserializes to `Unknown` and is dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendMessage {
    StateUpdate {
        #[serde(default)]
        timestamp: Option<String>,
        state: Box<GameState>,
    },
    Event {
        #[serde(default)]
        timestamp: Option<String>,
        event: HistoryEntry,
    },
    #[serde(other)]
    Unknown,
}

impl BackendMessage {
    /// Validate required fields
    ///
    /// # Returns
    /// - `Ok(())` if the message is usable
    /// - `Err(&str)` with description of validation failure
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            BackendMessage::StateUpdate { state, .. } => state.validate(),
            BackendMessage::Event { event, .. } => {
                if event.kind.is_empty() {
                    return Err("event type is required");
                }
                Ok(())
            }
            BackendMessage::Unknown => Ok(()),
        }
    }
}

/// Full snapshot of the backend's view of the office
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub session_id: String,
    #[serde(default)]
    pub boss: BossInfo,
    #[serde(default)]
    pub agents: Vec<SnapshotAgent>,
    #[serde(default)]
    pub office: OfficeInfo,
    #[serde(default)]
    pub arrival_queue: Vec<String>,
    #[serde(default)]
    pub departure_queue: Vec<String>,
}

impl GameState {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.session_id.is_empty() {
            return Err("sessionId is required");
        }
        if self.agents.iter().any(|a| a.id.is_empty()) {
            return Err("agent id is required");
        }
        Ok(())
    }
}

/// Boss as reported by the backend
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BossInfo {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub bubble: Option<BubbleContent>,
}

/// One agent as reported by the backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAgent {
    pub id: String,
    #[serde(default)]
    pub native_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub state: BackendAgentState,
    #[serde(default)]
    pub desk: Option<u32>,
    #[serde(default)]
    pub bubble: Option<BubbleContent>,
    #[serde(default)]
    pub current_task: Option<String>,
}

/// Agent state as the backend sees it. Only a few of these matter to the
/// office: `arriving` picks the spawn variant, `working`/`thinking` drive the
/// typing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendAgentState {
    Arriving,
    Reporting,
    WalkingToDesk,
    #[default]
    Working,
    Thinking,
    WaitingPermission,
    Completed,
    Waiting,
    ReportingDone,
    Leaving,
    InElevator,
    #[serde(other)]
    Unknown,
}

impl BackendAgentState {
    pub fn is_busy(self) -> bool {
        matches!(self, BackendAgentState::Working | BackendAgentState::Thinking)
    }
}

/// Office counters reported by the backend
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfficeInfo {
    #[serde(default = "default_desk_count")]
    pub desk_count: u32,
    #[serde(default)]
    pub elevator_state: String,
    #[serde(default)]
    pub phone_state: String,
    #[serde(default)]
    pub context_utilization: f64,
    #[serde(default)]
    pub tool_uses_since_compaction: u32,
    #[serde(default)]
    pub print_report: bool,
}

impl Default for OfficeInfo {
    fn default() -> Self {
        Self {
            desk_count: default_desk_count(),
            elevator_state: String::new(),
            phone_state: String::new(),
            context_utilization: 0.0,
            tool_uses_since_compaction: 0,
            print_report: false,
        }
    }
}

fn default_desk_count() -> u32 {
    crate::layout::DEFAULT_DESK_COUNT
}

/// Speech or thought bubble
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BubbleContent {
    #[serde(rename = "type", default)]
    pub kind: BubbleKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl BubbleContent {
    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            kind: BubbleKind::Speech,
            text: text.into(),
            icon: None,
            persistent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleKind {
    Thought,
    #[default]
    Speech,
}

/// History entry carried by an `event` message
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HistoryEntry {
    pub const SESSION_START: &'static str = "session_start";
    pub const PRE_TOOL_USE: &'static str = "pre_tool_use";
    pub const POST_TOOL_USE: &'static str = "post_tool_use";
    pub const CONTEXT_COMPACTION: &'static str = "context_compaction";

    /// Agent id the backend uses for the main (boss) session
    pub const MAIN_AGENT: &'static str = "main";

    /// Parsed timestamp, if present and readable
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }
}

/// Accept RFC 3339 as well as naive ISO timestamps (assumed UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
