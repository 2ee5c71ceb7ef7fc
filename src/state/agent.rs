//! Per-agent records: position, path, queue bookkeeping and speech bubbles

use std::collections::VecDeque;

use crate::event::BubbleContent;
use crate::machine::Phase;
use crate::nav::Position;
use crate::queue::QueueKind;

/// Per-agent animation record owned by the office
#[derive(Debug, Clone)]
pub struct AgentAnimationState {
    pub id: String,
    pub name: String,
    pub color: String,
    /// 1-based desk number
    pub desk: u32,
    /// Mirrors the lifecycle machine after every transition
    pub phase: Phase,
    pub position: Position,
    /// Where the current walk ends, if walking
    pub target: Option<Position>,
    pub path: Option<PathState>,
    pub bubble: BubbleState,
    /// Line the agent belongs to, kept while it is beside or at the boss
    pub queue: Option<QueueKind>,
    /// Index in that line, -1 when out of the line
    pub queue_index: i32,
    /// Slot reserved at the back of a line while walking to it
    pub reserved: Option<(QueueKind, i32)>,
    /// Desk typing animation
    pub typing: bool,
    pub task: Option<String>,
    /// When to try planning again after no route was found
    pub retry_route_at: Option<u64>,
}

impl AgentAnimationState {
    pub fn new(id: &str, name: &str, color: &str, desk: u32, position: Position) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            desk,
            phase: Phase::Waiting,
            position,
            target: None,
            path: None,
            bubble: BubbleState::default(),
            queue: None,
            queue_index: -1,
            reserved: None,
            typing: false,
            task: None,
            retry_route_at: None,
        }
    }

    /// Walking along a path right now
    pub fn is_walking(&self) -> bool {
        self.path.is_some()
    }
}

/// Waypoints being followed plus the index of the next one to reach
#[derive(Debug, Clone, PartialEq)]
pub struct PathState {
    pub waypoints: Vec<Position>,
    pub next: usize,
    /// Fraction of the segment ending at `next` already walked
    pub progress: f32,
}

/// Outcome of advancing along a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub position: Position,
    pub next: usize,
    pub progress: f32,
    pub arrived: bool,
}

impl PathState {
    /// Start a path; the first waypoint is the current position
    pub fn new(waypoints: Vec<Position>) -> Option<Self> {
        if waypoints.len() < 2 {
            return None;
        }
        Some(Self {
            waypoints,
            next: 1,
            progress: 0.0,
        })
    }

    /// Walk `distance` pixels from `from`, carrying leftover distance across
    /// waypoints. Does not modify the path.
    pub fn advance(&self, from: Position, distance: f32) -> Advance {
        let mut position = from;
        let mut next = self.next;
        let mut remaining = distance;

        while let Some(&waypoint) = self.waypoints.get(next) {
            let gap = position.distance(waypoint);
            if gap <= remaining {
                position = waypoint;
                remaining -= gap;
                next += 1;
            } else {
                if gap > 0.0 {
                    position = position.lerp(waypoint, remaining / gap);
                }
                break;
            }
        }

        let arrived = next >= self.waypoints.len();
        let segment = (self.waypoints.get(next - 1), self.waypoints.get(next));
        let progress = match segment {
            (Some(&start), Some(&end)) if !arrived => {
                let length = start.distance(end);
                if length > 0.0 {
                    (start.distance(position) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            _ => 1.0,
        };
        Advance {
            position,
            next,
            progress,
            arrived,
        }
    }
}

/// Bubble on screen plus the ones waiting their turn
#[derive(Debug, Clone, Default)]
pub struct BubbleState {
    pub current: Option<BubbleContent>,
    pub shown_at_ms: u64,
    pub queue: VecDeque<BubbleContent>,
    /// Text most recently put on screen
    last_text: Option<String>,
}

impl BubbleState {
    /// Queue a bubble reported by the backend. Text already shown, showing,
    /// or waiting is skipped since snapshots repeat the same bubble.
    pub fn push_backend(&mut self, bubble: BubbleContent, now_ms: u64) -> bool {
        let seen = self.last_text.as_deref() == Some(bubble.text.as_str())
            || self.queue.iter().any(|b| b.text == bubble.text);
        if seen {
            return false;
        }
        self.push(bubble, now_ms);
        true
    }

    /// Queue a locally generated line
    pub fn push_local(&mut self, bubble: BubbleContent, now_ms: u64) {
        if self.current.as_ref().is_some_and(|c| c.text == bubble.text) {
            return;
        }
        self.push(bubble, now_ms);
    }

    fn push(&mut self, bubble: BubbleContent, now_ms: u64) {
        if self.current.is_none() {
            self.show(bubble, now_ms);
        } else {
            self.queue.push_back(bubble);
        }
    }

    fn show(&mut self, bubble: BubbleContent, now_ms: u64) {
        self.last_text = Some(bubble.text.clone());
        self.current = Some(bubble);
        self.shown_at_ms = now_ms;
    }

    /// Rotate bubbles. Non-persistent ones give way after `min_ms`;
    /// persistent ones stay until something else is queued.
    pub fn advance(&mut self, now_ms: u64, min_ms: u64) {
        let Some(current) = &self.current else {
            if let Some(next) = self.queue.pop_front() {
                self.show(next, now_ms);
            }
            return;
        };
        if now_ms.saturating_sub(self.shown_at_ms) < min_ms {
            return;
        }
        let persistent = current.persistent;
        if let Some(next) = self.queue.pop_front() {
            self.show(next, now_ms);
        } else if !persistent {
            self.current = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
