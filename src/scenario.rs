//! Headless scripted scenario
//!
//! Feeds the office the same backend snapshots a live session would: agents
//! show up one after another, work for a while, then vanish from the roster
//! and get walked out. Time comes from a [`ManualClock`], so a few simulated
//! minutes run in milliseconds and the outcome depends only on the seed.

use std::fmt::Write as _;

use crate::clock::{Clock, FrameScheduler, ManualClock};
use crate::config::OfficeConfig;
use crate::event::{
    BackendAgentState, BubbleContent, BubbleKind, GameState, HistoryEntry, SnapshotAgent,
};
use crate::machine::Phase;
use crate::state::{Office, OfficeSnapshot, PhaseChange, AGENT_COLORS};

/// First agent shows up this long after the session starts
const FIRST_ARRIVAL_MS: u64 = 1_000;

/// Gap between consecutive arrivals
const ARRIVAL_GAP_MS: u64 = 4_000;

/// How long each agent stays on the backend roster
const WORK_MS: u64 = 20_000;

/// Backend snapshot cadence
const SNAPSHOT_INTERVAL_MS: u64 = 1_000;

/// Outcome of a scripted run
#[derive(Debug)]
pub struct ScenarioReport {
    pub phase_log: Vec<PhaseChange>,
    pub snapshot: OfficeSnapshot,
    /// Agents that made it all the way out
    pub completed: usize,
    pub elapsed_ms: u64,
}

impl ScenarioReport {
    /// Phase log as aligned text, one transition per line
    pub fn render_log(&self) -> String {
        let mut out = String::new();
        for change in &self.phase_log {
            let _ = writeln!(
                out,
                "{:>8.1}s  {:<10} {}",
                change.at_ms as f64 / 1000.0,
                change.agent_id,
                change.phase
            );
        }
        let _ = writeln!(
            out,
            "{} of {} agents completed in {:.1}s",
            self.completed,
            self.expected(),
            self.elapsed_ms as f64 / 1000.0
        );
        out
    }

    fn expected(&self) -> usize {
        let mut ids: Vec<&str> = self.phase_log.iter().map(|c| c.agent_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

fn agent_id(index: usize) -> String {
    format!("agent-{}", index + 1)
}

fn arrival_ms(index: usize) -> u64 {
    FIRST_ARRIVAL_MS + index as u64 * ARRIVAL_GAP_MS
}

/// Backend roster at `now_ms`
fn roster(agents: usize, now_ms: u64) -> GameState {
    let listed = (0..agents)
        .filter(|&i| now_ms >= arrival_ms(i) && now_ms < arrival_ms(i) + WORK_MS)
        .map(|i| {
            let since = now_ms - arrival_ms(i);
            let state = if since < SNAPSHOT_INTERVAL_MS {
                BackendAgentState::Arriving
            } else {
                BackendAgentState::Working
            };
            SnapshotAgent {
                id: agent_id(i),
                native_id: None,
                name: Some(format!("Agent {}", i + 1)),
                color: AGENT_COLORS[i % AGENT_COLORS.len()].to_string(),
                number: i as u32 + 1,
                state,
                desk: None,
                bubble: (state == BackendAgentState::Working).then(|| BubbleContent {
                    kind: BubbleKind::Thought,
                    text: format!("Working on task {}", i + 1),
                    icon: None,
                    persistent: false,
                }),
                current_task: Some(format!("Task {}", i + 1)),
            }
        })
        .collect();

    GameState {
        session_id: "simulation".to_string(),
        agents: listed,
        ..GameState::default()
    }
}

/// Run `agents` scripted agents for at most `duration_ms` of simulated time
pub fn run(config: OfficeConfig, agents: usize, duration_ms: u64) -> ScenarioReport {
    let frames = FrameScheduler::new(ManualClock::new(0), config.motion.frame_rate);
    let mut office = Office::new(config);
    let last_departure = (0..agents)
        .map(|i| arrival_ms(i) + WORK_MS)
        .max()
        .unwrap_or(0);

    tracing::info!(agents, duration_ms, "Scenario starting");
    office.apply_state(&roster(agents, 0));
    office.apply_event(HistoryEntry {
        kind: HistoryEntry::SESSION_START.to_string(),
        ..HistoryEntry::default()
    });

    // Snapshots land between frames
    let clock = frames.clock();
    let mut next_snapshot = SNAPSHOT_INTERVAL_MS;
    frames.run_until(&mut office, duration_ms, |office| {
        let now = clock.now_ms();
        if now >= next_snapshot {
            office.apply_state(&roster(agents, now));
            next_snapshot += SNAPSHOT_INTERVAL_MS;
        }
        now > last_departure && office.agent_count() == 0
    });

    let phase_log: Vec<PhaseChange> = office.phase_log().cloned().collect();
    let completed = phase_log
        .iter()
        .filter(|c| c.phase == Phase::Removed)
        .count();
    tracing::info!(completed, "Scenario finished");

    ScenarioReport {
        phase_log,
        snapshot: office.snapshot(),
        completed,
        elapsed_ms: clock.now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_follows_schedule() {
        assert!(roster(2, 0).agents.is_empty());

        let first = roster(2, FIRST_ARRIVAL_MS);
        assert_eq!(first.agents.len(), 1);
        assert_eq!(first.agents[0].state, BackendAgentState::Arriving);

        let both = roster(2, arrival_ms(1) + SNAPSHOT_INTERVAL_MS);
        assert_eq!(both.agents.len(), 2);
        assert_eq!(both.agents[0].state, BackendAgentState::Working);

        assert!(roster(2, arrival_ms(1) + WORK_MS).agents.is_empty());
    }

    #[test]
    fn test_two_agents_come_and_go() {
        let report = run(OfficeConfig::default(), 2, 180_000);
        assert_eq!(report.completed, 2, "{}", report.render_log());
        assert!(report.snapshot.agents.is_empty());
        assert!(!report.snapshot.elevator.open);

        for id in ["agent-1", "agent-2"] {
            let phases: Vec<Phase> = report
                .phase_log
                .iter()
                .filter(|c| c.agent_id == id)
                .map(|c| c.phase)
                .collect();
            assert_eq!(phases.first(), Some(&Phase::Arriving), "{id}");
            assert!(phases.contains(&Phase::Idle), "{id}");
            assert_eq!(phases.last(), Some(&Phase::Removed), "{id}");
        }
    }
}
