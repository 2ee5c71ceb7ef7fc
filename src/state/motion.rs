//! The cooperative tick: timers, walking, bubbles and boss arbitration

use super::{Office, PathState};
use crate::machine::MachineEvent;
use crate::nav::{plan_route, Position, StepDecision};

/// Longest frame the tick will simulate; longer gaps are treated as this
const MAX_FRAME_MS: u64 = 250;

/// Delay before planning again after no route was found
const ROUTE_RETRY_MS: u64 = 1000;

/// Agents this close to a destination are already there
const ARRIVAL_EPSILON: f32 = 0.5;

impl Office {
    /// Advance the whole office to `now_ms`.
    ///
    /// Due timers fire first. Then every walking agent moves, and only after
    /// all positions are written do arrivals reach the machines. Bubbles
    /// rotate, failed routes are retried, and a free boss is offered to the
    /// front of a line.
    pub fn tick(&mut self, now_ms: u64) {
        let elapsed = self
            .last_tick_ms
            .map_or(0, |last| now_ms.saturating_sub(last).min(MAX_FRAME_MS));
        self.last_tick_ms = Some(now_ms);
        self.now_ms = self.now_ms.max(now_ms);

        if self.compaction_until.is_some_and(|until| until <= self.now_ms) {
            self.compaction_until = None;
            tracing::info!("Context compaction finished");
        }

        for timer in self.timers.drain_due(self.now_ms) {
            self.pending.push_back((timer.agent_id, timer.event));
        }
        self.pump();

        let arrived = self.advance_agents(elapsed);
        for id in arrived {
            let event = self
                .machines
                .get(&id)
                .and_then(|m| MachineEvent::arrival_for(m.phase()));
            if let Some(event) = event {
                self.pending.push_back((id, event));
            }
        }
        self.pump();

        self.advance_bubbles();

        self.retry_routes();
        self.pump();

        self.notify_boss_available();
        self.pump();

        self.process_pending_departures();
    }

    /// Move every walking agent by `speed * dt` along its path. Returns the
    /// agents that reached their destination this frame.
    fn advance_agents(&mut self, elapsed_ms: u64) -> Vec<String> {
        let budget = self.config.motion.walk_speed * elapsed_ms as f32 / 1000.0;
        if budget <= 0.0 {
            return Vec::new();
        }

        let walking: Vec<String> = self
            .agents
            .values()
            .filter(|a| a.is_walking())
            .map(|a| a.id.clone())
            .collect();

        let mut arrived = Vec::new();
        for id in walking {
            let Some(agent) = self.agents.get(&id) else {
                continue;
            };
            let Some(path) = &agent.path else {
                continue;
            };
            let from = agent.position;
            let step = path.advance(from, budget);

            let decision = if self.collisions.is_registered(&id) {
                self.collisions
                    .check_step(&id, from, step.position, self.now_ms, &mut self.rng)
            } else {
                StepDecision::Proceed
            };

            match decision {
                StepDecision::Proceed => {
                    let Some(agent) = self.agents.get_mut(&id) else {
                        continue;
                    };
                    agent.position = step.position;
                    if step.arrived {
                        agent.path = None;
                        agent.target = None;
                    } else if let Some(path) = agent.path.as_mut() {
                        path.next = step.next;
                        path.progress = step.progress;
                    }
                    self.grid.update_agent_position(&id, step.position);
                    self.collisions.record_move(&id, step.position);
                    if step.arrived {
                        self.collisions.set_parked(&id, true);
                        arrived.push(id);
                    }
                }
                StepDecision::Wait => {}
                StepDecision::Repath => self.repath(&id),
            }
        }
        arrived
    }

    /// Plan a fresh route to the current target, keeping the old one if the
    /// search finds nothing
    fn repath(&mut self, id: &str) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let Some(target) = agent.target else {
            return;
        };
        let route = plan_route(&self.grid, agent.position, target, Some(id));
        match PathState::new(route) {
            Some(path) => {
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.path = Some(path);
                }
            }
            None => tracing::debug!(agent = %id, "Repath found no route, keeping the old one"),
        }
    }

    /// Start walking towards `destination`. An agent already there arrives
    /// at once; one with no route stays put and tries again later.
    pub(super) fn start_walk(&mut self, id: &str, destination: Position) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        agent.target = Some(destination);
        agent.retry_route_at = None;

        if agent.position.distance(destination) <= ARRIVAL_EPSILON {
            agent.position = destination;
            agent.path = None;
            agent.target = None;
            let phase = agent.phase;
            self.grid.update_agent_position(id, destination);
            self.collisions.set_position(id, destination);
            self.collisions.set_parked(id, true);
            if let Some(event) = MachineEvent::arrival_for(phase) {
                self.pending.push_back((id.to_string(), event));
            }
            return;
        }

        let from = agent.position;
        let route = plan_route(&self.grid, from, destination, Some(id));
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        match PathState::new(route) {
            Some(path) => {
                agent.path = Some(path);
                self.collisions.set_parked(id, false);
            }
            None => {
                tracing::warn!(
                    agent = %id,
                    ?from,
                    to = ?destination,
                    "No path found, staying put"
                );
                agent.path = None;
                agent.retry_route_at = Some(self.now_ms + ROUTE_RETRY_MS);
                self.collisions.set_parked(id, true);
            }
        }
    }

    fn retry_routes(&mut self) {
        let now = self.now_ms;
        let due: Vec<(String, Position)> = self
            .agents
            .values()
            .filter(|a| a.retry_route_at.is_some_and(|at| at <= now))
            .filter_map(|a| a.target.map(|t| (a.id.clone(), t)))
            .collect();
        for (id, target) in due {
            tracing::debug!(agent = %id, "Retrying route");
            self.start_walk(&id, target);
        }
    }

    fn advance_bubbles(&mut self) {
        let now = self.now_ms;
        let min = self.config.timing.bubble_min_display_ms;
        for agent in self.agents.values_mut() {
            agent.bubble.advance(now, min);
        }
        self.boss.bubble.advance(now, min);
    }
}
