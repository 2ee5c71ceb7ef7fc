//! Collision and priority between walking agents
//!
//! Only the lower half of each 32x64 sprite, narrowed to 16px, takes part
//! in collision tests. That lets agents pass close by without stopping while
//! still keeping feet from overlapping. A step only counts as a collision if
//! it brings the two agents closer, so overlapping agents can always separate.
//!
//! When two agents meet, the one with the lexicographically smaller id yields
//! with a longer randomized wait and the other gets a short one. Until the
//! yielder moves again it no longer blocks the agent it yielded to, so the
//! keeper walks on once its short wait ends. After a wait a blocked agent may
//! ask for a new route a bounded number of times, then it keeps waiting until
//! the way clears.
//!
//! Parked agents (standing in a line, at a desk, beside the boss) are left to
//! the grid's soft cost and do not block here. A walker can still stall for
//! good if the grid offers no way around a parked agent; the tick loop keeps
//! it waiting rather than giving up on its destination.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use super::Position;
use crate::config::CollisionConfig;

/// Width of the collision box
pub const FEET_WIDTH: f32 = 16.0;
/// Height of the collision box (lower half of a 64px sprite)
pub const FEET_HEIGHT: f32 = 32.0;

/// What the tick loop should do with a proposed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    /// Move as planned
    Proceed,
    /// Hold position this frame
    Wait,
    /// Hold position and plan a new route
    Repath,
}

#[derive(Debug, Clone)]
struct CollisionState {
    position: Position,
    waiting_until: Option<u64>,
    repath_attempts: u32,
    stalled: bool,
    parked: bool,
    /// Agents this one gave way to since it last moved
    yields_to: HashSet<String>,
}

/// Axis-aligned collision box anchored at an agent position
#[derive(Debug, Clone, Copy)]
struct FeetBox {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

impl FeetBox {
    fn at(pos: Position) -> Self {
        Self {
            min_x: pos.x - FEET_WIDTH / 2.0,
            max_x: pos.x + FEET_WIDTH / 2.0,
            min_y: pos.y,
            max_y: pos.y + FEET_HEIGHT,
        }
    }

    fn overlaps(&self, other: &FeetBox) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

/// Tracks agent positions and wait timers for collision decisions
#[derive(Debug)]
pub struct CollisionManager {
    agents: HashMap<String, CollisionState>,
    config: CollisionConfig,
}

impl CollisionManager {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            agents: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, id: &str, position: Position) {
        self.agents.insert(
            id.to_string(),
            CollisionState {
                position,
                waiting_until: None,
                repath_attempts: 0,
                stalled: false,
                parked: false,
                yields_to: HashSet::new(),
            },
        );
    }

    pub fn unregister(&mut self, id: &str) {
        self.agents.remove(id);
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Record a completed step; resets the wait timer and repath budget
    pub fn record_move(&mut self, id: &str, position: Position) {
        if let Some(state) = self.agents.get_mut(id) {
            state.position = position;
            state.waiting_until = None;
            state.repath_attempts = 0;
            state.stalled = false;
            state.yields_to.clear();
        }
    }

    /// Record a position without touching timers (teleports, spawns)
    pub fn set_position(&mut self, id: &str, position: Position) {
        if let Some(state) = self.agents.get_mut(id) {
            state.position = position;
        }
    }

    /// Mark an agent as standing still (`true`) or walking (`false`)
    pub fn set_parked(&mut self, id: &str, parked: bool) {
        if let Some(state) = self.agents.get_mut(id) {
            state.parked = parked;
        }
    }

    pub fn waiting_until(&self, id: &str) -> Option<u64> {
        self.agents.get(id).and_then(|s| s.waiting_until)
    }

    /// The agent a step from `from` to `to` would bump into, if any. Agents
    /// that already gave way to `id` are stepped past.
    pub fn find_blocker(&self, id: &str, from: Position, to: Position) -> Option<&str> {
        let moving = FeetBox::at(to);
        self.agents
            .iter()
            .filter(|(other_id, other)| other_id.as_str() != id && !other.parked)
            .filter(|(_, other)| !other.yields_to.contains(id))
            .filter(|(_, other)| moving.overlaps(&FeetBox::at(other.position)))
            .filter(|(_, other)| to.distance(other.position) < from.distance(other.position))
            .map(|(other_id, _)| other_id.as_str())
            .min()
    }

    /// Whether `id` must hold instead of stepping to `to`.
    ///
    /// An active wait always holds. A fresh collision starts waits for both
    /// agents: the smaller id yields for longer. An expired wait is left for
    /// [`CollisionManager::should_repath`] to resolve.
    pub fn should_wait<R: Rng>(
        &mut self,
        id: &str,
        from: Position,
        to: Position,
        now_ms: u64,
        rng: &mut R,
    ) -> bool {
        match self.waiting_until(id) {
            Some(until) if until > now_ms => return true,
            Some(_) => return false,
            None => {}
        }
        let Some(blocker) = self.find_blocker(id, from, to).map(str::to_string) else {
            return false;
        };

        let (yielder, keeper) = if id < blocker.as_str() {
            (id.to_string(), blocker.clone())
        } else {
            (blocker.clone(), id.to_string())
        };
        let (ylo, yhi) = self.config.yield_wait_ms;
        let (slo, shi) = self.config.short_wait_ms;
        let yield_ms = rng.gen_range(ylo..=yhi.max(ylo));
        let short_ms = rng.gen_range(slo..=shi.max(slo));
        self.extend_wait(&yielder, now_ms + yield_ms);
        self.extend_wait(&keeper, now_ms + short_ms);
        if let Some(state) = self.agents.get_mut(&yielder) {
            state.yields_to.insert(keeper.clone());
        }

        tracing::debug!(
            agent = %id,
            blocker = %blocker,
            yielder = %yielder,
            "Collision, waiting"
        );
        true
    }

    /// Resolve an expired wait for `id`.
    ///
    /// Returns true when the caller should plan a new route. When the way is
    /// still blocked and the repath budget is spent, the agent starts another
    /// yield-length wait instead. It never gives up on its destination.
    pub fn should_repath<R: Rng>(
        &mut self,
        id: &str,
        from: Position,
        to: Position,
        now_ms: u64,
        rng: &mut R,
    ) -> bool {
        let blocked = self.find_blocker(id, from, to).is_some();
        let max_attempts = self.config.max_repath_attempts;
        let (ylo, yhi) = self.config.yield_wait_ms;
        let Some(state) = self.agents.get_mut(id) else {
            return false;
        };
        state.waiting_until = None;

        if !blocked {
            return false;
        }
        if state.repath_attempts < max_attempts {
            state.repath_attempts += 1;
            tracing::debug!(agent = %id, attempt = state.repath_attempts, "Repathing around blocker");
            return true;
        }

        state.waiting_until = Some(now_ms + rng.gen_range(ylo..=yhi.max(ylo)));
        if !state.stalled {
            state.stalled = true;
            tracing::debug!(agent = %id, "Repath budget spent, waiting for the way to clear");
        }
        false
    }

    /// Decide what to do with a proposed step this frame
    pub fn check_step<R: Rng>(
        &mut self,
        id: &str,
        from: Position,
        to: Position,
        now_ms: u64,
        rng: &mut R,
    ) -> StepDecision {
        let expired = self
            .waiting_until(id)
            .is_some_and(|until| until <= now_ms);
        if expired {
            if self.should_repath(id, from, to, now_ms, rng) {
                return StepDecision::Repath;
            }
            if self.waiting_until(id).is_some() {
                return StepDecision::Wait;
            }
            return StepDecision::Proceed;
        }
        if self.should_wait(id, from, to, now_ms, rng) {
            StepDecision::Wait
        } else {
            StepDecision::Proceed
        }
    }

    fn extend_wait(&mut self, id: &str, until: u64) {
        if let Some(state) = self.agents.get_mut(id) {
            state.waiting_until = Some(state.waiting_until.map_or(until, |u| u.max(until)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn manager() -> CollisionManager {
        CollisionManager::new(CollisionConfig::default())
    }

    /// "b" walks right into "a"
    fn head_on(seed: u64) -> (u64, u64) {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(seed);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));

        assert!(cm.should_wait("b", Position::new(94.0, 100.0), Position::new(96.0, 100.0), 1_000, &mut rng));
        (
            cm.waiting_until("a").unwrap() - 1_000,
            cm.waiting_until("b").unwrap() - 1_000,
        )
    }

    #[test]
    fn test_smaller_id_yields_longer() {
        let (a_wait, b_wait) = head_on(42);
        assert!((800..=1400).contains(&a_wait), "a waited {a_wait}");
        assert!((200..=500).contains(&b_wait), "b waited {b_wait}");
    }

    #[test]
    fn test_waits_are_reproducible_for_a_seed() {
        assert_eq!(head_on(42), head_on(42));
    }

    #[test]
    fn test_upper_body_overlap_is_not_a_collision() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(1);
        // Sprites overlap vertically by 24px, feet do not
        cm.register("a", Position::new(100.0, 100.0));
        cm.register("b", Position::new(100.0, 142.0));
        assert!(!cm.should_wait("b", Position::new(100.0, 142.0), Position::new(100.0, 140.0), 0, &mut rng));
    }

    #[test]
    fn test_moving_apart_is_never_blocked() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(1);
        cm.register("a", Position::new(100.0, 100.0));
        cm.register("b", Position::new(104.0, 100.0));
        // Already overlapping, stepping away
        assert!(!cm.should_wait("b", Position::new(104.0, 100.0), Position::new(106.0, 100.0), 0, &mut rng));
        // Stepping closer
        assert!(cm.should_wait("b", Position::new(104.0, 100.0), Position::new(102.0, 100.0), 0, &mut rng));
    }

    #[test]
    fn test_parked_agent_never_blocks() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(1);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));
        cm.set_parked("a", true);
        assert!(!cm.should_wait("b", Position::new(94.0, 100.0), Position::new(96.0, 100.0), 0, &mut rng));
        assert_eq!(cm.waiting_until("a"), None);

        cm.set_parked("a", false);
        assert!(cm.should_wait("b", Position::new(94.0, 100.0), Position::new(96.0, 100.0), 0, &mut rng));
    }

    #[test]
    fn test_repath_budget_then_wait_forever() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(3);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));
        let from = Position::new(94.0, 100.0);
        let to = Position::new(96.0, 100.0);

        let mut now = 0;
        assert_eq!(cm.check_step("b", from, to, now, &mut rng), StepDecision::Wait);

        let mut repaths = 0;
        for _ in 0..10 {
            now += 2_000;
            match cm.check_step("b", from, to, now, &mut rng) {
                StepDecision::Repath => repaths += 1,
                StepDecision::Wait => {}
                StepDecision::Proceed => panic!("way is still blocked"),
            }
        }
        assert_eq!(repaths, 3);
        assert_eq!(cm.agents["b"].repath_attempts, 3);
        assert!(cm.waiting_until("b").is_some());
    }

    #[test]
    fn test_successful_move_resets_budget() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(3);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));
        let from = Position::new(94.0, 100.0);
        let to = Position::new(96.0, 100.0);

        cm.check_step("b", from, to, 0, &mut rng);
        assert_eq!(cm.check_step("b", from, to, 2_000, &mut rng), StepDecision::Repath);
        assert_eq!(cm.agents["b"].repath_attempts, 1);

        cm.record_move("b", Position::new(94.0, 120.0));
        assert_eq!(cm.agents["b"].repath_attempts, 0);
        assert_eq!(cm.waiting_until("b"), None);
    }

    #[test]
    fn test_expired_wait_with_clear_way_proceeds() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(3);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));
        let from = Position::new(94.0, 100.0);
        let to = Position::new(96.0, 100.0);
        cm.check_step("b", from, to, 0, &mut rng);

        cm.unregister("a");
        assert_eq!(cm.check_step("b", from, to, 2_000, &mut rng), StepDecision::Proceed);
    }

    #[test]
    fn test_keeper_walks_through_while_yielder_waits() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(7);
        let a = Position::new(110.0, 100.0);
        let mut b = Position::new(94.0, 100.0);
        cm.register("a", a);
        cm.register("b", b);
        cm.set_parked("a", false);
        cm.set_parked("b", false);

        // Head on: "a" gives way, "b" holds only briefly
        let toward_a = Position::new(96.0, 100.0);
        assert_eq!(cm.check_step("b", b, toward_a, 0, &mut rng), StepDecision::Wait);
        let toward_b = Position::new(108.0, 100.0);
        assert_eq!(cm.check_step("a", a, toward_b, 0, &mut rng), StepDecision::Wait);

        // Once its short wait is over "b" keeps walking into and past "a"
        let mut now = 600;
        while b.x < 130.0 {
            let next = Position::new(b.x + 2.0, b.y);
            assert_eq!(cm.check_step("b", b, next, now, &mut rng), StepDecision::Proceed);
            cm.record_move("b", next);
            b = next;
            now += 16;
        }
        assert!(cm.waiting_until("a").is_some());
    }

    #[test]
    fn test_yield_lasts_until_the_yielder_moves() {
        let mut cm = manager();
        let mut rng = StdRng::seed_from_u64(7);
        cm.register("a", Position::new(110.0, 100.0));
        cm.register("b", Position::new(94.0, 100.0));
        let from = Position::new(94.0, 100.0);
        let to = Position::new(96.0, 100.0);
        cm.check_step("b", from, to, 0, &mut rng);
        assert_eq!(cm.find_blocker("b", from, to), None);

        cm.record_move("a", Position::new(110.0, 100.0));
        assert_eq!(cm.find_blocker("b", from, to), Some("a"));
    }
}
