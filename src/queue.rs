//! Queue position registry
//!
//! Maps (queue kind, index) to a pixel standing spot. Both queues form an L
//! in front of the boss desk: a short horizontal run at the front, then a
//! vertical run growing away from the desk. A line that reaches the top of
//! the floor folds outward into rows that snake back and forth above the
//! desks. Index -1 is the spot right next to the boss where the head of the
//! queue talks to the boss.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nav::Position;

/// Distance between consecutive queue slots
pub const QUEUE_SPACING: f32 = 48.0;

/// Index meaning "beside the boss, out of the line"
pub const READY_INDEX: i32 = -1;

const ARRIVAL_SLOTS: [Position; 6] = [
    Position::new(496.0, 880.0),
    Position::new(448.0, 880.0),
    Position::new(400.0, 880.0),
    Position::new(400.0, 832.0),
    Position::new(400.0, 784.0),
    Position::new(400.0, 736.0),
];

const DEPARTURE_SLOTS: [Position; 6] = [
    Position::new(784.0, 880.0),
    Position::new(832.0, 880.0),
    Position::new(880.0, 880.0),
    Position::new(880.0, 832.0),
    Position::new(880.0, 784.0),
    Position::new(880.0, 736.0),
];

/// Topmost standing row of the vertical run, and first row of the fold
const FOLD_TOP_Y: f32 = 160.0;
/// Slots per folded row
const FOLD_SLOTS: usize = 7;
/// Folded rows before the last spot is reused
const FOLD_ROWS: usize = 4;

const ARRIVAL_READY: Position = Position::new(512.0, 816.0);
const DEPARTURE_READY: Position = Position::new(768.0, 816.0);

/// Which line an agent stands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Arrival,
    Departure,
}

impl QueueKind {
    /// Arrival first: the boss serves arrivals before departures
    pub const ALL: [QueueKind; 2] = [QueueKind::Arrival, QueueKind::Departure];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Arrival => "arrival",
            QueueKind::Departure => "departure",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel spot for a queue index. Indices past the predefined slots continue
/// the vertical run [`QUEUE_SPACING`] apart, then fold away from the boss
/// desk. Past the last folded slot every index shares that slot.
pub fn queue_position(kind: QueueKind, index: i32) -> Position {
    let (slots, ready, outward) = match kind {
        QueueKind::Arrival => (&ARRIVAL_SLOTS, ARRIVAL_READY, -1.0),
        QueueKind::Departure => (&DEPARTURE_SLOTS, DEPARTURE_READY, 1.0),
    };
    if index < 0 {
        return ready;
    }
    let index = index as usize;
    if let Some(slot) = slots.get(index) {
        return *slot;
    }
    let last = slots[slots.len() - 1];
    let beyond = index - (slots.len() - 1);
    let vertical = ((last.y - FOLD_TOP_Y) / QUEUE_SPACING) as usize;
    if beyond <= vertical {
        return Position::new(last.x, last.y - beyond as f32 * QUEUE_SPACING);
    }

    let k = (beyond - vertical - 1).min(FOLD_SLOTS * FOLD_ROWS - 1);
    let (row, col) = (k / FOLD_SLOTS, k % FOLD_SLOTS);
    // Odd rows walk back towards the vertical run
    let step = if row % 2 == 0 { col + 1 } else { FOLD_SLOTS - col };
    Position::new(
        last.x + outward * step as f32 * QUEUE_SPACING,
        FOLD_TOP_Y + row as f32 * QUEUE_SPACING,
    )
}

/// Spot beside the boss for the given queue
pub fn ready_position(kind: QueueKind) -> Position {
    queue_position(kind, READY_INDEX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::config::MAX_AGENTS;
    use crate::nav::{world_to_grid, NavigationGrid};

    #[test]
    fn test_negative_index_is_ready_spot() {
        assert_eq!(queue_position(QueueKind::Arrival, -1), ARRIVAL_READY);
        assert_eq!(queue_position(QueueKind::Departure, -7), DEPARTURE_READY);
        assert_eq!(ready_position(QueueKind::Departure), DEPARTURE_READY);
    }

    #[test]
    fn test_extrapolation_continues_vertical_run() {
        assert_eq!(queue_position(QueueKind::Arrival, 6), Position::new(400.0, 688.0));
        assert_eq!(queue_position(QueueKind::Departure, 8), Position::new(880.0, 592.0));
    }

    #[test]
    fn test_slots_are_spaced_and_walkable() {
        let grid = NavigationGrid::office();
        for kind in QueueKind::ALL {
            let mut prev = queue_position(kind, 0);
            let mut tiles = HashSet::from([world_to_grid(prev)]);
            assert!(grid.is_passable(world_to_grid(prev)));
            for i in 1..MAX_AGENTS as i32 {
                let p = queue_position(kind, i);
                assert!((prev.distance(p) - QUEUE_SPACING).abs() < 0.01, "{kind} {i}");
                assert!(grid.is_passable(world_to_grid(p)), "{kind} {i} at {p:?}");
                assert!(tiles.insert(world_to_grid(p)), "{kind} {i} reuses a tile");
                prev = p;
            }
            assert!(grid.is_passable(world_to_grid(ready_position(kind))));
        }
    }

    #[test]
    fn test_long_line_folds_at_the_top() {
        // Last vertical slot, then the first folded one
        assert_eq!(queue_position(QueueKind::Arrival, 17), Position::new(400.0, 160.0));
        assert_eq!(queue_position(QueueKind::Arrival, 18), Position::new(352.0, 160.0));
        assert_eq!(queue_position(QueueKind::Arrival, 25), Position::new(64.0, 208.0));
        assert_eq!(queue_position(QueueKind::Departure, 18), Position::new(928.0, 160.0));

        let end = queue_position(QueueKind::Departure, 1_000);
        assert_eq!(end, queue_position(QueueKind::Departure, 45));
        assert!(NavigationGrid::office().is_passable(world_to_grid(end)));
    }
}
