//! Office floor layout
//!
//! Fixed geometry for the 1280x1024 office: walls, the elevator cut into the
//! back wall, two rows of agent desks, the boss desk at the front, and the
//! anchor points agents walk between.

use crate::nav::{GridPosition, Position, Tile};

/// Grid size in tiles (32px tiles)
pub const GRID_WIDTH: i32 = 40;
pub const GRID_HEIGHT: i32 = 32;

/// Desks per row and the number of rows the floor has room for
pub const DESKS_PER_ROW: u32 = 4;
pub const DESK_ROWS: u32 = 2;
pub const MAX_DESKS: u32 = DESKS_PER_ROW * DESK_ROWS;

/// Desk count used when the backend does not say otherwise
pub const DEFAULT_DESK_COUNT: u32 = 8;

const DESK_X_START: f32 = 265.0;
const DESK_X_SPACING: f32 = 250.0;
const DESK_ROW_Y: [f32; DESK_ROWS as usize] = [360.0, 560.0];

/// Tile columns covered by each desk column
const DESK_TILE_COLS: [(i32, i32); DESKS_PER_ROW as usize] = [(6, 10), (14, 18), (21, 25), (29, 33)];
/// Tile rows covered by each desk row
const DESK_TILE_ROWS: [(i32, i32); DESK_ROWS as usize] = [(12, 13), (18, 19)];

/// Rows of solid back wall
const BACK_WALL_ROWS: i32 = 4;
/// Elevator shaft tiles (inclusive)
const ELEVATOR_COLS: (i32, i32) = (2, 4);
const ELEVATOR_ROWS: (i32, i32) = (2, 3);

/// Boss desk tiles (inclusive)
const BOSS_DESK_COLS: (i32, i32) = (17, 22);
const BOSS_DESK_ROWS: (i32, i32) = (25, 27);

/// Where agents appear and vanish
pub const ELEVATOR_INSIDE: Position = Position::new(112.0, 96.0);

/// Standing spot in front of the boss desk
pub const BOSS_APPROACH: Position = Position::new(640.0, 776.0);

/// Where the boss sprite sits (not walkable)
#[cfg(test)]
pub const BOSS_SEAT: Position = Position::new(640.0, 830.0);

/// Which desk row and column a desk number lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeskSlot {
    pub row: u32,
    pub col: u32,
}

/// Resolve a 1-based desk number to its row/column.
///
/// Desk numbers beyond the desk count wrap around, and the desk count itself
/// is clamped to what the floor can hold.
pub fn desk_slot(desk: u32, desk_count: u32) -> DeskSlot {
    let count = desk_count.clamp(1, MAX_DESKS);
    let index = desk.saturating_sub(1) % count;
    DeskSlot {
        row: index / DESKS_PER_ROW,
        col: index % DESKS_PER_ROW,
    }
}

/// Pixel position an agent stands at when working at `desk`
pub fn desk_position(desk: u32, desk_count: u32) -> Position {
    let slot = desk_slot(desk, desk_count);
    Position::new(
        DESK_X_START + slot.col as f32 * DESK_X_SPACING,
        DESK_ROW_Y[slot.row as usize],
    )
}

fn within(value: i32, (lo, hi): (i32, i32)) -> bool {
    value >= lo && value <= hi
}

/// Static classification of a single tile
pub fn tile_at(tile: GridPosition) -> Tile {
    let GridPosition { x, y } = tile;
    if x < 0 || y < 0 || x >= GRID_WIDTH || y >= GRID_HEIGHT {
        return Tile::Wall;
    }
    if within(x, ELEVATOR_COLS) && within(y, ELEVATOR_ROWS) {
        return Tile::Elevator;
    }
    if y < BACK_WALL_ROWS || x == 0 || x == GRID_WIDTH - 1 || y == GRID_HEIGHT - 1 {
        return Tile::Wall;
    }
    if within(x, BOSS_DESK_COLS) && within(y, BOSS_DESK_ROWS) {
        return Tile::BossDesk;
    }
    let desk_col = DESK_TILE_COLS.iter().any(|&cols| within(x, cols));
    let desk_row = DESK_TILE_ROWS.iter().any(|&rows| within(y, rows));
    if desk_col && desk_row {
        return Tile::Desk;
    }
    Tile::Floor
}

/// Full static tile map in row-major order
pub fn build_tiles() -> Vec<Tile> {
    (0..GRID_HEIGHT)
        .flat_map(|y| (0..GRID_WIDTH).map(move |x| tile_at(GridPosition::new(x, y))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::world_to_grid;

    #[test]
    fn test_desk_five_is_second_row_first_column() {
        assert_eq!(desk_slot(5, 8), DeskSlot { row: 1, col: 0 });
        assert_eq!(desk_position(5, 8), Position::new(265.0, 560.0));
    }

    #[test]
    fn test_desk_numbers_wrap() {
        assert_eq!(desk_slot(1, 8), DeskSlot { row: 0, col: 0 });
        assert_eq!(desk_slot(8, 8), DeskSlot { row: 1, col: 3 });
        assert_eq!(desk_slot(9, 8), DeskSlot { row: 0, col: 0 });
        assert_eq!(desk_slot(3, 2), DeskSlot { row: 0, col: 0 });
        // Zero is treated like desk 1
        assert_eq!(desk_slot(0, 8), DeskSlot { row: 0, col: 0 });
    }

    #[test]
    fn test_anchor_points_are_on_floor() {
        let mut anchors = vec![ELEVATOR_INSIDE, BOSS_APPROACH];
        anchors.extend((1..=MAX_DESKS).map(|d| desk_position(d, MAX_DESKS)));
        for anchor in anchors {
            let tile = tile_at(world_to_grid(anchor));
            assert!(tile.is_passable(), "{anchor:?} lands on {tile:?}");
        }
    }

    #[test]
    fn test_boss_seat_is_blocked() {
        assert_eq!(tile_at(world_to_grid(BOSS_SEAT)), Tile::BossDesk);
    }

    #[test]
    fn test_border_is_wall() {
        assert_eq!(tile_at(GridPosition::new(0, 10)), Tile::Wall);
        assert_eq!(tile_at(GridPosition::new(39, 10)), Tile::Wall);
        assert_eq!(tile_at(GridPosition::new(10, 31)), Tile::Wall);
        assert_eq!(tile_at(GridPosition::new(10, 1)), Tile::Wall);
        assert_eq!(tile_at(GridPosition::new(-1, 10)), Tile::Wall);
        assert_eq!(build_tiles().len(), (GRID_WIDTH * GRID_HEIGHT) as usize);
    }
}
