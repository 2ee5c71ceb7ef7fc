//! Tile-based navigation for office agents
//!
//! The office floor is a fixed 40x32 grid of 32px tiles. Agents live in pixel
//! space; planning happens in tile space and is converted back into a smooth
//! pixel polyline before the tick loop animates it.
//!
//! - [`grid`]: static tile classification plus per-agent dynamic obstacles
//! - [`pathfinder`]: A* over the grid
//! - [`smoothing`]: tile route to natural pixel polyline
//! - [`collision`]: wait/yield/repath decisions between walking agents

pub mod collision;
pub mod grid;
pub mod pathfinder;
pub mod smoothing;

pub use collision::{CollisionManager, StepDecision};
pub use grid::{NavigationGrid, Tile};

use serde::{Deserialize, Serialize};

/// Edge length of one tile in pixels
pub const TILE_SIZE: f32 = 32.0;

/// A pixel-space coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other` (t in 0..=1)
    pub fn lerp(self, other: Position, t: f32) -> Position {
        Position::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// An integer tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Tile containing a pixel position
pub fn world_to_grid(pos: Position) -> GridPosition {
    GridPosition::new(
        (pos.x / TILE_SIZE).floor() as i32,
        (pos.y / TILE_SIZE).floor() as i32,
    )
}

/// Pixel center of a tile
pub fn grid_to_world(tile: GridPosition) -> Position {
    Position::new(
        tile.x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        tile.y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
    )
}

/// Plan a walkable pixel route between two points.
///
/// Returns an empty vec when no route exists. Callers must leave the agent
/// where it is in that case rather than walking a straight line.
pub fn plan_route(
    grid: &NavigationGrid,
    start: Position,
    end: Position,
    ignore: Option<&str>,
) -> Vec<Position> {
    let tiles = pathfinder::find_path(grid, start, end, ignore);
    if tiles.is_empty() {
        return Vec::new();
    }
    smoothing::smooth_path(grid, &tiles, start, end, ignore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;

    #[test]
    fn test_grid_world_round_trip() {
        for y in 0..layout::GRID_HEIGHT {
            for x in 0..layout::GRID_WIDTH {
                let p = GridPosition::new(x, y);
                assert_eq!(world_to_grid(grid_to_world(p)), p);
            }
        }
    }

    #[test]
    fn test_world_to_grid_edges() {
        assert_eq!(world_to_grid(Position::new(0.0, 0.0)), GridPosition::new(0, 0));
        assert_eq!(world_to_grid(Position::new(31.9, 31.9)), GridPosition::new(0, 0));
        assert_eq!(world_to_grid(Position::new(32.0, 64.0)), GridPosition::new(1, 2));
        assert_eq!(world_to_grid(Position::new(-1.0, 5.0)), GridPosition::new(-1, 0));
    }

    #[test]
    fn test_plan_route_keeps_exact_endpoints() {
        let grid = NavigationGrid::office();
        let start = layout::ELEVATOR_INSIDE;
        let end = layout::desk_position(1, 8);
        let route = plan_route(&grid, start, end, None);

        assert!(route.len() >= 2);
        assert_eq!(route[0], start);
        assert_eq!(*route.last().unwrap(), end);
    }
}
