//! A* pathfinding over the navigation grid
//!
//! 8-connected search with an octile heuristic. Diagonal steps are only
//! allowed when both flanking tiles are walkable, so agents never clip a
//! desk corner or another agent's shoulder. Endpoints that land on a blocked
//! or occupied tile are snapped to the nearest walkable tile before
//! searching. Other agents only add cost to the tiles they stand on.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f32::consts::SQRT_2;

use super::{world_to_grid, GridPosition, NavigationGrid, Position};

/// Node expansions before giving up
pub const MAX_ITERATIONS: usize = 10_000;

/// Ring radius searched when snapping a blocked endpoint
pub const SNAP_RADIUS: i32 = 5;

const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Open-set entry, ordered so the heap pops the lowest f first
#[derive(Debug, Clone, Copy)]
struct Node {
    f: f32,
    h: f32,
    pos: GridPosition,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties prefer the node closer to the goal
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance between two tiles
pub fn octile(a: GridPosition, b: GridPosition) -> f32 {
    let dx = (a.x - b.x).abs() as f32;
    let dy = (a.y - b.y).abs() as f32;
    dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
}

/// Nearest tile walkable for `ignore`, searching rings out to `radius`
pub fn nearest_walkable(
    grid: &NavigationGrid,
    tile: GridPosition,
    radius: i32,
    ignore: Option<&str>,
) -> Option<GridPosition> {
    if grid.is_walkable(tile, ignore) {
        return Some(tile);
    }
    for r in 1..=radius {
        let mut best: Option<(f32, GridPosition)> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                let candidate = GridPosition::new(tile.x + dx, tile.y + dy);
                if !grid.is_walkable(candidate, ignore) {
                    continue;
                }
                let d = octile(tile, candidate);
                match best {
                    Some((bd, _)) if bd <= d => {}
                    _ => best = Some((d, candidate)),
                }
            }
        }
        if let Some((_, found)) = best {
            return Some(found);
        }
    }
    None
}

/// Whether stepping from `from` by (dx, dy) is legal for `ignore`
fn can_step(
    grid: &NavigationGrid,
    from: GridPosition,
    dx: i32,
    dy: i32,
    ignore: Option<&str>,
) -> bool {
    let to = GridPosition::new(from.x + dx, from.y + dy);
    if !grid.is_passable(to) {
        return false;
    }
    if dx != 0 && dy != 0 {
        // No corner cutting
        let flank_a = GridPosition::new(from.x + dx, from.y);
        let flank_b = GridPosition::new(from.x, from.y + dy);
        return grid.is_walkable(flank_a, ignore) && grid.is_walkable(flank_b, ignore);
    }
    true
}

/// Find a tile route from `start` to `end` (pixel positions).
///
/// `ignore` is the requesting agent, whose own tile carries no penalty.
/// Returns the tile sequence including both endpoints, or an empty vec when
/// no route exists within the iteration cap.
pub fn find_path(
    grid: &NavigationGrid,
    start: Position,
    end: Position,
    ignore: Option<&str>,
) -> Vec<GridPosition> {
    let start_tile = nearest_walkable(grid, world_to_grid(start), SNAP_RADIUS, ignore);
    let Some(start_tile) = start_tile else {
        tracing::debug!(?start, "No walkable tile near route start");
        return Vec::new();
    };
    let end_tile = nearest_walkable(grid, world_to_grid(end), SNAP_RADIUS, ignore);
    let Some(end_tile) = end_tile else {
        tracing::debug!(?end, "No walkable tile near route end");
        return Vec::new();
    };

    if start_tile == end_tile {
        return vec![start_tile];
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<GridPosition, GridPosition> = HashMap::new();
    let mut g_score: HashMap<GridPosition, f32> = HashMap::new();
    let mut closed: HashSet<GridPosition> = HashSet::new();

    let h = octile(start_tile, end_tile);
    g_score.insert(start_tile, 0.0);
    open.push(Node {
        f: h,
        h,
        pos: start_tile,
    });

    let mut iterations = 0;
    while let Some(Node { pos, .. }) = open.pop() {
        if pos == end_tile {
            return reconstruct(&came_from, end_tile);
        }
        if !closed.insert(pos) {
            continue;
        }

        iterations += 1;
        if iterations > MAX_ITERATIONS {
            tracing::warn!(
                from = ?start_tile,
                to = ?end_tile,
                "Pathfinding hit iteration cap"
            );
            return Vec::new();
        }

        let g = g_score.get(&pos).copied().unwrap_or(f32::INFINITY);
        for &(dx, dy) in &NEIGHBORS {
            if !can_step(grid, pos, dx, dy, ignore) {
                continue;
            }
            let next = GridPosition::new(pos.x + dx, pos.y + dy);
            if closed.contains(&next) {
                continue;
            }
            let Some(tile_cost) = grid.cost(next, ignore) else {
                continue;
            };
            let step = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
            let tentative = g + step * tile_cost;
            if tentative < g_score.get(&next).copied().unwrap_or(f32::INFINITY) {
                came_from.insert(next, pos);
                g_score.insert(next, tentative);
                let h = octile(next, end_tile);
                open.push(Node {
                    f: tentative + h,
                    h,
                    pos: next,
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct(
    came_from: &HashMap<GridPosition, GridPosition>,
    end: GridPosition,
) -> Vec<GridPosition> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
