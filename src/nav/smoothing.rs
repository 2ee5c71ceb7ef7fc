//! Path smoothing
//!
//! Turns a tile route into a pixel polyline that looks walked rather than
//! stepped: collinear runs collapse, clear shortcuts are taken, hairpin turns
//! get a short quadratic curve, and near-duplicate points are dropped.
//! Every segment of the result stays on statically passable tiles, and
//! shortcuts never cut across a tile another agent stands on.

use super::{grid_to_world, world_to_grid, GridPosition, NavigationGrid, Position};

/// Sampling step for line-of-sight checks (half a tile)
pub const LOS_STEP: f32 = 16.0;

/// Corners where the heading turns by more than this get rounded
pub const CORNER_TURN_DEG: f32 = 135.0;

/// Maximum distance from a corner to where its curve starts
pub const CORNER_OFFSET: f32 = 16.0;

/// Line segments per rounded corner
pub const CURVE_SEGMENTS: usize = 4;

/// Points closer than this to the previous one are dropped when safe
pub const MIN_POINT_SPACING: f32 = 4.0;

/// Whether the straight segment `a -> b` stays on passable tiles.
///
/// Samples are at most half a tile apart, so consecutive samples are in the
/// same tile or a neighbouring one. A diagonal hop between samples also
/// requires both flanking tiles to be passable.
pub fn line_of_sight(grid: &NavigationGrid, a: Position, b: Position) -> bool {
    let mut prev = world_to_grid(a);
    if !grid.is_passable(prev) {
        return false;
    }
    let steps = (a.distance(b) / LOS_STEP).ceil().max(1.0) as usize;
    for i in 1..=steps {
        let tile = world_to_grid(a.lerp(b, i as f32 / steps as f32));
        if tile == prev {
            continue;
        }
        if !grid.is_passable(tile) {
            return false;
        }
        if tile.x != prev.x && tile.y != prev.y {
            let flank_a = GridPosition::new(tile.x, prev.y);
            let flank_b = GridPosition::new(prev.x, tile.y);
            if !grid.is_passable(flank_a) || !grid.is_passable(flank_b) {
                return false;
            }
        }
        prev = tile;
    }
    true
}

/// Whether the segment `a -> b` avoids tiles held by agents other than
/// `ignore`. The endpoint tiles themselves are not checked.
fn clear_of_agents(grid: &NavigationGrid, a: Position, b: Position, ignore: Option<&str>) -> bool {
    if grid.dynamic_obstacle_count() == 0 {
        return true;
    }
    let (first, last) = (world_to_grid(a), world_to_grid(b));
    let steps = (a.distance(b) / LOS_STEP).ceil().max(1.0) as usize;
    (1..steps).all(|i| {
        let tile = world_to_grid(a.lerp(b, i as f32 / steps as f32));
        tile == first || tile == last || !grid.is_occupied(tile, ignore)
    })
}

/// Smooth a tile route into a pixel polyline from `start` to `end`.
///
/// `start` is kept exactly. `end` is kept exactly when its tile is passable,
/// otherwise the route ends at the center of the snapped tile. Detours the
/// search took around agents other than `ignore` survive shortcutting.
pub fn smooth_path(
    grid: &NavigationGrid,
    tiles: &[GridPosition],
    start: Position,
    end: Position,
    ignore: Option<&str>,
) -> Vec<Position> {
    let (Some(&first), Some(&last)) = (tiles.first(), tiles.last()) else {
        return Vec::new();
    };
    let end = if grid.is_passable(world_to_grid(end)) {
        end
    } else {
        grid_to_world(last)
    };

    // Tile centers bracketed by the exact endpoints. The hop from an endpoint
    // to its own tile center never leaves that tile.
    let mut points = Vec::with_capacity(tiles.len() + 2);
    points.push(start);
    points.extend(tiles.iter().map(|&t| grid_to_world(t)));
    points.push(end);
    if tiles.len() == 1 && first == world_to_grid(start) {
        points = vec![start, end];
    }
    points.dedup_by(|b, a| a.distance(*b) < f32::EPSILON);

    let points = remove_collinear(&points);
    let points = shortcut(grid, &points, ignore);
    let points = round_corners(grid, &points);
    drop_close_points(grid, &points)
}

fn remove_collinear(points: &[Position]) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let prev = out[out.len() - 1];
        let cur = points[i];
        let next = points[i + 1];
        let (ax, ay) = (cur.x - prev.x, cur.y - prev.y);
        let (bx, by) = (next.x - cur.x, next.y - cur.y);
        let cross = ax * by - ay * bx;
        let dot = ax * bx + ay * by;
        if cross.abs() < 1e-3 && dot > 0.0 {
            continue;
        }
        out.push(cur);
    }
    out.push(points[points.len() - 1]);
    out
}

/// Greedy string pulling: from each kept point jump to the furthest visible one
fn shortcut(grid: &NavigationGrid, points: &[Position], ignore: Option<&str>) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    let mut i = 0;
    while i < points.len() - 1 {
        let mut j = points.len() - 1;
        while j > i + 1
            && !(line_of_sight(grid, points[i], points[j])
                && clear_of_agents(grid, points[i], points[j], ignore))
        {
            j -= 1;
        }
        out.push(points[j]);
        i = j;
    }
    out
}

fn round_corners(grid: &NavigationGrid, points: &[Position]) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }
    // Compared against the interior angle at the corner
    let threshold = (180.0 - CORNER_TURN_DEG).to_radians().cos();
    let mut out = vec![points[0]];

    for i in 1..points.len() - 1 {
        let prev = points[i - 1];
        let corner = points[i];
        let next = points[i + 1];

        let (ax, ay) = (prev.x - corner.x, prev.y - corner.y);
        let (bx, by) = (next.x - corner.x, next.y - corner.y);
        let la = ax.hypot(ay);
        let lb = bx.hypot(by);
        if la < f32::EPSILON || lb < f32::EPSILON {
            out.push(corner);
            continue;
        }

        let cos = (ax * bx + ay * by) / (la * lb);
        if cos <= threshold {
            // Gentle turn
            out.push(corner);
            continue;
        }

        let offset = CORNER_OFFSET.min(la.min(lb) * 0.5);
        let a = Position::new(corner.x + ax / la * offset, corner.y + ay / la * offset);
        let b = Position::new(corner.x + bx / lb * offset, corner.y + by / lb * offset);
        let curve: Vec<Position> = (0..=CURVE_SEGMENTS)
            .map(|k| quadratic(a, corner, b, k as f32 / CURVE_SEGMENTS as f32))
            .collect();

        let last_out = out[out.len() - 1];
        let valid = line_of_sight(grid, last_out, curve[0])
            && curve.windows(2).all(|w| line_of_sight(grid, w[0], w[1]))
            && line_of_sight(grid, curve[CURVE_SEGMENTS], next);
        if valid {
            out.extend(curve);
        } else {
            out.push(corner);
        }
    }

    out.push(points[points.len() - 1]);
    out
}

fn quadratic(a: Position, control: Position, b: Position, t: f32) -> Position {
    let u = 1.0 - t;
    Position::new(
        u * u * a.x + 2.0 * u * t * control.x + t * t * b.x,
        u * u * a.y + 2.0 * u * t * control.y + t * t * b.y,
    )
}

fn drop_close_points(grid: &NavigationGrid, points: &[Position]) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let last = out[out.len() - 1];
        if last.distance(points[i]) < MIN_POINT_SPACING
            && line_of_sight(grid, last, points[i + 1])
        {
            continue;
        }
        out.push(points[i]);
    }

    let end = points[points.len() - 1];
    if out.len() >= 2 {
        let last = out[out.len() - 1];
        let before = out[out.len() - 2];
        if last.distance(end) < MIN_POINT_SPACING && line_of_sight(grid, before, end) {
            out.pop();
        }
    }
    out.push(end);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::nav::{pathfinder, plan_route, Tile};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_walkable(grid: &NavigationGrid, route: &[Position]) {
        for pair in route.windows(2) {
            assert!(
                line_of_sight(grid, pair[0], pair[1]),
                "segment {:?} -> {:?} crosses a blocked tile",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_line_of_sight_blocked_by_desk() {
        let grid = NavigationGrid::office();
        // Straight through the first desk row
        assert!(!line_of_sight(
            &grid,
            Position::new(265.0, 340.0),
            Position::new(265.0, 500.0)
        ));
        // Along the open aisle above it
        assert!(line_of_sight(
            &grid,
            Position::new(150.0, 340.0),
            Position::new(1100.0, 340.0)
        ));
    }

    #[test]
    fn test_line_of_sight_rejects_corner_clip() {
        let tiles = vec![
            Tile::Floor, Tile::Wall, //
            Tile::Floor, Tile::Floor,
        ];
        let grid = NavigationGrid::new(2, 2, tiles);
        // Diagonal through the shared corner of (0,0) and (1,1)
        assert!(!line_of_sight(
            &grid,
            Position::new(16.0, 16.0),
            Position::new(48.0, 48.0)
        ));
    }

    #[test]
    fn test_straight_corridor_collapses_to_two_points() {
        let grid = NavigationGrid::office();
        let start = Position::new(150.0, 340.0);
        let end = Position::new(1100.0, 340.0);
        let route = plan_route(&grid, start, end, None);
        assert_eq!(route, vec![start, end]);
    }

    #[test]
    fn test_smoothed_routes_stay_walkable() {
        let grid = NavigationGrid::office();
        let mut rng = StdRng::seed_from_u64(7);
        let mut checked = 0;

        while checked < 60 {
            let from = Position::new(rng.gen_range(40.0..1240.0), rng.gen_range(130.0..990.0));
            let to = Position::new(rng.gen_range(40.0..1240.0), rng.gen_range(130.0..990.0));
            if !grid.is_passable(world_to_grid(from)) || !grid.is_passable(world_to_grid(to)) {
                continue;
            }
            let tiles = pathfinder::find_path(&grid, from, to, None);
            assert!(!tiles.is_empty());
            let route = smooth_path(&grid, &tiles, from, to, None);

            assert_eq!(route[0], from);
            assert_eq!(*route.last().unwrap(), to);
            assert_walkable(&grid, &route);
            checked += 1;
        }
    }

    fn open_floor() -> NavigationGrid {
        NavigationGrid::new(20, 20, vec![Tile::Floor; 400])
    }

    #[test]
    fn test_hairpin_is_rounded() {
        let grid = open_floor();
        let corner = Position::new(400.0, 100.0);
        let points = vec![Position::new(100.0, 100.0), corner, Position::new(120.0, 160.0)];

        let out = round_corners(&grid, &points);
        assert_eq!(out.len(), CURVE_SEGMENTS + 3);
        assert!(!out.contains(&corner));
        assert_eq!(out[0], points[0]);
        assert_eq!(out[out.len() - 1], points[2]);
        assert_walkable(&grid, &out);
    }

    #[test]
    fn test_right_angle_is_left_sharp() {
        let grid = open_floor();
        let points = vec![
            Position::new(100.0, 100.0),
            Position::new(400.0, 100.0),
            Position::new(400.0, 400.0),
        ];
        assert_eq!(round_corners(&grid, &points), points);
    }

    #[test]
    fn test_blocked_end_stops_at_snapped_tile() {
        let grid = NavigationGrid::office();
        let route = plan_route(&grid, layout::BOSS_APPROACH, layout::BOSS_SEAT, None);
        let last = *route.last().unwrap();
        assert!(grid.is_passable(world_to_grid(last)));
        assert_walkable(&grid, &route);
    }

    #[test]
    fn test_shortcut_keeps_detour_around_agent() {
        let mut grid = NavigationGrid::office();
        let start = Position::new(150.0, 496.0);
        let end = Position::new(1100.0, 496.0);
        grid.update_agent_position("standing", Position::new(624.0, 496.0));

        let route = plan_route(&grid, start, end, Some("walker"));
        assert!(route.len() > 2, "expected a detour, got {route:?}");
        for pair in route.windows(2) {
            assert!(clear_of_agents(&grid, pair[0], pair[1], Some("walker")));
        }
        // Nothing to avoid for the standing agent itself
        let own = plan_route(&grid, start, end, Some("standing"));
        assert_eq!(own, vec![start, end]);
    }

    #[test]
    fn test_close_points_are_dropped() {
        let grid = NavigationGrid::office();
        let points = vec![
            Position::new(150.0, 340.0),
            Position::new(152.0, 340.0),
            Position::new(300.0, 340.0),
        ];
        let out = drop_close_points(&grid, &points);
        assert_eq!(out, vec![points[0], points[2]]);
    }
}
