//! Navigation grid
//!
//! Static tile classification built once from the office layout, plus a
//! dynamic overlay of agent positions. Other agents are never hard walls for
//! planning: they add a soft cost so routes bend around them when a detour
//! is cheap and push through when it is not.

use std::collections::HashMap;

use super::{world_to_grid, GridPosition, Position};
use crate::layout;

/// Cost of walking through a tile another agent stands on
pub const AGENT_SOFT_COST: f32 = 8.0;

/// Tile classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Floor,
    Wall,
    Desk,
    BossDesk,
    Elevator,
    /// Floor occupied by another agent (overlay only, never stored statically)
    AgentSoft,
}

impl Tile {
    /// Whether static geometry allows standing here
    pub fn is_passable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Elevator | Tile::AgentSoft)
    }

    /// Movement cost multiplier, `None` when impassable
    pub fn cost(self) -> Option<f32> {
        match self {
            Tile::Floor | Tile::Elevator => Some(1.0),
            Tile::AgentSoft => Some(AGENT_SOFT_COST),
            Tile::Wall | Tile::Desk | Tile::BossDesk => None,
        }
    }

    /// Single character used by the ASCII debug dump
    pub fn glyph(self) -> char {
        match self {
            Tile::Floor => '.',
            Tile::Wall => '#',
            Tile::Desk => 'D',
            Tile::BossDesk => 'B',
            Tile::Elevator => 'E',
            Tile::AgentSoft => 'a',
        }
    }
}

/// Static tiles plus the dynamic agent overlay
#[derive(Debug, Clone)]
pub struct NavigationGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    /// Agent id -> tile the agent currently stands on
    agents: HashMap<String, GridPosition>,
}

impl NavigationGrid {
    /// Build a grid from row-major tiles
    pub fn new(width: i32, height: i32, tiles: Vec<Tile>) -> Self {
        debug_assert_eq!(tiles.len(), (width * height) as usize);
        Self {
            width,
            height,
            tiles,
            agents: HashMap::new(),
        }
    }

    /// The office floor
    pub fn office() -> Self {
        Self::new(layout::GRID_WIDTH, layout::GRID_HEIGHT, layout::build_tiles())
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Static tile, out of bounds reads as wall
    pub fn tile(&self, pos: GridPosition) -> Tile {
        if !self.in_bounds(pos) {
            return Tile::Wall;
        }
        self.tiles[(pos.y * self.width + pos.x) as usize]
    }

    /// Static passability, ignoring agents
    pub fn is_passable(&self, pos: GridPosition) -> bool {
        self.tile(pos).is_passable()
    }

    /// Whether an agent other than `ignore` stands on this tile
    pub fn is_occupied(&self, pos: GridPosition, ignore: Option<&str>) -> bool {
        self.agents
            .iter()
            .any(|(id, &tile)| tile == pos && Some(id.as_str()) != ignore)
    }

    /// Hard walkability: passable and not occupied by another agent
    pub fn is_walkable(&self, pos: GridPosition, ignore: Option<&str>) -> bool {
        self.is_passable(pos) && !self.is_occupied(pos, ignore)
    }

    /// Tile as seen by `ignore`, with other agents shown as soft tiles
    pub fn tile_for(&self, pos: GridPosition, ignore: Option<&str>) -> Tile {
        let tile = self.tile(pos);
        if tile.is_passable() && self.is_occupied(pos, ignore) {
            Tile::AgentSoft
        } else {
            tile
        }
    }

    /// Movement cost for `ignore` entering this tile, `None` when impassable
    pub fn cost(&self, pos: GridPosition, ignore: Option<&str>) -> Option<f32> {
        self.tile_for(pos, ignore).cost()
    }

    /// Record where an agent stands
    pub fn update_agent_position(&mut self, id: &str, pos: Position) {
        let tile = world_to_grid(pos);
        match self.agents.get_mut(id) {
            Some(current) => *current = tile,
            None => {
                self.agents.insert(id.to_string(), tile);
            }
        }
    }

    /// Forget an agent entirely
    pub fn remove_dynamic_obstacle(&mut self, id: &str) {
        self.agents.remove(id);
    }

    /// Number of agents in the overlay
    pub fn dynamic_obstacle_count(&self) -> usize {
        self.agents.len()
    }

    /// Clear the dynamic overlay
    pub fn clear_dynamic_obstacles(&mut self) {
        self.agents.clear();
    }

    /// Render the grid with agent overlay as text, one row per line
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.tile_for(GridPosition::new(x, y), None).glyph());
            }
            out.push('\n');
        }
        out
    }
}
