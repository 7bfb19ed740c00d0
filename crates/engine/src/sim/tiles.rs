use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::content::MapDefinition;

use super::bus::{Notification, ObserverBus};
use super::flair::{Bird, BusStop, FlairEffect, FlairEntity, Lady};
use super::instructions::Instruction;
use super::score::{AttemptProgress, MapRecordTable};
use super::Vec3;

pub const ROLE_BUS_STOP: &str = "BUSSTOP";
pub const ROLE_SPECIAL_BIRD: &str = "SPECIAL_BIRD";
pub const ROLE_NO_TILE: &str = "NO_TILE";

/// Gameplay role of a tile. `NoTile` stands for the air beyond the map edge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TileRole {
    #[default]
    Plain,
    BusStop,
    SpecialBird,
    Other(String),
    NoTile,
}

impl TileRole {
    pub fn from_layout(role: Option<&str>) -> Self {
        match role.map(str::trim) {
            None | Some("") => TileRole::Plain,
            Some(ROLE_BUS_STOP) => TileRole::BusStop,
            Some(ROLE_SPECIAL_BIRD) => TileRole::SpecialBird,
            Some(ROLE_NO_TILE) => TileRole::NoTile,
            Some(other) => TileRole::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TileRole::Plain => "",
            TileRole::BusStop => ROLE_BUS_STOP,
            TileRole::SpecialBird => ROLE_SPECIAL_BIRD,
            TileRole::Other(role) => role,
            TileRole::NoTile => ROLE_NO_TILE,
        }
    }
}

impl fmt::Display for TileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub x: i32,
    pub z: i32,
}

impl GridCoord {
    pub fn is_adjacent_or_same(self, other: GridCoord) -> bool {
        (self.x - other.x).abs() < 2 && (self.z - other.z).abs() < 2
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    id: String,
    kind: String,
    role: TileRole,
    grid: GridCoord,
    flair: Vec<FlairEntity>,
    active: bool,
}

impl Tile {
    fn new(index: usize, kind: &str, role: TileRole, grid: GridCoord) -> Self {
        let flair = match role {
            TileRole::BusStop => vec![
                FlairEntity::BusStop(BusStop::new(format!("BusStop_{index}"))),
                FlairEntity::Lady(Lady::new(format!("Lady_{index}"))),
            ],
            TileRole::SpecialBird => vec![FlairEntity::Bird(Bird::new(format!("Bird_{index}")))],
            _ => Vec::new(),
        };
        Self {
            id: format!("Tile_{index}"),
            kind: kind.to_string(),
            role,
            grid,
            flair,
            active: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Geometry class from the layout, e.g. straight or junction.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn role(&self) -> &TileRole {
        &self.role
    }

    pub fn grid(&self) -> GridCoord {
        self.grid
    }

    pub fn flair(&self) -> &[FlairEntity] {
        &self.flair
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn activate(&mut self) {
        self.active = true;
        for flair in &mut self.flair {
            flair.activate();
        }
    }

    fn deactivate(&mut self) {
        self.active = false;
        for flair in &mut self.flair {
            flair.deactivate();
        }
    }
}

/// Spatial query answered by whoever owns tile geometry: which tile, if any,
/// lies beneath a world position.
pub trait TileResolver {
    fn resolve_tile_at(&self, tiles: &[Tile], position: Vec3) -> Option<String>;
}

/// Treats every tile as a square of `tile_length` centred on its grid
/// coordinate scaled by that length.
#[derive(Debug, Clone, Copy)]
pub struct GridTileResolver {
    tile_length: f32,
}

impl GridTileResolver {
    pub fn new(tile_length: f32) -> Self {
        Self {
            tile_length: if tile_length > 0.0 { tile_length } else { 1.0 },
        }
    }
}

impl TileResolver for GridTileResolver {
    fn resolve_tile_at(&self, tiles: &[Tile], position: Vec3) -> Option<String> {
        let target = GridCoord {
            x: (position.x / self.tile_length).round() as i32,
            z: (position.z / self.tile_length).round() as i32,
        };
        tiles
            .iter()
            .find(|tile| tile.grid == target)
            .map(|tile| tile.id.clone())
    }
}

/// Tiles of the loaded map, the single active tile and this attempt's
/// success count.
pub struct TileGraph {
    tiles: Vec<Tile>,
    index_by_id: HashMap<String, usize>,
    active_tile: Option<usize>,
    map_index: Option<usize>,
    progress: AttemptProgress,
    resolver: Box<dyn TileResolver>,
}

impl TileGraph {
    pub fn new(resolver: Box<dyn TileResolver>) -> Self {
        Self {
            tiles: Vec::new(),
            index_by_id: HashMap::new(),
            active_tile: None,
            map_index: None,
            progress: AttemptProgress::default(),
            resolver,
        }
    }

    pub fn with_grid(tile_length: f32) -> Self {
        Self::new(Box::new(GridTileResolver::new(tile_length)))
    }

    /// Replaces every tile and its flair; starts a fresh attempt.
    pub fn load_map(&mut self, map_index: usize, definition: &MapDefinition) {
        self.tiles = definition
            .tile_layout
            .iter()
            .enumerate()
            .map(|(index, layout)| {
                Tile::new(
                    index,
                    &layout.id,
                    TileRole::from_layout(layout.role.as_deref()),
                    GridCoord {
                        x: layout.x,
                        z: layout.z,
                    },
                )
            })
            .collect();
        self.index_by_id = self
            .tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| (tile.id.clone(), index))
            .collect();
        self.active_tile = None;
        self.map_index = Some(map_index);
        self.progress =
            AttemptProgress::new(definition.success_criteria, definition.maximum_score);
        info!(
            map_index,
            map = %definition.name,
            tiles = self.tiles.len(),
            success_criteria = definition.success_criteria,
            maximum_score = definition.maximum_score,
            "map_loaded"
        );
    }

    pub fn unload(&mut self) {
        self.tiles.clear();
        self.index_by_id.clear();
        self.active_tile = None;
        self.map_index = None;
        self.progress = AttemptProgress::default();
    }

    pub fn map_index(&self) -> Option<usize> {
        self.map_index
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: &str) -> Option<&Tile> {
        self.index_by_id.get(id).and_then(|index| self.tiles.get(*index))
    }

    pub fn active_tile(&self) -> Option<&Tile> {
        self.active_tile.and_then(|index| self.tiles.get(index))
    }

    pub fn active_tile_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.active).count()
    }

    pub fn progress(&self) -> &AttemptProgress {
        &self.progress
    }

    pub fn is_current_map_complete(&self) -> bool {
        self.progress.is_complete()
    }

    /// Role of a tile id, or `NoTile` for ids this map does not contain.
    pub fn tile_role(&self, id: &str) -> TileRole {
        match self.tile(id) {
            Some(tile) => tile.role.clone(),
            None => {
                warn!(tile_id = id, "tile_not_in_map");
                TileRole::NoTile
            }
        }
    }

    pub fn adjacent_tile_ids(&self, id: &str) -> Vec<&str> {
        let Some(origin) = self.tile(id).map(Tile::grid) else {
            warn!(tile_id = id, "tile_not_in_map");
            return Vec::new();
        };
        self.tiles
            .iter()
            .filter(|tile| tile.grid.is_adjacent_or_same(origin))
            .map(|tile| tile.id.as_str())
            .collect()
    }

    pub fn activate_tile_under_position(&mut self, position: Vec3, bus: &ObserverBus) {
        let resolved = self.resolver.resolve_tile_at(&self.tiles, position);
        let target = match resolved {
            Some(id) => match self.index_by_id.get(&id) {
                Some(index) => Some(*index),
                None => {
                    warn!(tile_id = %id, "resolved_tile_not_in_map");
                    None
                }
            },
            None => None,
        };
        if target != self.active_tile {
            self.activate_tile(target, bus);
        }
    }

    fn activate_tile(&mut self, target: Option<usize>, bus: &ObserverBus) {
        if let Some(old) = self.active_tile.and_then(|index| self.tiles.get_mut(index)) {
            old.deactivate();
        }
        let role = match target.and_then(|index| self.tiles.get_mut(index)) {
            Some(tile) => {
                tile.activate();
                tile.role.clone()
            }
            None => TileRole::NoTile,
        };
        self.active_tile = target;
        debug!(
            tile_id = self.active_tile().map_or("", Tile::id),
            role = %role,
            "tile_activated"
        );
        bus.publish(Notification::TileChange(role));
    }

    /// Applies a finished PAUSE to the active tile, or a finished FIRE to the
    /// active tile and its neighbours.
    pub fn handle_instruction_completed(
        &mut self,
        instruction: Instruction,
        bus: &ObserverBus,
        records: &mut MapRecordTable,
    ) {
        let Some(active) = self.active_tile else {
            return;
        };
        let targets = match instruction {
            Instruction::Pause => vec![active],
            Instruction::Fire => {
                let origin = self.tiles[active].grid;
                self.tiles
                    .iter()
                    .enumerate()
                    .filter(|(_, tile)| tile.grid.is_adjacent_or_same(origin))
                    .map(|(index, _)| index)
                    .collect()
            }
            _ => return,
        };

        let mut effects = Vec::new();
        for index in targets {
            for flair in &mut self.tiles[index].flair {
                flair.do_special(instruction, &mut effects);
            }
        }
        self.apply_effects(effects, bus, records);
    }

    /// Ticks every flair state machine once.
    pub fn update(&mut self, bus: &ObserverBus, records: &mut MapRecordTable) {
        let mut effects = Vec::new();
        for tile in &mut self.tiles {
            for flair in &mut tile.flair {
                flair.update(&mut effects);
            }
        }
        self.apply_effects(effects, bus, records);
    }

    fn apply_effects(
        &mut self,
        effects: Vec<FlairEffect>,
        bus: &ObserverBus,
        records: &mut MapRecordTable,
    ) {
        for effect in effects {
            bus.publish(Notification::ScoreChange(effect.score_delta));
            if effect.counts_toward_completion {
                self.progress.register_success();
                if let Some(map_index) = self.map_index {
                    records.record_completion(map_index, &self.progress);
                }
                debug!(
                    successes = self.progress.successes(),
                    success_criteria = self.progress.success_criteria(),
                    "flair_success_registered"
                );
            }
        }
    }
}
