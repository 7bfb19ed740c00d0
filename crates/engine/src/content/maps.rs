use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Top level of a map-set file.
#[derive(Debug, Clone, Deserialize)]
pub struct MapSetFile {
    #[serde(rename = "mapDefinition")]
    pub map_definition: Vec<MapDefinition>,
    /// Renderer-owned tile geometry settings, passed through untouched.
    #[serde(rename = "tileConfig", default)]
    pub tile_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDefinition {
    pub mapid: u32,
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub difficulty: u32,
    pub success_criteria: u32,
    pub maximum_score: u32,
    pub tile_layout: Vec<TileLayout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileLayout {
    pub x: i32,
    pub z: i32,
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Map-select card contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo<'a> {
    pub mapid: u32,
    pub name: &'a str,
    pub instructions: &'a str,
    pub difficulty: u32,
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map set {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse map set {path}{location}: {message}", location = at_json_path(.json_path))]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
    #[error("invalid map set {path}: map {map_index}: {message}")]
    Invalid {
        path: PathBuf,
        map_index: usize,
        message: String,
    },
    #[error("map set {path} defines no maps")]
    Empty { path: PathBuf },
}

fn at_json_path(json_path: &str) -> String {
    if json_path.is_empty() || json_path == "." {
        String::new()
    } else {
        format!(" at {json_path}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapSet {
    maps: Vec<MapDefinition>,
    tile_config: Option<serde_json::Value>,
}

impl MapSet {
    pub fn new(maps: Vec<MapDefinition>) -> Self {
        Self {
            maps,
            tile_config: None,
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MapDefinition> {
        self.maps.get(index)
    }

    pub fn maps(&self) -> &[MapDefinition] {
        &self.maps
    }

    pub fn tile_config(&self) -> Option<&serde_json::Value> {
        self.tile_config.as_ref()
    }

    pub fn info(&self, index: usize) -> Option<MapInfo<'_>> {
        self.maps.get(index).map(|map| MapInfo {
            mapid: map.mapid,
            name: &map.name,
            instructions: &map.instructions,
            difficulty: map.difficulty,
        })
    }
}

pub fn load_map_set(path: &Path) -> Result<MapSet, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let map_set = parse_map_set(path, &raw)?;
    info!(path = %path.display(), maps = map_set.len(), "map_set_loaded");
    Ok(map_set)
}

pub fn parse_map_set(path: &Path, raw: &str) -> Result<MapSet, MapLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let file: MapSetFile =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            MapLoadError::Parse {
                path: path.to_path_buf(),
                json_path,
                message: error.into_inner().to_string(),
            }
        })?;

    if file.map_definition.is_empty() {
        return Err(MapLoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    for (map_index, map) in file.map_definition.iter().enumerate() {
        validate_map(map).map_err(|message| MapLoadError::Invalid {
            path: path.to_path_buf(),
            map_index,
            message,
        })?;
    }

    Ok(MapSet {
        maps: file.map_definition,
        tile_config: file.tile_config,
    })
}

fn validate_map(map: &MapDefinition) -> Result<(), String> {
    if map.maximum_score == 0 {
        return Err("maximumScore must be positive".to_string());
    }
    if map.success_criteria > map.maximum_score {
        return Err(format!(
            "successCriteria {} exceeds maximumScore {}",
            map.success_criteria, map.maximum_score
        ));
    }
    if map.tile_layout.is_empty() {
        return Err("tileLayout is empty".to_string());
    }
    let mut seen = HashSet::with_capacity(map.tile_layout.len());
    for (tile_index, tile) in map.tile_layout.iter().enumerate() {
        if !seen.insert((tile.x, tile.z)) {
            return Err(format!(
                "tileLayout[{tile_index}] repeats coordinate ({}, {})",
                tile.x, tile.z
            ));
        }
    }
    Ok(())
}
