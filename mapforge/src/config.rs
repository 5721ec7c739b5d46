//! Global layer-index constants and the configuration record consumed from
//! upstream. Grounded in `tiled_master/framework/config.py` and
//! `implement/town_impl/config.py` / `implement/room_impl/config.py`.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TILE_SIZE: u32 = 16;
pub const DEFAULT_LAYER_NUMS: u32 = 10;

/// Fixed layer indices shared by every stage. `interior` stages alias
/// `water_layer`/`plants_layer` to `wall_layer`/`void_layer` locally; the
/// grid itself only knows about these ten scratch/export slots.
pub const ITEM_LAYER: usize = 0;
pub const OBSTACLE_LAYER: usize = 1;
pub const COVER_LAYER: usize = 2;
pub const GROUND_LAYER: usize = 3;
pub const WATER_LAYER: usize = 4;
/// Interior rooms repurpose the water slot as their wall layer.
pub const WALL_LAYER: usize = 4;
pub const PLANTS_LAYER: usize = 5;
/// Interior rooms repurpose the plants slot as their void/roof layer.
pub const VOID_LAYER: usize = 5;
pub const ROAD_LAYER: usize = 6;
pub const TREE_LAYER: usize = 7;
/// Scratch layers, dropped (or at least not meaningfully exported) at
/// serialization time.
pub const STRUCTURE_LAYER: usize = 8;
pub const HOUSE_LAYER: usize = 9;

pub const PLACEHOLDER_TILE_PATH: &str = "__placeholder__";

/// Per-map scratch directories a filesystem-backed `AssetProvider` writes
/// derived assets into. Grounded in `tiled_master/framework/config.py`'s
/// `temp_*_folder_template` constants; `{map_id}` is substituted by callers.
pub fn asset_dir(cache_root: &str, map_id: &str) -> std::path::PathBuf {
    std::path::Path::new(cache_root).join(map_id).join("asset")
}

pub fn subimage_dir(cache_root: &str, map_id: &str) -> std::path::PathBuf {
    std::path::Path::new(cache_root).join(map_id).join("subimage")
}

pub fn tileset_dir(cache_root: &str, map_id: &str) -> std::path::PathBuf {
    std::path::Path::new(cache_root).join(map_id).join("tileset")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElementName {
    Town,
    Village,
    River,
    Woods,
    Ground,
    Bush,
    Collision,
    Cover,
    Interior,
    TownLogic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementConfig {
    pub name: ElementName,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub map_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_layer_nums")]
    pub layer_nums: u32,
    pub elements: Vec<ElementConfig>,
}

fn default_layer_nums() -> u32 {
    DEFAULT_LAYER_NUMS
}

impl Config {
    /// Parses `json` into a `Config`, reporting a JSON-pointer-style path to
    /// the offending field on failure instead of just a byte offset —
    /// upstream configuration records are hand-assembled by callers, so a
    /// bare `serde_json::Error` location is rarely enough to find the typo.
    pub fn from_json(json: &str) -> ConfigResult<Config> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            ConfigError::Parse { path, source: err.into_inner() }
        })
    }
}

/// A higher-level, caller-facing description that expands to a `Config`.
/// Grounded in `implement/town_impl/schema.py`'s `MapGenSetting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapGenSetting {
    pub layout: Layout,
    pub scene: String,
    #[serde(default)]
    pub building: u32,
    pub tree: Option<TreeLevel>,
    pub water: Option<WaterLevel>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum Layout {
    Village,
    Town,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TreeLevel {
    Sparse,
    Dense,
    #[serde(rename = "Slightly Dense")]
    SlightlyDense,
    Lush,
}

impl TreeLevel {
    pub fn scale(self) -> u32 {
        match self {
            TreeLevel::Sparse => 1,
            TreeLevel::Dense => 2,
            TreeLevel::SlightlyDense => 3,
            TreeLevel::Lush => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WaterLevel {
    Pond,
    Stream,
    River,
    Creek,
    Ocean,
    Coast,
}

impl WaterLevel {
    pub fn scale(self) -> u32 {
        match self {
            WaterLevel::Pond => 1,
            WaterLevel::Stream => 2,
            WaterLevel::River => 3,
            WaterLevel::Creek => 4,
            WaterLevel::Ocean => 5,
            WaterLevel::Coast => 6,
        }
    }
}

impl MapGenSetting {
    /// Translate the high-level setting into the element list a `Config`
    /// expects. The layout chooses between the Town and Village stages;
    /// water/tree levels become `scale` knobs inside their element `data`.
    pub fn to_elements(&self) -> Vec<ElementConfig> {
        let mut elements = Vec::new();

        let mut layout_data = HashMap::new();
        layout_data.insert(
            "building".to_string(),
            serde_json::Value::from(self.building),
        );
        let layout_name = match self.layout {
            Layout::Village => ElementName::Village,
            Layout::Town => ElementName::Town,
        };
        elements.push(ElementConfig {
            name: layout_name,
            enable: true,
            data: serde_json::to_value(layout_data).unwrap(),
        });

        if let Some(water) = self.water {
            let mut data = HashMap::new();
            data.insert("scale".to_string(), serde_json::Value::from(water.scale()));
            elements.push(ElementConfig {
                name: ElementName::River,
                enable: true,
                data: serde_json::to_value(data).unwrap(),
            });
        }

        if let Some(tree) = self.tree {
            let mut data = HashMap::new();
            data.insert("scale".to_string(), serde_json::Value::from(tree.scale()));
            elements.push(ElementConfig {
                name: ElementName::Woods,
                enable: true,
                data: serde_json::to_value(data).unwrap(),
            });
        }

        elements.push(ElementConfig {
            name: ElementName::Ground,
            enable: true,
            data: serde_json::Value::Null,
        });
        elements.push(ElementConfig {
            name: ElementName::Collision,
            enable: true,
            data: serde_json::Value::Null,
        });
        elements.push(ElementConfig {
            name: ElementName::Cover,
            enable: true,
            data: serde_json::Value::Null,
        });

        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_level_scales_match_fixed_table() {
        assert_eq!(WaterLevel::Pond.scale(), 1);
        assert_eq!(WaterLevel::Coast.scale(), 6);
    }

    #[test]
    fn config_parses_from_json() {
        let raw = serde_json::json!({
            "map_id": "t1",
            "width": 64,
            "height": 32,
            "elements": [
                {"name": "ground", "enable": true, "data": {}}
            ]
        })
        .to_string();
        let cfg = Config::from_json(&raw).unwrap();
        assert_eq!(cfg.layer_nums, DEFAULT_LAYER_NUMS);
        assert_eq!(cfg.elements.len(), 1);
    }

    #[test]
    fn malformed_element_reports_its_json_path() {
        let raw = serde_json::json!({
            "map_id": "t1",
            "width": 64,
            "height": 32,
            "elements": [
                {"name": "not_a_real_element", "enable": true, "data": {}}
            ]
        })
        .to_string();
        let err = Config::from_json(&raw).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, "elements[0].name"),
            other => panic!("expected a Parse error, got {:?}", other),
        }
    }
}
