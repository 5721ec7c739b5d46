//! Converts a built `MapCache` plus its assembled tilesets into a Tiled
//! 1.10 JSON map document. Grounded in
//! `tiled_master/framework/builder.py::MapExporter._generate_map_data`.

use crate::config;
use crate::map_cache::MapCache;
use crate::schema::Tileset;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct TiledDocument {
    pub width: i32,
    pub height: i32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub version: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tiledversion: &'static str,
    pub orientation: &'static str,
    pub renderorder: &'static str,
    pub nextlayerid: u32,
    pub nextobjectid: u32,
    pub compressionlevel: i32,
    pub layers: Vec<Value>,
    pub tilesets: Vec<Value>,
}

fn tile_layer_json(id: usize, name: &str, width: i32, height: i32, data: Vec<u32>) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "type": "tilelayer",
        "width": width,
        "height": height,
        "visible": true,
        "opacity": 1,
        "data": data,
        "x": 0,
        "y": 0,
    })
}

fn append_flag_tile(map: &mut serde_json::Map<String, Value>, tile_id: u32, flag_name: &str) {
    let tiles = map.entry("tiles").or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(tiles) = tiles {
        tiles.push(serde_json::json!({
            "id": tile_id,
            "properties": [{"name": flag_name, "type": "bool", "value": true}],
        }));
    }
}

/// Assembles the full exported document. Layers that are entirely empty are
/// dropped, except the cover and obstacle layers, which are always present
/// so downstream collision/cover readers don't have to special-case their
/// absence.
pub fn build_document(map_cache: &MapCache, tilesets: &[Tileset]) -> TiledDocument {
    let tilesets_by_id: BTreeMap<u32, &Tileset> = tilesets.iter().map(|t| (t.tileset_id, t)).collect();

    let mut layers = Vec::new();
    layers.push(serde_json::to_value(&map_cache.itemlayer).expect("ItemLayer always serializes"));

    for layer_index in 0..map_cache.layer_nums {
        let mut data = Vec::with_capacity((map_cache.width.max(0) * map_cache.height.max(0)) as usize);
        let mut any_nonzero = false;
        for y in 0..map_cache.height {
            for x in 0..map_cache.width {
                let cell = map_cache.get_tile(x, y, layer_index);
                let gid = if cell.tileset_id == 0 {
                    0
                } else {
                    match tilesets_by_id.get(&cell.tileset_id) {
                        Some(tileset) => tileset.firstgid + cell.local_id - 1,
                        None => {
                            log::error!("tile at ({}, {}) references unknown tileset id {}", x, y, cell.tileset_id);
                            0
                        }
                    }
                };
                any_nonzero |= gid != 0;
                data.push(gid);
            }
        }

        if !any_nonzero && layer_index != config::COVER_LAYER && layer_index != config::OBSTACLE_LAYER {
            continue;
        }

        let name = if layer_index == config::COVER_LAYER {
            "CoverLayer".to_string()
        } else if layer_index == config::OBSTACLE_LAYER {
            "Obstacles".to_string()
        } else {
            format!("Layer_{}", layer_index + 1)
        };
        layers.push(tile_layer_json(layer_index, &name, map_cache.width, map_cache.height, data));
    }

    let mut tilesets_json = Vec::with_capacity(tilesets.len());
    for tileset in tilesets {
        let mut value = serde_json::to_value(tileset).expect("Tileset always serializes");
        if let Value::Object(ref mut map) = value {
            if tileset.tileset_id == map_cache.collision_idx.0 && map_cache.collision_idx.0 != 0 {
                append_flag_tile(map, tileset.firstgid + map_cache.collision_idx.1 - 1, "collision");
            }
            if tileset.tileset_id == map_cache.cover_idx.0 && map_cache.cover_idx.0 != 0 {
                append_flag_tile(map, tileset.firstgid + map_cache.cover_idx.1 - 1, "cover");
            }
        }
        tilesets_json.push(value);
    }

    TiledDocument {
        width: map_cache.width,
        height: map_cache.height,
        tilewidth: config::TILE_SIZE,
        tileheight: config::TILE_SIZE,
        version: "1.10",
        kind: "map",
        tiledversion: "1.10.0",
        orientation: "orthogonal",
        renderorder: "right-down",
        nextlayerid: map_cache.layer_nums as u32 + 1,
        nextobjectid: 1,
        compressionlevel: -1,
        layers,
        tilesets: tilesets_json,
    }
}

pub fn to_json_string(map_cache: &MapCache, tilesets: &[Tileset]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&build_document(map_cache, tilesets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TextureTile;

    fn tileset(tileset_id: u32, firstgid: u32) -> Tileset {
        Tileset {
            tileset_id,
            name: format!("tileset_{tileset_id}"),
            columns: 4,
            firstgid,
            image: "sheet.png".to_string(),
            imagewidth: 64,
            imageheight: 64,
            spacing: 0,
            margin: 0,
            tilecount: 16,
            tilewidth: config::TILE_SIZE,
            tileheight: config::TILE_SIZE,
        }
    }

    #[test]
    fn empty_layers_are_dropped_except_cover_and_obstacle() {
        let map_cache = MapCache::new("m1", 4, 4, config::DEFAULT_LAYER_NUMS as usize);
        let doc = build_document(&map_cache, &[tileset(1, 1)]);

        let layer_names: Vec<&str> = doc.layers.iter().filter_map(|l| l.get("name").and_then(Value::as_str)).collect();
        assert!(layer_names.contains(&"CoverLayer"));
        assert!(layer_names.contains(&"Obstacles"));
        assert!(!layer_names.iter().any(|n| n.starts_with("Layer_")));
    }

    #[test]
    fn a_placed_tile_resolves_to_the_tilesets_gid_range() {
        let mut map_cache = MapCache::new("m1", 4, 4, config::DEFAULT_LAYER_NUMS as usize);
        map_cache.drop_tile(1, 1, config::GROUND_LAYER, &TextureTile::new("grass", "grass.png", 1, 3));

        let doc = build_document(&map_cache, &[tileset(1, 1)]);
        let ground_layer = doc
            .layers
            .iter()
            .find(|l| l.get("name").and_then(Value::as_str) == Some("Layer_4"))
            .expect("ground layer is non-empty and should be present");

        let data = ground_layer["data"].as_array().unwrap();
        assert_eq!(data[1 * 4 + 1].as_u64().unwrap(), 3);
    }
}
