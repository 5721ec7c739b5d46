//! Layered map state: the mutable grid every stage reads from and writes
//! into, plus the snapshot/rollback primitives stages use to attempt a
//! placement and discard it on failure. Grounded in
//! `tiled_master/framework/map_cache.py::MapCache`.

use crate::config;
use crate::object::{ItemLayer, Object};
use crate::prng::{stable_hash, Prng};
use crate::schema::{ObjectGroup, TextureObject, TextureTile, TileGroup, Texture};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileCell {
    pub tileset_id: u32,
    pub local_id: u32,
    pub collision: bool,
    pub cover: bool,
}

impl TileCell {
    fn is_empty(&self) -> bool {
        self.local_id == 0
    }
}

pub struct MapCache {
    pub map_id: String,
    pub random_seed: u64,
    pub rand: Prng,
    pub width: i32,
    pub height: i32,
    pub layer_nums: usize,
    tile_data: Vec<TileCell>, // layer-major: [layer][y][x]
    pub itemlayer: ItemLayer,
    pub collision_idx: (u32, u32),
    pub cover_idx: (u32, u32),
}

impl MapCache {
    pub fn new(map_id: impl Into<String>, width: i32, height: i32, layer_nums: usize) -> Self {
        let map_id = map_id.into();
        let random_seed = stable_hash(&map_id);
        log::info!("init map {} with seed {}", map_id, random_seed);
        MapCache {
            rand: Prng::from_seed(random_seed),
            random_seed,
            width,
            height,
            layer_nums,
            tile_data: vec![TileCell::default(); layer_nums * (width.max(0) as usize) * (height.max(0) as usize)],
            itemlayer: ItemLayer::new(config::ITEM_LAYER as u32, "Items"),
            collision_idx: (0, 0),
            cover_idx: (0, 0),
            map_id,
        }
    }

    fn index(&self, x: i32, y: i32, layer: usize) -> usize {
        (layer * self.height as usize + y as usize) * self.width as usize + x as usize
    }

    fn in_bounds(&self, x: i32, y: i32, layer: usize) -> bool {
        layer < self.layer_nums && x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Copy every field of `other` into `self`, used to commit a tentative
    /// clone back into the map a stage is building.
    pub fn assign(&mut self, other: &MapCache) {
        self.width = other.width;
        self.height = other.height;
        self.layer_nums = other.layer_nums;
        self.random_seed = other.random_seed;
        self.rand = other.rand.clone();
        self.tile_data = other.tile_data.clone();
        self.itemlayer = other.itemlayer.clone();
        self.collision_idx = other.collision_idx;
        self.cover_idx = other.cover_idx;
    }

    /// Clone this map state with a PRNG reseeded from `(seed, attempts)`, so
    /// repeated speculative attempts at the same placement draw different
    /// random sequences while staying fully deterministic.
    pub fn create_copy(&self, attempts: u64) -> MapCache {
        let random_seed = stable_hash(&format!("({}, {})", self.random_seed, attempts));
        MapCache {
            map_id: self.map_id.clone(),
            random_seed,
            rand: Prng::from_seed(random_seed),
            width: self.width,
            height: self.height,
            layer_nums: self.layer_nums,
            tile_data: self.tile_data.clone(),
            itemlayer: self.itemlayer.clone(),
            collision_idx: self.collision_idx,
            cover_idx: self.cover_idx,
        }
    }

    pub fn set_collision_idx(&mut self, tileset_id: u32, local_id: u32) {
        self.collision_idx = (tileset_id, local_id);
    }

    pub fn set_cover_idx(&mut self, tileset_id: u32, local_id: u32) {
        self.cover_idx = (tileset_id, local_id);
    }

    fn set_tile(&mut self, x: i32, y: i32, layer: usize, cell: TileCell) {
        if self.in_bounds(x, y, layer) {
            let idx = self.index(x, y, layer);
            self.tile_data[idx] = cell;
        }
    }

    /// Place a single resolved tile. Returns `false` if out of bounds.
    pub fn drop_tile(&mut self, x: i32, y: i32, layer: usize, tile: &TextureTile) -> bool {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return false;
        }
        self.set_tile(
            x,
            y,
            layer,
            TileCell {
                tileset_id: tile.tileset_id,
                local_id: tile.local_id,
                collision: tile.collision,
                cover: tile.cover,
            },
        );
        true
    }

    pub fn get_tile(&self, x: i32, y: i32, layer: usize) -> TileCell {
        if !self.in_bounds(x, y, layer) {
            return TileCell::default();
        }
        self.tile_data[self.index(x, y, layer)]
    }

    pub fn clear_tile(&mut self, x: i32, y: i32, layer: usize) {
        if self.in_bounds(x, y, layer) {
            let idx = self.index(x, y, layer);
            self.tile_data[idx] = TileCell::default();
        }
    }

    pub fn clear_layer(&mut self, layer: usize) {
        if layer >= self.layer_nums {
            return;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = self.index(x, y, layer);
                self.tile_data[idx] = TileCell::default();
            }
        }
        log::info!("cleared all tiles from layer {}", layer);
    }

    pub fn get_layer(&self, layer: usize) -> Vec<(i32, i32)> {
        assert!(layer < self.layer_nums, "layer out of bounds");
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.tile_data[self.index(x, y, layer)].local_id > 0 {
                    out.push((x, y));
                }
            }
        }
        out
    }

    pub fn get_neighbors(&self, x: i32, y: i32, layer: usize, radius: i32) -> Vec<(i32, i32)> {
        assert!(layer < self.layer_nums, "layer out of bounds");
        assert!(x >= 0 && x < self.width && y >= 0 && y < self.height, "coordinates out of bounds");
        let mut out = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < self.width && ny >= 0 && ny < self.height && self.check_exists(nx, ny, layer) {
                    out.push((nx, ny));
                }
            }
        }
        out
    }

    pub fn check_collision(&self, x: i32, y: i32, layer: usize) -> bool {
        self.get_tile(x, y, layer).collision
    }

    pub fn check_cover(&self, x: i32, y: i32, layer: usize) -> bool {
        self.get_tile(x, y, layer).cover
    }

    pub fn check_exists(&self, x: i32, y: i32, layer: usize) -> bool {
        !self.get_tile(x, y, layer).is_empty()
    }

    /// Scatter tiles (and at most one auto-tile variant sheet) from a tile
    /// group over `drop_area`. Auto-tile edge resolution runs as a second
    /// pass over the whole area so that neighbor lookups see every tile this
    /// call placed.
    pub fn drop_tiles_from_tilegroup(&mut self, tilegroup: &TileGroup, drop_area: &[(i32, i32)], target_layer: usize) {
        let mut tile_textures: Vec<&TextureTile> = Vec::new();
        let mut autotile_texture = None;
        for texture in &tilegroup.textures {
            match texture {
                Texture::Tile(t) => {
                    for _ in 0..t.rate {
                        tile_textures.push(t);
                    }
                }
                Texture::AutoTile(a) => autotile_texture = Some(a),
            }
        }

        if !tile_textures.is_empty() {
            for &(x, y) in drop_area {
                if let Some(tile) = self.rand.choice(&tile_textures) {
                    let tile: TextureTile = (**tile).clone();
                    self.drop_tile(x, y, target_layer, &tile);
                }
            }
        }

        if let Some(autotile_texture) = autotile_texture {
            use crate::autotile::{AutoTile, Scheme};
            let scheme = match autotile_texture.method.as_str() {
                "inner16" => Scheme::Inner16,
                "blob47" => Scheme::Blob47,
                _ => Scheme::Tile48,
            };
            let autotile = AutoTile::new(scheme);

            if tile_textures.is_empty() {
                if let Some(base_local_id) = autotile.base_tile_local_id() {
                    for &(x, y) in drop_area {
                        let tile = TextureTile {
                            name: format!("{}_{}", autotile_texture.name, base_local_id),
                            kind: "tile",
                            image_path: autotile_texture.image_path.clone(),
                            collision: autotile_texture.collision,
                            cover: autotile_texture.cover,
                            rate: 1,
                            tileset_id: autotile_texture.tileset_id,
                            local_id: base_local_id,
                        };
                        self.drop_tile(x, y, target_layer, &tile);
                    }
                }
            }

            // Edge variants are resolved after the block above so neighbor
            // lookups observe every tile this call is placing.
            for &(x, y) in drop_area {
                if let Some(local_id) = autotile.local_id(self, self.width, self.height, x, y, target_layer) {
                    let tile = TextureTile {
                        name: format!("{}_{}", autotile_texture.name, local_id),
                        kind: "tile",
                        image_path: autotile_texture.image_path.clone(),
                        collision: autotile_texture.collision,
                        cover: autotile_texture.cover,
                        rate: 1,
                        tileset_id: autotile_texture.tileset_id,
                        local_id,
                    };
                    self.drop_tile(x, y, target_layer, &tile);
                }
            }
        }
    }

    pub fn drop_objects_from_objectgroup(&mut self, objectgroup: &ObjectGroup, drop_area: &[(i32, i32)], target_layer: usize, add_to_items: bool) {
        let mut object_textures: Vec<&TextureObject> = Vec::new();
        for texture in &objectgroup.textures {
            for _ in 0..texture.rate {
                object_textures.push(texture);
            }
        }
        if object_textures.is_empty() {
            return;
        }
        for &(x, y) in drop_area {
            if let Some(texture) = self.rand.choice(&object_textures) {
                let texture: TextureObject = (**texture).clone();
                self.drop_object(x, y, target_layer, &texture, add_to_items);
            }
        }
    }

    /// Attempt to place every tile of an object's footprint; if any blueprint
    /// tile would land out of bounds, the whole placement is discarded and
    /// the map is left unchanged.
    pub fn drop_object(&mut self, x: i32, y: i32, layer: usize, object_texture: &TextureObject, add_to_items: bool) -> bool {
        let mut attempt = self.create_copy(0);
        for blueprint in &object_texture.blueprints {
            let abs_x = x + blueprint.relative_x;
            let abs_y = y + blueprint.relative_y;
            if !attempt.drop_tile(abs_x, abs_y, layer, &blueprint.texture) {
                return false;
            }
        }
        self.assign(&attempt);

        if add_to_items {
            log::debug!("add object to items: {}", object_texture.name);
            let obj = Object::new(
                object_texture.name.clone(),
                object_texture.kind.to_string(),
                x * config::TILE_SIZE as i32,
                y * config::TILE_SIZE as i32,
                object_texture.original_width,
                object_texture.original_height,
                object_texture.width * config::TILE_SIZE,
                object_texture.height * config::TILE_SIZE,
                &object_texture.functions,
                object_texture.rotation as f64,
                object_texture.visible,
                object_texture.image_url.clone(),
                object_texture.image_path.clone(),
            );
            self.add_object_to_items(obj);
        }
        true
    }

    /// Breadth-first flood fill from `(start_x, start_y)` over empty cells of
    /// `layer`; true if the fill reaches the map boundary.
    pub fn flood_fill_to_edge(&self, start_x: i32, start_y: i32, layer: usize) -> bool {
        assert!(layer < self.layer_nums, "layer out of bounds");
        assert!(start_x >= 0 && start_x < self.width && start_y >= 0 && start_y < self.height, "coordinates out of bounds");

        if self.get_tile(start_x, start_y, layer).tileset_id != 0 {
            return true;
        }

        let mut queue = VecDeque::new();
        queue.push_back((start_x, start_y));
        let mut visited = HashSet::new();
        visited.insert((start_x, start_y));

        const DIRECTIONS: [(i32, i32); 8] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];

        while let Some((x, y)) = queue.pop_front() {
            if x == 0 || x == self.width - 1 || y == 0 || y == self.height - 1 {
                return true;
            }
            for (dx, dy) in DIRECTIONS.iter() {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < self.width && ny >= 0 && ny < self.height && !visited.contains(&(nx, ny)) {
                    if self.get_tile(nx, ny, layer).tileset_id == 0 {
                        queue.push_back((nx, ny));
                        visited.insert((nx, ny));
                    }
                }
            }
        }
        false
    }

    pub fn add_object_to_items(&mut self, obj: Object) {
        self.itemlayer.add_object(obj);
    }

    /// Copy `source_layer` of `source` into `target_layer` of `self`, either
    /// over the whole overlapping extent or a given `(x, y, w, h)` region.
    pub fn merge_layer_from(&mut self, source: &MapCache, source_layer: usize, target_layer: usize, only_non_zero: bool, region: Option<(i32, i32, i32, i32)>) -> bool {
        if source_layer >= source.layer_nums {
            log::error!("source layer {} out of bounds", source_layer);
            return false;
        }
        if target_layer >= self.layer_nums {
            log::error!("target layer {} out of bounds", target_layer);
            return false;
        }

        let (start_x, start_y, end_x, end_y) = match region {
            Some((x, y, w, h)) => (x, y, (x + w).min(source.width).min(self.width), (y + h).min(source.height).min(self.height)),
            None => (0, 0, source.width.min(self.width), source.height.min(self.height)),
        };

        for y in start_y..end_y {
            for x in start_x..end_x {
                let tile = source.get_tile(x, y, source_layer);
                if only_non_zero && tile.is_empty() {
                    continue;
                }
                self.set_tile(x, y, target_layer, tile);
            }
        }
        true
    }
}

impl crate::autotile::NeighborOccupancy for MapCache {
    fn check_exists(&self, x: i32, y: i32, layer: usize) -> bool {
        MapCache::check_exists(self, x, y, layer)
    }
}

impl crate::geom::pathfind::Occupancy for MapCache {
    fn check_exists(&self, x: i32, y: i32, layer: usize) -> bool {
        MapCache::check_exists(self, x, y, layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(tileset_id: u32, local_id: u32) -> TextureTile {
        TextureTile::new("t", "t.png", tileset_id, local_id)
    }

    #[test]
    fn drop_tile_out_of_bounds_is_a_no_op() {
        let mut map = MapCache::new("m", 4, 4, 2);
        assert!(!map.drop_tile(10, 10, 0, &tile(1, 1)));
        assert!(!map.check_exists(10, 10, 0));
    }

    #[test]
    fn clone_and_assign_round_trip_state() {
        let mut map = MapCache::new("m", 4, 4, 2);
        map.drop_tile(1, 1, 0, &tile(1, 5));
        let clone = map.create_copy(3);
        assert_ne!(clone.random_seed, map.random_seed);
        assert!(clone.check_exists(1, 1, 0));

        let mut fresh = MapCache::new("m", 4, 4, 2);
        fresh.assign(&clone);
        assert!(fresh.check_exists(1, 1, 0));
        assert_eq!(fresh.random_seed, clone.random_seed);
    }

    #[test]
    fn flood_fill_reaches_edge_on_empty_map() {
        let map = MapCache::new("m", 5, 5, 1);
        assert!(map.flood_fill_to_edge(2, 2, 0));
    }

    #[test]
    fn flood_fill_is_blocked_by_a_surrounding_ring() {
        let mut map = MapCache::new("m", 5, 5, 1);
        for x in 0..5 {
            map.drop_tile(x, 0, 0, &tile(1, 1));
            map.drop_tile(x, 4, 0, &tile(1, 1));
        }
        for y in 0..5 {
            map.drop_tile(0, y, 0, &tile(1, 1));
            map.drop_tile(4, y, 0, &tile(1, 1));
        }
        assert!(!map.flood_fill_to_edge(2, 2, 0));
    }
}
