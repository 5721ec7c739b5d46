//! Interior room layout: recursively subdivided polygon rooms wired into a
//! tree, with a door cut between each parent/child pair and one more to the
//! outside from the southernmost room. Grounded in
//! `implement/room_impl/element_room.py::Room`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::geom::dwellings::{Dwellings, Room as DwellingRoom};
use crate::map_cache::MapCache;
use crate::prng::Prng;
use crate::schema::TileGroupDescriptor;
use async_trait::async_trait;

const FLOOR: &str = "floor";
const WALL_LV1: &str = "wall_lv1";
const WALL_LV2: &str = "wall_lv2";
const ROOF: &str = "roof";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

type Door = ((i64, i64), Side);

struct TreeNode {
    room_idx: usize,
    children: Vec<usize>,
    door_to_parent: Option<Door>,
    external_door: Option<Door>,
}

fn sorted_cells(room: &DwellingRoom) -> Vec<(i64, i64)> {
    let mut cells: Vec<(i64, i64)> = room.cells.iter().copied().collect();
    cells.sort();
    cells
}

/// Finds a shared-wall cell between two adjacent rooms. Cells are visited in
/// sorted order so that the result is independent of hash-set iteration.
fn find_door_between(room1: &DwellingRoom, room2: &DwellingRoom) -> Option<Door> {
    for (c, r) in sorted_cells(room1) {
        if room2.cells.contains(&(c, r - 1)) {
            return Some(((c, r), Side::Top));
        }
        if room2.cells.contains(&(c, r + 1)) {
            return Some(((c, r), Side::Bottom));
        }
        if room2.cells.contains(&(c - 1, r)) {
            return Some(((c, r), Side::Left));
        }
        if room2.cells.contains(&(c + 1, r)) {
            return Some(((c, r), Side::Right));
        }
    }
    for (c, r) in sorted_cells(room2) {
        if room1.cells.contains(&(c, r - 1)) {
            return Some(((c, r), Side::Bottom));
        }
        if room1.cells.contains(&(c, r + 1)) {
            return Some(((c, r), Side::Top));
        }
        if room1.cells.contains(&(c - 1, r)) {
            return Some(((c, r), Side::Right));
        }
        if room1.cells.contains(&(c + 1, r)) {
            return Some(((c, r), Side::Left));
        }
    }
    log::warn!("can't find door between two rooms expected to be adjacent");
    None
}

/// Cell on the southern border of `room`; ties break on the smallest column
/// so the choice is deterministic for a given seed.
fn find_southern_external_door(room: &DwellingRoom) -> Door {
    let max_r = room.cells.iter().map(|c| c.1).max().expect("room has at least one cell");
    let mut candidates: Vec<(i64, i64)> = room.cells.iter().copied().filter(|c| c.1 == max_r).collect();
    candidates.sort();
    (candidates[0], Side::Bottom)
}

fn build_room_tree(rooms: &[DwellingRoom], connections: &[(usize, usize)]) -> Vec<TreeNode> {
    let n = rooms.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(a, b) in connections {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }

    let mut nodes: Vec<TreeNode> =
        (0..n).map(|i| TreeNode { room_idx: i, children: Vec::new(), door_to_parent: None, external_door: None }).collect();

    let root = 0;
    let mut visited = vec![false; n];
    visited[root] = true;
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        for &neighbor in &adjacency[current] {
            if visited[neighbor] {
                continue;
            }
            visited[neighbor] = true;
            nodes[neighbor].door_to_parent = find_door_between(&rooms[current], &rooms[neighbor]);
            nodes[current].children.push(neighbor);
            stack.push(neighbor);
        }
    }
    nodes
}

fn assign_southern_external_door(nodes: &mut [TreeNode], rooms: &[DwellingRoom]) {
    let mut southern: Option<usize> = None;
    let mut southern_r = i64::MIN;
    for (i, node) in nodes.iter().enumerate() {
        let max_r = rooms[node.room_idx].cells.iter().map(|c| c.1).max().unwrap_or(i64::MIN);
        if max_r > southern_r {
            southern_r = max_r;
            southern = Some(i);
        }
    }
    if let Some(i) = southern {
        nodes[i].external_door = Some(find_southern_external_door(&rooms[nodes[i].room_idx]));
    }
}

pub struct RoomElement {
    resources: ResourceRegistry,
    grid_width: i64,
    grid_height: i64,
    cell_width: i64,
    cell_height: i64,
    line_width: i64,
    total_width: i64,
    total_height: i64,
}

impl RoomElement {
    pub fn new(grid_width: i64, grid_height: i64, cell_width: i64, cell_height: i64, line_width: i64) -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(FLOOR, TileGroupDescriptor::new(FLOOR));
        resources.add_tile_group(WALL_LV1, TileGroupDescriptor::new(WALL_LV1));
        resources.add_tile_group(WALL_LV2, TileGroupDescriptor::new(WALL_LV2));
        resources.add_tile_group(ROOF, TileGroupDescriptor::new(ROOF));

        let total_width = grid_width * (cell_width + line_width) + line_width;
        let total_height = grid_height * (cell_height + line_width) + line_width;
        RoomElement { resources, grid_width, grid_height, cell_width, cell_height, line_width, total_width, total_height }
    }

    pub fn default_layout() -> Self {
        Self::new(12, 6, 4, 5, 1)
    }

    pub fn total_size(&self) -> (i32, i32) {
        (self.total_width as i32, self.total_height as i32)
    }

    fn set_rect(tiled: &mut [u8], total_width: i64, x0: i64, y0: i64, w: i64, h: i64, value: u8) {
        for r in y0..y0 + h {
            for c in x0..x0 + w {
                if r >= 0 && c >= 0 {
                    let idx = (r * total_width + c) as usize;
                    if idx < tiled.len() {
                        tiled[idx] = value;
                    }
                }
            }
        }
    }

    fn region_contains(tiled: &[u8], total_width: i64, x0: i64, y0: i64, w: i64, h: i64, value: u8) -> bool {
        for r in y0..y0 + h {
            for c in x0..x0 + w {
                if r >= 0 && c >= 0 {
                    let idx = (r * total_width + c) as usize;
                    if idx < tiled.len() && tiled[idx] == value {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Rasterizes the room tree into a `(floor, wall, door)` tile grid and
    /// returns floor and wall point lists (door cells are merged into floor).
    fn to_tiled(&self, rooms: &[DwellingRoom], connections: &[(usize, usize)]) -> (Vec<(i32, i32)>, Vec<(i32, i32)>) {
        let mut tree = build_room_tree(rooms, connections);
        assign_southern_external_door(&mut tree, rooms);

        let tw = self.total_width;
        let lw = self.line_width;
        let cw = self.cell_width;
        let ch = self.cell_height;
        let mut tiled = vec![0u8; (self.total_width * self.total_height) as usize];

        for room in rooms {
            for &(c, r) in &room.cells {
                let x0 = lw + c * (cw + lw);
                let y0 = lw + r * (ch + lw);
                Self::set_rect(&mut tiled, tw, x0, y0, cw, ch, 1);
            }
        }

        for room in rooms {
            for &(c, r) in &room.cells {
                let x0 = lw + c * (cw + lw);
                let y0 = lw + r * (ch + lw);

                let top_val = if room.cells.contains(&(c, r - 1)) { 1 } else { 2 };
                Self::set_rect(&mut tiled, tw, x0, y0 - lw, cw, lw, top_val);

                let bottom_val = if room.cells.contains(&(c, r + 1)) { 1 } else { 2 };
                Self::set_rect(&mut tiled, tw, x0, y0 + ch, cw, lw, bottom_val);

                let left_val = if room.cells.contains(&(c - 1, r)) { 1 } else { 2 };
                Self::set_rect(&mut tiled, tw, x0 - lw, y0, lw, ch, left_val);

                let right_val = if room.cells.contains(&(c + 1, r)) { 1 } else { 2 };
                Self::set_rect(&mut tiled, tw, x0 + cw, y0, lw, ch, right_val);
            }
        }

        for room in rooms {
            for &(c, r) in &room.cells {
                let x0 = lw + c * (cw + lw);
                let y0 = lw + r * (ch + lw);

                let top_is_wall = Self::region_contains(&tiled, tw, x0, y0 - lw, cw, lw, 2);
                let left_is_wall = Self::region_contains(&tiled, tw, x0 - lw, y0, lw, ch, 2);
                let right_is_wall = Self::region_contains(&tiled, tw, x0 + cw, y0, lw, ch, 2);
                let bottom_is_wall = Self::region_contains(&tiled, tw, x0, y0 + ch, cw, lw, 2);

                let top_left = if top_is_wall || left_is_wall { 2 } else { 1 };
                Self::set_rect(&mut tiled, tw, x0 - lw, y0 - lw, lw, lw, top_left);

                let top_right = if top_is_wall || right_is_wall { 2 } else { 1 };
                Self::set_rect(&mut tiled, tw, x0 + cw, y0 - lw, lw, lw, top_right);

                let bottom_left = if bottom_is_wall || left_is_wall { 2 } else { 1 };
                Self::set_rect(&mut tiled, tw, x0 - lw, y0 + ch, lw, lw, bottom_left);

                let bottom_right = if bottom_is_wall || right_is_wall { 2 } else { 1 };
                Self::set_rect(&mut tiled, tw, x0 + cw, y0 + ch, lw, lw, bottom_right);
            }
        }

        for node in &tree {
            for door in [node.door_to_parent, node.external_door].into_iter().flatten() {
                let ((c, r), side) = door;
                let x0 = lw + c * (cw + lw);
                let y0 = lw + r * (ch + lw);

                let (door_x, door_y, door_w, door_h) = match side {
                    Side::Top => {
                        let door_width = 2;
                        ((x0 as f64) + (cw - door_width) as f64 / 2.0, (y0 - lw) as f64, door_width as f64, lw as f64)
                    }
                    Side::Bottom => {
                        let door_width = 2;
                        ((x0 as f64) + (cw - door_width) as f64 / 2.0, (y0 + ch) as f64, door_width as f64, lw as f64)
                    }
                    Side::Left => {
                        let door_height = 4;
                        ((x0 - lw) as f64, (y0 as f64) + (ch - door_height) as f64 / 2.0, lw as f64, door_height as f64)
                    }
                    Side::Right => {
                        let door_height = 4;
                        ((x0 + cw) as f64, (y0 as f64) + (ch - door_height) as f64 / 2.0, lw as f64, door_height as f64)
                    }
                };

                let x_start = door_x.round() as i64;
                let y_start = door_y.round() as i64;
                let x_end = (door_x + door_w).round() as i64;
                let y_end = (door_y + door_h).round() as i64;
                Self::set_rect(&mut tiled, tw, x_start, y_start, x_end - x_start, y_end - y_start, 4);
            }
        }

        let mut floor_points = Vec::new();
        let mut wall_points = Vec::new();
        for r in 0..self.total_height {
            for c in 0..tw {
                match tiled[(r * tw + c) as usize] {
                    1 | 4 => floor_points.push((c as i32, r as i32)),
                    2 => wall_points.push((c as i32, r as i32)),
                    _ => {}
                }
            }
        }
        (floor_points, wall_points)
    }
}

impl Default for RoomElement {
    fn default() -> Self {
        Self::default_layout()
    }
}

#[async_trait]
impl MapElement for RoomElement {
    fn name(&self) -> &str {
        "Room Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating room layout");

        let rand = Prng::from_seed(map_cache.random_seed);
        let mut dwellings = Dwellings::new(self.grid_width as usize, self.grid_height as usize, rand, 6);
        let (rooms, connections) = dwellings.divide_room(8, 0.6, 0.3, 100);
        let (floor_points, wall_points) = self.to_tiled(&rooms, &connections);

        let floor_group = self.resources.tile_group(FLOOR).clone();
        let wall_lv1_group = self.resources.tile_group(WALL_LV1).clone();
        let wall_lv2_group = self.resources.tile_group(WALL_LV2).clone();
        let roof_group = self.resources.tile_group(ROOF).clone();

        map_cache.drop_tiles_from_tilegroup(&floor_group, &floor_points, config::GROUND_LAYER);

        for &(x, y) in &wall_points {
            if map_cache.check_exists(x, y + 1, config::GROUND_LAYER) {
                map_cache.drop_tiles_from_tilegroup(&wall_lv1_group, &[(x, y + 1)], config::WALL_LAYER);
            }
            if map_cache.check_exists(x, y + 2, config::GROUND_LAYER) {
                map_cache.drop_tiles_from_tilegroup(&wall_lv2_group, &[(x, y + 2)], config::WALL_LAYER);
            }
        }

        let mut all_coords = Vec::new();
        for y in 0..self.total_height as i32 {
            for x in 0..self.total_width as i32 {
                if !map_cache.check_exists(x, y, config::GROUND_LAYER) && !map_cache.check_exists(x, y, config::WALL_LAYER) {
                    all_coords.push((x, y));
                }
            }
        }
        map_cache.drop_tiles_from_tilegroup(&roof_group, &all_coords, config::VOID_LAYER);

        log::info!("generate room layout done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetProvider, DecodedImage};
    use crate::error::ResourceResult;
    use crate::resources::Preloader;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    struct SolidColorProvider;

    #[async_trait]
    impl AssetProvider for SolidColorProvider {
        async fn load(&self, _reference: &str) -> ResourceResult<DecodedImage> {
            Ok(DecodedImage { pixels: RgbaImage::from_pixel(16, 16, Rgba([1, 1, 1, 255])) })
        }
    }

    fn with_tile(resources: &mut ResourceRegistry, key: &str, resource_id: &str) {
        let mut group = crate::schema::TileGroupDescriptor::new(key);
        group.tiles.push(crate::schema::TileDescriptor::new(resource_id, format!("{resource_id}.png")));
        resources.add_tile_group(key, group);
    }

    #[tokio::test]
    async fn every_cell_ends_up_floor_wall_or_roof() {
        let mut element = RoomElement::new(8, 6, 4, 5, 1);
        with_tile(element.resources_mut(), FLOOR, "floor");
        with_tile(element.resources_mut(), WALL_LV1, "wall1");
        with_tile(element.resources_mut(), WALL_LV2, "wall2");
        with_tile(element.resources_mut(), ROOF, "roof");

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let (tw, th) = element.total_size();
        let mut map_cache = MapCache::new("m1", tw, th, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for y in 0..th {
            for x in 0..tw {
                let has_floor = map_cache.check_exists(x, y, config::GROUND_LAYER);
                let has_wall = map_cache.check_exists(x, y, config::WALL_LAYER);
                let has_roof = map_cache.check_exists(x, y, config::VOID_LAYER);
                assert!(has_floor || has_wall || has_roof, "cell ({x},{y}) has no covering tile");
            }
        }
    }

    #[test]
    fn door_tie_break_picks_the_smallest_column() {
        let mut cells = std::collections::HashSet::new();
        cells.insert((3, 5));
        cells.insert((1, 5));
        cells.insert((2, 5));
        cells.insert((2, 4));
        let room = DwellingRoom::new(cells);
        let (cell, side) = find_southern_external_door(&room);
        assert_eq!(cell, (1, 5));
        assert_eq!(side, Side::Bottom);
    }
}
