//! City-style town: a BSP road skeleton wired up with a KMST, houses
//! fronting the road edges. Grounded in
//! `implement/town_impl/element_town.py::Town`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::geom::bsp::{Bsp, Rect};
use crate::geom::kmst::kmst;
use crate::geom::pathfind::Pathfinder;
use crate::map_cache::MapCache;
use crate::prng::Prng;
use crate::schema::{ObjectGroup, ObjectGroupDescriptor, TextureObject, TileGroup, TileGroupDescriptor};
use async_trait::async_trait;
use std::collections::BTreeSet;

const SPEC_BUILDINGS: &str = "spec_buildings";
const DEFAULT_BUILDINGS: &str = "default_buildings";
const ROAD: &str = "road";
const BRIDGE: &str = "bridge";

#[derive(Debug, Clone, Copy)]
pub struct PlacedBuilding {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub connection_hook: (i32, i32),
}

pub struct TownElement {
    resources: ResourceRegistry,
    num_nodes: usize,
    extra_count: usize,
    nodes: Vec<PlacedBuilding>,
    road_tiles: Vec<(i32, i32)>,
}

impl TownElement {
    pub fn new(num_nodes: usize) -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_object_group(SPEC_BUILDINGS, ObjectGroupDescriptor::new(SPEC_BUILDINGS));
        resources.add_object_group(DEFAULT_BUILDINGS, ObjectGroupDescriptor::new(DEFAULT_BUILDINGS));
        resources.add_tile_group(ROAD, TileGroupDescriptor::new(ROAD));
        resources.add_tile_group(BRIDGE, TileGroupDescriptor::new(BRIDGE));
        TownElement { resources, num_nodes, extra_count: 2, nodes: Vec::new(), road_tiles: Vec::new() }
    }

    pub fn nodes(&self) -> &[PlacedBuilding] {
        &self.nodes
    }

    fn remove_corners_on_water(map_cache: &MapCache, corners: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
        corners
            .into_iter()
            .filter(|&(cx, cy)| {
                let probe_x = if cx < 0 {
                    0
                } else if cx >= map_cache.width {
                    map_cache.width - 1
                } else {
                    cx
                };
                let probe_y = if cy < 0 {
                    0
                } else if cy >= map_cache.height {
                    map_cache.height - 1
                } else {
                    cy
                };
                !map_cache.check_exists(probe_x, probe_y, config::WATER_LAYER)
            })
            .collect()
    }

    fn generate_road_map(
        map_cache: &mut MapCache,
        road_group: &TileGroup,
        bridge_group: &TileGroup,
        region: Rect,
        extra_count: usize,
        max_attempts: u32,
    ) -> Option<Vec<(i32, i32)>> {
        let road_scale = if road_group.scale == -1 { 2 } else { road_group.scale };
        let bsp_size = (12 - road_scale * 2).max(2);

        for attempt in 0..=max_attempts {
            let mut temp_map_cache = map_cache.create_copy(attempt as u64);
            log::info!("generate roadmap at scale {}", road_scale);
            let (_regions, raw_corners) = Bsp::run(bsp_size, region, &mut temp_map_cache.rand);
            let corners = Self::remove_corners_on_water(&temp_map_cache, raw_corners);

            if corners.len() < 2 {
                log::info!("failed to generate connections for nodes, refreshing the nodes position to retry, trytimes={}", attempt + 1);
                continue;
            }

            map_cache.assign(&temp_map_cache);
            let points: Vec<(f64, f64)> = corners.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
            let mut kmst_rand = Prng::from_seed(map_cache.random_seed);
            let edges = kmst(&points, extra_count, &mut kmst_rand);
            let road_tiles = Self::generate_roads(map_cache, &edges, road_group, bridge_group);
            return Some(road_tiles);
        }
        None
    }

    fn generate_roads(
        map_cache: &mut MapCache,
        edges: &[((f64, f64), (f64, f64))],
        road_group: &TileGroup,
        bridge_group: &TileGroup,
    ) -> Vec<(i32, i32)> {
        log::info!("generating roads");
        let width = map_cache.width;
        let height = map_cache.height;

        let mut corridor_positions: Vec<(i32, i32)> = Vec::new();
        for &(start, goal) in edges {
            let start = (start.0.round() as i32, start.1.round() as i32);
            let goal = (goal.0.round() as i32, goal.1.round() as i32);
            let pathfinder = Pathfinder::new(map_cache, width, height, 1);
            let mut corridor: Vec<(i32, i32)> = pathfinder.find_corridor_path(start, goal, &[config::STRUCTURE_LAYER]).into_iter().collect();
            corridor.sort();
            corridor_positions.extend(corridor);
        }
        let road_tiles = corridor_positions.clone();

        if !road_group.textures.is_empty() && !bridge_group.textures.is_empty() {
            let corridor_set: BTreeSet<(i32, i32)> = corridor_positions.iter().copied().collect();
            let bridge_set: BTreeSet<(i32, i32)> =
                corridor_positions.iter().copied().filter(|&(x, y)| map_cache.check_exists(x, y, config::WATER_LAYER)).collect();
            let road_area: Vec<(i32, i32)> = corridor_set.difference(&bridge_set).copied().collect();
            let bridge_area: Vec<(i32, i32)> = bridge_set.into_iter().collect();

            let mut final_map_cache = map_cache.create_copy(0);
            let mut road_temp_cache = map_cache.create_copy(0);
            road_temp_cache.drop_tiles_from_tilegroup(road_group, &road_area, config::ROAD_LAYER);
            final_map_cache.merge_layer_from(&road_temp_cache, config::ROAD_LAYER, config::ROAD_LAYER, true, None);

            let mut bridge_temp_cache = map_cache.create_copy(0);
            bridge_temp_cache.drop_tiles_from_tilegroup(bridge_group, &bridge_area, config::ROAD_LAYER);
            final_map_cache.merge_layer_from(&bridge_temp_cache, config::ROAD_LAYER, config::ROAD_LAYER, true, None);

            map_cache.assign(&final_map_cache);
        } else if !road_group.textures.is_empty() {
            map_cache.drop_tiles_from_tilegroup(road_group, &corridor_positions, config::ROAD_LAYER);
        } else {
            log::warn!("no road model registered, skipping road placement");
        }

        road_tiles
    }

    fn can_place_house(map_cache: &MapCache, x: i32, y: i32, width: u32, height: u32) -> bool {
        if x < 0 || y < 0 || x + width as i32 > map_cache.width || y + height as i32 > map_cache.height {
            return false;
        }
        for ty in y..y + height as i32 {
            for tx in x..x + width as i32 {
                if map_cache.check_exists(tx, ty, config::WATER_LAYER)
                    || map_cache.check_exists(tx, ty, config::ROAD_LAYER)
                    || map_cache.check_exists(tx, ty, config::HOUSE_LAYER)
                {
                    return false;
                }
            }
        }
        true
    }

    fn generate_house_along_edge(map_cache: &mut MapCache, obj_texture: &TextureObject, edge_x: i32, edge_y: i32) -> Option<PlacedBuilding> {
        let house_width = obj_texture.width;
        let house_height = obj_texture.height;
        let dis_offset = 1;
        let offsets: [(i32, i32, i32, i32); 4] = [
            (1, 0, 0 + dis_offset, -(house_height as i32) / 2),
            (0, 1, -(house_width as i32) / 2, 0 + dis_offset),
            (0, -1, -(house_width as i32) / 2, -(house_height as i32) + 1 - dis_offset),
            (-1, 0, -(house_width as i32) + 1 - dis_offset, -(house_height as i32) / 2),
        ];

        for (attempt, &(shift_x, shift_y, offset_x, offset_y)) in offsets.iter().enumerate() {
            let mut temp_map_cache = map_cache.create_copy(attempt as u64 + 1);
            let x = edge_x + offset_x;
            let y = edge_y + offset_y;
            let checkpoint_x = edge_x + shift_x;
            let checkpoint_y = edge_y + shift_y;

            if map_cache.check_exists(checkpoint_x, checkpoint_y, config::HOUSE_LAYER)
                || map_cache.check_exists(checkpoint_x, checkpoint_y, config::ROAD_LAYER)
            {
                continue;
            }
            if !Self::can_place_house(map_cache, x, y, house_width, house_height) {
                continue;
            }
            if temp_map_cache.drop_object(x, y, config::HOUSE_LAYER, obj_texture, true) {
                map_cache.assign(&temp_map_cache);
                return Some(PlacedBuilding {
                    x,
                    y,
                    width: house_width,
                    height: house_height,
                    connection_hook: (x + house_width as i32 / 2, y + house_height as i32 + 1),
                });
            }
        }
        None
    }

    fn generate_house_with_spec(
        map_cache: &mut MapCache,
        spec_textures: &[TextureObject],
        default_buildings: &ObjectGroup,
        edge_x: i32,
        edge_y: i32,
    ) -> Option<PlacedBuilding> {
        if let Some(spec_node) = spec_textures.first() {
            return Self::generate_house_along_edge(map_cache, spec_node, edge_x, edge_y);
        }
        if !default_buildings.textures.is_empty() {
            let default_node = map_cache.rand.choice(&default_buildings.textures)?.clone();
            return Self::generate_house_along_edge(map_cache, &default_node, edge_x, edge_y);
        }
        None
    }

    fn generate_houses_along_edge(
        &mut self,
        map_cache: &mut MapCache,
        spec_buildings: &ObjectGroup,
        default_buildings: &ObjectGroup,
        edge_tiles: &[(i32, i32)],
    ) {
        let mut spec_buildings_copy: Vec<TextureObject> = spec_buildings.textures.clone();
        let mut edge_list: Vec<(i32, i32)> = edge_tiles
            .iter()
            .copied()
            .filter(|&(x, y)| x >= 0 && x < map_cache.width && y > 0 && y <= map_cache.height)
            .collect();

        self.nodes.clear();
        let mut attempts: u64 = 0;
        while self.nodes.len() < self.num_nodes && !edge_list.is_empty() {
            attempts += 1;
            let mut temp_map_cache = map_cache.create_copy(attempts);
            let (edge_x, edge_y) = edge_list.remove(0);

            let new_node = Self::generate_house_with_spec(&mut temp_map_cache, &spec_buildings_copy, default_buildings, edge_x, edge_y);
            if let Some(node) = new_node {
                self.nodes.push(node);
                map_cache.assign(&temp_map_cache);
                if !spec_buildings_copy.is_empty() {
                    log::info!("popped {}, left {} nodes", spec_buildings_copy[0].name, spec_buildings_copy.len() - 1);
                    spec_buildings_copy.remove(0);
                }
            }
        }

        if self.nodes.len() < self.num_nodes {
            log::warn!("only placed {} nodes out of {} due to overlap constraints", self.nodes.len(), self.num_nodes);
        }
    }
}

#[async_trait]
impl MapElement for TownElement {
    fn name(&self) -> &str {
        "Town Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating town");

        let map_width = map_cache.width;
        let map_height = map_cache.height;
        let width_shift = map_width / 10 + map_cache.rand.gen_range(-5, 6) as i32;
        let height_shift = map_height / 10 + map_cache.rand.gen_range(-3, 4) as i32;
        let area_width = map_width * 9 / 10 + map_cache.rand.gen_range(-5, 6) as i32 - width_shift;
        let area_height = map_height * 9 / 10 + map_cache.rand.gen_range(-3, 4) as i32 - height_shift;

        log::info!("init city with scale: {:?}", (width_shift, height_shift, area_width, area_height));

        let road_group = self.resources.tile_group(ROAD).clone();
        let bridge_group = self.resources.tile_group(BRIDGE).clone();
        let spec_buildings = self.resources.object_group(SPEC_BUILDINGS).clone();
        let default_buildings = self.resources.object_group(DEFAULT_BUILDINGS).clone();

        if road_group.textures.is_empty() && bridge_group.textures.is_empty() {
            log::warn!("no road no town");
            return Ok(());
        }

        let region = Rect { x: width_shift, y: height_shift, w: area_width.max(1), h: area_height.max(1) };
        let road_tiles = Self::generate_road_map(map_cache, &road_group, &bridge_group, region, self.extra_count, 50);

        match road_tiles {
            Some(tiles) if !tiles.is_empty() => {
                self.road_tiles = tiles.clone();
                self.generate_houses_along_edge(map_cache, &spec_buildings, &default_buildings, &tiles);
                log::info!("generate town done");
            }
            _ => log::warn!("generate town failed: couldn't generate roadmap"),
        }

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

    #[tokio::test]
    async fn town_without_road_textures_is_a_no_op() {
        let mut element = TownElement::new(3);
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 60, 60, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();
        assert!(element.nodes().is_empty());
    }

    #[tokio::test]
    async fn town_with_road_textures_places_a_connected_road() {
        let mut element = TownElement::new(2);
        let mut road = crate::schema::TileGroupDescriptor::new(ROAD);
        road.tiles.push(crate::schema::TileDescriptor::new("road", "road.png"));
        element.resources_mut().add_tile_group(ROAD, road);

        let mut default_buildings = ObjectGroupDescriptor::new(DEFAULT_BUILDINGS);
        default_buildings.objects.push(crate::schema::ObjectDescriptor {
            resource_id: "house".into(),
            name: Some("house".into()),
            image: Some("house.png".into()),
            width: 2,
            height: 2,
            collision: true,
            cover: true,
            functions: Vec::new(),
        });
        element.resources_mut().add_object_group(DEFAULT_BUILDINGS, default_buildings);

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 60, 60, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();
        assert!(!map_cache.get_layer(config::ROAD_LAYER).is_empty());
    }
}
