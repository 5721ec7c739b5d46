//! Village: houses scattered across a rectangular plot and wired together
//! by a KMST, rather than hung off a BSP road skeleton like
//! [`crate::elements::town`]. Grounded in
//! `implement/town_impl/element_village.py::Village`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
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

pub struct VillageElement {
    resources: ResourceRegistry,
    width: i32,
    height: i32,
    num_nodes: usize,
    nodes: Vec<PlacedBuilding>,
}

impl VillageElement {
    pub fn new(width: i32, height: i32, num_nodes: usize) -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_object_group(SPEC_BUILDINGS, ObjectGroupDescriptor::new(SPEC_BUILDINGS));
        resources.add_object_group(DEFAULT_BUILDINGS, ObjectGroupDescriptor::new(DEFAULT_BUILDINGS));
        resources.add_tile_group(ROAD, TileGroupDescriptor::new(ROAD));
        resources.add_tile_group(BRIDGE, TileGroupDescriptor::new(BRIDGE));
        VillageElement { resources, width, height, num_nodes, nodes: Vec::new() }
    }

    pub fn nodes(&self) -> &[PlacedBuilding] {
        &self.nodes
    }

    fn can_place_house(map_cache: &MapCache, x: i32, y: i32, width: u32, height: u32) -> bool {
        if x < 0 || y < 0 || x + width as i32 > map_cache.width || y + height as i32 > map_cache.height {
            return false;
        }
        for ty in y..y + height as i32 {
            for tx in x..x + width as i32 {
                if map_cache.check_exists(tx, ty, config::WATER_LAYER)
                    || map_cache.check_exists(tx, ty, config::TREE_LAYER)
                    || map_cache.check_exists(tx, ty, config::HOUSE_LAYER)
                {
                    return false;
                }
            }
        }
        true
    }

    fn generate_house(&self, map_cache: &mut MapCache, obj_texture: &TextureObject) -> Option<PlacedBuilding> {
        let house_width = obj_texture.width;
        let house_height = obj_texture.height;
        let width_shift = self.width / 10;
        let height_shift = self.height / 20;

        let x = map_cache.rand.gen_range_f32(width_shift as f32, (self.width - width_shift - house_width as i32) as f32) as i32;
        let y = map_cache.rand.gen_range_f32(height_shift as f32, (self.height - height_shift - house_height as i32) as f32) as i32;

        if !Self::can_place_house(map_cache, x, y, house_width, house_height) {
            return None;
        }

        if map_cache.drop_object(x, y, config::HOUSE_LAYER, obj_texture, true) {
            let placeholder = crate::schema::TextureTile::new("structure", config::PLACEHOLDER_TILE_PATH, 0, 1);
            for tx in x..x + house_width as i32 {
                for ty in y + 2..y + house_height as i32 {
                    map_cache.drop_tile(tx, ty, config::STRUCTURE_LAYER, &placeholder);
                }
            }
            return Some(PlacedBuilding {
                x,
                y,
                width: house_width,
                height: house_height,
                connection_hook: (x + house_width as i32 / 2, y + house_height as i32 + 1),
            });
        }
        None
    }

    fn generate_house_with_spec(
        &self,
        map_cache: &mut MapCache,
        spec_textures: &[TextureObject],
        default_buildings: &ObjectGroup,
    ) -> Option<PlacedBuilding> {
        if let Some(spec_node) = spec_textures.first() {
            return self.generate_house(map_cache, spec_node);
        }
        if !default_buildings.textures.is_empty() {
            let default_node = map_cache.rand.choice(&default_buildings.textures)?.clone();
            return self.generate_house(map_cache, &default_node);
        }
        None
    }

    fn generate_houses(&mut self, map_cache: &mut MapCache, spec_buildings: &ObjectGroup, default_buildings: &ObjectGroup) {
        let max_attempts = ((map_cache.width * map_cache.height / 40) as u32).max(20);
        self.nodes.clear();
        let mut spec_buildings_copy: Vec<TextureObject> = spec_buildings.textures.clone();
        let mut attempts: u64 = 0;

        while (self.nodes.len() as u64) < self.num_nodes as u64 && attempts < max_attempts as u64 {
            let mut temp_map_cache = map_cache.create_copy(attempts);
            attempts += 1;

            let new_node = self.generate_house_with_spec(&mut temp_map_cache, &spec_buildings_copy, default_buildings);
            if let Some(node) = new_node {
                self.nodes.push(node);
                map_cache.assign(&temp_map_cache);
                if !spec_buildings_copy.is_empty() {
                    log::debug!("popped {}, left {} nodes", spec_buildings_copy[0].name, spec_buildings_copy.len() - 1);
                    spec_buildings_copy.remove(0);
                }
            }
        }

        if self.nodes.len() < self.num_nodes {
            log::warn!("only placed {} nodes out of {} due to overlap constraints", self.nodes.len(), self.num_nodes);
        }
    }

    fn build_kmst_from_nodes(&self, map_cache: &MapCache) -> Vec<((f64, f64), (f64, f64))> {
        let points: Vec<(f64, f64)> = self.nodes.iter().map(|n| (n.connection_hook.0 as f64, n.connection_hook.1 as f64)).collect();
        if points.len() < 2 {
            return Vec::new();
        }
        let mut rand = Prng::from_seed(map_cache.random_seed);
        kmst(&points, 2, &mut rand)
    }

    fn generate_roads(map_cache: &mut MapCache, edges: &[((f64, f64), (f64, f64))], road_group: &TileGroup, bridge_group: &TileGroup, width: i32, height: i32) {
        log::info!("generating roads");

        let mut corridor_positions: Vec<(i32, i32)> = Vec::new();
        for &(start, goal) in edges {
            let start = (start.0.round() as i32, start.1.round() as i32);
            let goal = (goal.0.round() as i32, goal.1.round() as i32);
            let pathfinder = Pathfinder::new(map_cache, width, height, 1);
            let mut corridor: Vec<(i32, i32)> = pathfinder.find_corridor_path(start, goal, &[config::STRUCTURE_LAYER]).into_iter().collect();
            corridor.sort();
            corridor_positions.extend(corridor);
        }

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
    }
}

#[async_trait]
impl MapElement for VillageElement {
    fn name(&self) -> &str {
        "Village Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating town");

        let spec_buildings = self.resources.object_group(SPEC_BUILDINGS).clone();
        let default_buildings = self.resources.object_group(DEFAULT_BUILDINGS).clone();

        let max_attempts = 50;
        let mut edges = Vec::new();
        for attempt in 0..=max_attempts {
            let mut temp_map_cache = map_cache.create_copy(attempt);
            self.generate_houses(&mut temp_map_cache, &spec_buildings, &default_buildings);
            edges = self.build_kmst_from_nodes(&temp_map_cache);
            if self.nodes.len() == 1 || !edges.is_empty() {
                map_cache.assign(&temp_map_cache);
                break;
            }
            log::warn!("failed to generate connections for nodes, refreshing the nodes position to retry, trytimes={}", attempt + 1);
        }

        let road_group = self.resources.tile_group(ROAD).clone();
        let bridge_group = self.resources.tile_group(BRIDGE).clone();
        if !road_group.textures.is_empty() && !edges.is_empty() {
            Self::generate_roads(map_cache, &edges, &road_group, &bridge_group, self.width, self.height);
        }

        log::info!("generate town done");
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
    async fn village_places_houses_in_bounds() {
        let mut element = VillageElement::new(50, 50, 3);
        let mut default_buildings = ObjectGroupDescriptor::new(DEFAULT_BUILDINGS);
        default_buildings.objects.push(crate::schema::ObjectDescriptor {
            resource_id: "hut".into(),
            name: Some("hut".into()),
            image: Some("hut.png".into()),
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

        let mut map_cache = MapCache::new("m1", 50, 50, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for node in element.nodes() {
            assert!(node.x >= 0 && node.y >= 0);
            assert!(node.x + node.width as i32 <= 50);
            assert!(node.y + node.height as i32 <= 50);
        }
    }
}
