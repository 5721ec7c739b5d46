//! Scatters tree objects across noise-selected wooded area, retrying
//! placements that would overlap water, roads, houses, or another tree.
//! Grounded in `implement/town_impl/element_natural.py::Woods`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::map_cache::MapCache;
use crate::noise::NoiseMap;
use crate::schema::{ObjectGroupDescriptor, TextureObject};
use async_trait::async_trait;
use std::collections::BTreeSet;

const TREE_OBJECTS: &str = "tree_objects";

#[derive(Debug, Clone, Copy)]
pub struct PlacedTree {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub struct WoodsElement {
    resources: ResourceRegistry,
    trees: Vec<PlacedTree>,
}

impl WoodsElement {
    pub fn new() -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_object_group(TREE_OBJECTS, ObjectGroupDescriptor::new(TREE_OBJECTS));
        WoodsElement { resources, trees: Vec::new() }
    }

    pub fn trees(&self) -> &[PlacedTree] {
        &self.trees
    }

    fn can_place(map_cache: &MapCache, x: i32, y: i32, width: u32, height: u32) -> bool {
        for ty in y..y + height as i32 {
            for tx in x..x + width as i32 {
                if tx < 0
                    || ty < 0
                    || tx >= map_cache.width
                    || ty >= map_cache.height
                    || map_cache.check_exists(tx, ty, config::WATER_LAYER)
                    || map_cache.check_exists(tx, ty, config::ROAD_LAYER)
                    || map_cache.check_exists(tx, ty, config::HOUSE_LAYER)
                    || map_cache.check_exists(tx, ty, config::TREE_LAYER)
                {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for WoodsElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for WoodsElement {
    fn name(&self) -> &str {
        "Woods Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generate woods");
        let object_group = self.resources.object_group(TREE_OBJECTS).clone();

        let width = map_cache.width;
        let height = map_cache.height;
        let scale = object_group.scale.max(1) as u32;

        let max_attempts = ((height as u32 * width as u32 / 20 * scale).max(40)) as u64;
        let mut noise_map = NoiseMap::new(width as usize, height as usize, map_cache.random_seed);

        let waters: BTreeSet<(i32, i32)> = map_cache.get_layer(config::WATER_LAYER).into_iter().collect();
        let roads: BTreeSet<(i32, i32)> = map_cache.get_layer(config::ROAD_LAYER).into_iter().collect();
        let houses: BTreeSet<(i32, i32)> = map_cache.get_layer(config::HOUSE_LAYER).into_iter().collect();

        let mut woods_area: BTreeSet<(i32, i32)> = noise_map
            .generate_tree_area(scale)
            .into_iter()
            .filter(|p| !waters.contains(p) && !roads.contains(p) && !houses.contains(p))
            .collect();

        self.trees.clear();
        let textures: Vec<TextureObject> = object_group.textures;
        let weights: Vec<f32> = textures.iter().map(|t| t.rate as f32).collect();

        let mut attempt: u64 = 0;
        while attempt < max_attempts && !woods_area.is_empty() {
            let mut temp_map_cache = map_cache.create_copy(attempt);
            let candidates: Vec<(i32, i32)> = woods_area.iter().copied().collect();
            let &(cx, cy) = temp_map_cache.rand.choice(&candidates).expect("woods_area is non-empty");

            let obj_texture = temp_map_cache
                .rand
                .weighted_choice(&textures, &weights)
                .expect("object group has at least one texture")
                .clone();

            let tree_width = obj_texture.width;
            let tree_height = obj_texture.height;
            let x = cx - (tree_width / 2) as i32;
            let y = cy - (tree_height / 2) as i32;

            if Self::can_place(&temp_map_cache, x, y, tree_width, tree_height)
                && temp_map_cache.drop_object(x, y, config::TREE_LAYER, &obj_texture, true)
            {
                self.trees.push(PlacedTree { x, y, width: tree_width, height: tree_height });
                map_cache.assign(&temp_map_cache);

                for ty in cy - tree_width as i32..cy + tree_height as i32 {
                    for tx in cx - tree_width as i32..cx + tree_width as i32 {
                        woods_area.remove(&(tx, ty));
                    }
                }
            }

            attempt += 1;
        }

        log::info!("generate woods with {} trees", self.trees.len());
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
    async fn woods_places_trees_only_in_bounds() {
        let mut element = WoodsElement::new();
        let mut group = crate::schema::ObjectGroupDescriptor::new(TREE_OBJECTS);
        group.scale = 2;
        group.objects.push(crate::schema::ObjectDescriptor {
            resource_id: "oak".into(),
            name: Some("oak".into()),
            image: Some("oak.png".into()),
            width: 1,
            height: 1,
            collision: true,
            cover: true,
            functions: Vec::new(),
        });
        element.resources_mut().add_object_group(TREE_OBJECTS, group);

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 30, 30, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for tree in element.trees() {
            assert!(tree.x >= 0 && tree.y >= 0);
            assert!(tree.x + tree.width as i32 <= 30);
            assert!(tree.y + tree.height as i32 <= 30);
        }
    }
}
