//! Carves a river out of double-Perlin noise. Grounded in
//! `implement/town_impl/element_natural.py::River`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::map_cache::MapCache;
use crate::noise::NoiseMap;
use crate::schema::TileGroupDescriptor;
use async_trait::async_trait;

const RIVER_TILES: &str = "river_tiles";

pub struct RiverElement {
    resources: ResourceRegistry,
}

impl RiverElement {
    pub fn new() -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(RIVER_TILES, TileGroupDescriptor::new(RIVER_TILES));
        RiverElement { resources }
    }
}

impl Default for RiverElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for RiverElement {
    fn name(&self) -> &str {
        "River Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating river");
        let river_tile_group = self.resources.tile_group(RIVER_TILES).clone();

        let mut noise_map = NoiseMap::new(map_cache.width as usize, map_cache.height as usize, map_cache.random_seed);
        let river_tiles = noise_map.generate_natural_river(river_tile_group.scale.max(1) as u32);

        map_cache.drop_tiles_from_tilegroup(&river_tile_group, &river_tiles, config::WATER_LAYER);
        log::info!("generate river done");
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
    async fn river_build_does_not_panic_on_a_small_map() {
        let mut element = RiverElement::new();
        let mut group = crate::schema::TileGroupDescriptor::new(RIVER_TILES);
        group.scale = 4;
        group.tiles.push(crate::schema::TileDescriptor::new("water", "water.png"));
        element.resources_mut().add_tile_group(RIVER_TILES, group);

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 40, 40, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();
    }
}
