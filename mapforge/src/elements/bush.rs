//! Scatters bush tiles, avoiding water and roads. Grounded in
//! `implement/town_impl/element_natural.py::Bush`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::map_cache::MapCache;
use crate::noise::NoiseMap;
use crate::schema::TileGroupDescriptor;
use async_trait::async_trait;

const BUSH_TILES: &str = "bush_tiles";

pub struct BushElement {
    resources: ResourceRegistry,
}

impl BushElement {
    pub fn new() -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(BUSH_TILES, TileGroupDescriptor::new(BUSH_TILES));
        BushElement { resources }
    }
}

impl Default for BushElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for BushElement {
    fn name(&self) -> &str {
        "Bush Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating bush");
        let bush_tile_group = self.resources.tile_group(BUSH_TILES).clone();

        let mut noise_map = NoiseMap::new(map_cache.width as usize, map_cache.height as usize, map_cache.random_seed);
        let bush_tiles = noise_map.generate_bushes();

        let drop_area: Vec<(i32, i32)> = bush_tiles
            .into_iter()
            .filter(|&(x, y)| {
                !map_cache.check_exists(x, y, config::WATER_LAYER) && !map_cache.check_exists(x, y, config::ROAD_LAYER)
            })
            .collect();

        map_cache.drop_tiles_from_tilegroup(&bush_tile_group, &drop_area, config::PLANTS_LAYER);
        log::info!("generate bush done");
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
    async fn bushes_never_land_on_water() {
        let mut element = BushElement::new();
        let mut group = crate::schema::TileGroupDescriptor::new(BUSH_TILES);
        group.tiles.push(crate::schema::TileDescriptor::new("bush", "bush.png"));
        element.resources_mut().add_tile_group(BUSH_TILES, group);

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 60, 60, config::DEFAULT_LAYER_NUMS as usize);
        let water = crate::schema::TextureTile::new("water", "water.png", 1, 5);
        for y in 0..60 {
            for x in 0..60 {
                map_cache.drop_tile(x, y, config::WATER_LAYER, &water);
            }
        }

        element.build(&mut map_cache).await.unwrap();
        for (x, y) in map_cache.get_layer(config::PLANTS_LAYER) {
            assert!(!map_cache.check_exists(x, y, config::WATER_LAYER));
        }
    }
}
