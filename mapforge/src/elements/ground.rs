//! Covers the whole map in a base tile group. Grounded in
//! `implement/town_impl/element_natural.py::Ground`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::map_cache::MapCache;
use crate::schema::TileGroupDescriptor;
use async_trait::async_trait;

const GROUND_TILES: &str = "ground_tiles";

pub struct GroundElement {
    resources: ResourceRegistry,
}

impl GroundElement {
    pub fn new() -> Self {
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(GROUND_TILES, TileGroupDescriptor::new(GROUND_TILES));
        GroundElement { resources }
    }
}

impl Default for GroundElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for GroundElement {
    fn name(&self) -> &str {
        "Ground Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating ground");
        let ground_tile_group = self.resources.tile_group(GROUND_TILES).clone();

        let mut drop_area = Vec::with_capacity((map_cache.width * map_cache.height) as usize);
        for y in 0..map_cache.height {
            for x in 0..map_cache.width {
                drop_area.push((x, y));
            }
        }

        map_cache.drop_tiles_from_tilegroup(&ground_tile_group, &drop_area, config::GROUND_LAYER);
        log::info!("generate ground done");
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
    async fn ground_covers_every_cell() {
        let mut element = GroundElement::new();
        element.resources_mut().add_tile("ground_tiles", crate::schema::TileDescriptor::new("grass", "grass.png"));
        // re-register as part of a tile group instead of a lone tile, matching real usage
        let mut group = crate::schema::TileGroupDescriptor::new(GROUND_TILES);
        group.tiles.push(crate::schema::TileDescriptor::new("grass", "grass.png"));
        element.resources_mut().add_tile_group(GROUND_TILES, group);

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 4, 3, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for y in 0..3 {
            for x in 0..4 {
                assert!(map_cache.check_exists(x, y, config::GROUND_LAYER));
            }
        }
    }
}
