//! Derives a cover layer (things the player can stand behind/under) from the
//! topmost occupied tile at every position. Grounded in
//! `tiled_master/elements/cover_element.py`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::{BuildError, BuildResult, ConfigError};
use crate::map_cache::MapCache;
use crate::schema::{Texture, TileDescriptor, TileGroupDescriptor};
use async_trait::async_trait;

const COVER_TILES: &str = "cover_tiles";
const COVER_TILE: &str = "cover_tile";

pub struct CoverElement {
    resources: ResourceRegistry,
}

impl CoverElement {
    pub fn new() -> Self {
        let mut group = TileGroupDescriptor::new(COVER_TILES);
        group.scale = 1;
        group.tiles.push(TileDescriptor {
            resource_id: COVER_TILE.to_string(),
            image: config::PLACEHOLDER_TILE_PATH.to_string(),
            name: Some(COVER_TILE.to_string()),
            collision: false,
            cover: true,
            rate: 1,
        });
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(COVER_TILES, group);
        CoverElement { resources }
    }
}

impl Default for CoverElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for CoverElement {
    fn name(&self) -> &str {
        "Cover Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating cover layer");

        if config::COVER_LAYER >= map_cache.layer_nums {
            return Err(BuildError::Config {
                map_id: map_cache.map_id.clone(),
                source: ConfigError::RegionOutOfBounds {
                    width: map_cache.width as u32,
                    height: map_cache.height as u32,
                },
            });
        }
        map_cache.clear_layer(config::COVER_LAYER);

        let cover_texture = match &self.resources.tile_group(COVER_TILES).textures[0] {
            Texture::Tile(tile) => tile.clone(),
            Texture::AutoTile(_) => unreachable!("cover tile group only ever registers a plain tile"),
        };
        map_cache.set_cover_idx(cover_texture.tileset_id, cover_texture.local_id);

        for y in 0..map_cache.height {
            for x in 0..map_cache.width {
                for layer in (0..map_cache.layer_nums).rev() {
                    if map_cache.check_exists(x, y, layer) {
                        if map_cache.check_cover(x, y, layer) {
                            map_cache.drop_tile(x, y, config::COVER_LAYER, &cover_texture);
                        }
                        break;
                    }
                }
            }
        }

        log::info!("cover layer generation completed");
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
    async fn empty_map_has_no_cover() {
        let mut element = CoverElement::new();
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 2, 2, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for y in 0..2 {
            for x in 0..2 {
                assert!(!map_cache.check_exists(x, y, config::COVER_LAYER));
            }
        }
    }

    #[tokio::test]
    async fn a_cover_tile_propagates_to_the_cover_layer() {
        let mut element = CoverElement::new();
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 1, 1, config::DEFAULT_LAYER_NUMS as usize);
        let mut canopy = crate::schema::TextureTile::new("canopy", "canopy.png", 1, 3);
        canopy.cover = true;
        map_cache.drop_tile(0, 0, config::TREE_LAYER, &canopy);

        element.build(&mut map_cache).await.unwrap();
        assert!(map_cache.check_exists(0, 0, config::COVER_LAYER));
    }
}
