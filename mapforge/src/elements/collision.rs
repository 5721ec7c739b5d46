//! Derives a collision layer from the topmost occupied tile at every
//! position. Grounded in `tiled_master/elements/collision_element.py`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::{BuildError, BuildResult, ConfigError};
use crate::map_cache::MapCache;
use crate::schema::{Texture, TileDescriptor, TileGroupDescriptor};
use async_trait::async_trait;

const COLLISION_TILES: &str = "collision_tiles";
const COLLISION_TILE: &str = "collision_tile";

pub struct CollisionElement {
    resources: ResourceRegistry,
}

impl CollisionElement {
    pub fn new() -> Self {
        let mut group = TileGroupDescriptor::new(COLLISION_TILES);
        group.scale = 1;
        group.tiles.push(TileDescriptor {
            resource_id: COLLISION_TILE.to_string(),
            image: config::PLACEHOLDER_TILE_PATH.to_string(),
            name: Some(COLLISION_TILE.to_string()),
            collision: true,
            cover: false,
            rate: 1,
        });
        let mut resources = ResourceRegistry::new();
        resources.add_tile_group(COLLISION_TILES, group);
        CollisionElement { resources }
    }
}

impl Default for CollisionElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for CollisionElement {
    fn name(&self) -> &str {
        "Collision Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        log::info!("generating collision layer");

        if config::OBSTACLE_LAYER >= map_cache.layer_nums {
            return Err(BuildError::Config {
                map_id: map_cache.map_id.clone(),
                source: ConfigError::RegionOutOfBounds {
                    width: map_cache.width as u32,
                    height: map_cache.height as u32,
                },
            });
        }
        map_cache.clear_layer(config::OBSTACLE_LAYER);

        let collision_texture = match &self.resources.tile_group(COLLISION_TILES).textures[0] {
            Texture::Tile(tile) => tile.clone(),
            Texture::AutoTile(_) => unreachable!("collision tile group only ever registers a plain tile"),
        };
        map_cache.set_collision_idx(collision_texture.tileset_id, collision_texture.local_id);

        for y in 0..map_cache.height {
            for x in 0..map_cache.width {
                for layer in (0..map_cache.layer_nums).rev() {
                    if map_cache.check_exists(x, y, layer) {
                        if map_cache.check_collision(x, y, layer) {
                            map_cache.drop_tile(x, y, config::OBSTACLE_LAYER, &collision_texture);
                        }
                        break;
                    } else if layer == 0 {
                        map_cache.drop_tile(x, y, config::OBSTACLE_LAYER, &collision_texture);
                    }
                }
            }
        }

        log::info!("collision layer generation completed");
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
    async fn empty_map_is_entirely_collision() {
        let mut element = CollisionElement::new();
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 3, 3, config::DEFAULT_LAYER_NUMS as usize);
        element.build(&mut map_cache).await.unwrap();

        for y in 0..3 {
            for x in 0..3 {
                assert!(map_cache.check_exists(x, y, config::OBSTACLE_LAYER));
            }
        }
    }

    #[tokio::test]
    async fn a_collision_tile_on_a_lower_layer_propagates_up() {
        let mut element = CollisionElement::new();
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        element.preload(&preloader).await.unwrap();
        element.resolve_resources(&preloader).await;

        let mut map_cache = MapCache::new("m1", 1, 1, config::DEFAULT_LAYER_NUMS as usize);
        let wall = crate::schema::TextureTile::new("wall", "wall.png", 1, 2);
        let mut wall = wall;
        wall.collision = true;
        map_cache.drop_tile(0, 0, config::GROUND_LAYER, &wall);

        element.build(&mut map_cache).await.unwrap();
        assert!(map_cache.check_exists(0, 0, config::OBSTACLE_LAYER));
    }
}
