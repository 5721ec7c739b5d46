//! Resource registry: turns resource descriptors into resolved textures.
//! Images decode concurrently as stages preload, but tileset/local ids are
//! assigned in a deterministic sorted pass afterward (`finalize_dynamic_ids`,
//! `finalize_autotile_ids`) rather than in decode-completion order, so the
//! exported gids don't depend on scheduling. Grounded in
//! `tiled_master/framework/preloader.py::Preloader`.

use crate::asset::AssetProvider;
use crate::config;
use crate::error::{ResourceError, ResourceResult};
use crate::schema::{
    AutoTileDescriptor, Blueprint, ObjectDescriptor, ObjectGroup, ObjectGroupDescriptor, Texture,
    TextureAutoTile, TextureObject, TextureTile, TileDescriptor, TileGroup, TileGroupDescriptor,
    Tileset,
};
use futures::future::join_all;
use image::{imageops, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const TILE_WIDTH: u32 = config::TILE_SIZE;
const TILE_HEIGHT: u32 = config::TILE_SIZE;
const DYNAMIC_COLUMNS: u32 = 16;

/// One registered autotile sheet, keyed by the same `(image_path, method,
/// name)` triple `finalize_autotile_ids` sorts on; the sheet has no stable id
/// of its own until that sort runs.
struct AutotileRecord {
    image_path: String,
    method: String,
    name: String,
    image: RgbaImage,
    columns: u32,
    tilecount: u32,
    imagewidth: u32,
    imageheight: u32,
}

/// Dedups images by path as they're decoded. Numeric ids are *not* assigned
/// here: concurrent preload across stages means the order images finish
/// decoding in isn't the order stages registered them, so an id handed out
/// at decode time would vary between runs. `finalize_dynamic_ids` assigns
/// the real ids afterward, sorted by path.
struct DynamicIds {
    images: HashMap<String, RgbaImage>,
}

pub struct Preloader {
    map_id: String,
    provider: Arc<dyn AssetProvider>,
    dynamic_tileset_id: u32,
    dynamic: Mutex<DynamicIds>,
    autotiles: Mutex<Vec<AutotileRecord>>,
}

impl Preloader {
    pub fn new(map_id: impl Into<String>, provider: Arc<dyn AssetProvider>) -> Self {
        Preloader {
            map_id: map_id.into(),
            provider,
            dynamic_tileset_id: 1,
            dynamic: Mutex::new(DynamicIds { images: HashMap::new() }),
            autotiles: Mutex::new(Vec::new()),
        }
    }

    /// Registers a decoded image under `path`, keeping the first copy seen
    /// if the same path is registered twice. Does not assign an id.
    async fn register_dynamic_image(&self, path: &str, image: RgbaImage) {
        let mut dynamic = self.dynamic.lock().await;
        dynamic.images.entry(path.to_string()).or_insert(image);
    }

    /// Assigns every distinct registered image path a sequential local id,
    /// sorted by path so the assignment doesn't depend on decode completion
    /// order. Call once every stage has finished preloading.
    pub async fn finalize_dynamic_ids(&self) -> HashMap<String, u32> {
        let dynamic = self.dynamic.lock().await;
        let mut paths: Vec<&String> = dynamic.images.keys().collect();
        paths.sort();
        paths.into_iter().enumerate().map(|(i, path)| (path.clone(), i as u32 + 1)).collect()
    }

    /// Assigns every distinct registered `(image_path, method, name)` sheet
    /// a sequential tileset id, sorted the same deterministic way as
    /// `finalize_dynamic_ids`.
    pub async fn finalize_autotile_ids(&self) -> HashMap<(String, String, String), u32> {
        let autotiles = self.autotiles.lock().await;
        let mut keys: Vec<(String, String, String)> =
            autotiles.iter().map(|r| (r.image_path.clone(), r.method.clone(), r.name.clone())).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter().enumerate().map(|(i, key)| (key, self.dynamic_tileset_id + 1 + i as u32)).collect()
    }

    pub async fn load_tile_texture(&self, descriptor: &TileDescriptor) -> ResourceResult<TextureTile> {
        if descriptor.image.is_empty() {
            return Err(ResourceError::NotFound { path: descriptor.resource_id.clone() });
        }
        log::debug!("loading tile texture: {}", descriptor.image);
        let decoded = self.provider.load(&descriptor.image).await?;
        self.register_dynamic_image(&descriptor.image, decoded.pixels).await;
        Ok(TextureTile {
            name: descriptor.name.clone().unwrap_or_else(|| descriptor.resource_id.clone()),
            kind: "tile",
            image_path: descriptor.image.clone(),
            collision: descriptor.collision,
            cover: descriptor.cover,
            rate: descriptor.rate,
            tileset_id: self.dynamic_tileset_id,
            // Resolved by `ResourceRegistry::resolve_dynamic_ids` once every
            // stage has finished preloading.
            local_id: 0,
        })
    }

    pub async fn load_autotile(&self, descriptor: &AutoTileDescriptor) -> ResourceResult<TextureAutoTile> {
        if descriptor.image.is_empty() {
            return Err(ResourceError::NotFound { path: descriptor.resource_id.clone() });
        }
        log::debug!("loading autotile texture: {}", descriptor.image);
        let decoded = self.provider.load(&descriptor.image).await?;
        let name = descriptor.name.clone().unwrap_or_else(|| descriptor.resource_id.clone());

        let (columns, tilecount, imagewidth, imageheight) = match descriptor.method.as_str() {
            "tile48" => (8, 48, TILE_WIDTH * 8, TILE_HEIGHT * 6),
            "inner16" => (4, 16, TILE_WIDTH * 4, TILE_HEIGHT * 4),
            // The source table names 57 tiles for what is physically an
            // 11x5 = 55 slot sheet; we size the sheet to what actually fits.
            "blob47" => (11, 55, TILE_WIDTH * 11, TILE_HEIGHT * 5),
            other => {
                log::error!("invalid autotile method '{}', defaulting to tile48", other);
                (8, 48, TILE_WIDTH * 8, TILE_HEIGHT * 6)
            }
        };

        self.autotiles.lock().await.push(AutotileRecord {
            image_path: descriptor.image.clone(),
            method: descriptor.method.clone(),
            name: name.clone(),
            image: decoded.pixels,
            columns,
            tilecount,
            imagewidth,
            imageheight,
        });

        Ok(TextureAutoTile {
            name,
            kind: "autotile",
            method: descriptor.method.clone(),
            image_path: descriptor.image.clone(),
            collision: descriptor.collision,
            cover: descriptor.cover,
            rate: descriptor.rate,
            // Resolved by `ResourceRegistry::resolve_dynamic_ids` once every
            // stage has finished preloading.
            tileset_id: 0,
        })
    }

    pub async fn load_tile_group(&self, descriptor: &TileGroupDescriptor) -> ResourceResult<TileGroup> {
        if descriptor.tiles.is_empty() && descriptor.auto_tiles.is_empty() {
            log::warn!("tile group '{}' has no tiles or auto_tiles", descriptor.resource_id);
        }
        let (tiles, autotiles) = futures::join!(
            join_all(descriptor.tiles.iter().map(|t| self.load_tile_texture(t))),
            join_all(descriptor.auto_tiles.iter().map(|a| self.load_autotile(a))),
        );

        let mut textures: Vec<Texture> = tiles
            .into_iter()
            .collect::<ResourceResult<Vec<_>>>()?
            .into_iter()
            .map(Texture::Tile)
            .collect();
        textures.extend(
            autotiles
                .into_iter()
                .collect::<ResourceResult<Vec<_>>>()?
                .into_iter()
                .map(Texture::AutoTile),
        );

        Ok(TileGroup { kind: "tilegroup", textures, scale: descriptor.scale })
    }

    /// Cuts a large object image into `tile_width`x`tile_height` grid cells,
    /// registering each cell into the dynamic tileset and producing one
    /// blueprint per cell.
    async fn slice_into_blueprints(
        &self,
        name: &str,
        image: &RgbaImage,
        image_path: &str,
        grid_width: u32,
        grid_height: u32,
        descriptor: &ObjectDescriptor,
    ) -> Vec<Blueprint> {
        let mut blueprints = Vec::with_capacity((grid_width * grid_height) as usize);
        for y in 0..grid_height {
            for x in 0..grid_width {
                let left = x * TILE_WIDTH;
                let upper = y * TILE_HEIGHT;
                let cell = if left + TILE_WIDTH <= image.width() && upper + TILE_HEIGHT <= image.height() {
                    imageops::crop_imm(image, left, upper, TILE_WIDTH, TILE_HEIGHT).to_image()
                } else {
                    RgbaImage::new(TILE_WIDTH, TILE_HEIGHT)
                };
                let cell_path = format!("{}#{}_{}", image_path, x, y);
                self.register_dynamic_image(&cell_path, cell).await;
                let texture = TextureTile {
                    name: format!("{}_{}_{}", name, x, y),
                    kind: "tile",
                    image_path: cell_path,
                    collision: descriptor.collision,
                    cover: descriptor.cover,
                    rate: 1,
                    tileset_id: self.dynamic_tileset_id,
                    // Resolved by `ResourceRegistry::resolve_dynamic_ids` once
                    // every stage has finished preloading.
                    local_id: 0,
                };
                blueprints.push(Blueprint { texture, relative_x: x as i32, relative_y: y as i32 });
            }
        }
        blueprints
    }

    pub async fn load_object(&self, descriptor: &ObjectDescriptor) -> ResourceResult<TextureObject> {
        log::debug!("loading object texture: {:?}", descriptor.image);
        let name = descriptor.name.clone().unwrap_or_else(|| descriptor.resource_id.clone());

        let loaded = match &descriptor.image {
            Some(url) if !url.is_empty() => self.provider.load(url).await.ok(),
            _ => None,
        };

        let (grid_width, grid_height, original_width, original_height, resized) = match loaded {
            Some(decoded) => {
                let original_width = decoded.width();
                let original_height = decoded.height();
                let grid_width = descriptor.width;
                let target_width_px = grid_width * TILE_WIDTH;
                let scale_factor = target_width_px as f64 / original_width as f64;
                let target_height_px = ((original_height as f64 * scale_factor) as u32).max(TILE_HEIGHT);
                let grid_height = (target_height_px + TILE_HEIGHT - 1) / TILE_HEIGHT;
                let resized = imageops::resize(&decoded.pixels, target_width_px, grid_height * TILE_HEIGHT, imageops::FilterType::Lanczos3);
                (grid_width, grid_height, original_width, original_height, resized)
            }
            None => {
                if descriptor.image.as_deref().map_or(false, |s| !s.is_empty()) {
                    log::error!("failed to load object image for '{}', using placeholder", descriptor.resource_id);
                }
                let grid_width = descriptor.width;
                let grid_height = descriptor.height;
                let target_width_px = grid_width * TILE_WIDTH;
                let target_height_px = grid_height * TILE_HEIGHT;
                (grid_width, grid_height, target_width_px, target_height_px, placeholder_image(target_width_px, target_height_px))
            }
        };

        let image_path = descriptor.image.clone().unwrap_or_default();
        let blueprints = self
            .slice_into_blueprints(&name, &resized, &image_path, grid_width, grid_height, descriptor)
            .await;

        Ok(TextureObject {
            name,
            kind: "object",
            shape: "rectangle".to_string(),
            width: grid_width,
            height: grid_height,
            original_width,
            original_height,
            functions: descriptor.functions.clone(),
            image_path,
            image_url: String::new(),
            collision: descriptor.collision,
            cover: descriptor.cover,
            visible: true,
            rotation: 0,
            rate: 1,
            blueprints,
        })
    }

    pub async fn load_object_group(&self, descriptor: &ObjectGroupDescriptor) -> ResourceResult<ObjectGroup> {
        if descriptor.objects.is_empty() {
            log::warn!("object group '{}' has no objects", descriptor.resource_id);
        }
        let objects = join_all(descriptor.objects.iter().map(|o| self.load_object(o)))
            .await
            .into_iter()
            .collect::<ResourceResult<Vec<_>>>()?;
        Ok(ObjectGroup { kind: "objectgroup", textures: objects, scale: descriptor.scale })
    }

    async fn assemble_dynamic_tileset(&self) -> ResourceResult<(Tileset, RgbaImage)> {
        let dynamic = self.dynamic.lock().await;
        let mut paths: Vec<&String> = dynamic.images.keys().collect();
        paths.sort();
        let tile_count = paths.len() as u32;
        if tile_count == 0 {
            return Err(ResourceError::NotFound { path: "<no tiles registered>".to_string() });
        }
        let rows = (tile_count + DYNAMIC_COLUMNS - 1) / DYNAMIC_COLUMNS;
        let total_width = DYNAMIC_COLUMNS * TILE_WIDTH;
        let total_height = rows * TILE_HEIGHT;
        let mut combined = RgbaImage::new(total_width, total_height);

        for (i, path) in paths.into_iter().enumerate() {
            let local_id = i as u32 + 1;
            let x = ((local_id - 1) % DYNAMIC_COLUMNS) * TILE_WIDTH;
            let y = ((local_id - 1) / DYNAMIC_COLUMNS) * TILE_HEIGHT;
            match dynamic.images.get(path) {
                Some(tile_image) => imageops::replace(&mut combined, tile_image, x as i64, y as i64),
                None => log::error!("no pixel data recorded for dynamic tile '{}'", path),
            }
        }

        let tileset = Tileset {
            tileset_id: self.dynamic_tileset_id,
            name: "default_tileset".to_string(),
            columns: DYNAMIC_COLUMNS,
            firstgid: 1,
            image: format!("{}_dynamic_tileset.png", self.map_id),
            imagewidth: total_width,
            imageheight: total_height,
            spacing: 0,
            margin: 0,
            tilecount: tile_count,
            tilewidth: TILE_WIDTH,
            tileheight: TILE_HEIGHT,
        };
        Ok((tileset, combined))
    }

    /// Assembles every registered tileset (the shared dynamic sheet plus one
    /// sheet per autotile). Autotile sheets are assigned ids by
    /// `finalize_autotile_ids` and emitted in id order, so the result is the
    /// same regardless of the order stages' preload futures completed in.
    pub async fn process_tilesets(&self) -> ResourceResult<(Vec<Tileset>, Vec<RgbaImage>)> {
        let (dynamic_tileset, dynamic_image) = self.assemble_dynamic_tileset().await?;
        let mut gid_count = dynamic_tileset.tilecount;
        let mut tilesets = vec![dynamic_tileset];
        let mut images = vec![dynamic_image];

        let autotile_ids = self.finalize_autotile_ids().await;
        let guard = self.autotiles.lock().await;
        let mut resolved: Vec<(u32, &AutotileRecord)> = guard
            .iter()
            .map(|record| {
                let key = (record.image_path.clone(), record.method.clone(), record.name.clone());
                (autotile_ids[&key], record)
            })
            .collect();
        resolved.sort_by_key(|(tileset_id, _)| *tileset_id);

        for (tileset_id, autotile) in resolved {
            tilesets.push(Tileset {
                tileset_id,
                name: format!("autotile_{}", tileset_id),
                columns: autotile.columns,
                firstgid: 1 + gid_count,
                image: format!("{}_autotile_{}.png", self.map_id, tileset_id),
                imagewidth: autotile.imagewidth,
                imageheight: autotile.imageheight,
                spacing: 0,
                margin: 0,
                tilecount: autotile.tilecount,
                tilewidth: TILE_WIDTH,
                tileheight: TILE_HEIGHT,
            });
            gid_count += autotile.tilecount;
            images.push(autotile.image.clone());
        }

        Ok((tilesets, images))
    }
}

fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), image::Rgba([200, 200, 200, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DecodedImage;
    use async_trait::async_trait;

    struct SolidColorProvider;

    #[async_trait]
    impl AssetProvider for SolidColorProvider {
        async fn load(&self, _reference: &str) -> ResourceResult<DecodedImage> {
            Ok(DecodedImage { pixels: RgbaImage::from_pixel(16, 16, image::Rgba([10, 20, 30, 255])) })
        }
    }

    #[tokio::test]
    async fn repeated_tile_paths_share_a_local_id() {
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        let d = TileDescriptor::new("grass", "grass.png");
        preloader.load_tile_texture(&d).await.unwrap();
        preloader.load_tile_texture(&d).await.unwrap();
        let ids = preloader.finalize_dynamic_ids().await;
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["grass.png"], 1);
    }

    #[tokio::test]
    async fn distinct_tile_paths_get_distinct_ids() {
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        preloader.load_tile_texture(&TileDescriptor::new("grass", "grass.png")).await.unwrap();
        preloader.load_tile_texture(&TileDescriptor::new("sand", "sand.png")).await.unwrap();
        let ids = preloader.finalize_dynamic_ids().await;
        assert_ne!(ids["grass.png"], ids["sand.png"]);
    }

    #[tokio::test]
    async fn dynamic_ids_are_assigned_by_sorted_path_not_registration_order() {
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        // Registered "z" first, "a" second; sorted assignment must still put
        // "a" before "z" regardless of which decode finished first.
        preloader.load_tile_texture(&TileDescriptor::new("zzz", "zzz.png")).await.unwrap();
        preloader.load_tile_texture(&TileDescriptor::new("aaa", "aaa.png")).await.unwrap();
        let ids = preloader.finalize_dynamic_ids().await;
        assert_eq!(ids["aaa.png"], 1);
        assert_eq!(ids["zzz.png"], 2);
    }

    #[tokio::test]
    async fn autotile_tileset_ids_increment_from_the_dynamic_sheet() {
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        let mut walls = AutoTileDescriptor {
            resource_id: "walls".into(),
            image: "walls.png".into(),
            name: None,
            method: "tile48".into(),
            collision: false,
            cover: false,
            rate: 1,
        };
        let mut fences = walls.clone();
        fences.resource_id = "fences".into();
        fences.image = "fences.png".into();
        walls.name = Some("walls".into());
        fences.name = Some("fences".into());

        preloader.load_autotile(&walls).await.unwrap();
        preloader.load_autotile(&fences).await.unwrap();
        let ids = preloader.finalize_autotile_ids().await;
        // Sorted by (image_path, method, name): "fences.png" < "walls.png".
        assert_eq!(ids[&("fences.png".to_string(), "tile48".to_string(), "fences".to_string())], 2);
        assert_eq!(ids[&("walls.png".to_string(), "tile48".to_string(), "walls".to_string())], 3);
    }

    #[tokio::test]
    async fn empty_tile_descriptor_image_is_a_not_found_error() {
        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        let mut d = TileDescriptor::new("grass", "grass.png");
        d.image = String::new();
        assert!(preloader.load_tile_texture(&d).await.is_err());
    }
}
