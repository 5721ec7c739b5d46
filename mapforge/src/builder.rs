//! Orchestrates a full map generation run: collects stages, preloads their
//! resources concurrently, then builds each stage in registration order
//! against one shared `MapCache`. Grounded in
//! `tiled_master/framework/builder.py::MapBuilder`.

use crate::asset::AssetProvider;
use crate::element::MapElement;
use crate::error::{BuildResult, ResourceSnafu};
use crate::map_cache::MapCache;
use crate::resources::Preloader;
use crate::schema::Tileset;
use futures::future::try_join_all;
use image::RgbaImage;
use snafu::ResultExt;
use std::sync::Arc;

pub struct MapBuilder {
    map_id: String,
    width: i32,
    height: i32,
    layer_nums: usize,
    elements: Vec<Box<dyn MapElement>>,
    tilesets: Vec<Tileset>,
    tileset_images: Vec<RgbaImage>,
    map_cache: Option<MapCache>,
}

impl MapBuilder {
    pub fn new(map_id: impl Into<String>, width: i32, height: i32, layer_nums: usize) -> Self {
        MapBuilder {
            map_id: map_id.into(),
            width,
            height,
            layer_nums,
            elements: Vec::new(),
            tilesets: Vec::new(),
            tileset_images: Vec::new(),
            map_cache: None,
        }
    }

    /// Registers a stage. Stages build in the order they're added; that
    /// order is load-bearing (e.g. roads must exist before woods avoids
    /// planting trees on top of them).
    pub fn add_element(&mut self, element: Box<dyn MapElement>) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn map_cache(&self) -> Option<&MapCache> {
        self.map_cache.as_ref()
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub fn tileset_images(&self) -> &[RgbaImage] {
        &self.tileset_images
    }

    /// Resolves every stage's resource manifest concurrently; unlike `build`,
    /// preload order carries no dependency between stages, since no stage's
    /// `preload` reads another stage's loaded resources. Tileset/local ids
    /// aren't known until every stage has registered its images, so they're
    /// resolved in a second pass once the concurrent wave finishes, not
    /// during `preload` itself.
    async fn preload_resources(&mut self, provider: Arc<dyn AssetProvider>) -> crate::error::ResourceResult<()> {
        let preloader = Preloader::new(self.map_id.clone(), provider);

        for element in self.elements.iter() {
            log::info!("preloading element: {}", element.name());
        }
        try_join_all(self.elements.iter_mut().map(|element| element.preload(&preloader))).await?;

        for element in self.elements.iter_mut() {
            element.resolve_resources(&preloader).await;
        }

        let (tilesets, images) = preloader.process_tilesets().await?;
        self.tilesets = tilesets;
        self.tileset_images = images;
        Ok(())
    }

    /// Runs the full build: preload, then build every stage in order against
    /// a freshly created `MapCache`.
    pub async fn build(&mut self, provider: Arc<dyn AssetProvider>) -> BuildResult<()> {
        log::info!("building map '{}' ({}x{}) with {} elements", self.map_id, self.width, self.height, self.elements.len());

        self.preload_resources(provider).await.context(ResourceSnafu { map_id: self.map_id.clone() })?;

        let mut map_cache = MapCache::new(self.map_id.clone(), self.width, self.height, self.layer_nums);
        for element in self.elements.iter_mut() {
            log::info!("building element: {}", element.name());
            element.build(&mut map_cache).await?;
        }
        self.map_cache = Some(map_cache);

        log::info!("map '{}' built successfully", self.map_id);
        Ok(())
    }

    /// Serializes the built map to a Tiled 1.10 JSON document string.
    /// Returns `None` if `build` hasn't run yet.
    pub fn export_json(&self) -> Option<serde_json::Result<String>> {
        self.map_cache.as_ref().map(|cache| crate::serializer::to_json_string(cache, &self.tilesets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::elements::ground::GroundElement;
    use crate::error::ResourceResult;
    use crate::asset::DecodedImage;
    use async_trait::async_trait;
    use image::Rgba;

    struct SolidColorProvider;

    #[async_trait]
    impl AssetProvider for SolidColorProvider {
        async fn load(&self, _reference: &str) -> ResourceResult<DecodedImage> {
            Ok(DecodedImage { pixels: RgbaImage::from_pixel(16, 16, Rgba([5, 5, 5, 255])) })
        }
    }

    #[tokio::test]
    async fn build_then_export_produces_a_tiled_document() {
        let mut ground = GroundElement::new();
        let mut group = crate::schema::TileGroupDescriptor::new("ground_tiles");
        group.tiles.push(crate::schema::TileDescriptor::new("grass", "grass.png"));
        ground.resources_mut().add_tile_group("ground_tiles", group);

        let mut builder = MapBuilder::new("m1", 8, 8, config::DEFAULT_LAYER_NUMS as usize);
        builder.add_element(Box::new(ground));

        builder.build(Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>).await.unwrap();
        assert!(builder.map_cache().is_some());

        let json = builder.export_json().expect("map was built").expect("serialization succeeds");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["width"], 8);
        assert_eq!(parsed["height"], 8);
    }
}
