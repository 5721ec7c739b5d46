//! Common scaffolding shared by every map stage: resource descriptor
//! registration, concurrent preloading, and the `build` hook. Grounded in
//! `tiled_master/framework/element.py::MapElement`.

use crate::map_cache::MapCache;
use crate::resources::Preloader;
use crate::schema::{
    AutoTileDescriptor, ObjectDescriptor, ObjectGroup, ObjectGroupDescriptor, Texture,
    TextureAutoTile, TextureObject, TextureTile, TileDescriptor, TileGroup, TileGroupDescriptor,
};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{BTreeMap, HashMap};

/// One entry of a stage's resource manifest, before loading.
#[derive(Debug, Clone)]
pub enum ResourceDescriptor {
    Tile(TileDescriptor),
    AutoTile(AutoTileDescriptor),
    TileGroup(TileGroupDescriptor),
    Object(ObjectDescriptor),
    ObjectGroup(ObjectGroupDescriptor),
}

/// The resolved counterpart of a `ResourceDescriptor`, after `preload`.
#[derive(Debug, Clone)]
pub enum LoadedResource {
    Tile(TextureTile),
    AutoTile(TextureAutoTile),
    TileGroup(TileGroup),
    Object(TextureObject),
    ObjectGroup(ObjectGroup),
}

impl LoadedResource {
    pub fn as_tile(&self) -> Option<&TextureTile> {
        match self {
            LoadedResource::Tile(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tile_group(&self) -> Option<&TileGroup> {
        match self {
            LoadedResource::TileGroup(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&TextureObject> {
        match self {
            LoadedResource::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_group(&self) -> Option<&ObjectGroup> {
        match self {
            LoadedResource::ObjectGroup(g) => Some(g),
            _ => None,
        }
    }
}

/// Resource manifest plus loaded results for one `MapElement`. A `BTreeMap`
/// keeps iteration order stable across runs, which keeps `preload` trivially
/// deterministic to test even though the loads themselves run concurrently.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    descriptors: BTreeMap<String, ResourceDescriptor>,
    loaded: BTreeMap<String, LoadedResource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        ResourceRegistry::default()
    }

    fn insert(&mut self, resource_id: impl Into<String>, descriptor: ResourceDescriptor) {
        let resource_id = resource_id.into();
        if self.descriptors.contains_key(&resource_id) {
            log::warn!("resource id '{}' already exists and will be overridden", resource_id);
        }
        self.descriptors.insert(resource_id, descriptor);
    }

    pub fn add_tile(&mut self, resource_id: impl Into<String>, descriptor: TileDescriptor) {
        self.insert(resource_id, ResourceDescriptor::Tile(descriptor));
    }

    pub fn add_auto_tile(&mut self, resource_id: impl Into<String>, descriptor: AutoTileDescriptor) {
        self.insert(resource_id, ResourceDescriptor::AutoTile(descriptor));
    }

    pub fn add_tile_group(&mut self, resource_id: impl Into<String>, descriptor: TileGroupDescriptor) {
        self.insert(resource_id, ResourceDescriptor::TileGroup(descriptor));
    }

    pub fn add_object(&mut self, resource_id: impl Into<String>, descriptor: ObjectDescriptor) {
        self.insert(resource_id, ResourceDescriptor::Object(descriptor));
    }

    pub fn add_object_group(&mut self, resource_id: impl Into<String>, descriptor: ObjectGroupDescriptor) {
        self.insert(resource_id, ResourceDescriptor::ObjectGroup(descriptor));
    }

    pub fn get(&self, resource_id: &str) -> Option<&LoadedResource> {
        self.loaded.get(resource_id)
    }

    pub fn tile(&self, resource_id: &str) -> &TextureTile {
        self.get(resource_id)
            .and_then(LoadedResource::as_tile)
            .unwrap_or_else(|| panic!("resource '{}' was not loaded as a tile", resource_id))
    }

    pub fn tile_group(&self, resource_id: &str) -> &TileGroup {
        self.get(resource_id)
            .and_then(LoadedResource::as_tile_group)
            .unwrap_or_else(|| panic!("resource '{}' was not loaded as a tile group", resource_id))
    }

    pub fn object(&self, resource_id: &str) -> &TextureObject {
        self.get(resource_id)
            .and_then(LoadedResource::as_object)
            .unwrap_or_else(|| panic!("resource '{}' was not loaded as an object", resource_id))
    }

    pub fn object_group(&self, resource_id: &str) -> &ObjectGroup {
        self.get(resource_id)
            .and_then(LoadedResource::as_object_group)
            .unwrap_or_else(|| panic!("resource '{}' was not loaded as an object group", resource_id))
    }

    /// Resolves every registered descriptor concurrently against `preloader`
    /// and stores the results. Mirrors `MapElement.preload`'s `asyncio.gather`
    /// over all descriptors; the custom per-stage hook runs in the same wave
    /// via `MapElement::preload_impl`, called by the trait default method.
    async fn preload(&mut self, preloader: &Preloader) -> crate::error::ResourceResult<()> {
        let loads = try_join_all(self.descriptors.iter().map(|(resource_id, descriptor)| {
            let resource_id = resource_id.clone();
            async move {
                let loaded = match descriptor {
                    ResourceDescriptor::Tile(d) => LoadedResource::Tile(preloader.load_tile_texture(d).await?),
                    ResourceDescriptor::AutoTile(d) => LoadedResource::AutoTile(preloader.load_autotile(d).await?),
                    ResourceDescriptor::TileGroup(d) => LoadedResource::TileGroup(preloader.load_tile_group(d).await?),
                    ResourceDescriptor::Object(d) => LoadedResource::Object(preloader.load_object(d).await?),
                    ResourceDescriptor::ObjectGroup(d) => LoadedResource::ObjectGroup(preloader.load_object_group(d).await?),
                };
                Ok::<_, crate::error::ResourceError>((resource_id, loaded))
            }
        }))
        .await?;

        for (resource_id, loaded) in loads {
            self.loaded.insert(resource_id, loaded);
        }
        Ok(())
    }

    /// Patches every loaded resource's tileset/local id in place using
    /// `Preloader`'s finalized, sorted id tables. Must run after every
    /// stage has preloaded and before any stage's `build` reads these ids,
    /// since `preload` leaves them as placeholder `0`s.
    pub(crate) fn resolve_dynamic_ids(
        &mut self,
        tile_ids: &HashMap<String, u32>,
        autotile_ids: &HashMap<(String, String, String), u32>,
    ) {
        for loaded in self.loaded.values_mut() {
            Self::resolve_loaded(loaded, tile_ids, autotile_ids);
        }
    }

    fn resolve_loaded(
        loaded: &mut LoadedResource,
        tile_ids: &HashMap<String, u32>,
        autotile_ids: &HashMap<(String, String, String), u32>,
    ) {
        match loaded {
            LoadedResource::Tile(tile) => Self::resolve_tile(tile, tile_ids),
            LoadedResource::AutoTile(autotile) => Self::resolve_autotile(autotile, autotile_ids),
            LoadedResource::TileGroup(group) => {
                for texture in &mut group.textures {
                    match texture {
                        Texture::Tile(tile) => Self::resolve_tile(tile, tile_ids),
                        Texture::AutoTile(autotile) => Self::resolve_autotile(autotile, autotile_ids),
                    }
                }
            }
            LoadedResource::Object(object) => {
                for blueprint in &mut object.blueprints {
                    Self::resolve_tile(&mut blueprint.texture, tile_ids);
                }
            }
            LoadedResource::ObjectGroup(group) => {
                for object in &mut group.textures {
                    for blueprint in &mut object.blueprints {
                        Self::resolve_tile(&mut blueprint.texture, tile_ids);
                    }
                }
            }
        }
    }

    fn resolve_tile(tile: &mut TextureTile, tile_ids: &HashMap<String, u32>) {
        match tile_ids.get(&tile.image_path) {
            Some(&id) => tile.local_id = id,
            None => log::error!("no finalized id for tile image '{}'", tile.image_path),
        }
    }

    fn resolve_autotile(autotile: &mut TextureAutoTile, autotile_ids: &HashMap<(String, String, String), u32>) {
        let key = (autotile.image_path.clone(), autotile.method.clone(), autotile.name.clone());
        match autotile_ids.get(&key) {
            Some(&id) => autotile.tileset_id = id,
            None => log::error!("no finalized id for autotile '{}'", autotile.name),
        }
    }
}

/// One stage of map generation: registers the textures it needs, then
/// builds its contribution into a `MapCache` once those textures resolve.
#[async_trait]
pub trait MapElement: Send + Sync {
    fn name(&self) -> &str;

    fn resources(&self) -> &ResourceRegistry;
    fn resources_mut(&mut self) -> &mut ResourceRegistry;

    /// Optional hook for stage-specific preload work beyond the registered
    /// descriptors (e.g. precomputing a layout that `build` will consume).
    async fn preload_impl(&mut self, _preloader: &Preloader) -> crate::error::ResourceResult<()> {
        Ok(())
    }

    /// Resolves every registered resource descriptor, then runs
    /// `preload_impl`. The two don't need ordering relative to each other,
    /// since `preload_impl` only ever reads `preloader`, not `self.resources()`.
    async fn preload(&mut self, preloader: &Preloader) -> crate::error::ResourceResult<()> {
        self.resources_mut().preload(preloader).await?;
        self.preload_impl(preloader).await
    }

    /// Patches this element's resolved resources with `preloader`'s
    /// finalized tileset/local ids. `preloader` must have finished
    /// preloading every stage that shares it before this is called, since
    /// the ids are only deterministic once every image path has been seen.
    /// `MapBuilder::build` calls this once per element after the concurrent
    /// preload wave completes; a stage tested in isolation must call it
    /// itself between `preload` and `build`.
    async fn resolve_resources(&mut self, preloader: &Preloader) {
        let tile_ids = preloader.finalize_dynamic_ids().await;
        let autotile_ids = preloader.finalize_autotile_ids().await;
        self.resources_mut().resolve_dynamic_ids(&tile_ids, &autotile_ids);
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> crate::error::BuildResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetProvider, DecodedImage};
    use crate::error::ResourceResult;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    struct SolidColorProvider;

    #[async_trait]
    impl AssetProvider for SolidColorProvider {
        async fn load(&self, _reference: &str) -> ResourceResult<DecodedImage> {
            Ok(DecodedImage { pixels: RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255])) })
        }
    }

    #[tokio::test]
    async fn preload_resolves_every_registered_descriptor() {
        let mut registry = ResourceRegistry::new();
        registry.add_tile("grass", TileDescriptor::new("grass", "grass.png"));
        registry.add_tile("sand", TileDescriptor::new("sand", "sand.png"));

        let preloader = Preloader::new("m1", Arc::new(SolidColorProvider) as Arc<dyn AssetProvider>);
        registry.preload(&preloader).await.unwrap();

        assert_eq!(registry.tile("grass").image_path, "grass.png");
        assert_eq!(registry.tile("sand").image_path, "sand.png");
    }

    #[test]
    fn registering_the_same_resource_id_twice_overrides_the_first() {
        let mut registry = ResourceRegistry::new();
        registry.add_tile("grass", TileDescriptor::new("grass", "a.png"));
        registry.add_tile("grass", TileDescriptor::new("grass", "b.png"));
        match registry.descriptors.get("grass").unwrap() {
            ResourceDescriptor::Tile(d) => assert_eq!(d.image, "b.png"),
            _ => panic!("expected a tile descriptor"),
        }
    }
}
