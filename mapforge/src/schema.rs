//! Resource descriptors and resolved texture records. Grounded in
//! `tiled_master/framework/schema.py`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub resource_id: String,
    pub image: String,
    pub name: Option<String>,
    #[serde(default)]
    pub collision: bool,
    #[serde(default)]
    pub cover: bool,
    #[serde(default = "default_rate")]
    pub rate: u32,
}

fn default_rate() -> u32 {
    1
}

impl TileDescriptor {
    pub fn new(resource_id: impl Into<String>, image: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        TileDescriptor {
            name: Some(resource_id.clone()),
            resource_id,
            image: image.into(),
            collision: false,
            cover: false,
            rate: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTileDescriptor {
    pub resource_id: String,
    pub image: String,
    pub name: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub collision: bool,
    #[serde(default)]
    pub cover: bool,
    #[serde(default = "default_rate")]
    pub rate: u32,
}

fn default_method() -> String {
    "tile48".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileGroupDescriptor {
    pub resource_id: String,
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default)]
    pub tiles: Vec<TileDescriptor>,
    #[serde(default)]
    pub auto_tiles: Vec<AutoTileDescriptor>,
}

fn default_scale() -> i32 {
    -1
}

impl TileGroupDescriptor {
    pub fn new(resource_id: impl Into<String>) -> Self {
        TileGroupDescriptor {
            resource_id: resource_id.into(),
            scale: -1,
            tiles: Vec::new(),
            auto_tiles: Vec::new(),
        }
    }

    pub fn add_tile(mut self, resource_id: impl Into<String>, image: impl Into<String>) -> Self {
        self.tiles.push(TileDescriptor::new(resource_id, image));
        self
    }

    pub fn add_auto_tile(mut self, resource_id: impl Into<String>, image: impl Into<String>, method: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        self.auto_tiles.push(AutoTileDescriptor {
            name: Some(resource_id.clone()),
            resource_id,
            image: image.into(),
            method: method.into(),
            collision: false,
            cover: false,
            rate: 1,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub resource_id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(default = "default_dim")]
    pub width: u32,
    #[serde(default = "default_dim")]
    pub height: u32,
    #[serde(default)]
    pub collision: bool,
    #[serde(default)]
    pub cover: bool,
    #[serde(default)]
    pub functions: Vec<String>,
}

fn default_dim() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectGroupDescriptor {
    pub resource_id: String,
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default)]
    pub objects: Vec<ObjectDescriptor>,
}

impl ObjectGroupDescriptor {
    pub fn new(resource_id: impl Into<String>) -> Self {
        ObjectGroupDescriptor {
            resource_id: resource_id.into(),
            scale: -1,
            objects: Vec::new(),
        }
    }

    pub fn add_object(mut self, resource_id: impl Into<String>, image: Option<String>, width: u32, height: u32) -> Self {
        let resource_id = resource_id.into();
        self.objects.push(ObjectDescriptor {
            name: Some(resource_id.clone()),
            resource_id,
            image,
            width,
            height,
            collision: false,
            cover: false,
            functions: Vec::new(),
        });
        self
    }
}

/// A resolved tile that lives in the shared dynamic tileset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureTile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub image_path: String,
    pub collision: bool,
    pub cover: bool,
    pub rate: u32,
    pub tileset_id: u32,
    pub local_id: u32,
}

impl TextureTile {
    pub fn new(name: impl Into<String>, image_path: impl Into<String>, tileset_id: u32, local_id: u32) -> Self {
        TextureTile {
            name: name.into(),
            kind: "tile",
            image_path: image_path.into(),
            collision: false,
            cover: false,
            rate: 1,
            tileset_id,
            local_id,
        }
    }
}

/// A resolved auto-tile, backed by its own dedicated tileset sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureAutoTile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub method: String,
    pub image_path: String,
    pub collision: bool,
    pub cover: bool,
    pub rate: u32,
    pub tileset_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Texture {
    Tile(TextureTile),
    AutoTile(TextureAutoTile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGroup {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub textures: Vec<Texture>,
    pub scale: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub texture: TextureTile,
    pub relative_x: i32,
    pub relative_y: i32,
}

impl Blueprint {
    pub fn relative_coordinates(&self) -> (i32, i32) {
        (self.relative_x, self.relative_y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureObject {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub shape: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub functions: Vec<String>,
    pub image_path: String,
    pub image_url: String,
    pub collision: bool,
    pub cover: bool,
    pub visible: bool,
    pub rotation: i32,
    pub rate: u32,
    pub blueprints: Vec<Blueprint>,
}

impl TextureObject {
    pub fn blueprint_area(&self, x: i32, y: i32) -> Vec<(i32, i32)> {
        self.blueprints
            .iter()
            .map(|b| {
                let (rx, ry) = b.relative_coordinates();
                (x + rx, y + ry)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectGroup {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub textures: Vec<TextureObject>,
    pub scale: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tileset {
    pub tileset_id: u32,
    pub name: String,
    pub columns: u32,
    pub firstgid: u32,
    pub image: String,
    pub imagewidth: u32,
    pub imageheight: u32,
    pub spacing: u32,
    pub margin: u32,
    pub tilecount: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_group_builder_names_tiles_after_their_resource_id() {
        let group = TileGroupDescriptor::new("grass").add_tile("grass_0", "grass_0.png");
        assert_eq!(group.tiles[0].name.as_deref(), Some("grass_0"));
    }

    #[test]
    fn blueprint_area_offsets_by_object_origin() {
        let tex = TextureTile::new("wall", "wall.png", 1, 0);
        let bp = Blueprint { texture: tex, relative_x: 1, relative_y: 2 };
        let obj = TextureObject {
            name: "house".into(),
            kind: "object",
            shape: "rectangle".into(),
            width: 2,
            height: 2,
            original_width: 32,
            original_height: 32,
            functions: vec![],
            image_path: String::new(),
            image_url: String::new(),
            collision: false,
            cover: false,
            visible: true,
            rotation: 0,
            rate: 1,
            blueprints: vec![bp],
        };
        assert_eq!(obj.blueprint_area(5, 5), vec![(6, 7)]);
    }
}
