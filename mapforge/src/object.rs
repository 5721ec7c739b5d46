//! Placed-object records and the item layer that collects them. Grounded in
//! `tiled_master/framework/object.py`.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Object {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: i32,
    pub y: i32,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: f64,
    pub visible: bool,
    pub properties: Vec<Property>,
}

impl Object {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        x: i32,
        y: i32,
        original_width: u32,
        original_height: u32,
        width: u32,
        height: u32,
        functions: &[String],
        rotation: f64,
        visible: bool,
        image: impl Into<String>,
        image_path: impl Into<String>,
    ) -> Self {
        let functions_json = serde_json::to_string(functions).unwrap_or_else(|_| "[]".to_string());
        Object {
            id: 0,
            name: name.into(),
            kind: kind.into(),
            x,
            y,
            original_width,
            original_height,
            width,
            height,
            rotation,
            visible,
            properties: vec![
                Property { name: "texture", kind: "string", value: image.into() },
                Property { name: "image_path", kind: "string", value: image_path.into() },
                Property { name: "functions", kind: "string", value: functions_json },
            ],
        }
    }
}

/// Collects the individual objects placed onto the map into Tiled's
/// `objectgroup` layer shape, allocating ids for objects that don't already
/// carry one.
#[derive(Debug, Clone, Serialize)]
pub struct ItemLayer {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f64,
    pub x: i32,
    pub y: i32,
    #[serde(skip)]
    next_id: u32,
    #[serde(rename = "objects", serialize_with = "serialize_objects_in_order")]
    id_object_map: BTreeMap<u32, Object>,
}

fn serialize_objects_in_order<S>(map: &BTreeMap<u32, Object>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for obj in map.values() {
        seq.serialize_element(obj)?;
    }
    seq.end()
}

impl ItemLayer {
    pub fn new(layer_id: u32, name: impl Into<String>) -> Self {
        ItemLayer {
            kind: "objectgroup",
            id: layer_id,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            x: 0,
            y: 0,
            next_id: 1,
            id_object_map: BTreeMap::new(),
        }
    }

    pub fn add_object(&mut self, mut obj: Object) {
        if obj.id != 0 {
            if !self.id_object_map.contains_key(&obj.id) {
                if obj.id >= self.next_id {
                    self.next_id = obj.id + 1;
                    log::warn!("object arrived with an id past the allocator's high-water mark");
                }
                self.id_object_map.insert(obj.id, obj);
            }
        } else {
            obj.id = self.next_id;
            self.next_id += 1;
            self.id_object_map.insert(obj.id, obj);
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.id_object_map.values()
    }
}
