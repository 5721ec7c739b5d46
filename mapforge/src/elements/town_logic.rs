//! Clears the scratch layers used by town/village road planning once a
//! stage no longer needs them. Grounded in
//! `implement/town_impl/element_logic.py::TownLogic`.

use crate::config;
use crate::element::{MapElement, ResourceRegistry};
use crate::error::BuildResult;
use crate::map_cache::MapCache;
use async_trait::async_trait;

pub struct TownLogicElement {
    resources: ResourceRegistry,
}

impl TownLogicElement {
    pub fn new() -> Self {
        TownLogicElement { resources: ResourceRegistry::new() }
    }
}

impl Default for TownLogicElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapElement for TownLogicElement {
    fn name(&self) -> &str {
        "Town Logic Element"
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    async fn build(&mut self, map_cache: &mut MapCache) -> BuildResult<()> {
        map_cache.clear_layer(config::STRUCTURE_LAYER);
        map_cache.clear_layer(config::HOUSE_LAYER);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clears_structure_and_house_layers() {
        let mut element = TownLogicElement::new();
        let mut map_cache = MapCache::new("m1", 4, 4, config::DEFAULT_LAYER_NUMS as usize);
        let marker = crate::schema::TextureTile::new("t", "t.png", 1, 1);
        map_cache.drop_tile(0, 0, config::STRUCTURE_LAYER, &marker);
        map_cache.drop_tile(1, 1, config::HOUSE_LAYER, &marker);

        element.build(&mut map_cache).await.unwrap();

        assert!(!map_cache.check_exists(0, 0, config::STRUCTURE_LAYER));
        assert!(!map_cache.check_exists(1, 1, config::HOUSE_LAYER));
    }
}
