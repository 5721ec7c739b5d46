pub use super::asset::*;
pub use super::builder::*;
pub use super::config::*;
pub use super::element::*;
pub use super::elements::{bush::*, collision::*, cover::*, ground::*, river::*, room::*};
pub use super::elements::{town::*, town_logic::*, village::*, woods::*};
pub use super::error::*;
pub use super::geom::{bsp::*, dwellings::*, kmst::*, pathfind::*, polygon::*};
pub use super::map_cache::*;
pub use super::noise::*;
pub use super::object::*;
pub use super::prng::*;
pub use super::resources::*;
pub use super::schema::*;
pub use super::serializer::*;
