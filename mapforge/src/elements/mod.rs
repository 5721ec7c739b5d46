//! Concrete map stages. Each stage is a `MapElement`: it declares the
//! textures it needs, then contributes its part of the map once those
//! textures resolve.

pub mod bush;
pub mod collision;
pub mod cover;
pub mod ground;
pub mod river;
pub mod room;
pub mod town;
pub mod town_logic;
pub mod village;
pub mod woods;
