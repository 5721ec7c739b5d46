extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;

pub mod asset;
pub mod autotile;
pub mod builder;
pub mod config;
pub mod element;
pub mod elements;
pub mod error;
pub mod geom;
pub mod map_cache;
pub mod noise;
pub mod object;
pub mod prelude;
pub mod prng;
pub mod resources;
pub mod schema;
pub mod serializer;
