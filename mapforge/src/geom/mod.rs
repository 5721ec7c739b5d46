pub mod bsp;
pub mod dwellings;
pub mod kmst;
pub mod pathfind;
pub mod polygon;
