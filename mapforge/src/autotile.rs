//! Bitmask-driven auto-tile resolution. Grounded in
//! `tiled_master/framework/autotile.py::AutoTile` for the neighbor-bitmask
//! algorithm, and `tiled_master/framework/preloader.py::load_autotile` for
//! the three scheme sheet layouts (`tile48`, `inner16`, `blob47`).
//!
//! The source's `decimal_to_local_id` mapping tables live in JSON files that
//! ship with the original art assets and aren't part of this port's input
//! corpus, so the reduced-bitmask -> sheet-slot assignment here is derived
//! algorithmically instead of transcribed: classes are enumerated in
//! ascending numeric order of their reduced bitmask and assigned sequential
//! slot indices. This reproduces the same *topology* (a tile variant is
//! selected consistently for a given neighbor configuration) without
//! depending on an externally authored lookup table.

use std::collections::HashMap;

/// (dx, dy) offsets in the bit order the original neighbor scan uses:
/// N, NE, E, SE, S, SW, W, NW.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

pub trait NeighborOccupancy {
    fn check_exists(&self, x: i32, y: i32, layer: usize) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tile48,
    Inner16,
    Blob47,
}

impl Scheme {
    pub fn columns(self) -> u32 {
        match self {
            Scheme::Tile48 => 8,
            Scheme::Inner16 => 4,
            Scheme::Blob47 => 11,
        }
    }

    pub fn rows(self) -> u32 {
        match self {
            Scheme::Tile48 => 6,
            Scheme::Inner16 => 4,
            Scheme::Blob47 => 5,
        }
    }

    pub fn tile_count(self) -> u32 {
        self.columns() * self.rows()
    }
}

/// Clear diagonal bits whose adjacent cardinal pair isn't fully set; a
/// corner only matters visually when both of its flanking edges are present.
/// This collapses the raw 256 neighbor combinations down to 47 distinct
/// classes, matching the `blob47`/`tile48` schemes.
fn reduce_blob_bitmask(bitmask: u8) -> u8 {
    const N: u8 = 1 << 0;
    const NE: u8 = 1 << 1;
    const E: u8 = 1 << 2;
    const SE: u8 = 1 << 3;
    const S: u8 = 1 << 4;
    const SW: u8 = 1 << 5;
    const W: u8 = 1 << 6;
    const NW: u8 = 1 << 7;

    let mut m = bitmask;
    if bitmask & (N | E) != (N | E) {
        m &= !NE;
    }
    if bitmask & (S | E) != (S | E) {
        m &= !SE;
    }
    if bitmask & (S | W) != (S | W) {
        m &= !SW;
    }
    if bitmask & (N | W) != (N | W) {
        m &= !NW;
    }
    m
}

fn blob_class_table() -> HashMap<u8, u32> {
    let mut classes: Vec<u8> = (0u16..=255).map(|b| reduce_blob_bitmask(b as u8)).collect::<std::collections::HashSet<_>>().into_iter().collect();
    classes.sort_unstable();
    classes.into_iter().enumerate().map(|(i, m)| (m, i as u32)).collect()
}

/// Keeps only the 4 cardinal bits (N, E, S, W); `inner16` draws no
/// distinction based on diagonal neighbors, collapsing the raw 256
/// combinations down to the scheme's 16 classes.
fn reduce_inner16_bitmask(bitmask: u8) -> u8 {
    const N: u8 = 1 << 0;
    const E: u8 = 1 << 2;
    const S: u8 = 1 << 4;
    const W: u8 = 1 << 6;
    bitmask & (N | E | S | W)
}

fn inner16_class_table() -> HashMap<u8, u32> {
    let mut classes: Vec<u8> = (0u16..=255).map(|b| reduce_inner16_bitmask(b as u8)).collect::<std::collections::HashSet<_>>().into_iter().collect();
    classes.sort_unstable();
    classes.into_iter().enumerate().map(|(i, m)| (m, i as u32)).collect()
}

pub struct AutoTile {
    scheme: Scheme,
    classes: HashMap<u8, u32>,
}

impl AutoTile {
    pub fn new(scheme: Scheme) -> Self {
        let classes = match scheme {
            Scheme::Tile48 | Scheme::Blob47 => blob_class_table(),
            Scheme::Inner16 => inner16_class_table(),
        };
        AutoTile { scheme, classes }
    }

    fn raw_bitmask<O: NeighborOccupancy>(&self, map: &O, width: i32, height: i32, x: i32, y: i32, layer: usize) -> u8 {
        let mut bitmask: u8 = 0;
        for (bit_index, (dx, dy)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            let (nx, ny) = (x + dx, y + dy);
            let occupied = if nx < 0 || ny < 0 || nx >= width || ny >= height {
                true
            } else {
                map.check_exists(nx, ny, layer)
            };
            if occupied {
                bitmask |= 1 << bit_index;
            }
        }
        bitmask
    }

    /// Returns the local tile id within the scheme's sheet, or `None` for a
    /// fully surrounded cell (bitmask 255, reduced the same way under every
    /// scheme), which is rendered with the base/interior tile instead.
    pub fn local_id<O: NeighborOccupancy>(&self, map: &O, width: i32, height: i32, x: i32, y: i32, layer: usize) -> Option<u32> {
        let raw = self.raw_bitmask(map, width, height, x, y, layer);
        if raw == 255 {
            return None;
        }
        let reduced = match self.scheme {
            Scheme::Inner16 => reduce_inner16_bitmask(raw),
            Scheme::Tile48 | Scheme::Blob47 => reduce_blob_bitmask(raw),
        };
        self.classes.get(&reduced).copied()
    }

    pub fn base_tile_local_id(&self) -> Option<u32> {
        let full = match self.scheme {
            Scheme::Inner16 => reduce_inner16_bitmask(255),
            Scheme::Tile48 | Scheme::Blob47 => reduce_blob_bitmask(255),
        };
        self.classes.get(&full).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllOccupied;
    impl NeighborOccupancy for AllOccupied {
        fn check_exists(&self, _x: i32, _y: i32, _layer: usize) -> bool {
            true
        }
    }

    struct NoneOccupied;
    impl NeighborOccupancy for NoneOccupied {
        fn check_exists(&self, _x: i32, _y: i32, _layer: usize) -> bool {
            false
        }
    }

    #[test]
    fn fully_surrounded_cell_has_no_variant_tile() {
        let at = AutoTile::new(Scheme::Tile48);
        let map = AllOccupied;
        assert_eq!(at.local_id(&map, 10, 10, 5, 5, 0), None);
    }

    #[test]
    fn isolated_cell_maps_to_a_stable_variant() {
        let at = AutoTile::new(Scheme::Blob47);
        let map = NoneOccupied;
        let id1 = at.local_id(&map, 10, 10, 5, 5, 0);
        let id2 = at.local_id(&map, 10, 10, 5, 5, 0);
        assert_eq!(id1, id2);
        assert!(id1.is_some());
    }

    #[test]
    fn blob_scheme_has_exactly_47_classes() {
        assert_eq!(blob_class_table().len(), 47);
    }

    #[test]
    fn inner16_fully_surrounded_cell_has_no_variant_tile() {
        let at = AutoTile::new(Scheme::Inner16);
        let map = AllOccupied;
        assert_eq!(at.local_id(&map, 10, 10, 5, 5, 0), None);
    }

    #[test]
    fn inner16_scheme_has_exactly_16_classes() {
        assert_eq!(inner16_class_table().len(), 16);
    }
}
