//! Width-aware A* corridor carving. Grounded in
//! `tiled_master/methods/pathfind.py::Pathfinder`.
//!
//! Positions are tracked in "half-steps": raw integer coordinates equal to
//! the logical coordinate times two, so half-integer seam positions (used
//! when `width` is even) stay exactly hashable and orderable instead of
//! relying on float equality.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

pub trait Occupancy {
    /// True if `(x, y)` is occupied on `layer`.
    fn check_exists(&self, x: i32, y: i32, layer: usize) -> bool;
}

type Pos = (i32, i32); // half-step coordinates

#[derive(Copy, Clone, Eq, PartialEq)]
struct HeapItem {
    cost: i32,
    pos: Pos,
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.cmp(&self.cost)
    }
}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Pathfinder<'a, O: Occupancy> {
    map: &'a O,
    map_width: i32,
    map_height: i32,
    width: i32,
}

impl<'a, O: Occupancy> Pathfinder<'a, O> {
    pub fn new(map: &'a O, map_width: i32, map_height: i32, width: i32) -> Self {
        Pathfinder {
            map,
            map_width,
            map_height,
            width,
        }
    }

    fn even(&self) -> bool {
        self.width % 2 == 0
    }

    fn to_half(p: (i32, i32)) -> Pos {
        (p.0 * 2, p.1 * 2)
    }

    fn heuristic(a: Pos, b: Pos) -> i32 {
        (a.0 - b.0).abs() + (a.1 - b.1).abs()
    }

    fn neighbors(&self, pos: Pos) -> Vec<Pos> {
        if self.even() {
            vec![
                (pos.0 - 1, pos.1),
                (pos.0 + 1, pos.1),
                (pos.0, pos.1 - 1),
                (pos.0, pos.1 + 1),
            ]
        } else {
            vec![
                (pos.0 - 2, pos.1),
                (pos.0 + 2, pos.1),
                (pos.0, pos.1 - 2),
                (pos.0, pos.1 + 2),
            ]
        }
    }

    fn bound_x(&self) -> i32 {
        (self.map_width as f64 * 1.2) as i32
    }

    fn bound_y(&self) -> i32 {
        (self.map_height as f64 * 1.2) as i32
    }

    fn floor_div2(a: i32) -> i32 {
        // matches Python's `int(x - 0.5)`/`int(x + 0.5)`, which truncate toward
        // zero rather than floor; plain integer division already does that.
        a / 2
    }

    fn is_valid(&self, pos: Pos, forbidden: &[usize]) -> bool {
        let bx = self.bound_x();
        let by = self.bound_y();
        let in_bounds = |x: i32, y: i32| x >= 0 && x < bx && y >= 0 && y < by;

        if self.even() {
            let (hx, hy) = pos;
            // real x = hx/2.0; tiles at floor(x-0.5), floor(x+0.5) etc.
            let tiles = [
                (Self::floor_div2(hx - 1), Self::floor_div2(hy - 1)),
                (Self::floor_div2(hx - 1), Self::floor_div2(hy + 1)),
                (Self::floor_div2(hx + 1), Self::floor_div2(hy - 1)),
                (Self::floor_div2(hx + 1), Self::floor_div2(hy + 1)),
            ];
            tiles.iter().all(|&(tx, ty)| {
                in_bounds(tx, ty) && forbidden.iter().all(|&layer| !self.map.check_exists(tx, ty, layer))
            })
        } else {
            let tx = pos.0 / 2;
            let ty = pos.1 / 2;
            in_bounds(tx, ty) && forbidden.iter().all(|&layer| !self.map.check_exists(tx, ty, layer))
        }
    }

    /// Returns the carved corridor as a set of `(x, y)` tile coordinates.
    pub fn find_corridor_path(&self, start: (i32, i32), goal: (i32, i32), forbidden: &[usize]) -> HashSet<(i32, i32)> {
        let start = Self::to_half(start);
        let goal = Self::to_half(goal);

        let mut open = BinaryHeap::new();
        open.push(HeapItem { cost: 0, pos: start });
        let mut came_from: HashMap<Pos, Pos> = HashMap::new();
        let mut g_score: HashMap<Pos, i32> = HashMap::new();
        g_score.insert(start, 0);
        let mut closed: HashSet<Pos> = HashSet::new();

        while let Some(HeapItem { pos: current, .. }) = open.pop() {
            if closed.contains(&current) {
                continue;
            }
            closed.insert(current);

            if current == goal {
                let mut path = vec![];
                let mut cur = current;
                while let Some(&prev) = came_from.get(&cur) {
                    path.push(cur);
                    cur = prev;
                }
                path.push(start);
                path.reverse();
                return self.expand_path(&path, forbidden);
            }

            for neighbor in self.neighbors(current) {
                if closed.contains(&neighbor) {
                    continue;
                }
                if !self.is_valid(neighbor, forbidden) {
                    continue;
                }
                let tentative = g_score[&current] + 1;
                if tentative < *g_score.get(&neighbor).unwrap_or(&i32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative);
                    open.push(HeapItem {
                        cost: tentative + Self::heuristic(neighbor, goal),
                        pos: neighbor,
                    });
                }
            }
        }

        log::warn!("failed to find path between {:?} and {:?}", start, goal);
        HashSet::new()
    }

    fn expand_path(&self, path: &[Pos], forbidden: &[usize]) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        for &(hx, hy) in path {
            let tiles: Vec<(i32, i32)> = if self.even() {
                vec![
                    (Self::floor_div2(hx - 1), Self::floor_div2(hy - 1)),
                    (Self::floor_div2(hx - 1), Self::floor_div2(hy + 1)),
                    (Self::floor_div2(hx + 1), Self::floor_div2(hy - 1)),
                    (Self::floor_div2(hx + 1), Self::floor_div2(hy + 1)),
                ]
            } else {
                let half_width = self.width / 2;
                let cx = hx / 2;
                let cy = hy / 2;
                let mut v = Vec::new();
                for sx in (cx - half_width)..=(cx + half_width) {
                    for sy in (cy - half_width)..=(cy + half_width) {
                        v.push((sx, sy));
                    }
                }
                v
            };
            for (tx, ty) in tiles {
                if forbidden.iter().all(|&layer| !self.map.check_exists(tx, ty, layer)) {
                    out.insert((tx, ty));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyMap;
    impl Occupancy for EmptyMap {
        fn check_exists(&self, _x: i32, _y: i32, _layer: usize) -> bool {
            false
        }
    }

    #[test]
    fn finds_straight_path_on_empty_map() {
        let map = EmptyMap;
        let pf = Pathfinder::new(&map, 20, 20, 2);
        let corridor = pf.find_corridor_path((2, 2), (10, 2), &[1]);
        assert!(!corridor.is_empty());
        assert!(corridor.contains(&(10, 2)) || corridor.contains(&(10, 1)));
    }

    struct BlockedMap;
    impl Occupancy for BlockedMap {
        fn check_exists(&self, _x: i32, _y: i32, layer: usize) -> bool {
            layer == 1
        }
    }

    #[test]
    fn fails_returns_empty_when_every_tile_is_forbidden() {
        let map = BlockedMap;
        let pf = Pathfinder::new(&map, 5, 5, 2);
        let corridor = pf.find_corridor_path((0, 0), (4, 4), &[1]);
        assert!(corridor.is_empty());
    }
}
