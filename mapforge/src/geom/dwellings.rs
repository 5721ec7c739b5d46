//! Recursive polygon-room subdivision. Grounded in
//! `tiled_master/methods/dwelling.py::Room` / `Dwellings`.

use super::kmst::unweighted_mst;
use super::polygon::Grid;
use crate::prng::Prng;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub cells: HashSet<(i64, i64)>,
}

impl Room {
    pub fn new(cells: HashSet<(i64, i64)>) -> Self {
        Room { cells }
    }

    pub fn area(&self) -> usize {
        self.cells.len()
    }

    pub fn bbox(&self) -> Option<(i64, i64, i64, i64)> {
        if self.cells.is_empty() {
            return None;
        }
        let min_x = self.cells.iter().map(|c| c.0).min().unwrap();
        let max_x = self.cells.iter().map(|c| c.0).max().unwrap();
        let min_y = self.cells.iter().map(|c| c.1).min().unwrap();
        let max_y = self.cells.iter().map(|c| c.1).max().unwrap();
        Some((min_x, min_y, max_x, max_y))
    }

    pub fn shape_ratio(&self) -> f64 {
        match self.bbox() {
            None => 0.0,
            Some((min_x, min_y, max_x, max_y)) => {
                let w = (max_x - min_x + 1) as f64;
                let h = (max_y - min_y + 1) as f64;
                w.min(h) / w.max(h)
            }
        }
    }

    pub fn is_one_cell_wide(&self) -> bool {
        match self.bbox() {
            None => false,
            Some((min_x, min_y, max_x, max_y)) => {
                let w = max_x - min_x + 1;
                let h = max_y - min_y + 1;
                if self.area() as i64 != w * h {
                    return false;
                }
                (w == 1 && h > 1) || (h == 1 && w > 1)
            }
        }
    }

    fn from_bbox(bbox: (i64, i64, i64, i64)) -> Self {
        let (x0, y0, x1, y1) = bbox;
        let mut cells = HashSet::new();
        for r in y0..=y1 {
            for c in x0..=x1 {
                cells.insert((c, r));
            }
        }
        Room::new(cells)
    }
}

fn rooms_are_adjacent(a: &Room, b: &Room) -> bool {
    for &(c, r) in &a.cells {
        for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)].iter() {
            if b.cells.contains(&(c + dx, r + dy)) {
                return true;
            }
        }
    }
    false
}

fn clip_room_to_polygon(room: &Room, grid: &Grid) -> Option<Room> {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = room.bbox()?;
    let mut valid = false;
    for r in min_y..=max_y {
        for c in min_x..=max_x {
            if grid.get(c, r) {
                valid = true;
                min_x = min_x.min(c);
                max_x = max_x.max(c);
                min_y = min_y.min(r);
                max_y = max_y.max(r);
            }
        }
    }
    if !valid {
        return None;
    }
    Some(Room::from_bbox((min_x, min_y, max_x, max_y)))
}

fn subdivide_room(room: &Room, horizontal: bool, rand: &mut Prng) -> (Option<Room>, Option<Room>) {
    let bbox = match room.bbox() {
        Some(b) => b,
        None => return (None, None),
    };
    let (min_x, min_y, max_x, max_y) = bbox;
    if horizontal {
        if max_y == min_y {
            return (Some(room.clone()), None);
        }
        let split = rand.gen_range(min_y, max_y);
        let r1: HashSet<_> = room.cells.iter().filter(|(_, r)| *r <= split).cloned().collect();
        let r2: HashSet<_> = room.cells.iter().filter(|(_, r)| *r > split).cloned().collect();
        (Some(Room::new(r1)), Some(Room::new(r2)))
    } else {
        if max_x == min_x {
            return (Some(room.clone()), None);
        }
        let split = rand.gen_range(min_x, max_x);
        let r1: HashSet<_> = room.cells.iter().filter(|(c, _)| *c <= split).cloned().collect();
        let r2: HashSet<_> = room.cells.iter().filter(|(c, _)| *c > split).cloned().collect();
        (Some(Room::new(r1)), Some(Room::new(r2)))
    }
}

fn count_overlap(room: &Room, grid: &Grid) -> usize {
    let (x0, y0, x1, y1) = match room.bbox() {
        Some(b) => b,
        None => return 0,
    };
    let mut count = 0;
    for r in y0..=y1 {
        for c in x0..=x1 {
            if grid.get(c, r) {
                count += 1;
            }
        }
    }
    count
}

fn is_room_valid(room: &Room, grid: &Grid, max_area: usize, min_overlap_ratio: f64, shape_ratio_threshold: f64) -> bool {
    if room.area() > max_area {
        return false;
    }
    if room.shape_ratio() < shape_ratio_threshold {
        return false;
    }
    if (count_overlap(room, grid) as f64) < room.area() as f64 * min_overlap_ratio {
        return false;
    }
    true
}

fn subdivide_rooms_iterative(
    rooms: &[Room],
    grid: &Grid,
    max_area: usize,
    min_overlap_ratio: f64,
    shape_ratio_threshold: f64,
    rand: &mut Prng,
) -> Vec<Room> {
    let mut out = Vec::new();
    for room in rooms {
        let clipped = match clip_room_to_polygon(room, grid) {
            Some(c) => c,
            None => continue,
        };
        if is_room_valid(&clipped, grid, max_area, min_overlap_ratio, shape_ratio_threshold) {
            out.push(clipped);
            continue;
        }
        let bbox = match clipped.bbox() {
            Some(b) => b,
            None => continue,
        };
        let horizontal = (bbox.2 - bbox.0) <= (bbox.3 - bbox.1);
        let (room1, room2) = subdivide_room(&clipped, horizontal, rand);
        if let Some(r1) = room1 {
            if r1.area() > 0 {
                if let Some(c) = clip_room_to_polygon(&r1, grid) {
                    out.push(c);
                }
            }
        }
        if let Some(r2) = room2 {
            if r2.area() > 0 {
                if let Some(c) = clip_room_to_polygon(&r2, grid) {
                    out.push(c);
                }
            }
        }
    }
    out
}

pub struct Dwellings {
    pub grid: Grid,
    pub rooms: Vec<Room>,
    rand: Prng,
}

impl Dwellings {
    pub fn new(width: usize, height: usize, mut rand: Prng, num_vertices: u32) -> Self {
        let grid = Grid::create_room_polygon(width, height, num_vertices, &mut rand);
        let bbox = grid.bounding_box().expect("polygon acceptance loop guarantees a non-empty area");
        let initial_room = Room::from_bbox(bbox);
        Dwellings {
            grid,
            rooms: vec![initial_room],
            rand,
        }
    }

    pub fn subdivide(&mut self, max_area: usize, min_overlap_ratio: f64, shape_ratio_threshold: f64, max_iterations: u32) -> &[Room] {
        let mut current = self.rooms.clone();
        for _ in 0..max_iterations {
            let next = subdivide_rooms_iterative(
                &current,
                &self.grid,
                max_area,
                min_overlap_ratio,
                shape_ratio_threshold,
                &mut self.rand,
            );
            if next.len() == current.len() {
                break;
            }
            current = next;
        }
        self.rooms = current;
        &self.rooms
    }

    pub fn merge_adjacent_one_cell_wide_rooms(&mut self) {
        let (candidates, others): (Vec<Room>, Vec<Room>) =
            self.rooms.drain(..).partition(|r| r.is_one_cell_wide());

        let n = candidates.len();
        let mut visited = vec![false; n];
        let mut components: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            if visited[i] {
                continue;
            }
            let mut comp = Vec::new();
            let mut stack = vec![i];
            visited[i] = true;
            while let Some(cur) = stack.pop() {
                comp.push(cur);
                for j in 0..n {
                    if !visited[j] && rooms_are_adjacent(&candidates[cur], &candidates[j]) {
                        visited[j] = true;
                        stack.push(j);
                    }
                }
            }
            components.push(comp);
        }

        let mut merged = Vec::new();
        for comp in components {
            let mut cells = HashSet::new();
            for idx in comp {
                cells.extend(candidates[idx].cells.iter().cloned());
            }
            merged.push(Room::new(cells));
        }

        self.rooms = others;
        self.rooms.extend(merged);
    }

    pub fn generate_room_mst(&mut self, extra_count: usize) -> Vec<(usize, usize)> {
        let n = self.rooms.len();
        let mut adjacency = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if rooms_are_adjacent(&self.rooms[i], &self.rooms[j]) {
                    adjacency.push((i, j));
                }
            }
        }
        unweighted_mst(n, &adjacency, extra_count, &mut self.rand)
    }

    /// Run subdivide -> merge -> MST and return the final room list plus the
    /// connection list as room-index pairs.
    pub fn divide_room(
        &mut self,
        max_area: usize,
        min_overlap_ratio: f64,
        shape_ratio_threshold: f64,
        max_iterations: u32,
    ) -> (Vec<Room>, Vec<(usize, usize)>) {
        self.subdivide(max_area, min_overlap_ratio, shape_ratio_threshold, max_iterations);
        self.merge_adjacent_one_cell_wide_rooms();
        let connections = self.generate_room_mst(0);
        (self.rooms.clone(), connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_room_produces_connected_room_graph() {
        let rand = Prng::from_seed(42);
        let mut dwellings = Dwellings::new(12, 8, rand, 6);
        let (rooms, connections) = dwellings.divide_room(8, 0.6, 0.3, 100);
        assert!(!rooms.is_empty());
        if rooms.len() > 1 {
            assert!(!connections.is_empty());
        }
    }

    #[test]
    fn one_cell_wide_detection() {
        let mut cells = HashSet::new();
        cells.insert((0, 0));
        cells.insert((0, 1));
        cells.insert((0, 2));
        let room = Room::new(cells);
        assert!(room.is_one_cell_wide());
    }
}
