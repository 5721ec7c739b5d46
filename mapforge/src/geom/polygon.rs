//! Random-polygon rasterization and cellular-automaton cleanup, used as the
//! floor-plan silhouette for interior room generation. Grounded in
//! `tiled_master/methods/dwelling.py::Grid`.

use crate::prng::Prng;
use std::collections::VecDeque;

pub struct Grid {
    pub width: usize,
    pub height: usize,
    cells: Vec<bool>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn get(&self, c: i64, r: i64) -> bool {
        if c < 0 || r < 0 || c as usize >= self.width || r as usize >= self.height {
            return false;
        }
        self.cells[r as usize * self.width + c as usize]
    }

    fn set(&mut self, c: usize, r: usize, v: bool) {
        self.cells[r * self.width + c] = v;
    }

    fn is_point_in_polygon(x: f64, y: f64, polygon: &[(f64, f64)]) -> bool {
        let n = polygon.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = polygon[i];
            let (xj, yj) = polygon[j];
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi + 1e-9) + xi) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn fill_polygon(&mut self, polygon: &[(f64, f64)]) {
        for r in 0..self.height {
            for c in 0..self.width {
                let inside = Self::is_point_in_polygon(c as f64 + 0.5, r as f64 + 0.5, polygon);
                self.set(c, r, inside);
            }
        }
    }

    /// Pick `num_vertices` random points inside `(x0,y0,x1,y1)`, sort by
    /// polar angle around the centroid, and rasterize the resulting simple
    /// polygon.
    pub fn from_random_polygon(x0: i64, y0: i64, width: usize, height: usize, num_vertices: u32, rand: &mut Prng) -> Self {
        let x1 = x0 + width as i64;
        let y1 = y0 + height as i64;
        let cx = (x0 + x1) as f64 / 2.0;
        let cy = (y0 + y1) as f64 / 2.0;

        let mut points: Vec<(f64, f64, f64)> = Vec::new();
        for _ in 0..num_vertices {
            let x = rand.gen_range(x0, x1 + 1) as f64;
            let y = rand.gen_range(y0, y1 + 1) as f64;
            let angle = (y - cy).atan2(x - cx);
            points.push((x, y, angle));
        }
        points.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap());
        let polygon: Vec<(f64, f64)> = points.iter().map(|p| (p.0, p.1)).collect();

        let mut grid = Grid::new(width, height);
        grid.fill_polygon(&polygon);
        grid
    }

    pub fn count_valid(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Cellular-automaton smoothing: a cell is true in the next iteration
    /// iff at least 5 of its 8 neighbors are true.
    pub fn smooth(&mut self, iterations: u32) {
        for _ in 0..iterations {
            let mut next = vec![false; self.width * self.height];
            for r in 0..self.height as i64 {
                for c in 0..self.width as i64 {
                    let mut count = 0;
                    for dr in -1i64..=1 {
                        for dc in -1i64..=1 {
                            if dr == 0 && dc == 0 {
                                continue;
                            }
                            if self.get(c + dc, r + dr) {
                                count += 1;
                            }
                        }
                    }
                    next[r as usize * self.width + c as usize] = count >= 5;
                }
            }
            self.cells = next;
        }
    }

    /// Keep only the largest 4-connected component of true cells.
    pub fn remove_small_regions(&mut self) {
        let mut visited = vec![false; self.width * self.height];
        let mut components: Vec<Vec<(usize, usize)>> = Vec::new();

        for r in 0..self.height {
            for c in 0..self.width {
                let idx = r * self.width + c;
                if self.cells[idx] && !visited[idx] {
                    let mut comp = Vec::new();
                    let mut q = VecDeque::new();
                    q.push_back((r, c));
                    visited[idx] = true;
                    while let Some((cr, cc)) = q.pop_front() {
                        comp.push((cr, cc));
                        for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)].iter() {
                            let nr = cr as i64 + dr;
                            let nc = cc as i64 + dc;
                            if nr >= 0 && nc >= 0 && (nr as usize) < self.height && (nc as usize) < self.width {
                                let nidx = nr as usize * self.width + nc as usize;
                                if self.cells[nidx] && !visited[nidx] {
                                    visited[nidx] = true;
                                    q.push_back((nr as usize, nc as usize));
                                }
                            }
                        }
                    }
                    components.push(comp);
                }
            }
        }

        if components.is_empty() {
            return;
        }
        let largest = components.into_iter().max_by_key(|c| c.len()).unwrap();
        let mut next = vec![false; self.width * self.height];
        for (r, c) in largest {
            next[r * self.width + c] = true;
        }
        self.cells = next;
    }

    /// Flood-fill false cells from every boundary cell; any false cell not
    /// reached is an enclosed hole and is flipped true.
    pub fn fill_holes(&mut self) {
        let mut visited = vec![false; self.width * self.height];
        let w = self.width;
        let h = self.height;

        let mut flood = |cells: &[bool], visited: &mut Vec<bool>, start: (usize, usize)| {
            let mut q = VecDeque::new();
            q.push_back(start);
            visited[start.0 * w + start.1] = true;
            while let Some((cr, cc)) = q.pop_front() {
                for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)].iter() {
                    let nr = cr as i64 + dr;
                    let nc = cc as i64 + dc;
                    if nr >= 0 && nc >= 0 && (nr as usize) < h && (nc as usize) < w {
                        let nidx = nr as usize * w + nc as usize;
                        if !cells[nidx] && !visited[nidx] {
                            visited[nidx] = true;
                            q.push_back((nr as usize, nc as usize));
                        }
                    }
                }
            }
        };

        for r in 0..h {
            if !visited[r * w] && !self.cells[r * w] {
                flood(&self.cells, &mut visited, (r, 0));
            }
            if !visited[r * w + w - 1] && !self.cells[r * w + w - 1] {
                flood(&self.cells, &mut visited, (r, w - 1));
            }
        }
        for c in 0..w {
            if !visited[c] && !self.cells[c] {
                flood(&self.cells, &mut visited, (0, c));
            }
            if !visited[(h - 1) * w + c] && !self.cells[(h - 1) * w + c] {
                flood(&self.cells, &mut visited, (h - 1, c));
            }
        }

        for idx in 0..self.cells.len() {
            if !self.cells[idx] && !visited[idx] {
                self.cells[idx] = true;
            }
        }
    }

    /// Translate the true region so its bounding-box center aligns with the
    /// grid center.
    pub fn center_effective_area(&mut self) {
        let mut min_r = self.height as i64;
        let mut max_r = -1i64;
        let mut min_c = self.width as i64;
        let mut max_c = -1i64;
        for r in 0..self.height {
            for c in 0..self.width {
                if self.cells[r * self.width + c] {
                    min_r = min_r.min(r as i64);
                    max_r = max_r.max(r as i64);
                    min_c = min_c.min(c as i64);
                    max_c = max_c.max(c as i64);
                }
            }
        }
        if max_r == -1 || max_c == -1 {
            return;
        }
        let current_center_r = (min_r + max_r + 1) as f64 / 2.0;
        let current_center_c = (min_c + max_c + 1) as f64 / 2.0;
        let desired_r = self.height as f64 / 2.0;
        let desired_c = self.width as f64 / 2.0;
        let offset_r = (desired_r - current_center_r).round() as i64;
        let offset_c = (desired_c - current_center_c).round() as i64;

        let mut next = vec![false; self.width * self.height];
        for r in 0..self.height {
            for c in 0..self.width {
                if self.cells[r * self.width + c] {
                    let nr = r as i64 + offset_r;
                    let nc = c as i64 + offset_c;
                    if nr >= 0 && nc >= 0 && (nr as usize) < self.height && (nc as usize) < self.width {
                        next[nr as usize * self.width + nc as usize] = true;
                    }
                }
            }
        }
        self.cells = next;
    }

    /// Run the full acceptance loop: rasterize, smooth, extract largest
    /// component, fill holes, center; repeat until `8 <= true_count <= 32`.
    pub fn create_room_polygon(width: usize, height: usize, num_vertices: u32, rand: &mut Prng) -> Self {
        loop {
            let mut grid = Grid::from_random_polygon(0, 0, width, height, num_vertices, rand);
            grid.smooth(2);
            grid.remove_small_regions();
            grid.fill_holes();
            let count = grid.count_valid();
            if (8..=32).contains(&count) {
                grid.center_effective_area();
                return grid;
            }
        }
    }

    /// Bounding box of all true cells as `(min_x, min_y, max_x, max_y)`.
    pub fn bounding_box(&self) -> Option<(i64, i64, i64, i64)> {
        let mut min_x = self.width as i64;
        let mut min_y = self.height as i64;
        let mut max_x = -1i64;
        let mut max_y = -1i64;
        for r in 0..self.height {
            for c in 0..self.width {
                if self.cells[r * self.width + c] {
                    min_x = min_x.min(c as i64);
                    max_x = max_x.max(c as i64);
                    min_y = min_y.min(r as i64);
                    max_y = max_y.max(r as i64);
                }
            }
        }
        if max_x == -1 {
            None
        } else {
            Some((min_x, min_y, max_x, max_y))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_room_polygon_satisfies_count_bounds() {
        let mut rand = Prng::from_seed(123);
        let grid = Grid::create_room_polygon(12, 8, 6, &mut rand);
        let count = grid.count_valid();
        assert!((8..=32).contains(&count));
    }

    #[test]
    fn fill_holes_removes_enclosed_false_cells() {
        let mut grid = Grid::new(3, 3);
        for c in 0..3 {
            grid.set(c, 0, true);
            grid.set(c, 2, true);
        }
        grid.set(0, 1, true);
        grid.set(2, 1, true);
        // center (1,1) is an enclosed hole
        assert!(!grid.get(1, 1));
        grid.fill_holes();
        assert!(grid.get(1, 1));
    }
}
