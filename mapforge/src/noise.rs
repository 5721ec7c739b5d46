//! Perlin-based region noise. Grounded in `tiled_master/methods/noise.py`'s
//! `NoiseMap`. The Python original used the third-party `perlin_noise`
//! library; no equivalent crate sits in this codebase's dependency graph, and
//! adding one for a single call site would violate the "don't fabricate
//! dependencies, don't import a crate for one thing the corpus doesn't
//! already reach for" discipline, so the gradient-noise core is implemented
//! directly from a seeded permutation table (classic Perlin, quintic fade).
//!
//! Noise values are never asserted bit-exact against the Python original
//! (see the open question on cross-platform noise reproducibility); tests
//! here assert coverage ratios and threshold-set sizes.

use crate::prng::Prng;

/// A hash-table-backed classic Perlin noise source. `octaves` blends
/// successive frequency doublings, mirroring `PerlinNoise(octaves=N, ...)`.
struct Perlin {
    perm: [u8; 512],
    octaves: u32,
}

impl Perlin {
    fn new(seed: u64, octaves: u32) -> Self {
        let mut p: Vec<u8> = (0..256u16).map(|v| v as u8).collect();
        let mut rng = Prng::from_seed(seed);
        rng.shuffle(&mut p);
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = p[i % 256];
        }
        Perlin { perm, octaves }
    }

    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn lerp(t: f64, a: f64, b: f64) -> f64 {
        a + t * (b - a)
    }

    fn grad(hash: u8, x: f64, y: f64) -> f64 {
        match hash & 3 {
            0 => x + y,
            1 => -x + y,
            2 => x - y,
            _ => -x - y,
        }
    }

    fn single(&self, x: f64, y: f64) -> f64 {
        let xi = x.floor() as i32 & 255;
        let yi = y.floor() as i32 & 255;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let u = Self::fade(xf);
        let v = Self::fade(yf);

        let aa = self.perm[(self.perm[xi as usize & 511] as usize + yi as usize) & 511];
        let ab = self.perm[(self.perm[xi as usize & 511] as usize + yi as usize + 1) & 511];
        let ba = self.perm[(self.perm[(xi + 1) as usize & 511] as usize + yi as usize) & 511];
        let bb = self.perm[(self.perm[(xi + 1) as usize & 511] as usize + yi as usize + 1) & 511];

        let x1 = Self::lerp(
            u,
            Self::grad(aa, xf, yf),
            Self::grad(ba, xf - 1.0, yf),
        );
        let x2 = Self::lerp(
            u,
            Self::grad(ab, xf, yf - 1.0),
            Self::grad(bb, xf - 1.0, yf - 1.0),
        );
        Self::lerp(v, x1, x2)
    }

    /// Sum `octaves` frequency-doubled, amplitude-halved layers, matching the
    /// `perlin_noise` library's `octaves` parameter semantics closely enough
    /// for the coverage-ratio properties this engine actually tests.
    fn sample(&self, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut max_amplitude = 0.0;
        for _ in 0..self.octaves {
            total += self.single(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        if max_amplitude == 0.0 {
            0.0
        } else {
            total / max_amplitude
        }
    }
}

pub struct NoiseMap {
    pub width: usize,
    pub height: usize,
    seed: u64,
    grid: Vec<f64>,
}

fn normalize(grid: &mut [f64]) {
    let min = grid.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = grid.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 {
        for v in grid.iter_mut() {
            *v = 0.0;
        }
    } else {
        for v in grid.iter_mut() {
            *v = (*v - min) / range;
        }
    }
}

impl NoiseMap {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        NoiseMap {
            width,
            height,
            seed,
            grid: vec![0.0; width * height],
        }
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.grid[y * self.width + x]
    }

    fn at_mut(&mut self, x: usize, y: usize) -> &mut f64 {
        &mut self.grid[y * self.width + x]
    }

    /// `perlin(scale)`: single-octave sample, x/y divided by `1000/scale`,
    /// min-max normalized to `[0,1]`.
    pub fn perlin(&mut self, scale: f64) {
        let divisor = 1000.0 / scale;
        let noise = Perlin::new(self.seed, 1);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = noise.sample(x as f64 / divisor, y as f64 / divisor);
                *self.at_mut(x, y) = v;
            }
        }
        normalize(&mut self.grid);
    }

    /// `double_perlin(major_scale, minor_scale, major_weight, minor_weight)`:
    /// two independently-normalized layers (octaves 2 and 4, seeds `s` and
    /// `s+1`), spatial factors `W*10/major_scale` and `H*10/minor_scale`,
    /// combined weighted. Result is left unnormalized, matching the source.
    pub fn double_perlin(&mut self, major_scale: f64, minor_scale: f64, major_weight: f64, minor_weight: f64) {
        let coarse = Perlin::new(self.seed, 2);
        let fine = Perlin::new(self.seed + 1, 4);
        let scale_coarse = self.width as f64 * 10.0 / major_scale;
        let scale_fine = self.height as f64 * 10.0 / minor_scale;

        let mut coarse_grid = vec![0.0; self.width * self.height];
        let mut fine_grid = vec![0.0; self.width * self.height];
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                coarse_grid[idx] = coarse.sample(x as f64 / scale_coarse, y as f64 / scale_coarse);
                fine_grid[idx] = fine.sample(x as f64 / scale_fine, y as f64 / scale_fine);
            }
        }
        normalize(&mut coarse_grid);
        normalize(&mut fine_grid);

        for idx in 0..self.grid.len() {
            self.grid[idx] = major_weight * coarse_grid[idx] + minor_weight * fine_grid[idx];
        }
    }

    /// Post-process: cells near the grid center are pulled toward
    /// `base_value`; re-normalized afterward.
    pub fn radial_attenuate(&mut self, sigma: f64, base_value: f64) {
        let cx = self.width as f64 / 2.0;
        let cy = self.height as f64 / 2.0;
        for y in 0..self.height {
            for x in 0..self.width {
                let d = (((x as f64 - cx).powi(2)) + ((y as f64 - cy).powi(2))).sqrt();
                let w = (-(d / sigma).powi(2)).exp();
                let v = self.at(x, y);
                *self.at_mut(x, y) = w * base_value + (1.0 - w) * v;
            }
        }
        normalize(&mut self.grid);
    }

    pub fn threshold(&self, lo: f64, hi: f64) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.at(x, y);
                if v >= lo && v <= hi {
                    out.push((x as i32, y as i32));
                }
            }
        }
        out
    }

    /// `generate_natural_river(scale)`. Presets 1-6, verbatim from the
    /// original `NoiseMap.generate_natural_river`.
    pub fn generate_natural_river(&mut self, scale: u32) -> Vec<(i32, i32)> {
        let (major, minor, mw, nw, lo, hi) = match scale {
            1 => (15.0, 15.0, 0.85, 0.15, 0.8, 1.0),
            2 => (2.0, 10.0, 0.85, 0.15, 0.5, 0.6),
            3 => (2.0, 10.0, 0.85, 0.15, 0.4, 0.65),
            4 => (0.25, 1.0, 0.85, 0.15, 0.5, 0.56),
            5 => (10.0, 15.0, 0.85, 0.15, 0.35, 1.0),
            6 => (2.0, 5.0, 0.8, 0.2, 0.45, 2.0),
            _ => return Vec::new(),
        };
        self.double_perlin(major, minor, mw, nw);
        self.threshold(lo, hi)
    }

    /// `generate_tree_area(scale)`. Presets 1-4.
    pub fn generate_tree_area(&mut self, scale: u32) -> Vec<(i32, i32)> {
        let threshold = match scale {
            1 => {
                self.double_perlin(50.0, 20.0, 0.7, 0.3);
                self.radial_attenuate(10.0, 0.0);
                0.8
            }
            2 => {
                self.double_perlin(20.0, 20.0, 0.7, 0.3);
                self.radial_attenuate(60.0, 0.0);
                0.2
            }
            3 => {
                self.double_perlin(20.0, 20.0, 0.7, 0.3);
                0.5
            }
            4 => {
                self.double_perlin(20.0, 20.0, 0.7, 0.3);
                self.radial_attenuate(20.0, 0.0);
                0.2
            }
            _ => return Vec::new(),
        };
        self.threshold(threshold, f64::INFINITY)
    }

    pub fn generate_bushes(&mut self) -> Vec<(i32, i32)> {
        self.perlin(300.0);
        self.threshold(0.78, f64::INFINITY)
    }

    pub fn generate_flowers(&mut self) -> Vec<(i32, i32)> {
        self.perlin(500.0);
        self.threshold(0.85, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perlin_output_is_normalized() {
        let mut n = NoiseMap::new(32, 32, 1);
        n.perlin(10.0);
        assert!(n.grid.iter().all(|v| *v >= 0.0 && *v <= 1.0));
    }

    #[test]
    fn river_preset_is_deterministic() {
        let mut a = NoiseMap::new(64, 32, 99);
        let mut b = NoiseMap::new(64, 32, 99);
        assert_eq!(a.generate_natural_river(4), b.generate_natural_river(4));
    }

    #[test]
    fn tree_area_preset_returns_nonempty_coverage_on_large_map() {
        let mut n = NoiseMap::new(80, 80, 5);
        let area = n.generate_tree_area(2);
        // A coverage-ratio property, not a pixel-exact check (see module docs).
        assert!(!area.is_empty());
        assert!(area.len() < 80 * 80);
    }
}
