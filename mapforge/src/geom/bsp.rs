//! Binary-space-partition rectangle splitter. Grounded in
//! `tiled_master/methods/bsp.py`.

use crate::prng::Prng;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

pub struct Bsp {
    min_size: i32,
    corners: HashSet<(i32, i32)>,
    regions: Vec<Rect>,
}

impl Bsp {
    pub fn new(min_size: i32) -> Self {
        Bsp {
            min_size,
            corners: HashSet::new(),
            regions: Vec::new(),
        }
    }

    fn add_corners(&mut self, r: Rect) {
        self.corners.insert((r.x, r.y));
        self.corners.insert((r.x + r.w, r.y));
        self.corners.insert((r.x, r.y + r.h));
        self.corners.insert((r.x + r.w, r.y + r.h));
    }

    fn partition(&mut self, region: Rect, rand: &mut Prng) {
        let Rect { x, y, w, h } = region;
        if w < 2 * self.min_size || h < 2 * self.min_size {
            self.add_corners(region);
            self.regions.push(region);
            return;
        }

        let mut split_horizontally = rand.gen_bool(0.5);
        if w > h {
            split_horizontally = false;
        } else if h > w {
            split_horizontally = true;
        }

        if split_horizontally {
            let split = rand.gen_range(self.min_size as i64, (h - self.min_size + 1) as i64) as i32;
            self.partition(Rect { x, y, w, h: split }, rand);
            self.partition(
                Rect {
                    x,
                    y: y + split,
                    w,
                    h: h - split,
                },
                rand,
            );
        } else {
            let split = rand.gen_range(self.min_size as i64, (w - self.min_size + 1) as i64) as i32;
            self.partition(Rect { x, y, w: split, h }, rand);
            self.partition(
                Rect {
                    x: x + split,
                    y,
                    w: w - split,
                    h,
                },
                rand,
            );
        }
    }

    /// Partition `region`, returning the leaf regions and the deduplicated
    /// interior corner points (the original rectangle's four outer corners
    /// excluded).
    pub fn run(min_size: i32, region: Rect, rand: &mut Prng) -> (Vec<Rect>, Vec<(i32, i32)>) {
        let mut bsp = Bsp::new(min_size);
        bsp.partition(region, rand);

        let outer = [
            (region.x, region.y),
            (region.x, region.y + region.h),
            (region.x + region.w, region.y),
            (region.x + region.w, region.y + region.h),
        ];
        let corners: Vec<(i32, i32)> = bsp
            .corners
            .into_iter()
            .filter(|c| !outer.contains(c))
            .collect();
        (bsp.regions, corners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_respect_min_size_and_corners_are_interior() {
        let mut rand = Prng::from_seed(1);
        let region = Rect { x: 0, y: 0, w: 80, h: 40 };
        let (regions, corners) = Bsp::run(10, region, &mut rand);
        for r in &regions {
            assert!(r.w >= 10);
            assert!(r.h >= 10);
        }
        for (cx, cy) in &corners {
            assert!(*cx > region.x && *cx < region.x + region.w || *cy > region.y && *cy < region.y + region.h);
            assert!(!(*cx == region.x && *cy == region.y));
            assert!(!(*cx == region.x + region.w && *cy == region.y + region.h));
        }
    }
}
