//! K-Minimum-Spanning-Tree connectivity. Grounded in
//! `tiled_master/methods/kmst.py`.

use crate::prng::Prng;

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
        } else if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
        }
        true
    }
}

fn kruskal(n: usize, mut edges: Vec<(f64, usize, usize)>) -> Vec<(usize, usize)> {
    edges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let mut uf = UnionFind::new(n);
    let mut mst = Vec::new();
    for (_, a, b) in edges {
        if uf.union(a, b) {
            mst.push((a, b));
            if mst.len() == n.saturating_sub(1) {
                break;
            }
        }
    }
    mst
}

fn add_extra_edges(
    mst: &[(usize, usize)],
    all_edges: &[(f64, usize, usize)],
    extra_count: usize,
    rand: &mut Prng,
) -> Vec<(usize, usize)> {
    use std::collections::HashSet;
    let mst_set: HashSet<(usize, usize)> = mst
        .iter()
        .map(|&(a, b)| if a < b { (a, b) } else { (b, a) })
        .collect();
    let mut candidates: Vec<(usize, usize)> = all_edges
        .iter()
        .filter_map(|&(_, a, b)| {
            let key = if a < b { (a, b) } else { (b, a) };
            if mst_set.contains(&key) {
                None
            } else {
                Some((a, b))
            }
        })
        .collect();
    rand.shuffle(&mut candidates);
    candidates.truncate(extra_count);
    candidates
}

/// Euclidean-weighted KMST over a complete graph on `points`. Returns edges
/// as coordinate pairs: the MST plus `extra_count` edges drawn uniformly
/// without replacement from the remaining candidates.
pub fn kmst(points: &[(f64, f64)], extra_count: usize, rand: &mut Prng) -> Vec<((f64, f64), (f64, f64))> {
    let n = points.len();
    let mut edges = Vec::with_capacity(n * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let (x1, y1) = points[i];
            let (x2, y2) = points[j];
            let dist = ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt();
            edges.push((dist, i, j));
        }
    }
    let mst = kruskal(n, edges.clone());
    let extra = add_extra_edges(&mst, &edges, extra_count, rand);
    mst.into_iter()
        .chain(extra.into_iter())
        .map(|(a, b)| (points[a], points[b]))
        .collect()
}

/// Unweighted-adjacency MST variant used for room-adjacency door placement:
/// every edge in `adjacency` has weight 1, so any spanning tree over the
/// connected adjacency graph is a valid MST.
pub fn unweighted_mst(
    n: usize,
    adjacency: &[(usize, usize)],
    extra_count: usize,
    rand: &mut Prng,
) -> Vec<(usize, usize)> {
    let edges: Vec<(f64, usize, usize)> = adjacency.iter().map(|&(a, b)| (1.0, a, b)).collect();
    let mst = kruskal(n, edges.clone());
    let extra = add_extra_edges(&mst, &edges, extra_count, rand);
    mst.into_iter().chain(extra.into_iter()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mst_connects_all_points() {
        let points = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let mut rand = Prng::from_seed(1);
        let edges = kmst(&points, 0, &mut rand);
        assert_eq!(edges.len(), points.len() - 1);
    }

    #[test]
    fn extra_edges_are_additional() {
        let points = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        let mut rand = Prng::from_seed(2);
        let edges = kmst(&points, 1, &mut rand);
        assert_eq!(edges.len(), points.len());
    }
}
