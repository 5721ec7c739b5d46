//! Deterministic PRNG. Grounded in `tiled_master/utils/utils.py::stable_hash`
//! and the seeding calls scattered through `map_cache.py`/`element.py`
//! (`random.Random(seed)`, `create_copy(attempts)`).

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// `stable_hash(s) -> u64`: first 8 bytes of SHA-256(s), big-endian. Byte-
/// stable across runs and platforms by construction (SHA-256 has no
/// platform-dependent behavior).
pub fn stable_hash(s: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// A seeded, cloneable random source. Every component receives one of these
/// rather than touching a global generator, and every snapshot/clone
/// operation on map state clones the `Prng` along with it.
#[derive(Clone)]
pub struct Prng {
    seed: u64,
    rng: ChaCha8Rng,
}

impl Prng {
    pub fn from_seed_str(seed_str: &str) -> Self {
        Self::from_seed(stable_hash(seed_str))
    }

    pub fn from_seed(seed: u64) -> Self {
        Prng {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive a fresh, independently-seeded `Prng` for a retry attempt,
    /// matching `MapCache.create_copy(attempts)`'s re-seed from
    /// `stable_hash((old_seed, attempts))`.
    pub fn fork(&self, attempts: u64) -> Self {
        let seed = stable_hash(&format!("({}, {})", self.seed, attempts));
        Prng::from_seed(seed)
    }

    pub fn gen_range(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng.gen_range(lo, hi)
    }

    pub fn gen_range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        self.rng.gen_range(lo, hi)
    }

    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p)
    }

    pub fn gen_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0, items.len());
        items.get(idx)
    }

    /// Weighted choice (Python's `random.choices(..., weights=...)`, `k=1`).
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: &[f32]) -> Option<&'a T> {
        if items.is_empty() || items.len() != weights.len() {
            return None;
        }
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return self.choice(items);
        }
        let mut pick = self.rng.gen_range(0.0, total);
        for (item, w) in items.iter().zip(weights.iter()) {
            if pick < *w {
                return Some(item);
            }
            pick -= *w;
        }
        items.last()
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        use rand::seq::SliceRandom;
        items.shuffle(&mut self.rng);
    }

    pub fn inner_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        assert_eq!(stable_hash("abc"), stable_hash("abc"));
        assert_ne!(stable_hash("abc"), stable_hash("abd"));
    }

    #[test]
    fn stable_hash_known_vector() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        // first 8 bytes big-endian: 0xba7816bf8f01cfea
        assert_eq!(stable_hash("abc"), 0xba7816bf8f01cfea);
    }

    #[test]
    fn seeded_prng_reproduces_first_outputs() {
        let mut a = Prng::from_seed(42);
        let mut b = Prng::from_seed(42);
        let seq_a: Vec<u64> = (0..1000).map(|_| a.gen_u64()).collect();
        let seq_b: Vec<u64> = (0..1000).map(|_| b.gen_u64()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn fork_is_deterministic_given_same_attempt() {
        let base = Prng::from_seed(7);
        let mut f1 = base.fork(3);
        let mut f2 = base.fork(3);
        assert_eq!(f1.gen_u64(), f2.gen_u64());
    }
}
