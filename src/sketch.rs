//! Aggregate ("sketch") contract used by the skip list, and a default
//! XOR-fingerprint implementation.

use std::fmt::Debug;

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Algebraic summary of a multiset of point updates.
///
/// `merge` must be commutative, associative and self-inverse:
/// `merge(merge(a, b), b) == a`. The skip list subtracts a sub-range's
/// aggregate during splits by merging it a second time.
pub trait Sketch: Debug + Clone + PartialEq {
    /// Incorporate one point observation. Calls with distinct indices commute.
    fn update(&mut self, index: u64);
    /// Combine with another aggregate of the same parameter space.
    fn merge(&mut self, other: &Self);
    /// Reset to the identity element.
    fn zero_contents(&mut self);
    /// Seed this instance was built with. Instances fabricated during
    /// `join`/`split` must share it.
    fn get_seed(&self) -> u64;
    /// Same-seeded instance holding no updates.
    fn fresh(&self) -> Self {
        let mut s = self.clone();
        s.zero_contents();
        s
    }
}

/// Column of 64-bit buckets over GF(2): each update XORs a seed-keyed
/// fingerprint of the index into one bucket, so merge is bucket-wise XOR and
/// two sketches are equal iff they saw the same multiset of updates mod 2
/// (up to fingerprint collisions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorSketch {
    seed: u64,
    buckets: Vec<u64>,
}

impl XorSketch {
    pub fn new(len: usize, seed: u64) -> Self {
        assert!(len > 0, "sketch needs at least one bucket");
        Self {
            seed,
            buckets: vec![0; len],
        }
    }

    fn fingerprint(&self, index: u64) -> (usize, u64) {
        let mut rng = StdRng::seed_from_u64(self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let bucket = rng.gen_range(0..self.buckets.len());
        (bucket, rng.gen::<u64>() | 1)
    }

    pub fn is_zero(&self) -> bool {
        self.buckets.iter().all(|&b| b == 0)
    }
}

impl Sketch for XorSketch {
    fn update(&mut self, index: u64) {
        let (bucket, fp) = self.fingerprint(index);
        self.buckets[bucket] ^= fp;
    }

    fn merge(&mut self, other: &Self) {
        debug_assert_eq!(
            self.seed,
            other.seed,
            "merging sketches built with different seeds"
        );
        debug_assert_eq!(self.buckets.len(), other.buckets.len());
        for (b, o) in self.buckets.iter_mut().zip(&other.buckets) {
            *b ^= o;
        }
    }

    fn zero_contents(&mut self) {
        self.buckets.fill(0);
    }

    fn get_seed(&self) -> u64 {
        self.seed
    }
}
