//! Deterministic random number generation for demo data.
//!
//! RULE: the seeder never calls a platform RNG. Every draw comes from a
//! `SeedRng` stream derived from one master seed, so the same seed
//! always produces the same customers and readings.
//!
//! Each purpose gets its own stream, seeded from
//! (master_seed XOR stream_index * golden ratio). Drawing more names
//! never shifts the consumption figures.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeedRng {
    pub stream: DemoStream,
    inner:      Pcg64Mcg,
}

impl SeedRng {
    pub fn new(master_seed: u64, stream: DemoStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            stream,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Draw a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Draw a u64 in [low, high].
    pub fn range_inclusive(&mut self, low: u64, high: u64) -> u64 {
        assert!(low <= high, "empty range {low}..={high}");
        low + self.next_u64_below(high - low + 1)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let index = self.next_u64_below(items.len() as u64) as usize;
        &items[index]
    }
}

/// Stable stream assignments. Append only: reordering reseeds every stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum DemoStream {
    Names       = 0,
    Addresses   = 1,
    Consumption = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_draws() {
        let mut a = SeedRng::new(42, DemoStream::Consumption);
        let mut b = SeedRng::new(42, DemoStream::Consumption);
        for _ in 0..20 {
            assert_eq!(a.next_u64_below(1_000), b.next_u64_below(1_000));
        }
    }

    #[test]
    fn streams_are_independent() {
        let mut names = SeedRng::new(42, DemoStream::Names);
        let mut usage = SeedRng::new(42, DemoStream::Consumption);
        let a: Vec<u64> = (0..8).map(|_| names.next_u64_below(u64::MAX)).collect();
        let b: Vec<u64> = (0..8).map(|_| usage.next_u64_below(u64::MAX)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn range_inclusive_stays_in_bounds() {
        let mut rng = SeedRng::new(7, DemoStream::Consumption);
        for _ in 0..200 {
            let v = rng.range_inclusive(5, 9);
            assert!((5..=9).contains(&v));
        }
    }
}
