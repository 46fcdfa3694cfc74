use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::errors::GenerationError;

/// Table of `(item, weight)` pairs with a single reusable draw routine.
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    items: Vec<T>,
    cumulative: Vec<f64>,
    total: f64,
}

impl<T: Copy> WeightedTable<T> {
    /// Build a table; fails on an empty table, a non-positive weight or a
    /// total that is not finite.
    pub fn new(
        entries: impl IntoIterator<Item = (T, f64)>,
        ctx: &str,
    ) -> Result<Self, GenerationError> {
        let mut items = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0.0;

        for (item, weight) in entries {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(GenerationError::Configuration(format!(
                    "{ctx}: weight must be finite and > 0 (got {weight})"
                )));
            }
            total += weight;
            items.push(item);
            cumulative.push(total);
        }

        if items.is_empty() {
            return Err(GenerationError::Configuration(format!(
                "{ctx}: no weighted entries"
            )));
        }
        if !total.is_finite() {
            return Err(GenerationError::Configuration(format!(
                "{ctx}: total weight overflows"
            )));
        }

        Ok(Self {
            items,
            cumulative,
            total,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let roll = rng.random_range(0.0..self.total);
        let idx = self.cumulative.partition_point(|bound| *bound <= roll);
        self.items[idx.min(self.items.len() - 1)]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

/// Derive an independent seed for a named phase of a run.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Reproducible random stream for a named phase of a run.
pub fn stream_rng(seed: u64, key: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(hash_seed(seed, key))
}

/// Split `0..count` into at most `shards` contiguous, non-empty ranges.
pub fn shard_ranges(count: usize, shards: usize) -> Vec<Range<usize>> {
    let shards = shards.max(1).min(count.max(1));
    let base = count / shards;
    let extra = count % shards;
    let mut ranges = Vec::with_capacity(shards);
    let mut start = 0;
    for shard in 0..shards {
        let len = base + usize::from(shard < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Split `total` into `parts` near-equal shares that sum to `total`.
pub fn split_evenly(total: usize, parts: usize) -> Vec<usize> {
    let parts = parts.max(1);
    (0..parts)
        .map(|part| total / parts + usize::from(part < total % parts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_table_rejects_bad_weights() {
        assert!(WeightedTable::new([("a", 0.0)], "test").is_err());
        assert!(WeightedTable::new([("a", f64::NAN)], "test").is_err());
        assert!(WeightedTable::<&str>::new([], "test").is_err());
        assert!(WeightedTable::new([("a", f64::MAX), ("b", f64::MAX)], "test").is_err());
    }

    #[test]
    fn weighted_table_follows_weights() {
        let table = WeightedTable::new([("heavy", 9.0), ("light", 1.0)], "test").unwrap();
        let mut rng = stream_rng(1, "weights");
        let heavy = (0..10_000)
            .filter(|_| table.sample(&mut rng) == "heavy")
            .count();
        assert!((8_500..9_500).contains(&heavy), "heavy drawn {heavy} times");
    }

    #[test]
    fn single_entry_always_wins() {
        let table = WeightedTable::new([(7_u8, 0.25)], "test").unwrap();
        let mut rng = stream_rng(3, "single");
        assert!((0..100).all(|_| table.sample(&mut rng) == 7));
    }

    #[test]
    fn streams_are_reproducible_and_distinct() {
        let a: u64 = stream_rng(5, "nodes/0").random();
        let b: u64 = stream_rng(5, "nodes/0").random();
        let c: u64 = stream_rng(5, "nodes/1").random();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn shard_ranges_cover_everything() {
        let ranges = shard_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
        assert_eq!(shard_ranges(2, 8).len(), 2);
        assert_eq!(shard_ranges(0, 4), vec![0..0]);
        assert_eq!(split_evenly(7, 3), vec![3, 2, 2]);
        assert_eq!(split_evenly(7, 3).iter().sum::<usize>(), 7);
    }
}
