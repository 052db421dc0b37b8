//! Shard-key routing.
//!
//! Maps a document id to one of N partitions with a 32-bit rolling string
//! hash. The mapping depends on the id alone, so any caller holding only an
//! id can re-derive which partition to query.

use std::num::NonZeroUsize;

use crate::document::Document;

/// 32-bit signed rolling hash over the UTF-16 code units of `s`.
///
/// `hash = hash * 31 + unit`, wrapping at every step. The empty string
/// hashes to 0.
pub fn hash_string(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Partition index for `id` in `[0, shards)`.
///
/// The absolute value of the hash is taken in the unsigned domain, so
/// `i32::MIN` maps to `2^31` instead of staying negative.
pub fn shard_key(shards: NonZeroUsize, id: &str) -> usize {
    hash_string(id).unsigned_abs() as usize % shards.get()
}

/// Routes documents and ids to a fixed number of shards.
#[derive(Debug, Clone, Copy)]
pub struct ShardRouter {
    shards: NonZeroUsize,
}

impl ShardRouter {
    /// Create a router over `shards` partitions.
    pub fn new(shards: NonZeroUsize) -> Self {
        Self { shards }
    }

    /// Number of partitions.
    pub fn shard_count(&self) -> usize {
        self.shards.get()
    }

    /// Partition index for an id.
    pub fn shard_for(&self, id: &str) -> usize {
        shard_key(self.shards, id)
    }

    /// Split documents into one bucket per shard, preserving input order
    /// within each bucket.
    pub fn partition_documents(&self, documents: &[Document]) -> Vec<Vec<Document>> {
        let mut buckets = vec![Vec::new(); self.shard_count()];
        for doc in documents {
            buckets[self.shard_for(&doc.id)].push(doc.clone());
        }
        buckets
    }

    /// Split ids into one bucket per shard, preserving input order.
    pub fn partition_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Vec<String>> {
        let mut buckets = vec![Vec::new(); self.shard_count()];
        for id in ids {
            let id = id.as_ref();
            buckets[self.shard_for(id)].push(id.to_string());
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Alphanumeric;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn shards(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn random_ids(count: usize, seed: u64) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(12)
                    .map(char::from)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_empty_string_hashes_to_zero() {
        assert_eq!(hash_string(""), 0);
        assert_eq!(shard_key(shards(4), ""), 0);
    }

    #[test]
    fn test_hash_matches_rolling_recurrence() {
        // 'a' = 97, 'b' = 98: 97 * 31 + 98
        assert_eq!(hash_string("a"), 97);
        assert_eq!(hash_string("ab"), 97 * 31 + 98);
        assert_eq!(hash_string("hello"), 99162322);
    }

    #[test]
    fn test_hash_wraps_at_32_bits() {
        let long = "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz";
        let mut expected: i64 = 0;
        for unit in long.encode_utf16() {
            expected = ((expected * 31 + i64::from(unit)) as i32) as i64;
        }
        assert_eq!(i64::from(hash_string(long)), expected);
    }

    #[test]
    fn test_hash_uses_utf16_code_units() {
        // U+1F600 is a surrogate pair: 0xD83D 0xDE00
        let expected = (0xD83Di32).wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(hash_string("\u{1F600}"), expected);
    }

    #[test]
    fn test_min_hash_stays_in_range() {
        // 'G' 'y' 'c' 'x' 'f' '_' wraps to exactly i32::MIN
        assert_eq!(hash_string("Gycxf_"), i32::MIN);
        // 2^31 % 3 == 2
        assert_eq!(shard_key(shards(3), "Gycxf_"), 2);
        assert_eq!(shard_key(shards(1), "Gycxf_"), 0);
        for n in 1..=64 {
            let key = shard_key(shards(n), "Gycxf_");
            assert!(key < n);
            assert_eq!(key, (1usize << 31) % n);
        }
    }

    #[test]
    fn test_shard_key_in_range() {
        for n in [1, 2, 3, 7, 10, 64] {
            for id in random_ids(500, n as u64) {
                assert!(shard_key(shards(n), &id) < n);
            }
        }
    }

    #[test]
    fn test_shard_key_is_deterministic() {
        for id in random_ids(200, 7) {
            let first = shard_key(shards(10), &id);
            for _ in 0..3 {
                assert_eq!(shard_key(shards(10), &id), first);
            }
        }
    }

    #[test]
    fn test_single_shard_routes_everything_to_zero() {
        for id in random_ids(50, 3) {
            assert_eq!(shard_key(shards(1), &id), 0);
        }
    }

    #[test]
    fn test_partition_ids_loses_nothing() {
        let router = ShardRouter::new(shards(10));
        let ids = random_ids(1000, 11);
        let buckets = router.partition_ids(&ids);

        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets.iter().map(Vec::len).sum::<usize>(), 1000);

        let mut flattened: Vec<_> = buckets.into_iter().flatten().collect();
        let mut original = ids.clone();
        flattened.sort();
        original.sort();
        assert_eq!(flattened, original);
    }

    #[test]
    fn test_partition_ids_routes_consistently() {
        let router = ShardRouter::new(shards(5));
        let ids = random_ids(100, 5);
        for (shard, bucket) in router.partition_ids(&ids).iter().enumerate() {
            for id in bucket {
                assert_eq!(router.shard_for(id), shard);
            }
        }
    }
}
