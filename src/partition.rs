//! # Value Partitioner
//!
//! Deterministic routing of values to partitions. Equal values always map
//! to the same partition regardless of which input or which task produced
//! them; that disjointness is what lets every partition be joined
//! independently with no cross-partition coordination.
//!
//! The raw value is never used modulo the partition count directly: input
//! generators can carry modular structure in the low bits, which would
//! skew partition sizes. Instead the bit pattern is run through
//! [`FxHasher`] together with a seed, and the partition index is taken
//! from the hash's high bits.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Salt mixed into the seed at each sub-partitioning depth so a skewed
/// hash class re-shuffles instead of collapsing into one sub-partition.
const DEPTH_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Maps a value to a partition index in `[0, partition_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    partition_count: u32,
    seed: u64,
}

impl Partitioner {
    /// Top-level partitioner for a job. `partition_count` must be nonzero;
    /// configuration validation enforces that before any partitioner is
    /// built.
    pub fn new(partition_count: u32, seed: u64) -> Self {
        debug_assert!(partition_count > 0, "partition_count must be nonzero");
        Self {
            partition_count,
            seed,
        }
    }

    /// Number of partitions this partitioner routes into.
    #[inline]
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Route a value to its partition. Pure function of the value, the
    /// partition count, and the seed.
    #[inline]
    pub fn partition_of(&self, value: i32) -> u32 {
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        value.hash(&mut hasher);
        let mixed = hasher.finish();
        // High bits: the low bits of a multiplicative hash keep too much
        // of the input's modular structure.
        ((mixed >> 32) % u64::from(self.partition_count)) as u32
    }

    /// Derive the partitioner used to split one overflowing partition into
    /// `fanout` sub-partitions at the given depth. A different depth gives
    /// a different seed, so values that collided at the parent level
    /// spread out again.
    pub fn subpartitioner(&self, fanout: u32, depth: u32) -> Partitioner {
        Partitioner::new(
            fanout,
            self.seed ^ DEPTH_SALT.wrapping_mul(u64::from(depth).wrapping_add(1)),
        )
    }
}
