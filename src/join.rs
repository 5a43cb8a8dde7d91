//! # Dedup-and-Join Stage
//!
//! Per-partition set intersection. The partitioner guarantees that equal
//! values from both inputs landed in the same partition, so each partition
//! is joined in isolation and the union of the per-partition results is
//! the full answer, with no cross-partition dedup step.
//!
//! The smaller spill side is deduplicated into an in-memory hash set (the
//! build side); the larger side streams past it (the probe side). A probe
//! hit removes the value from the build set, so every common value is
//! emitted exactly once: intersection of sets, not multisets.
//!
//! If the build side's distinct count overflows the memory budget, the
//! partition is re-scattered into sub-partitions with a depth-salted hash
//! and joined recursively. Past `max_depth` the job reports resource
//! exhaustion instead of degrading silently.

use crate::codec::{self, RECORD_SIZE};
use crate::error::{EngineError, Result};
use crate::ingest;
use crate::partition::Partitioner;
use crate::store::BlobStore;
use rustc_hash::FxHashSet;
use tracing::debug;

/// Sub-partitions one overflowing partition splits into, per level.
pub const SUBPARTITION_FANOUT: u32 = 8;

/// Shared parameters for all join tasks of one job.
#[derive(Clone, Copy)]
pub struct JoinContext<'a> {
    pub store: &'a dyn BlobStore,
    /// Bytes per spill read.
    pub chunk_size: usize,
    /// Cap on the build side's distinct values per (sub)partition.
    pub budget: usize,
    /// Recursion limit for sub-partitioning.
    pub max_depth: u32,
}

/// Join one partition's two spill shards and return the intersecting
/// values, each exactly once, in probe order.
pub fn join_partition(
    ctx: &JoinContext<'_>,
    partition: u32,
    partitioner: &Partitioner,
    left_spill: &str,
    right_spill: &str,
) -> Result<Vec<i32>> {
    join_at_depth(ctx, partition, partitioner, left_spill, right_spill, 0)
}

fn join_at_depth(
    ctx: &JoinContext<'_>,
    partition: u32,
    partitioner: &Partitioner,
    left_spill: &str,
    right_spill: &str,
    depth: u32,
) -> Result<Vec<i32>> {
    let left_len = ctx.store.len(left_spill)?;
    let right_len = ctx.store.len(right_spill)?;
    if left_len == 0 || right_len == 0 {
        return Ok(Vec::new());
    }

    // Build from the smaller side; only its distinct values are ever
    // materialized.
    let (build_spill, probe_spill) = if left_len <= right_len {
        (left_spill, right_spill)
    } else {
        (right_spill, left_spill)
    };

    match build_set(ctx, build_spill)? {
        BuildOutcome::Built(mut set) => {
            let mut matches = Vec::new();
            let mut offset = 0u64;
            loop {
                let chunk = ctx
                    .store
                    .read_at(probe_spill, offset, aligned_chunk(ctx.chunk_size))?;
                if chunk.is_empty() {
                    break;
                }
                offset += chunk.len() as u64;
                for value in codec::decode_all(&chunk, probe_spill)? {
                    // take(): a second occurrence of the same value can
                    // never match again.
                    if set.take(&value).is_some() {
                        matches.push(value);
                    }
                }
            }
            debug!(partition, depth, matches = matches.len(), "partition joined");
            Ok(matches)
        }
        BuildOutcome::Overflow { distinct } => {
            if depth >= ctx.max_depth {
                return Err(EngineError::ResourceExhaustion {
                    partition,
                    depth,
                    distinct,
                    budget: ctx.budget,
                });
            }
            debug!(partition, depth, distinct, "budget overflow, sub-partitioning");
            subdivide(ctx, partition, partitioner, left_spill, right_spill, depth)
        }
    }
}

/// Re-scatter both spills of an overflowing partition into
/// [`SUBPARTITION_FANOUT`] sub-partitions and join each pair recursively.
/// Sub-partition results are disjoint, so plain concatenation is correct.
fn subdivide(
    ctx: &JoinContext<'_>,
    partition: u32,
    partitioner: &Partitioner,
    left_spill: &str,
    right_spill: &str,
    depth: u32,
) -> Result<Vec<i32>> {
    let next_depth = depth + 1;
    let sub = partitioner.subpartitioner(SUBPARTITION_FANOUT, next_depth);

    let sub_paths = |parent: &str| -> Vec<String> {
        (0..SUBPARTITION_FANOUT)
            .map(|index| format!("{parent}.s{index}"))
            .collect()
    };
    let left_subs = sub_paths(left_spill);
    let right_subs = sub_paths(right_spill);

    ingest::scatter(ctx.store, left_spill, &sub, ctx.chunk_size, &left_subs)?;
    ingest::scatter(ctx.store, right_spill, &sub, ctx.chunk_size, &right_subs)?;

    let mut matches = Vec::new();
    for index in 0..SUBPARTITION_FANOUT as usize {
        let mut sub_matches = join_at_depth(
            ctx,
            partition,
            partitioner,
            &left_subs[index],
            &right_subs[index],
            next_depth,
        )?;
        matches.append(&mut sub_matches);
    }

    // Bound scratch space: sub-spills are dead once joined.
    for path in left_subs.iter().chain(right_subs.iter()) {
        ctx.store.delete(path)?;
    }
    Ok(matches)
}

enum BuildOutcome {
    Built(FxHashSet<i32>),
    Overflow { distinct: usize },
}

/// Spill reads must land on record boundaries.
fn aligned_chunk(chunk_size: usize) -> usize {
    (chunk_size / RECORD_SIZE).max(1) * RECORD_SIZE
}

/// Stream a spill into a deduplicated set, bailing out as soon as the
/// distinct count passes the budget.
fn build_set(ctx: &JoinContext<'_>, spill: &str) -> Result<BuildOutcome> {
    let mut set = FxHashSet::default();
    let mut offset = 0u64;
    loop {
        let chunk = ctx
            .store
            .read_at(spill, offset, aligned_chunk(ctx.chunk_size))?;
        if chunk.is_empty() {
            return Ok(BuildOutcome::Built(set));
        }
        offset += chunk.len() as u64;
        for value in codec::decode_all(&chunk, spill)? {
            set.insert(value);
            if set.len() > ctx.budget {
                return Ok(BuildOutcome::Overflow {
                    distinct: set.len(),
                });
            }
        }
    }
}
