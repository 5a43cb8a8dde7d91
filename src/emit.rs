//! # Emit Stage
//!
//! Serializes one partition's intersection back into the fixed binary
//! record format and writes it as that partition's output shard. Order
//! within a shard is whatever the join produced; nothing orders shards
//! against each other.

use crate::codec;
use crate::error::{EngineError, Result};
use crate::store::BlobStore;
use std::io::Write;

/// Write `values` as a shard at `shard_path`, truncating any previous
/// attempt (a retried task simply rewrites its shard). Returns the bytes
/// written, always `4 × values.len()`.
pub fn write_shard(store: &dyn BlobStore, shard_path: &str, values: &[i32]) -> Result<u64> {
    let mut sink = store.create(shard_path)?;
    let mut buffer = Vec::with_capacity(values.len().min(1 << 18) * codec::RECORD_SIZE);
    for &value in values {
        buffer.extend_from_slice(&codec::encode(value));
        if buffer.len() >= 1 << 20 {
            sink.write_all(&buffer)
                .map_err(|e| EngineError::io(shard_path, e))?;
            buffer.clear();
        }
    }
    sink.write_all(&buffer)
        .map_err(|e| EngineError::io(shard_path, e))?;
    sink.flush().map_err(|e| EngineError::io(shard_path, e))?;
    Ok((values.len() * codec::RECORD_SIZE) as u64)
}

/// Shard path for a partition index, zero-padded so lexicographic and
/// numeric orders agree.
pub fn shard_name(index: u32) -> String {
    format!("part-{index:05}.bin")
}
