//! # Ingest Stage
//!
//! Streams one binary input in bounded chunks, decodes each record, routes
//! it through the [`Partitioner`], and appends it to that partition's
//! spill shard. One pass per input; the whole file is never materialized.
//!
//! ```text
//! input stream ──chunks──▶ decode + route ──bounded channel──▶ spill writers
//!                          (reader thread)                     (caller thread)
//! ```
//!
//! The two stages overlap via a bounded channel, so decode work and spill
//! writes pipeline instead of alternating. A trailing partial record is a
//! fatal format error for the whole stage, never a silently dropped
//! record.

use crate::codec::{self, RECORD_SIZE};
use crate::error::{EngineError, Result};
use crate::partition::Partitioner;
use crate::store::BlobStore;
use crossbeam_channel::bounded;
use std::io::Write;
use std::thread;
use tracing::debug;

/// Chunks in flight between the reader and the spill writers.
const PIPELINE_DEPTH: usize = 2;

/// One decoded-and-routed chunk: encoded records grouped by partition.
type RoutedChunk = Vec<Vec<u8>>;

/// Scatter `input` into one spill shard per partition. `spill_paths[p]`
/// receives every record whose value routes to partition `p`. Returns the
/// number of records routed.
///
/// Spill shards are created (truncating any previous attempt) even when
/// they end up empty, so the join stage can treat their presence as its
/// per-partition barrier.
pub fn scatter(
    store: &dyn BlobStore,
    input: &str,
    partitioner: &Partitioner,
    chunk_size: usize,
    spill_paths: &[String],
) -> Result<u64> {
    let partitions = partitioner.partition_count() as usize;
    debug_assert_eq!(spill_paths.len(), partitions);

    let total_len = store.len(input)?;
    codec::check_aligned(total_len, input)?;

    // Whole records per read; config validation keeps this nonzero.
    let chunk_size = (chunk_size / RECORD_SIZE).max(1) * RECORD_SIZE;

    let mut sinks = spill_paths
        .iter()
        .map(|path| store.create(path))
        .collect::<Result<Vec<_>>>()?;

    let (chunk_tx, chunk_rx) = bounded::<RoutedChunk>(PIPELINE_DEPTH);

    let routed = thread::scope(|scope| -> Result<u64> {
        let reader = scope.spawn(move || -> Result<u64> {
            let mut offset = 0u64;
            let mut routed = 0u64;
            while offset < total_len {
                let want = chunk_size.min((total_len - offset) as usize);
                let chunk = store.read_at(input, offset, want)?;
                if chunk.is_empty() {
                    return Err(EngineError::format(
                        input,
                        offset,
                        "stream ended before its reported length",
                    ));
                }
                if chunk.len() % RECORD_SIZE != 0 {
                    let aligned = (chunk.len() / RECORD_SIZE * RECORD_SIZE) as u64;
                    return Err(EngineError::format(
                        input,
                        offset + aligned,
                        "read returned a partial record",
                    ));
                }

                let mut buckets: RoutedChunk = vec![Vec::new(); partitions];
                for raw in chunk.chunks_exact(RECORD_SIZE) {
                    let value = codec::decode(raw)?;
                    let target = partitioner.partition_of(value) as usize;
                    buckets[target].extend_from_slice(&codec::encode(value));
                    routed += 1;
                }
                offset += chunk.len() as u64;

                // A closed channel means the writer bailed; it reports the
                // real error.
                if chunk_tx.send(buckets).is_err() {
                    break;
                }
            }
            Ok(routed)
        });

        let mut write_error: Option<EngineError> = None;
        while let Ok(buckets) = chunk_rx.recv() {
            for (index, bytes) in buckets.iter().enumerate() {
                if bytes.is_empty() {
                    continue;
                }
                if let Err(e) = sinks[index].write_all(bytes) {
                    write_error = Some(EngineError::io(&spill_paths[index], e));
                    break;
                }
            }
            if write_error.is_some() {
                break;
            }
        }
        drop(chunk_rx);

        let read_result = reader.join().expect("scatter reader panicked");
        if let Some(error) = write_error {
            return Err(error);
        }
        read_result
    })?;

    for (index, sink) in sinks.iter_mut().enumerate() {
        sink.flush()
            .map_err(|e| EngineError::io(&spill_paths[index], e))?;
    }

    debug!(input, routed, partitions, "scatter complete");
    Ok(routed)
}
