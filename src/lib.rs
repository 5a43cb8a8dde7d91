//! # xsect
//!
//! Out-of-core set intersection for fixed-width binary integer files.
//!
//! Given two files of 4-byte little-endian signed integers, each far
//! larger than memory, `xsect` produces a third file in the same encoding
//! holding exactly the values present in both. The pipeline is a
//! scatter-gather over a value-partitioned shuffle:
//!
//! ```text
//! input A ──ingest──▶ spill shards ┐
//!                                  ├─▶ per-partition dedup + join ─▶ shard ─▶ merge
//! input B ──ingest──▶ spill shards ┘
//! ```
//!
//! Equal values always hash to the same partition, so each partition is
//! joined independently and the union of the per-partition results is the
//! complete intersection. No partition ever holds more than a configured
//! number of distinct values in memory; a partition that would is
//! recursively sub-partitioned.
//!
//! All I/O goes through the [`BlobStore`] collaborator and all
//! parallelism through the [`ComputeSubstrate`] collaborator, both seams
//! for swapping in remote implementations.

pub mod codec;
pub mod config;
pub mod emit;
pub mod error;
pub mod ingest;
pub mod join;
pub mod merge;
pub mod partition;
pub mod store;
pub mod substrate;

// Re-export main types for convenience
pub use config::{ConfigOverrides, EngineConfig, OutputMode, Profile};
pub use error::{EngineError, Result};
pub use merge::Artifact;
pub use partition::Partitioner;
pub use store::{BlobStore, LocalStore};
pub use substrate::{ComputeSubstrate, RayonSubstrate, SerialSubstrate};

use join::JoinContext;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument};

/// Summary of a completed intersection job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Records in the output artifact (distinct common values).
    pub records: u64,
    /// Artifact length in bytes; always `4 × records`.
    pub bytes: u64,
    /// Records read from the left input, duplicates included.
    pub left_records: u64,
    /// Records read from the right input, duplicates included.
    pub right_records: u64,
    /// Partition fan-out the job ran with.
    pub partition_count: u32,
    /// Shape of the artifact.
    pub output_mode: OutputMode,
    /// Store paths making up the artifact.
    pub artifact_paths: Vec<String>,
}

/// Main API for intersection jobs.
///
/// The engine is stateless across runs: a job is a pure function of its
/// two input streams and the configuration, and re-running it yields a
/// set-equal artifact.
pub struct Engine {
    store: Box<dyn BlobStore>,
    substrate: Box<dyn ComputeSubstrate>,
    config: EngineConfig,
}

/// Distinguishes concurrent jobs' scratch directories within one process.
static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Engine {
    /// Engine over the local filesystem rooted at `root`, parallelized
    /// over the process thread pool.
    pub fn local(root: impl Into<std::path::PathBuf>, config: EngineConfig) -> Result<Self> {
        let retries = config.task_retries;
        Self::with_parts(
            config,
            Box::new(LocalStore::new(root)),
            Box::new(RayonSubstrate::new(retries)),
        )
    }

    /// Engine over a custom store, parallelized over the process thread
    /// pool.
    pub fn with_store<S>(config: EngineConfig, store: S) -> Result<Self>
    where
        S: BlobStore + 'static,
    {
        let retries = config.task_retries;
        Self::with_parts(
            config,
            Box::new(store),
            Box::new(RayonSubstrate::new(retries)),
        )
    }

    /// Fully custom engine: any store, any substrate.
    pub fn with_parts(
        config: EngineConfig,
        store: Box<dyn BlobStore>,
        substrate: Box<dyn ComputeSubstrate>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            substrate,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute the set intersection of two binary inputs and materialize
    /// it at `output`.
    ///
    /// Fails fast if either input is not a whole number of records. On any
    /// failure, scratch spills and partial shards are removed; an artifact
    /// only exists for a completed job.
    #[instrument(skip(self))]
    pub fn intersect(&self, left: &str, right: &str, output: &str) -> Result<JobReport> {
        // Validate both inputs before any work is scheduled.
        codec::check_aligned(self.store.len(left)?, left)?;
        codec::check_aligned(self.store.len(right)?, right)?;

        let scratch = self.scratch_dir();
        let shard_paths = self.shard_paths(&scratch, output);

        let result = self.run_job(left, right, output, &scratch, &shard_paths);
        if result.is_err() {
            // Never leave a partial artifact behind.
            let _ = self.store.delete_dir(&scratch);
            for shard in &shard_paths {
                let _ = self.store.delete(shard);
            }
            if self.config.output_mode == OutputMode::SingleFile {
                let _ = self.store.delete(output);
            }
        }
        result
    }

    fn run_job(
        &self,
        left: &str,
        right: &str,
        output: &str,
        scratch: &str,
        shard_paths: &[String],
    ) -> Result<JobReport> {
        let partitions = self.config.partition_count;
        let partitioner = Partitioner::new(partitions, self.config.partitioner_seed);
        let chunk_size = self.config.aligned_chunk_size();

        let spill_paths = |side: &str| -> Vec<String> {
            (0..partitions)
                .map(|index| format!("{scratch}/{side}.p{index:05}.bin"))
                .collect()
        };
        let left_spills = spill_paths("left");
        let right_spills = spill_paths("right");

        // Scatter both inputs concurrently; each is one streaming pass.
        let (left_routed, right_routed) = rayon::join(
            || ingest::scatter(self.store.as_ref(), left, &partitioner, chunk_size, &left_spills),
            || {
                ingest::scatter(
                    self.store.as_ref(),
                    right,
                    &partitioner,
                    chunk_size,
                    &right_spills,
                )
            },
        );
        let left_records = left_routed?;
        let right_records = right_routed?;

        // Every partition's spills now exist, which is the per-partition
        // barrier the join tasks need.
        let ctx = JoinContext {
            store: self.store.as_ref(),
            chunk_size,
            budget: self.config.max_partition_values,
            max_depth: self.config.max_repartition_depth,
        };
        let counts: Vec<AtomicU64> = (0..partitions).map(|_| AtomicU64::new(0)).collect();

        self.substrate.run(partitions as usize, &|index| {
            let matches = join::join_partition(
                &ctx,
                index as u32,
                &partitioner,
                &left_spills[index],
                &right_spills[index],
            )?;
            emit::write_shard(self.store.as_ref(), &shard_paths[index], &matches)?;
            // store(), not add(): a retried task overwrites its slot.
            counts[index].store(matches.len() as u64, Ordering::SeqCst);
            Ok(())
        })?;

        let records: u64 = counts.iter().map(|count| count.load(Ordering::SeqCst)).sum();
        let artifact = merge::materialize(
            self.store.as_ref(),
            shard_paths,
            output,
            self.config.output_mode,
            chunk_size,
        )?;
        self.store.delete_dir(scratch)?;

        debug_assert_eq!(artifact.bytes, records * codec::RECORD_SIZE as u64);
        info!(
            records,
            bytes = artifact.bytes,
            left_records,
            right_records,
            partitions,
            "intersection complete"
        );
        Ok(JobReport {
            records,
            bytes: artifact.bytes,
            left_records,
            right_records,
            partition_count: partitions,
            output_mode: self.config.output_mode,
            artifact_paths: artifact.paths,
        })
    }

    fn scratch_dir(&self) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let nonce = nanos ^ JOB_COUNTER.fetch_add(1, Ordering::SeqCst).rotate_left(32);
        format!("{}/job-{nonce:016x}", self.config.scratch_dir)
    }

    fn shard_paths(&self, scratch: &str, output: &str) -> Vec<String> {
        let shard_dir = match self.config.output_mode {
            // Shards are transient in single-file mode; keep them in scratch.
            OutputMode::SingleFile => format!("{scratch}/shards"),
            // In sharded mode the shards are the artifact.
            OutputMode::Sharded => output.to_string(),
        };
        (0..self.config.partition_count)
            .map(|index| format!("{shard_dir}/{}", emit::shard_name(index)))
            .collect()
    }
}
