//! # Merge / Materialize
//!
//! Assembles per-partition shards into the final artifact. Two shapes are
//! supported: byte-concatenation into one file in ascending shard index,
//! or exposing the shard directory itself as the artifact. Either way the
//! artifact's total byte length is exactly `4 × emitted record count`.

use crate::config::OutputMode;
use crate::error::{EngineError, Result};
use crate::store::{copy_blob, BlobStore};
use std::io::Write;
use tracing::debug;

/// How the final artifact ended up on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Paths making up the artifact: one path in single-file mode, one per
    /// shard in sharded mode.
    pub paths: Vec<String>,
    /// Total artifact length in bytes.
    pub bytes: u64,
}

/// Materialize `shard_paths` (already in ascending shard index order) as
/// the artifact at `output`.
///
/// Single-file mode concatenates the shards into `output` and deletes
/// them; sharded mode leaves them in place as the artifact.
pub fn materialize(
    store: &dyn BlobStore,
    shard_paths: &[String],
    output: &str,
    mode: OutputMode,
    chunk_size: usize,
) -> Result<Artifact> {
    match mode {
        OutputMode::SingleFile => {
            let mut sink = store.create(output)?;
            let mut bytes = 0u64;
            for shard in shard_paths {
                bytes += copy_blob(store, shard, sink.as_mut(), chunk_size)?;
            }
            sink.flush().map_err(|e| EngineError::io(output, e))?;
            drop(sink);
            for shard in shard_paths {
                store.delete(shard)?;
            }
            debug!(output, bytes, shards = shard_paths.len(), "single-file artifact");
            Ok(Artifact {
                paths: vec![output.to_string()],
                bytes,
            })
        }
        OutputMode::Sharded => {
            let mut bytes = 0u64;
            for shard in shard_paths {
                bytes += store.len(shard)?;
            }
            debug!(output, bytes, shards = shard_paths.len(), "sharded artifact");
            Ok(Artifact {
                paths: shard_paths.to_vec(),
                bytes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::store::LocalStore;
    use std::io::Write;

    fn write_shard(store: &LocalStore, path: &str, values: &[i32]) {
        let mut sink = store.create(path).unwrap();
        for &value in values {
            sink.write_all(&codec::encode(value)).unwrap();
        }
        sink.flush().unwrap();
    }

    #[test]
    fn single_file_concatenates_in_shard_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        write_shard(&store, "out/part-00000.bin", &[1, 2]);
        write_shard(&store, "out/part-00001.bin", &[]);
        write_shard(&store, "out/part-00002.bin", &[3]);

        let shards = vec![
            "out/part-00000.bin".to_string(),
            "out/part-00001.bin".to_string(),
            "out/part-00002.bin".to_string(),
        ];
        let artifact = materialize(
            &store,
            &shards,
            "result.bin",
            OutputMode::SingleFile,
            1024,
        )
        .unwrap();

        assert_eq!(artifact.bytes, 12);
        assert_eq!(artifact.paths, vec!["result.bin".to_string()]);
        let raw = store.read_at("result.bin", 0, 64).unwrap();
        assert_eq!(codec::decode_all(&raw, "result").unwrap(), vec![1, 2, 3]);
        // Shards are consumed by the merge.
        assert!(!store.exists("out/part-00000.bin").unwrap());
    }

    #[test]
    fn sharded_mode_leaves_shards_as_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        write_shard(&store, "out/part-00000.bin", &[1, 2]);
        write_shard(&store, "out/part-00001.bin", &[3]);

        let shards = vec![
            "out/part-00000.bin".to_string(),
            "out/part-00001.bin".to_string(),
        ];
        let artifact =
            materialize(&store, &shards, "out", OutputMode::Sharded, 1024).unwrap();

        assert_eq!(artifact.bytes, 12);
        assert_eq!(artifact.paths, shards);
        assert!(store.exists("out/part-00001.bin").unwrap());
    }

    #[test]
    fn empty_job_yields_zero_byte_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        write_shard(&store, "out/part-00000.bin", &[]);

        let shards = vec!["out/part-00000.bin".to_string()];
        let artifact = materialize(
            &store,
            &shards,
            "result.bin",
            OutputMode::SingleFile,
            1024,
        )
        .unwrap();
        assert_eq!(artifact.bytes, 0);
        assert_eq!(store.len("result.bin").unwrap(), 0);
    }
}
