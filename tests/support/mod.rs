use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use xsect::{codec, BlobStore, EngineConfig, LocalStore};

/// Write values in the 4-byte little-endian wire format.
#[allow(dead_code)]
pub fn write_input(store: &LocalStore, path: &str, values: &[i32]) {
    let mut sink = store.create(path).unwrap();
    for &value in values {
        sink.write_all(&codec::encode(value)).unwrap();
    }
    sink.flush().unwrap();
}

/// Write raw bytes, bypassing the codec (for malformed-input fixtures).
#[allow(dead_code)]
pub fn write_raw(store: &LocalStore, path: &str, bytes: &[u8]) {
    let mut sink = store.create(path).unwrap();
    sink.write_all(bytes).unwrap();
    sink.flush().unwrap();
}

/// Decode an artifact (one or many paths) into a sorted value list.
#[allow(dead_code)]
pub fn read_artifact_sorted(store: &LocalStore, paths: &[String]) -> Vec<i32> {
    let mut values = Vec::new();
    for path in paths {
        let len = store.len(path).unwrap() as usize;
        let bytes = store.read_at(path, 0, len).unwrap();
        values.extend(codec::decode_all(&bytes, path).unwrap());
    }
    values.sort_unstable();
    values
}

/// Seeded value stream with duplicates: `count` draws from a span of
/// `2 × distinct_span` candidate values.
#[allow(dead_code)]
pub fn generate_values(count: usize, distinct_span: i32, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| rng.random_range(-distinct_span..distinct_span))
        .collect()
}

/// Config sized so small fixtures still exercise chunking and fan-out.
#[allow(dead_code)]
pub fn small_config() -> EngineConfig {
    EngineConfig {
        partition_count: 8,
        chunk_size: 64,
        ..EngineConfig::default()
    }
}
