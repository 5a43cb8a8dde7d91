//! Configuration for intersection jobs.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (xsect.toml)
//! ```toml
//! profile = "memory-saver"
//! partition_count = 256
//! chunk_size = 4194304
//! output_mode = "single-file"
//! scratch_dir = "scratch"
//! ```

use crate::codec::RECORD_SIZE;
use crate::error::{EngineError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default shard fan-out. Chosen so a partition's distinct values fit one
/// worker's memory envelope for inputs in the tens of gigabytes.
pub const DEFAULT_PARTITION_COUNT: u32 = 64;
/// Default bytes per ingest read.
pub const DEFAULT_CHUNK_SIZE: usize = 8 << 20;
/// Default cap on the distinct values materialized per partition.
pub const DEFAULT_MAX_PARTITION_VALUES: usize = 32_000_000;
/// Default cap on recursive sub-partitioning of an overflowing partition.
pub const DEFAULT_MAX_REPARTITION_DEPTH: u32 = 2;
/// Default retry count for a failed partition task.
pub const DEFAULT_TASK_RETRIES: u32 = 2;

/// Main configuration for an intersection job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tuning profile applied before explicit overrides.
    pub profile: Profile,
    /// Number of partitions the value domain is sharded into.
    pub partition_count: u32,
    /// Bytes read per I/O operation during ingest.
    pub chunk_size: usize,
    /// Shape of the final artifact.
    pub output_mode: OutputMode,
    /// Maximum distinct values materialized for one partition before it is
    /// sub-partitioned.
    pub max_partition_values: usize,
    /// Maximum recursive sub-partitioning depth before the job reports
    /// resource exhaustion.
    pub max_repartition_depth: u32,
    /// Retries for a failed partition task (transient I/O only).
    pub task_retries: u32,
    /// Store directory holding per-job spill shards.
    pub scratch_dir: String,
    /// Seed for the value partitioner. Any fixed value works; it exists so
    /// tests can exercise different routings.
    pub partitioner_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Balanced,
            partition_count: DEFAULT_PARTITION_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_mode: OutputMode::SingleFile,
            max_partition_values: DEFAULT_MAX_PARTITION_VALUES,
            max_repartition_depth: DEFAULT_MAX_REPARTITION_DEPTH,
            task_retries: DEFAULT_TASK_RETRIES,
            scratch_dir: "scratch".to_string(),
            partitioner_seed: 0,
        }
    }
}

impl EngineConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with XSECT_ prefix
        figment = figment.merge(Env::prefixed("XSECT_"));

        // Layer 3: CLI overrides
        figment = figment.merge(Serialized::defaults(overrides));

        let extracted: EngineConfig = figment
            .extract()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let profile = extracted.profile;
        let config = profile.apply(extracted);
        config.validate()?;
        Ok(config)
    }

    /// Build a config straight from a profile, skipping file and env.
    pub fn from_profile(profile: Profile) -> Self {
        profile.apply(Self {
            profile,
            ..Self::default()
        })
    }

    /// Check the invariants the pipeline assumes.
    pub fn validate(&self) -> Result<()> {
        if self.partition_count == 0 {
            return Err(EngineError::Config(
                "partition_count must be at least 1".into(),
            ));
        }
        if self.chunk_size < RECORD_SIZE {
            return Err(EngineError::Config(format!(
                "chunk_size must be at least {RECORD_SIZE} bytes, got {}",
                self.chunk_size
            )));
        }
        if self.max_partition_values == 0 {
            return Err(EngineError::Config(
                "max_partition_values must be at least 1".into(),
            ));
        }
        if self.scratch_dir.is_empty() {
            return Err(EngineError::Config("scratch_dir must not be empty".into()));
        }
        Ok(())
    }

    /// Chunk size rounded down to a whole number of records. Validation
    /// guarantees this never reaches zero.
    pub fn aligned_chunk_size(&self) -> usize {
        (self.chunk_size / RECORD_SIZE) * RECORD_SIZE
    }
}

/// Tuning profile presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Balanced settings for general workloads
    #[default]
    Balanced,
    /// Larger chunks and fewer, bigger partitions
    HighThroughput,
    /// Small partitions and small chunks for tight memory envelopes
    MemorySaver,
    /// Wide fan-out for inputs of tens of billions of records
    HugeInputs,
}

impl Profile {
    /// Overlay the profile's preset knobs on a config. A knob the user set
    /// explicitly (file, env, or CLI) is left alone; only fields still at
    /// their stock defaults take the profile value.
    fn apply(self, mut config: EngineConfig) -> EngineConfig {
        let defaults = EngineConfig::default();
        let preset = self.preset();
        if config.partition_count == defaults.partition_count {
            config.partition_count = preset.partition_count;
        }
        if config.chunk_size == defaults.chunk_size {
            config.chunk_size = preset.chunk_size;
        }
        if config.max_partition_values == defaults.max_partition_values {
            config.max_partition_values = preset.max_partition_values;
        }
        if config.max_repartition_depth == defaults.max_repartition_depth {
            config.max_repartition_depth = preset.max_repartition_depth;
        }
        config
    }

    fn preset(self) -> EngineConfig {
        let mut preset = EngineConfig::default();
        match self {
            Profile::Balanced => {}
            Profile::HighThroughput => {
                preset.partition_count = 32;
                preset.chunk_size = 32 << 20;
                preset.max_partition_values = 64_000_000;
            }
            Profile::MemorySaver => {
                preset.partition_count = 256;
                preset.chunk_size = 1 << 20;
                preset.max_partition_values = 4_000_000;
            }
            Profile::HugeInputs => {
                preset.partition_count = 1024;
                preset.chunk_size = 16 << 20;
                preset.max_partition_values = 16_000_000;
                preset.max_repartition_depth = 3;
            }
        }
        preset
    }
}

/// Shape of the final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Byte-concatenate all shards, in ascending shard index, into one file.
    #[default]
    SingleFile,
    /// The shard directory itself is the artifact.
    Sharded,
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mode: Option<OutputMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_partition_values: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_repartition_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.partition_count, DEFAULT_PARTITION_COUNT);
        assert_eq!(config.output_mode, OutputMode::SingleFile);
        assert_eq!(config.aligned_chunk_size() % RECORD_SIZE, 0);
    }

    #[test]
    fn profiles_reshape_the_fanout() {
        let huge = EngineConfig::from_profile(Profile::HugeInputs);
        assert_eq!(huge.partition_count, 1024);
        assert_eq!(huge.max_repartition_depth, 3);

        let saver = EngineConfig::from_profile(Profile::MemorySaver);
        assert!(saver.max_partition_values < huge.max_partition_values);
    }

    #[test]
    fn overrides_win_over_profile() {
        let overrides = ConfigOverrides {
            profile: Some(Profile::MemorySaver),
            partition_count: Some(7),
            ..ConfigOverrides::default()
        };
        let config = EngineConfig::load(None, overrides).unwrap();
        assert_eq!(config.partition_count, 7);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let mut config = EngineConfig::default();
        config.partition_count = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.chunk_size = 3;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_partition_values = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn enums_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&OutputMode::SingleFile).unwrap(),
            "\"single-file\""
        );
        assert_eq!(
            serde_json::to_string(&Profile::HighThroughput).unwrap(),
            "\"high-throughput\""
        );
        let mode: OutputMode = serde_json::from_str("\"sharded\"").unwrap();
        assert_eq!(mode, OutputMode::Sharded);
    }
}
