//! Error types for the intersection engine.

use thiserror::Error;

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the intersection engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input stream is not a whole number of 4-byte records, or a
    /// decode call was handed a malformed slice. Fatal for the affected
    /// stream; no partial output is considered valid.
    #[error("format error in {input} at byte {offset}: {detail}")]
    Format {
        /// Store path of the offending stream (or a slice label).
        input: String,
        /// Byte offset where the malformed data starts.
        offset: u64,
        /// Human-readable description of the violation.
        detail: String,
    },

    /// A partition's working set exceeded the configured budget even at
    /// the maximum sub-partitioning depth. Recoverable by raising
    /// `partition_count` or `max_partition_values` and re-running.
    #[error(
        "partition {partition} exhausted its memory budget at depth {depth}: \
         {distinct}+ distinct values against a budget of {budget}"
    )]
    ResourceExhaustion {
        /// Top-level partition index that overflowed.
        partition: u32,
        /// Sub-partitioning depth reached before giving up.
        depth: u32,
        /// Distinct values observed when the budget was breached.
        distinct: usize,
        /// Configured per-partition distinct-value budget.
        budget: usize,
    },

    /// An I/O failure from the blob store, propagated untouched. Retry
    /// policy belongs to the store implementation or the compute
    /// substrate, not the engine.
    #[error("I/O error on {path}")]
    Io {
        /// Store path the operation was addressing.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Build a format error for a stream position.
    pub fn format(input: impl Into<String>, offset: u64, detail: impl Into<String>) -> Self {
        Self::Format {
            input: input.into(),
            offset,
            detail: detail.into(),
        }
    }

    /// Wrap an I/O error with the store path it hit.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when re-running the same task may succeed (transient I/O).
    /// Format and exhaustion errors are deterministic and never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// True when the error indicates malformed input data.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_names_input_and_offset() {
        let err = EngineError::format("inputs/a.bin", 4096, "trailing partial record");
        let text = err.to_string();
        assert!(text.contains("inputs/a.bin"));
        assert!(text.contains("4096"));
        assert!(err.is_format());
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_io_errors_are_retryable() {
        let io = EngineError::io(
            "shards/part-00001.bin",
            std::io::Error::other("transient"),
        );
        assert!(io.is_retryable());

        let exhausted = EngineError::ResourceExhaustion {
            partition: 3,
            depth: 2,
            distinct: 1_000_001,
            budget: 1_000_000,
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.to_string().contains("partition 3"));
    }
}
