//! # Record Codec
//!
//! Bidirectional mapping between the fixed 4-byte little-endian wire form
//! and native `i32` values. Both inputs and the output artifact use this
//! encoding: no header, no footer, no separators.

use crate::error::{EngineError, Result};

/// Width of one record on the wire, in bytes.
pub const RECORD_SIZE: usize = 4;

/// Encode a value into its 4-byte little-endian record.
#[inline]
pub fn encode(value: i32) -> [u8; RECORD_SIZE] {
    value.to_le_bytes()
}

/// Decode exactly one record. The slice must be exactly [`RECORD_SIZE`]
/// bytes; anything else is a format error.
#[inline]
pub fn decode(bytes: &[u8]) -> Result<i32> {
    let record: [u8; RECORD_SIZE] = bytes.try_into().map_err(|_| {
        EngineError::format(
            "<slice>",
            0,
            format!(
                "expected a {RECORD_SIZE}-byte record, got {} bytes",
                bytes.len()
            ),
        )
    })?;
    Ok(i32::from_le_bytes(record))
}

/// Decode a whole buffer of records. Fails if the buffer is not a whole
/// number of records; `input` names the source stream in the error.
pub fn decode_all(bytes: &[u8], input: &str) -> Result<Vec<i32>> {
    check_aligned(bytes.len() as u64, input)?;
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Verify that a stream length is a whole number of records. The error
/// offset points at the start of the trailing partial record.
pub fn check_aligned(len: u64, input: &str) -> Result<()> {
    let remainder = len % RECORD_SIZE as u64;
    if remainder == 0 {
        return Ok(());
    }
    Err(EngineError::format(
        input,
        len - remainder,
        format!(
            "stream length {len} is not a multiple of {RECORD_SIZE}; \
             trailing partial record of {remainder} byte(s)"
        ),
    ))
}

/// Number of records in a stream of `len` bytes. Callers must have
/// validated alignment first.
#[inline]
pub fn record_count(len: u64) -> u64 {
    len / RECORD_SIZE as u64
}
