//! Record decoding.

use crate::error::{CodecError, CodecResult};
use serde::de::{DeserializeOwned, IgnoredAny};

/// Decode a record into its id and body.
///
/// # Errors
///
/// Returns an error if the bytes are not a `[id, body]` record or the body
/// does not match `T`.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(u64, T)> {
    if bytes.is_empty() {
        return Err(CodecError::invalid_structure("empty record"));
    }
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Read only the id of a record, skipping the body.
///
/// # Errors
///
/// Returns an error if the bytes are not a `[id, body]` record.
pub fn peek_record_id(bytes: &[u8]) -> CodecResult<u64> {
    let (id, _): (u64, IgnoredAny) = decode_record(bytes)?;
    Ok(id)
}
