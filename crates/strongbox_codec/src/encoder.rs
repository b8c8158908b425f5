//! Reusable record encoder.

use crate::error::{CodecError, CodecResult};
use bytes::Bytes;
use serde::Serialize;

/// Encode one record into a fresh buffer.
///
/// Convenience for callers that do not keep an encoder around.
///
/// # Errors
///
/// Returns an error if `body` fails to serialize.
pub fn encode_record<T: Serialize + ?Sized>(id: u64, body: &T) -> CodecResult<Vec<u8>> {
    let mut encoder = RecordEncoder::new();
    encoder.encode(id, body)?;
    Ok(encoder.into_bytes())
}

/// Serializes objects into record bytes.
///
/// A record is the CBOR array `[id, body]`. The encoder owns its output
/// buffer and keeps the allocation between records, so one encoder can
/// serve many writes. Every [`encode`](Self::encode) call replaces the
/// previous contents.
#[derive(Debug, Default)]
pub struct RecordEncoder {
    buffer: Vec<u8>,
}

impl RecordEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a record, replacing the current contents.
    ///
    /// On failure the encoder is left empty.
    pub fn encode<T: Serialize + ?Sized>(&mut self, id: u64, body: &T) -> CodecResult<&[u8]> {
        self.buffer.clear();
        if let Err(e) = ciborium::ser::into_writer(&(id, body), &mut self.buffer) {
            self.buffer.clear();
            return Err(CodecError::encoding_failed(e.to_string()));
        }
        Ok(&self.buffer)
    }

    /// Drop the contents but keep the allocation.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Size of the retained allocation.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Length of the encoded record.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is encoded.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Copy the encoded bytes out, leaving the encoder reusable.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    /// Copy the encoded bytes into a shared buffer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buffer)
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Error as _, Serializer};

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn record_is_id_body_pair() {
        let bytes = encode_record(5, "hi").unwrap();
        // array(2), unsigned(5), text(2) "hi"
        assert_eq!(bytes, vec![0x82, 0x05, 0x62, b'h', b'i']);
    }

    #[test]
    fn encode_replaces_previous_record() {
        let mut encoder = RecordEncoder::new();
        encoder.encode(1, &vec![1u8; 64]).unwrap();
        let first_len = encoder.len();
        encoder.encode(2, &0u8).unwrap();
        assert!(encoder.len() < first_len);
        assert_eq!(encoder.as_bytes(), &[0x82, 0x02, 0x00]);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut encoder = RecordEncoder::with_capacity(256);
        encoder.encode(1, "payload").unwrap();
        encoder.reset();
        assert!(encoder.is_empty());
        assert!(encoder.capacity() >= 256);
    }

    #[test]
    fn failed_encode_leaves_encoder_empty() {
        let mut encoder = RecordEncoder::new();
        encoder.encode(1, "ok").unwrap();
        let err = encoder.encode(2, &Unserializable).unwrap_err();
        assert!(matches!(err, CodecError::EncodingFailed { .. }));
        assert!(encoder.is_empty());
    }

    #[test]
    fn copies_are_independent() {
        let mut encoder = RecordEncoder::new();
        encoder.encode(1, "a").unwrap();
        let copy = encoder.to_vec();
        let shared = encoder.to_bytes();
        encoder.encode(2, "b").unwrap();
        assert_eq!(copy, shared.to_vec());
        assert_ne!(copy, encoder.as_bytes());
    }
}
