//! # Strongbox Codec
//!
//! Record encoding for Strongbox objects.
//!
//! A stored record is the CBOR array `[id, body]`, where `body` is the
//! object serialized with `serde`. Keeping the id inside the record lets a
//! reader recover it without consulting the engine key.
//!
//! Encoding goes through a [`RecordEncoder`], which keeps its buffer
//! between records so a pool of encoders can serve many writes without
//! reallocating.
//!
//! ## Usage
//!
//! ```
//! use strongbox_codec::{decode_record, RecordEncoder};
//!
//! let mut encoder = RecordEncoder::new();
//! let bytes = encoder.encode(42, "hello").unwrap().to_vec();
//!
//! let (id, body): (u64, String) = decode_record(&bytes).unwrap();
//! assert_eq!(id, 42);
//! assert_eq!(body, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::{decode_record, peek_record_id};
pub use encoder::{encode_record, RecordEncoder};
pub use error::{CodecError, CodecResult};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        device: String,
        value: i64,
        samples: Option<Vec<u16>>,
    }

    fn arb_reading() -> impl Strategy<Value = Reading> {
        (
            "[a-z]{0,12}",
            any::<i64>(),
            proptest::option::of(proptest::collection::vec(any::<u16>(), 0..8)),
        )
            .prop_map(|(device, value, samples)| Reading {
                device,
                value,
                samples,
            })
    }

    proptest! {
        #[test]
        fn reused_encoder_matches_fresh(
            first in arb_reading(),
            second in arb_reading(),
            id in 1u64..,
        ) {
            let mut encoder = RecordEncoder::new();
            encoder.encode(id, &first).unwrap();
            let reused = encoder.encode(id, &second).unwrap().to_vec();
            prop_assert_eq!(reused, encode_record(id, &second).unwrap());
        }

        #[test]
        fn decode_recovers_object(reading in arb_reading(), id in 1u64..) {
            let bytes = encode_record(id, &reading).unwrap();
            let (decoded_id, decoded): (u64, Reading) = decode_record(&bytes).unwrap();
            prop_assert_eq!(decoded_id, id);
            prop_assert_eq!(peek_record_id(&bytes).unwrap(), id);
            prop_assert_eq!(decoded, reading);
        }
    }
}
