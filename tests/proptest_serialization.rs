//! Property-based tests for cache entry encoding.
//!
//! # Properties Tested
//!
//! 1. **Roundtrip Property**: deserialize(serialize(x)) == x for any DTO
//! 2. **Envelope Property**: every entry starts with the magic and current version
//! 3. **Robustness Property**: arbitrary or truncated bytes produce an error, never a panic

use modern_kit::serialization::{
    deserialize_from_cache, serialize_for_cache, CACHE_MAGIC, CURRENT_SCHEMA_VERSION,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Customer {
    id: u64,
    name: String,
    tags: Vec<String>,
    credit_cents: Option<i64>,
}

fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        any::<u64>(),
        ".{0,32}",
        prop::collection::vec("[a-z]{1,8}", 0..5),
        any::<Option<i64>>(),
    )
        .prop_map(|(id, name, tags, credit_cents)| Customer {
            id,
            name,
            tags,
            credit_cents,
        })
}

proptest! {
    #[test]
    fn prop_roundtrip(customer in customer_strategy()) {
        let bytes = serialize_for_cache(&customer).expect("Failed to serialize");
        let restored: Customer = deserialize_from_cache(&bytes).expect("Failed to deserialize");
        prop_assert_eq!(restored, customer);
    }

    #[test]
    fn prop_envelope_header(customer in customer_strategy()) {
        let bytes = serialize_for_cache(&customer).expect("Failed to serialize");
        prop_assert_eq!(&bytes[..4], &CACHE_MAGIC[..]);
        prop_assert_eq!(u32::from(bytes[4]), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn prop_truncated_entries_are_rejected(customer in customer_strategy(), cut in 1usize..8) {
        let bytes = serialize_for_cache(&customer).expect("Failed to serialize");
        let keep = bytes.len().saturating_sub(cut);
        let result: modern_kit::Result<Customer> = deserialize_from_cache(&bytes[..keep]);
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let result: modern_kit::Result<Customer> = deserialize_from_cache(&bytes);
        if let Ok(decoded) = result {
            // Only possible when the input happens to be a well-formed entry.
            prop_assert_eq!(&bytes[..4], &CACHE_MAGIC[..]);
            prop_assert!(serialize_for_cache(&decoded).is_ok());
        }
    }
}
