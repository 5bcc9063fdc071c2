//! # kvmux Codec
//!
//! Attribute value model and packing for the kvmux client.
//!
//! The engine takes attributes, predicates and map entries as
//! `(name, datatype tag, packed bytes)` triples. This crate converts between
//! that layout and a dynamic [`Value`].
//!
//! ## Packing Rules
//!
//! - Integers and floats are 8 bytes, little-endian
//! - A top-level string is its raw bytes
//! - Strings inside containers carry a 32-bit little-endian length prefix
//! - Sets are sorted and deduplicated
//! - Maps are sorted by key; a repeated key keeps its last value
//! - Containers are homogeneous and never nested
//!
//! ## Usage
//!
//! ```
//! use kvmux_codec::{pack, unpack, Datatype, Value};
//!
//! let packed = pack(&Value::set([3i64, 1, 3])).unwrap();
//! assert_eq!(packed.datatype, Datatype::SetInt64);
//!
//! let decoded = unpack(packed.datatype, &packed.bytes).unwrap();
//! assert_eq!(decoded, Value::set([1i64, 3]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attribute;
mod datatype;
mod decoder;
mod encoder;
mod error;
mod value;

pub use attribute::{
    pack_attributes, pack_checks, pack_map_attributes, unpack_attributes, Attributes,
    MapAttribute, PackedAttribute, PackedCheck, PackedMapAttribute, Predicate, PredicateKind,
};
pub use datatype::{ContainerKind, Datatype};
pub use decoder::unpack;
pub use encoder::{pack, PackedValue};
pub use error::{CodecError, CodecResult};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering;

    fn key_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z]{0,6}").expect("Invalid regex")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn packed_set_is_strictly_ascending(items in prop::collection::vec(any::<i64>(), 0..32)) {
            let packed = pack(&Value::set(items.clone())).unwrap();
            let decoded = unpack(packed.datatype, &packed.bytes).unwrap();
            let elements = decoded.as_elements().unwrap();

            let mut expected = items;
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(elements.len(), expected.len());
            for pair in elements.windows(2) {
                prop_assert_eq!(pair[0].cmp_packed(&pair[1]), Ordering::Less);
            }
        }

        #[test]
        fn map_keeps_last_write(pairs in prop::collection::vec((key_strategy(), any::<i64>()), 1..24)) {
            let packed = pack(&Value::map(pairs.clone())).unwrap();
            let decoded = unpack(packed.datatype, &packed.bytes).unwrap();

            let mut last = std::collections::BTreeMap::new();
            for (k, v) in &pairs {
                last.insert(k.clone(), *v);
            }
            let entries = decoded.as_map().unwrap();
            prop_assert_eq!(entries.len(), last.len());
            for (k, v) in &last {
                prop_assert_eq!(decoded.get(&Value::from(k.as_str())), Some(&Value::Int(*v)));
            }
        }

        #[test]
        fn list_string_length_matches_prefixes(items in prop::collection::vec(key_strategy(), 0..16)) {
            let packed = pack(&Value::list(items.clone())).unwrap();
            let content: usize = items.iter().map(|s| s.len()).sum();
            prop_assert_eq!(packed.bytes.len(), content + 4 * items.len());
        }

        #[test]
        fn truncated_input_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..40)) {
            for dt in [Datatype::ListString, Datatype::SetFloat, Datatype::MapStringInt64, Datatype::Int64] {
                let _ = unpack(dt, &bytes);
            }
        }
    }
}
