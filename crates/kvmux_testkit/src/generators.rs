//! Property-based test generators using proptest.
//!
//! Values are generated so that they pack: containers are homogeneous and
//! floats are finite.

use kvmux_codec::{Attributes, Predicate, Value};
use proptest::prelude::*;

/// Strategy for short printable strings.
pub fn string_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9 ]{0,12}").expect("Invalid regex")
}

/// Strategy for object keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for finite floats.
pub fn float_strategy() -> impl Strategy<Value = f64> {
    -1.0e9f64..1.0e9
}

/// Strategy for string, int and float values.
pub fn primitive_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        string_strategy().prop_map(Value::String),
        any::<i64>().prop_map(Value::Int),
        float_strategy().prop_map(Value::Float),
    ]
}

/// Strategy for lists, sets and maps with a single element type.
pub fn container_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::collection::vec(string_strategy().prop_map(Value::String), 0..8)
            .prop_map(Value::List),
        prop::collection::vec(any::<i64>().prop_map(Value::Int), 0..8).prop_map(Value::List),
        prop::collection::vec(string_strategy().prop_map(Value::String), 0..8)
            .prop_map(Value::Set),
        prop::collection::vec(float_strategy().prop_map(Value::Float), 0..8)
            .prop_map(Value::Set),
        prop::collection::vec((string_strategy(), any::<i64>()), 0..8)
            .prop_map(|pairs| Value::map(pairs)),
    ]
}

/// Strategy for any packable value.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => primitive_value_strategy(),
        2 => container_value_strategy(),
    ]
}

/// Strategy for attribute maps matching [`KV_SPACE`](crate::KV_SPACE).
pub fn kv_attributes_strategy() -> impl Strategy<Value = Attributes> {
    (
        prop::option::of(string_strategy()),
        prop::option::of(any::<i64>()),
        prop::option::of(float_strategy()),
        prop::option::of(prop::collection::vec(string_strategy(), 0..4)),
        prop::option::of(prop::collection::vec(string_strategy(), 0..4)),
    )
        .prop_map(|(v, n, f, l, s)| {
            let mut attrs = Attributes::new();
            if let Some(v) = v {
                attrs.insert("v".into(), Value::String(v));
            }
            if let Some(n) = n {
                attrs.insert("n".into(), Value::Int(n));
            }
            if let Some(f) = f {
                attrs.insert("f".into(), Value::Float(f));
            }
            if let Some(l) = l {
                attrs.insert("l".into(), Value::list(l));
            }
            if let Some(s) = s {
                attrs.insert("s".into(), Value::set(s));
            }
            attrs
        })
}

/// Strategy for predicates over the `n` attribute of
/// [`KV_SPACE`](crate::KV_SPACE).
pub fn int_predicate_strategy() -> impl Strategy<Value = Predicate> {
    (any::<i64>(), 0..5u8).prop_map(|(n, which)| match which {
        0 => Predicate::equals("n", n),
        1 => Predicate::less_than("n", n),
        2 => Predicate::less_equal("n", n),
        3 => Predicate::greater_than("n", n),
        _ => Predicate::greater_equal("n", n),
    })
}

/// One step of a generated workload on [`KV_SPACE`](crate::KV_SPACE).
#[derive(Debug, Clone)]
pub enum KvOperation {
    /// Put `n` on an object.
    Put {
        /// Object key.
        key: String,
        /// Value of `n`.
        n: i64,
    },
    /// Create an object unless it exists.
    PutIfNotExist {
        /// Object key.
        key: String,
        /// Value of `n`.
        n: i64,
    },
    /// Add to `n`.
    Add {
        /// Object key.
        key: String,
        /// Amount.
        delta: i64,
    },
    /// Delete an object.
    Del {
        /// Object key.
        key: String,
    },
    /// Read an object.
    Get {
        /// Object key.
        key: String,
    },
}

/// Strategy for workload steps over a small key space, so that steps
/// collide on the same objects.
pub fn kv_operation_strategy() -> impl Strategy<Value = KvOperation> {
    let key = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(String::from);
    let small = -1000i64..1000;
    prop_oneof![
        3 => (key.clone(), small.clone()).prop_map(|(key, n)| KvOperation::Put { key, n }),
        1 => (key.clone(), small.clone())
            .prop_map(|(key, n)| KvOperation::PutIfNotExist { key, n }),
        2 => (key.clone(), small).prop_map(|(key, delta)| KvOperation::Add { key, delta }),
        1 => key.clone().prop_map(|key| KvOperation::Del { key }),
        2 => key.prop_map(|key| KvOperation::Get { key }),
    ]
}

/// Strategy for a sequence of workload steps.
pub fn kv_operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<KvOperation>> {
    prop::collection::vec(kv_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmux_codec::{pack, pack_attributes, unpack};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_values_pack(value in value_strategy()) {
            let packed = pack(&value).unwrap();
            prop_assert!(unpack(packed.datatype, &packed.bytes).is_ok());
        }

        #[test]
        fn generated_attributes_pack(attrs in kv_attributes_strategy()) {
            prop_assert_eq!(pack_attributes(&attrs).unwrap().len(), attrs.len());
        }

        #[test]
        fn keys_are_non_empty(key in key_strategy()) {
            prop_assert!(!key.is_empty());
        }
    }
}
