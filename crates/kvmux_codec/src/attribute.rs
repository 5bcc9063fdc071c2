//! Attributes, predicates and map attributes in packed form.

use crate::datatype::Datatype;
use crate::decoder::unpack;
use crate::encoder::pack;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::collections::BTreeMap;

/// Attribute name to value, ordered by name.
pub type Attributes = BTreeMap<String, Value>;

/// Comparison applied by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PredicateKind {
    /// Always fails.
    Fail = 9728,
    /// Attribute equals the value.
    Equals = 9729,
    /// Attribute is less than or equal to the value.
    LessEqual = 9730,
    /// Attribute is greater than or equal to the value.
    GreaterEqual = 9731,
    /// Attribute matches the regular expression.
    Regex = 9733,
    /// Attribute length equals the value.
    LengthEquals = 9734,
    /// Attribute length is at most the value.
    LengthLessEqual = 9735,
    /// Attribute length is at least the value.
    LengthGreaterEqual = 9736,
    /// Container attribute contains the value.
    Contains = 9737,
    /// Attribute is strictly less than the value.
    LessThan = 9738,
    /// Attribute is strictly greater than the value.
    GreaterThan = 9739,
}

impl PredicateKind {
    const ALL: [PredicateKind; 11] = [
        PredicateKind::Fail,
        PredicateKind::Equals,
        PredicateKind::LessEqual,
        PredicateKind::GreaterEqual,
        PredicateKind::Regex,
        PredicateKind::LengthEquals,
        PredicateKind::LengthLessEqual,
        PredicateKind::LengthGreaterEqual,
        PredicateKind::Contains,
        PredicateKind::LessThan,
        PredicateKind::GreaterThan,
    ];

    /// Returns the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up a predicate by its numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }
}

/// A check on one attribute, used by conditional operations and searches.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Attribute name.
    pub attribute: String,
    /// Operand.
    pub value: Value,
    /// Comparison.
    pub kind: PredicateKind,
}

impl Predicate {
    /// Creates a predicate.
    pub fn new(attribute: impl Into<String>, value: impl Into<Value>, kind: PredicateKind) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            kind,
        }
    }

    /// `attribute == value`
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::Equals)
    }

    /// `attribute < value`
    pub fn less_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::LessThan)
    }

    /// `attribute <= value`
    pub fn less_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::LessEqual)
    }

    /// `attribute > value`
    pub fn greater_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::GreaterThan)
    }

    /// `attribute >= value`
    pub fn greater_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::GreaterEqual)
    }

    /// Regular expression match.
    pub fn regex(attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(attribute, Value::String(pattern.into()), PredicateKind::Regex)
    }

    /// Container attribute holds `value`.
    pub fn contains(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, value, PredicateKind::Contains)
    }

    /// Length of a string or container equals `len`.
    pub fn length_equals(attribute: impl Into<String>, len: i64) -> Self {
        Self::new(attribute, len, PredicateKind::LengthEquals)
    }

    /// Length of a string or container is at most `len`.
    pub fn length_less_equal(attribute: impl Into<String>, len: i64) -> Self {
        Self::new(attribute, len, PredicateKind::LengthLessEqual)
    }

    /// Length of a string or container is at least `len`.
    pub fn length_greater_equal(attribute: impl Into<String>, len: i64) -> Self {
        Self::new(attribute, len, PredicateKind::LengthGreaterEqual)
    }
}

/// One entry of a map operation: `attribute[key] op= value`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapAttribute {
    /// Map attribute name.
    pub attribute: String,
    /// Key within the map.
    pub key: Value,
    /// Operand.
    pub value: Value,
}

impl MapAttribute {
    /// Creates a map attribute entry.
    pub fn new(attribute: impl Into<String>, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An attribute in the engine's flat layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAttribute {
    /// Attribute name.
    pub name: String,
    /// Datatype tag.
    pub datatype: Datatype,
    /// Packed bytes.
    pub value: Vec<u8>,
}

impl PackedAttribute {
    /// Unpacks the value.
    pub fn unpack(&self) -> CodecResult<Value> {
        unpack(self.datatype, &self.value)
    }
}

/// A predicate in the engine's flat layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedCheck {
    /// Attribute name.
    pub name: String,
    /// Datatype tag of the operand.
    pub datatype: Datatype,
    /// Packed operand.
    pub value: Vec<u8>,
    /// Comparison.
    pub predicate: PredicateKind,
}

impl PackedCheck {
    /// Unpacks the operand.
    pub fn unpack(&self) -> CodecResult<Value> {
        unpack(self.datatype, &self.value)
    }
}

/// A map attribute entry in the engine's flat layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedMapAttribute {
    /// Map attribute name.
    pub name: String,
    /// Datatype tag of the key.
    pub key_datatype: Datatype,
    /// Packed key.
    pub key: Vec<u8>,
    /// Datatype tag of the operand.
    pub value_datatype: Datatype,
    /// Packed operand.
    pub value: Vec<u8>,
}

/// Pack every attribute, in name order.
pub fn pack_attributes(attributes: &Attributes) -> CodecResult<Vec<PackedAttribute>> {
    attributes
        .iter()
        .map(|(name, value)| {
            let packed = pack(value)?;
            Ok(PackedAttribute {
                name: name.clone(),
                datatype: packed.datatype,
                value: packed.bytes,
            })
        })
        .collect()
}

/// Pack predicates, preserving their order.
pub fn pack_checks(checks: &[Predicate]) -> CodecResult<Vec<PackedCheck>> {
    checks
        .iter()
        .map(|check| {
            let packed = pack(&check.value)?;
            Ok(PackedCheck {
                name: check.attribute.clone(),
                datatype: packed.datatype,
                value: packed.bytes,
                predicate: check.kind,
            })
        })
        .collect()
}

/// Pack map attribute entries. Keys and operands must be primitives.
pub fn pack_map_attributes(entries: &[MapAttribute]) -> CodecResult<Vec<PackedMapAttribute>> {
    entries
        .iter()
        .map(|entry| {
            let key = pack_primitive(&entry.key)?;
            let value = pack_primitive(&entry.value)?;
            Ok(PackedMapAttribute {
                name: entry.attribute.clone(),
                key_datatype: key.datatype,
                key: key.bytes,
                value_datatype: value.datatype,
                value: value.bytes,
            })
        })
        .collect()
}

fn pack_primitive(value: &Value) -> CodecResult<crate::encoder::PackedValue> {
    if !value.is_primitive() {
        return Err(CodecError::NestedContainer {
            container: value.container_name(),
        });
    }
    pack(value)
}

/// Unpack attributes returned by the engine.
pub fn unpack_attributes(packed: &[PackedAttribute]) -> CodecResult<Attributes> {
    packed
        .iter()
        .map(|attr| Ok((attr.name.clone(), attr.unpack()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_codes() {
        assert_eq!(PredicateKind::Equals.code(), 9729);
        assert_eq!(PredicateKind::GreaterThan.code(), 9739);
        assert_eq!(PredicateKind::from_code(9733), Some(PredicateKind::Regex));
        assert_eq!(PredicateKind::from_code(9732), None);
    }

    #[test]
    fn attributes_pack_in_name_order() {
        let mut attrs = Attributes::new();
        attrs.insert("v".into(), Value::Int(3));
        attrs.insert("name".into(), Value::from("alice"));

        let packed = pack_attributes(&attrs).unwrap();
        assert_eq!(packed[0].name, "name");
        assert_eq!(packed[0].datatype, Datatype::String);
        assert_eq!(packed[0].value, b"alice");
        assert_eq!(packed[1].name, "v");
        assert_eq!(packed[1].value, 3i64.to_le_bytes());

        assert_eq!(unpack_attributes(&packed).unwrap(), attrs);
    }

    #[test]
    fn check_carries_predicate() {
        let packed = pack_checks(&[Predicate::greater_equal("age", 21i64)]).unwrap();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].predicate, PredicateKind::GreaterEqual);
        assert_eq!(packed[0].unpack().unwrap(), Value::Int(21));
    }

    #[test]
    fn map_attribute_key_must_be_primitive() {
        let ok = pack_map_attributes(&[MapAttribute::new("m", "k", 1.5)]).unwrap();
        assert_eq!(ok[0].key_datatype, Datatype::String);
        assert_eq!(ok[0].value_datatype, Datatype::Float);

        let err = pack_map_attributes(&[MapAttribute::new("m", Value::list([1i64]), 1i64)]);
        assert_eq!(err, Err(CodecError::NestedContainer { container: "list" }));
    }

    #[test]
    fn bad_attribute_fails_whole_batch() {
        let mut attrs = Attributes::new();
        attrs.insert("ok".into(), Value::Int(1));
        attrs.insert(
            "bad".into(),
            Value::List(vec![Value::Int(1), Value::from("x")]),
        );
        assert!(pack_attributes(&attrs).is_err());
    }
}
