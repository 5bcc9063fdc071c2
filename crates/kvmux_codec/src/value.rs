//! Dynamic attribute value type.

use crate::datatype::Datatype;
use crate::error::{CodecError, CodecResult};
use std::cmp::Ordering;

/// A dynamic attribute value.
///
/// Containers are flat: list and set elements, map keys and map values must
/// each be a single primitive type. Mixed or nested containers are rejected
/// when the value is packed, not when it is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Ordered list.
    List(Vec<Value>),
    /// Set (sorted and deduplicated when packed).
    Set(Vec<Value>),
    /// Map of key-value pairs (sorted by key when packed).
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Create a set value.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// Create a map value.
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns true for string, int and float.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Value::String(_) | Value::Int(_) | Value::Float(_))
    }

    /// Name of the container kind, for error messages.
    pub(crate) fn container_name(&self) -> &'static str {
        match self {
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            _ => "primitive",
        }
    }

    /// Datatype of a primitive value.
    pub(crate) fn primitive_datatype(&self) -> CodecResult<Datatype> {
        match self {
            Value::String(_) => Ok(Datatype::String),
            Value::Int(_) => Ok(Datatype::Int64),
            Value::Float(_) => Ok(Datatype::Float),
            other => Err(CodecError::NestedContainer {
                container: other.container_name(),
            }),
        }
    }

    /// Datatype this value packs to.
    ///
    /// # Errors
    ///
    /// Returns an error for mixed or nested containers.
    pub fn datatype(&self) -> CodecResult<Datatype> {
        match self {
            Value::String(_) | Value::Int(_) | Value::Float(_) => self.primitive_datatype(),
            Value::List(items) => match uniform_type(items.iter(), "list")? {
                Some(elem) => Datatype::list_of(elem),
                None => Ok(Datatype::ListGeneric),
            },
            Value::Set(items) => match uniform_type(items.iter(), "set")? {
                Some(elem) => Datatype::set_of(elem),
                None => Ok(Datatype::SetGeneric),
            },
            Value::Map(pairs) => {
                let key = uniform_type(pairs.iter().map(|(k, _)| k), "map key")?;
                let value = uniform_type(pairs.iter().map(|(_, v)| v), "map value")?;
                match (key, value) {
                    (Some(k), Some(v)) => Datatype::map_of(k, v),
                    _ => Ok(Datatype::MapGeneric),
                }
            }
        }
    }

    /// Compare two primitives the way the engine orders set elements and
    /// map keys: strings bytewise, numbers numerically.
    pub fn cmp_packed(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::List(_) => 3,
            Value::Set(_) => 4,
            Value::Map(_) => 5,
        }
    }

    /// Get this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the elements of a list or set.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Get the entries of a map.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Look up a key in a map value.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.cmp_packed(key) == Ordering::Equal)
            .map(|(_, v)| v)
    }
}

/// Returns the shared primitive type of `items`, or `None` if empty.
fn uniform_type<'a>(
    items: impl Iterator<Item = &'a Value>,
    container: &'static str,
) -> CodecResult<Option<Datatype>> {
    let mut expected: Option<Datatype> = None;
    for item in items {
        let found = item.primitive_datatype()?;
        match expected {
            None => expected = Some(found),
            Some(dt) if dt != found => {
                return Err(CodecError::Heterogeneous {
                    container,
                    expected: dt,
                    found,
                })
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
