//! Packing values into the engine's flat representation.

use crate::datatype::Datatype;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// A value in the engine's flat representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedValue {
    /// Datatype tag.
    pub datatype: Datatype,
    /// Packed bytes.
    pub bytes: Vec<u8>,
}

/// Pack a value into its datatype tag and bytes.
///
/// Layout:
/// - integers and floats are 8 bytes, little-endian
/// - a top-level string is its raw bytes
/// - strings inside containers carry a 32-bit little-endian length prefix
/// - sets are sorted and deduplicated
/// - maps are sorted by key; a repeated key keeps its last value
///
/// # Errors
///
/// Returns an error for mixed or nested containers and for string elements
/// longer than `u32::MAX` bytes.
pub fn pack(value: &Value) -> CodecResult<PackedValue> {
    let datatype = value.datatype()?;
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(PackedValue {
        datatype,
        bytes: encoder.into_bytes(),
    })
}

struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) => {
                self.buffer.extend_from_slice(s.as_bytes());
                Ok(())
            }
            Value::Int(_) | Value::Float(_) => self.encode_element(value),
            Value::List(items) => items.iter().try_for_each(|item| self.encode_element(item)),
            Value::Set(items) => {
                let mut sorted: Vec<&Value> = items.iter().collect();
                sorted.sort_by(|a, b| a.cmp_packed(b));
                sorted.dedup_by(|a, b| a.cmp_packed(b) == Ordering::Equal);
                sorted
                    .into_iter()
                    .try_for_each(|item| self.encode_element(item))
            }
            Value::Map(pairs) => {
                for (key, val) in sorted_entries(pairs) {
                    self.encode_element(key)?;
                    self.encode_element(val)?;
                }
                Ok(())
            }
        }
    }

    fn encode_element(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) => {
                let len = u32::try_from(s.len()).map_err(|_| CodecError::Oversized(s.len()))?;
                self.buffer.extend_from_slice(&len.to_le_bytes());
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Int(n) => self.buffer.extend_from_slice(&n.to_le_bytes()),
            Value::Float(f) => self.buffer.extend_from_slice(&f.to_le_bytes()),
            other => {
                return Err(CodecError::NestedContainer {
                    container: other.container_name(),
                })
            }
        }
        Ok(())
    }
}

/// Map entries sorted by key, keeping the last value for a repeated key.
fn sorted_entries(pairs: &[(Value, Value)]) -> Vec<(&Value, &Value)> {
    let mut entries: Vec<(usize, &Value, &Value)> = pairs
        .iter()
        .enumerate()
        .map(|(i, (k, v))| (i, k, v))
        .collect();
    // Insertion index breaks ties so the last write sorts last.
    entries.sort_by(|a, b| a.1.cmp_packed(b.1).then(a.0.cmp(&b.0)));

    let mut out: Vec<(&Value, &Value)> = Vec::with_capacity(entries.len());
    for (_, key, val) in entries {
        match out.last_mut() {
            Some(last) if last.0.cmp_packed(key) == Ordering::Equal => *last = (key, val),
            _ => out.push((key, val)),
        }
    }
    out
}
