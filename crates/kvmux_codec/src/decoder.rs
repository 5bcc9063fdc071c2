//! Unpacking values from the engine's flat representation.

use crate::datatype::{ContainerKind, Datatype};
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Unpack bytes of the given datatype into a value.
///
/// An empty int64 or float decodes to zero. Sets must be strictly ascending
/// and map keys strictly ascending, as the engine always writes them.
///
/// # Errors
///
/// Returns an error if the bytes are truncated, unordered, not UTF-8, or the
/// datatype is not one this codec handles.
pub fn unpack(datatype: Datatype, bytes: &[u8]) -> CodecResult<Value> {
    match datatype.container() {
        ContainerKind::Primitive => unpack_primitive(datatype, bytes),
        ContainerKind::List => {
            let mut decoder = Decoder::new(datatype, bytes);
            let elem = datatype.element()?;
            let mut items = Vec::new();
            while !decoder.is_empty() {
                items.push(decoder.element(elem)?);
            }
            Ok(Value::List(items))
        }
        ContainerKind::Set => {
            let mut decoder = Decoder::new(datatype, bytes);
            let elem = datatype.element()?;
            let mut items: Vec<Value> = Vec::new();
            while !decoder.is_empty() {
                let item = decoder.element(elem)?;
                if let Some(prev) = items.last() {
                    if prev.cmp_packed(&item) != Ordering::Less {
                        return Err(CodecError::malformed(datatype, "set is not sorted"));
                    }
                }
                items.push(item);
            }
            Ok(Value::Set(items))
        }
        ContainerKind::Map => {
            let mut decoder = Decoder::new(datatype, bytes);
            if datatype == Datatype::MapGeneric {
                return decoder.finish_empty().map(|()| Value::Map(Vec::new()));
            }
            let key_type = datatype.map_key()?;
            let value_type = datatype.element()?;
            if value_type == Datatype::Generic {
                return Err(CodecError::UnsupportedDatatype(datatype));
            }
            let mut pairs: Vec<(Value, Value)> = Vec::new();
            while !decoder.is_empty() {
                let key = decoder.element(key_type)?;
                let val = decoder.element(value_type)?;
                if let Some((prev, _)) = pairs.last() {
                    if prev.cmp_packed(&key) != Ordering::Less {
                        return Err(CodecError::malformed(datatype, "map keys are not sorted"));
                    }
                }
                pairs.push((key, val));
            }
            Ok(Value::Map(pairs))
        }
    }
}

fn unpack_primitive(datatype: Datatype, bytes: &[u8]) -> CodecResult<Value> {
    match datatype {
        Datatype::String => String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|_| CodecError::InvalidUtf8),
        Datatype::Int64 if bytes.is_empty() => Ok(Value::Int(0)),
        Datatype::Float if bytes.is_empty() => Ok(Value::Float(0.0)),
        Datatype::Int64 | Datatype::Float => {
            let mut decoder = Decoder::new(datatype, bytes);
            let value = decoder.element(datatype)?;
            decoder.finish_empty()?;
            Ok(value)
        }
        other => Err(CodecError::UnsupportedDatatype(other)),
    }
}

struct Decoder<'a> {
    datatype: Datatype,
    input: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn new(datatype: Datatype, input: &'a [u8]) -> Self {
        Self { datatype, input }
    }

    fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn finish_empty(&self) -> CodecResult<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(CodecError::malformed(
                self.datatype,
                format!("{} trailing bytes", self.input.len()),
            ))
        }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.input.len() < n {
            return Err(CodecError::malformed(
                self.datatype,
                format!("expected {} bytes, found {}", n, self.input.len()),
            ));
        }
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        Ok(head)
    }

    fn take_8(&mut self) -> CodecResult<[u8; 8]> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    fn element(&mut self, elem: Datatype) -> CodecResult<Value> {
        match elem {
            Datatype::String => {
                let mut len = [0u8; 4];
                len.copy_from_slice(self.take(4)?);
                let len = u32::from_le_bytes(len) as usize;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec())
                    .map(Value::String)
                    .map_err(|_| CodecError::InvalidUtf8)
            }
            Datatype::Int64 => Ok(Value::Int(i64::from_le_bytes(self.take_8()?))),
            Datatype::Float => Ok(Value::Float(f64::from_le_bytes(self.take_8()?))),
            _ => Err(CodecError::malformed(
                self.datatype,
                "non-empty container without an element type",
            )),
        }
    }
}
