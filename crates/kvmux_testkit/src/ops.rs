//! Value-level mutation and predicate semantics of the in-memory engine.

use crate::schema::{accepts, default_value};
use kvmux_codec::{pack, unpack, ContainerKind, Datatype, PredicateKind, Value};
use kvmux_core::{MapOp, MutateOp, Status};
use regex::Regex;
use std::cmp::Ordering;
use std::mem::discriminant;

/// Re-encodes a value so sets and maps are in canonical order.
pub(crate) fn normalize(value: Value) -> Result<Value, Status> {
    let packed = pack(&value).map_err(|_| Status::WrongType)?;
    unpack(packed.datatype, &packed.bytes).map_err(|_| Status::WrongType)
}

/// Applies `op` with `operand` to the current value of an attribute of type
/// `schema`.
pub(crate) fn apply(
    op: MutateOp,
    schema: Datatype,
    current: &Value,
    operand: Value,
) -> Result<Value, Status> {
    let updated = match op {
        MutateOp::Put | MutateOp::PutIfNotExist => {
            let dt = operand.datatype().map_err(|_| Status::WrongType)?;
            if !accepts(schema, dt) {
                return Err(Status::WrongType);
            }
            operand
        }
        MutateOp::StringPrepend | MutateOp::StringAppend => match (current, operand) {
            (Value::String(cur), Value::String(s)) if op == MutateOp::StringAppend => {
                Value::String(format!("{cur}{s}"))
            }
            (Value::String(cur), Value::String(s)) => Value::String(format!("{s}{cur}")),
            _ => return Err(Status::WrongType),
        },
        MutateOp::ListLpush | MutateOp::ListRpush => {
            let Value::List(items) = current else {
                return Err(Status::WrongType);
            };
            let new = elements(schema, operand)?;
            if op == MutateOp::ListLpush {
                Value::List(new.into_iter().chain(items.iter().cloned()).collect())
            } else {
                Value::List(items.iter().cloned().chain(new).collect())
            }
        }
        MutateOp::SetAdd | MutateOp::SetUnion => {
            let Value::Set(items) = current else {
                return Err(Status::WrongType);
            };
            Value::Set(items.iter().cloned().chain(elements(schema, operand)?).collect())
        }
        MutateOp::SetRemove | MutateOp::SetIntersect => {
            let Value::Set(items) = current else {
                return Err(Status::WrongType);
            };
            let others = elements(schema, operand)?;
            let keep_members = op == MutateOp::SetIntersect;
            Value::Set(
                items
                    .iter()
                    .filter(|item| contains(&others, item) == keep_members)
                    .cloned()
                    .collect(),
            )
        }
        _ => numeric(op, current, &operand)?,
    };
    normalize(updated)
}

/// Applies a map mutation to the entry `key` of a map attribute.
pub(crate) fn apply_map(
    op: MapOp,
    schema: Datatype,
    current: &Value,
    key: Value,
    operand: Value,
) -> Result<Value, Status> {
    let Value::Map(entries) = current else {
        return Err(Status::WrongType);
    };
    let key_type = schema.map_key().map_err(|_| Status::WrongType)?;
    let value_type = schema.element().map_err(|_| Status::WrongType)?;
    if key.datatype().ok() != Some(key_type) {
        return Err(Status::WrongType);
    }

    let mut entries = entries.clone();
    let pos = entries
        .iter()
        .position(|(k, _)| k.cmp_packed(&key) == Ordering::Equal);

    let value = match op {
        MapOp::Remove => {
            if let Some(i) = pos {
                entries.remove(i);
            }
            return normalize(Value::Map(entries));
        }
        MapOp::Add => {
            if operand.datatype().ok() != Some(value_type) {
                return Err(Status::WrongType);
            }
            operand
        }
        other => {
            let existing = pos
                .map(|i| entries[i].1.clone())
                .unwrap_or_else(|| default_value(value_type));
            apply(scalar(other), value_type, &existing, operand)?
        }
    };
    match pos {
        Some(i) => entries[i].1 = value,
        None => entries.push((key, value)),
    }
    normalize(Value::Map(entries))
}

fn scalar(op: MapOp) -> MutateOp {
    match op {
        MapOp::AtomicAdd => MutateOp::AtomicAdd,
        MapOp::AtomicSub => MutateOp::AtomicSub,
        MapOp::AtomicMul => MutateOp::AtomicMul,
        MapOp::AtomicDiv => MutateOp::AtomicDiv,
        MapOp::AtomicMod => MutateOp::AtomicMod,
        MapOp::AtomicAnd => MutateOp::AtomicAnd,
        MapOp::AtomicOr => MutateOp::AtomicOr,
        MapOp::AtomicXor => MutateOp::AtomicXor,
        MapOp::AtomicMin => MutateOp::AtomicMin,
        MapOp::AtomicMax => MutateOp::AtomicMax,
        MapOp::StringPrepend => MutateOp::StringPrepend,
        MapOp::StringAppend => MutateOp::StringAppend,
        MapOp::Add | MapOp::Remove => MutateOp::Put,
    }
}

/// Operand elements for list and set mutations: a single primitive or a
/// container of primitives, all of the attribute's element type.
fn elements(schema: Datatype, operand: Value) -> Result<Vec<Value>, Status> {
    let element = schema.element().map_err(|_| Status::WrongType)?;
    let items = match operand {
        Value::List(items) | Value::Set(items) => items,
        Value::Map(_) => return Err(Status::WrongType),
        primitive => vec![primitive],
    };
    if items.iter().any(|item| item.datatype().ok() != Some(element)) {
        return Err(Status::WrongType);
    }
    Ok(items)
}

fn contains(items: &[Value], needle: &Value) -> bool {
    items
        .iter()
        .any(|item| discriminant(item) == discriminant(needle) && item.cmp_packed(needle).is_eq())
}

fn numeric(op: MutateOp, current: &Value, operand: &Value) -> Result<Value, Status> {
    match (current, operand) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b).map(Value::Int),
        (Value::Float(a), Value::Float(b)) => float_op(op, *a, *b).map(Value::Float),
        _ => Err(Status::WrongType),
    }
}

fn int_op(op: MutateOp, a: i64, b: i64) -> Result<i64, Status> {
    let result = match op {
        MutateOp::AtomicAdd => a.checked_add(b),
        MutateOp::AtomicSub => a.checked_sub(b),
        MutateOp::AtomicMul => a.checked_mul(b),
        MutateOp::AtomicDiv => a.checked_div(b),
        MutateOp::AtomicMod => a.checked_rem(b),
        MutateOp::AtomicAnd => Some(a & b),
        MutateOp::AtomicOr => Some(a | b),
        MutateOp::AtomicXor => Some(a ^ b),
        MutateOp::AtomicMin => Some(a.min(b)),
        MutateOp::AtomicMax => Some(a.max(b)),
        _ => return Err(Status::WrongType),
    };
    result.ok_or(Status::Overflow)
}

fn float_op(op: MutateOp, a: f64, b: f64) -> Result<f64, Status> {
    let result = match op {
        MutateOp::AtomicAdd => a + b,
        MutateOp::AtomicSub => a - b,
        MutateOp::AtomicMul => a * b,
        MutateOp::AtomicDiv => a / b,
        MutateOp::AtomicMod => a % b,
        MutateOp::AtomicMin => a.min(b),
        MutateOp::AtomicMax => a.max(b),
        _ => return Err(Status::WrongType),
    };
    if result.is_finite() {
        Ok(result)
    } else {
        Err(Status::Overflow)
    }
}

/// Checks that a predicate's operand type fits the attribute it tests.
pub(crate) fn validate_check(
    schema: Datatype,
    operand: Datatype,
    kind: PredicateKind,
) -> Result<(), Status> {
    let ok = match kind {
        PredicateKind::Fail => true,
        PredicateKind::Equals => accepts(schema, operand),
        PredicateKind::LessThan
        | PredicateKind::LessEqual
        | PredicateKind::GreaterEqual
        | PredicateKind::GreaterThan => schema.is_primitive() && schema == operand,
        PredicateKind::LengthEquals
        | PredicateKind::LengthLessEqual
        | PredicateKind::LengthGreaterEqual => operand == Datatype::Int64,
        PredicateKind::Regex => schema == Datatype::String && operand == Datatype::String,
        PredicateKind::Contains => match schema.container() {
            ContainerKind::Primitive => schema == Datatype::String && operand == Datatype::String,
            ContainerKind::List | ContainerKind::Set => schema.element().ok() == Some(operand),
            ContainerKind::Map => schema.map_key().ok() == Some(operand),
        },
    };
    if ok {
        Ok(())
    } else {
        Err(Status::WrongType)
    }
}

/// A predicate ready to evaluate against stored values.
#[derive(Debug, Clone)]
pub(crate) struct Check {
    pub attribute: String,
    pub kind: PredicateKind,
    pub operand: Value,
    pub pattern: Option<Regex>,
}

impl Check {
    /// Returns true if `value` satisfies the predicate.
    pub fn matches(&self, value: &Value) -> bool {
        let operand = &self.operand;
        match self.kind {
            PredicateKind::Fail => false,
            PredicateKind::Equals => {
                if value.is_primitive() {
                    ordered(value, operand) == Some(Ordering::Equal)
                } else {
                    value == operand
                }
            }
            PredicateKind::LessThan => ordered(value, operand).is_some_and(Ordering::is_lt),
            PredicateKind::LessEqual => ordered(value, operand).is_some_and(Ordering::is_le),
            PredicateKind::GreaterEqual => ordered(value, operand).is_some_and(Ordering::is_ge),
            PredicateKind::GreaterThan => ordered(value, operand).is_some_and(Ordering::is_gt),
            PredicateKind::LengthEquals => length_cmp(value, operand).is_some_and(Ordering::is_eq),
            PredicateKind::LengthLessEqual => {
                length_cmp(value, operand).is_some_and(Ordering::is_le)
            }
            PredicateKind::LengthGreaterEqual => {
                length_cmp(value, operand).is_some_and(Ordering::is_ge)
            }
            PredicateKind::Regex => match (&self.pattern, value) {
                (Some(re), Value::String(s)) => re.is_match(s),
                _ => false,
            },
            PredicateKind::Contains => match value {
                Value::String(s) => operand.as_str().is_some_and(|needle| s.contains(needle)),
                Value::List(items) | Value::Set(items) => contains(items, operand),
                Value::Map(entries) => entries
                    .iter()
                    .any(|(k, _)| discriminant(k) == discriminant(operand) && k.cmp_packed(operand).is_eq()),
                _ => false,
            },
        }
    }
}

fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    (a.is_primitive() && discriminant(a) == discriminant(b)).then(|| a.cmp_packed(b))
}

fn length_cmp(value: &Value, operand: &Value) -> Option<Ordering> {
    let len = match value {
        Value::String(s) => s.len(),
        Value::List(items) | Value::Set(items) => items.len(),
        Value::Map(entries) => entries.len(),
        _ => return None,
    };
    let wanted = operand.as_int()?;
    Some((len as i128).cmp(&(wanted as i128)))
}
