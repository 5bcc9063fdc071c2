//! The object store behind the in-memory engine.
//!
//! Requests run to completion when they are submitted. Problems the native
//! client would catch before sending (unknown space or attribute, operand
//! of the wrong type) reject the submission; everything else becomes one
//! or more replies that the engine hands out through `poll`.

use crate::ops::{self, Check};
use crate::schema::{default_value, SpaceSchema};
use kvmux_codec::{
    pack_attributes, unpack, Attributes, ContainerKind, Datatype, PackedAttribute, PackedCheck,
    PackedMapAttribute, PackedValue, PredicateKind, Value,
};
use kvmux_core::{EngineFailure, MapOp, MutateOp, Request, Response, SortOrder, Status};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// One completion before the engine assigns its request id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reply {
    pub status: Status,
    pub response: Response,
    pub message: String,
}

impl Reply {
    fn ok(response: Response) -> Self {
        Self {
            status: Status::Success,
            response,
            message: String::new(),
        }
    }

    fn status(status: Status) -> Self {
        Self {
            status,
            response: Response::None,
            message: status.message().to_string(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

fn reject(status: Status, message: impl Into<String>) -> EngineFailure {
    EngineFailure::new(status).with_message(message)
}

#[derive(Debug, Clone)]
struct Object {
    key: Value,
    attributes: Attributes,
}

impl Object {
    fn new(schema: &SpaceSchema, key: Value) -> Self {
        let attributes = schema
            .attributes
            .iter()
            .map(|(name, dt)| (name.clone(), default_value(*dt)))
            .collect();
        Self { key, attributes }
    }

    fn value(&self, schema: &SpaceSchema, name: &str) -> Option<&Value> {
        if name == schema.key {
            Some(&self.key)
        } else {
            self.attributes.get(name)
        }
    }

    fn passes(&self, schema: &SpaceSchema, checks: &[Check]) -> bool {
        checks.iter().all(|check| {
            self.value(schema, &check.attribute)
                .is_some_and(|value| check.matches(value))
        })
    }

    fn with_key(&self, schema: &SpaceSchema) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert(schema.key.clone(), self.key.clone());
        attributes
    }
}

#[derive(Debug)]
struct Operand {
    name: String,
    datatype: Datatype,
    value: Value,
}

#[derive(Debug)]
struct MapOperand {
    name: String,
    datatype: Datatype,
    key: Value,
    value: Value,
}

/// A validated change to one object.
#[derive(Debug)]
enum Change {
    Attributes(MutateOp, Vec<Operand>),
    Map(MapOp, Vec<MapOperand>),
}

impl Change {
    fn creates(&self) -> bool {
        matches!(
            self,
            Change::Attributes(MutateOp::Put | MutateOp::PutIfNotExist, _)
        )
    }

    fn requires_absent(&self) -> bool {
        matches!(self, Change::Attributes(MutateOp::PutIfNotExist, _))
    }

    /// Applies every operand to a copy; the object is untouched on error.
    fn apply(&self, object: &Object) -> Result<Attributes, Status> {
        let mut attributes = object.attributes.clone();
        match self {
            Change::Attributes(op, operands) => {
                for operand in operands {
                    let current = attribute(&attributes, &operand.name, operand.datatype);
                    let updated =
                        ops::apply(*op, operand.datatype, &current, operand.value.clone())?;
                    attributes.insert(operand.name.clone(), updated);
                }
            }
            Change::Map(op, operands) => {
                for operand in operands {
                    let current = attribute(&attributes, &operand.name, operand.datatype);
                    let updated = ops::apply_map(
                        *op,
                        operand.datatype,
                        &current,
                        operand.key.clone(),
                        operand.value.clone(),
                    )?;
                    attributes.insert(operand.name.clone(), updated);
                }
            }
        }
        Ok(attributes)
    }
}

fn attribute(attributes: &Attributes, name: &str, datatype: Datatype) -> Value {
    attributes
        .get(name)
        .cloned()
        .unwrap_or_else(|| default_value(datatype))
}

fn object_reply(attributes: &Attributes) -> Reply {
    match pack_attributes(attributes) {
        Ok(packed) => Reply::ok(Response::Object(packed)),
        Err(e) => Reply::status(Status::Internal).with_message(e.to_string()),
    }
}

#[derive(Debug)]
struct Space {
    schema: SpaceSchema,
    /// Objects by packed key bytes.
    objects: BTreeMap<Vec<u8>, Object>,
}

impl Space {
    fn key(&self, key: &PackedValue) -> Result<(Vec<u8>, Value), EngineFailure> {
        if key.datatype != self.schema.key_type {
            return Err(reject(
                Status::WrongType,
                format!("key of `{}` must be {:?}", self.schema.name, self.schema.key_type),
            ));
        }
        let value = unpack(key.datatype, &key.bytes)
            .map_err(|e| reject(Status::WrongType, e.to_string()))?;
        Ok((key.bytes.clone(), value))
    }

    fn checks(&self, checks: &[PackedCheck]) -> Result<Vec<Check>, EngineFailure> {
        let mut prepared = Vec::with_capacity(checks.len());
        for check in checks {
            let schema_type = self.schema.any_type(&check.name).ok_or_else(|| {
                reject(
                    Status::UnknownAttr,
                    format!("unknown attribute `{}`", check.name),
                )
            })?;
            ops::validate_check(schema_type, check.datatype, check.predicate).map_err(|s| {
                reject(s, format!("predicate on `{}` has the wrong type", check.name))
            })?;
            let operand = check
                .unpack()
                .map_err(|e| reject(Status::WrongType, e.to_string()))?;
            let operand =
                ops::normalize(operand).map_err(|s| reject(s, "malformed predicate operand"))?;
            let pattern = match (check.predicate, &operand) {
                (PredicateKind::Regex, Value::String(pattern)) => Some(
                    Regex::new(pattern).map_err(|e| reject(Status::WrongType, e.to_string()))?,
                ),
                _ => None,
            };
            prepared.push(Check {
                attribute: check.name.clone(),
                kind: check.predicate,
                operand,
                pattern,
            });
        }
        Ok(prepared)
    }

    fn attribute_type(&self, name: &str) -> Result<Datatype, EngineFailure> {
        if name == self.schema.key {
            return Err(reject(
                Status::DontUseKey,
                format!("`{name}` is the key and cannot be mutated"),
            ));
        }
        self.schema
            .attribute_type(name)
            .ok_or_else(|| reject(Status::UnknownAttr, format!("unknown attribute `{name}`")))
    }

    fn change(&self, op: MutateOp, packed: &[PackedAttribute]) -> Result<Change, EngineFailure> {
        let mut operands: Vec<Operand> = Vec::with_capacity(packed.len());
        for attr in packed {
            let datatype = self.attribute_type(&attr.name)?;
            if operands.iter().any(|o| o.name == attr.name) {
                return Err(reject(
                    Status::DupeAttr,
                    format!("attribute `{}` given twice", attr.name),
                ));
            }
            let value = attr
                .unpack()
                .map_err(|e| reject(Status::WrongType, e.to_string()))?;
            // Type errors surface against a blank value; arithmetic faults
            // are left for the real object.
            if let Err(Status::WrongType) =
                ops::apply(op, datatype, &default_value(datatype), value.clone())
            {
                return Err(reject(
                    Status::WrongType,
                    format!("`{}` cannot take {} of {:?}", attr.name, op.name(), attr.datatype),
                ));
            }
            operands.push(Operand {
                name: attr.name.clone(),
                datatype,
                value,
            });
        }
        Ok(Change::Attributes(op, operands))
    }

    fn map_change(
        &self,
        op: MapOp,
        packed: &[PackedMapAttribute],
    ) -> Result<Change, EngineFailure> {
        let mut operands = Vec::with_capacity(packed.len());
        for attr in packed {
            let datatype = self.attribute_type(&attr.name)?;
            if datatype.container() != ContainerKind::Map {
                return Err(reject(
                    Status::WrongType,
                    format!("`{}` is not a map", attr.name),
                ));
            }
            let key = unpack(attr.key_datatype, &attr.key)
                .map_err(|e| reject(Status::WrongType, e.to_string()))?;
            let value = unpack(attr.value_datatype, &attr.value)
                .map_err(|e| reject(Status::WrongType, e.to_string()))?;
            if let Err(Status::WrongType) = ops::apply_map(
                op,
                datatype,
                &Value::Map(Vec::new()),
                key.clone(),
                value.clone(),
            ) {
                return Err(reject(
                    Status::WrongType,
                    format!("`{}` cannot take {}", attr.name, op.name()),
                ));
            }
            operands.push(MapOperand {
                name: attr.name.clone(),
                datatype,
                key,
                value,
            });
        }
        Ok(Change::Map(op, operands))
    }

    fn mutate_one(&mut self, key: Vec<u8>, key_value: Value, checks: &[Check], change: &Change) -> Reply {
        match self.objects.get_mut(&key) {
            None if !checks.is_empty() || !change.creates() => Reply::status(Status::NotFound),
            None => {
                let mut object = Object::new(&self.schema, key_value);
                match change.apply(&object) {
                    Ok(attributes) => {
                        object.attributes = attributes;
                        self.objects.insert(key, object);
                        Reply::ok(Response::None)
                    }
                    Err(status) => Reply::status(status),
                }
            }
            Some(_) if change.requires_absent() => Reply::status(Status::CmpFail),
            Some(object) if !object.passes(&self.schema, checks) => Reply::status(Status::CmpFail),
            Some(object) => match change.apply(object) {
                Ok(attributes) => {
                    object.attributes = attributes;
                    Reply::ok(Response::None)
                }
                Err(status) => Reply::status(status),
            },
        }
    }

    fn mutate_group(&mut self, checks: &[Check], change: &Change) -> Reply {
        if change.requires_absent() {
            return Reply::ok(Response::Count(0));
        }
        let mut count = 0u64;
        for object in self.objects.values_mut() {
            if !object.passes(&self.schema, checks) {
                continue;
            }
            if let Ok(attributes) = change.apply(object) {
                object.attributes = attributes;
                count += 1;
            }
        }
        Reply::ok(Response::Count(count))
    }

    fn matching<'a>(&'a self, checks: &'a [Check]) -> impl Iterator<Item = &'a Object> + 'a {
        self.objects
            .values()
            .filter(move |object| object.passes(&self.schema, checks))
    }
}

/// Every space of one in-memory cluster.
#[derive(Debug, Default)]
pub(crate) struct Store {
    spaces: BTreeMap<String, Space>,
}

impl Store {
    /// Creates a space; returns its name.
    pub fn add_space(&mut self, description: &str) -> Result<String, String> {
        let schema = SpaceSchema::parse(description)?;
        if self.spaces.contains_key(&schema.name) {
            return Err(format!("space `{}` already exists", schema.name));
        }
        let name = schema.name.clone();
        debug!(space = %name, attributes = schema.attributes.len(), "space added");
        self.spaces.insert(
            name.clone(),
            Space {
                schema,
                objects: BTreeMap::new(),
            },
        );
        Ok(name)
    }

    pub fn object_count(&self, space: &str) -> Option<usize> {
        self.spaces.get(space).map(|s| s.objects.len())
    }

    pub fn space_names(&self) -> Vec<String> {
        self.spaces.keys().cloned().collect()
    }

    fn space(&self, name: &str) -> Result<&Space, EngineFailure> {
        self.spaces
            .get(name)
            .ok_or_else(|| reject(Status::UnknownSpace, format!("space `{name}` does not exist")))
    }

    fn space_mut(&mut self, name: &str) -> Result<&mut Space, EngineFailure> {
        self.spaces
            .get_mut(name)
            .ok_or_else(|| reject(Status::UnknownSpace, format!("space `{name}` does not exist")))
    }

    /// Runs a request. `Err` rejects the submission; `Ok` holds the replies
    /// in delivery order.
    pub fn execute(&mut self, request: &Request) -> Result<Vec<Reply>, EngineFailure> {
        let reply = match request {
            Request::Get { space, key } => {
                let space = self.space(space)?;
                let (key, _) = space.key(key)?;
                match space.objects.get(&key) {
                    Some(object) => object_reply(&object.attributes),
                    None => Reply::status(Status::NotFound),
                }
            }
            Request::GetPartial {
                space,
                key,
                attributes,
            } => {
                let space = self.space(space)?;
                let (key, _) = space.key(key)?;
                if let Some(unknown) = attributes.iter().find(|a| space.schema.any_type(a).is_none()) {
                    return Err(reject(
                        Status::UnknownAttr,
                        format!("unknown attribute `{unknown}`"),
                    ));
                }
                match space.objects.get(&key) {
                    Some(object) => {
                        let selected: Attributes = attributes
                            .iter()
                            .filter_map(|name| {
                                object
                                    .value(&space.schema, name)
                                    .map(|v| (name.clone(), v.clone()))
                            })
                            .collect();
                        object_reply(&selected)
                    }
                    None => Reply::status(Status::NotFound),
                }
            }
            Request::Mutate {
                op,
                space,
                key,
                checks,
                attributes,
            } => {
                let space = self.space_mut(space)?;
                let (key, key_value) = space.key(key)?;
                let checks = space.checks(checks)?;
                let change = space.change(*op, attributes)?;
                space.mutate_one(key, key_value, &checks, &change)
            }
            Request::GroupMutate {
                op,
                space,
                checks,
                attributes,
            } => {
                let space = self.space_mut(space)?;
                let checks = space.checks(checks)?;
                let change = space.change(*op, attributes)?;
                space.mutate_group(&checks, &change)
            }
            Request::MapMutate {
                op,
                space,
                key,
                checks,
                attributes,
            } => {
                let space = self.space_mut(space)?;
                let (key, key_value) = space.key(key)?;
                let checks = space.checks(checks)?;
                let change = space.map_change(*op, attributes)?;
                space.mutate_one(key, key_value, &checks, &change)
            }
            Request::GroupMapMutate {
                op,
                space,
                checks,
                attributes,
            } => {
                let space = self.space_mut(space)?;
                let checks = space.checks(checks)?;
                let change = space.map_change(*op, attributes)?;
                space.mutate_group(&checks, &change)
            }
            Request::Del { space, key, checks } => {
                let space = self.space_mut(space)?;
                let (key, _) = space.key(key)?;
                let checks = space.checks(checks)?;
                match space.objects.get(&key) {
                    None => Reply::status(Status::NotFound),
                    Some(object) if !object.passes(&space.schema, &checks) => {
                        Reply::status(Status::CmpFail)
                    }
                    Some(_) => {
                        space.objects.remove(&key);
                        Reply::ok(Response::None)
                    }
                }
            }
            Request::GroupDel { space, checks } => {
                let space = self.space_mut(space)?;
                let checks = space.checks(checks)?;
                let schema = &space.schema;
                let before = space.objects.len();
                space.objects.retain(|_, object| !object.passes(schema, &checks));
                Reply::ok(Response::Count((before - space.objects.len()) as u64))
            }
            Request::Search { space, checks } => {
                let space = self.space(space)?;
                let checks = space.checks(checks)?;
                let mut replies: Vec<Reply> = space
                    .matching(&checks)
                    .map(|object| object_reply(&object.with_key(&space.schema)))
                    .collect();
                replies.push(Reply::status(Status::SearchDone));
                return Ok(replies);
            }
            Request::SortedSearch {
                space,
                checks,
                sort_by,
                limit,
                order,
            } => {
                let space = self.space(space)?;
                let checks = space.checks(checks)?;
                let sort_type = space.schema.any_type(sort_by).ok_or_else(|| {
                    reject(Status::UnknownAttr, format!("unknown attribute `{sort_by}`"))
                })?;
                if !sort_type.is_primitive() {
                    return Err(reject(
                        Status::WrongType,
                        format!("cannot sort by container attribute `{sort_by}`"),
                    ));
                }
                let mut found: Vec<&Object> = space.matching(&checks).collect();
                found.sort_by(|a, b| {
                    let (a, b) = (a.value(&space.schema, sort_by), b.value(&space.schema, sort_by));
                    let ord = match (a, b) {
                        (Some(a), Some(b)) => a.cmp_packed(b),
                        _ => std::cmp::Ordering::Equal,
                    };
                    match order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    }
                });
                let limit = usize::try_from(*limit).unwrap_or(usize::MAX);
                let mut replies: Vec<Reply> = found
                    .into_iter()
                    .take(limit)
                    .map(|object| object_reply(&object.with_key(&space.schema)))
                    .collect();
                replies.push(Reply::status(Status::SearchDone));
                return Ok(replies);
            }
            Request::SearchDescribe { space, checks } => {
                let space = self.space(space)?;
                let checks = space.checks(checks)?;
                let mut text = format!(
                    "space {}: scan of {} object(s)",
                    space.schema.name,
                    space.objects.len()
                );
                for check in &checks {
                    text.push_str(&format!("\n  {} {:?}", check.attribute, check.kind));
                }
                text.push_str(&format!("\n  {} match(es)", space.matching(&checks).count()));
                Reply::ok(Response::Text(text))
            }
            Request::Count { space, checks } => {
                let space = self.space(space)?;
                let checks = space.checks(checks)?;
                Reply::ok(Response::Count(space.matching(&checks).count() as u64))
            }
            Request::DumpConfig => {
                let text = self
                    .spaces
                    .values()
                    .map(|space| space.schema.to_string())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Reply::ok(Response::Text(text))
            }
            Request::ListSpaces => {
                let mut replies: Vec<Reply> = self
                    .spaces
                    .keys()
                    .map(|name| Reply::ok(Response::Text(name.clone())))
                    .collect();
                replies.push(Reply::status(Status::SearchDone));
                return Ok(replies);
            }
            Request::AddSpace { description } => match self.add_space(description) {
                Ok(_) => Reply::ok(Response::None),
                Err(message) => Reply::status(Status::ServerError).with_message(message),
            },
            Request::RmSpace { name } => match self.spaces.remove(name) {
                Some(_) => {
                    debug!(space = %name, "space removed");
                    Reply::ok(Response::None)
                }
                None => Reply::status(Status::NotFound)
                    .with_message(format!("cannot rm space `{name}`: does not exist")),
            },
            Request::ValidateSpace { description } => match SpaceSchema::parse(description) {
                Ok(_) => Reply::ok(Response::None),
                Err(message) => Reply::status(Status::ServerError).with_message(message),
            },
        };
        Ok(vec![reply])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmux_codec::{pack, pack_attributes, pack_checks, unpack_attributes, Predicate};

    const KV: &str = "space kv key k attributes string v, int n, set(string) tags";

    fn store() -> Store {
        let mut store = Store::default();
        store.add_space(KV).unwrap();
        store
    }

    fn put(store: &mut Store, key: &str, attrs: Attributes) -> Reply {
        let request = Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&key.into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs).unwrap(),
        };
        store.execute(&request).unwrap().remove(0)
    }

    fn get(store: &mut Store, key: &str) -> Reply {
        let request = Request::Get {
            space: "kv".into(),
            key: pack(&key.into()).unwrap(),
        };
        store.execute(&request).unwrap().remove(0)
    }

    fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attributes {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn put_fills_defaults() {
        let mut store = store();
        assert_eq!(put(&mut store, "a", attrs([("v", "x".into())])).status, Status::Success);
        let reply = get(&mut store, "a");
        let Response::Object(packed) = reply.response else {
            panic!("expected an object");
        };
        let object = unpack_attributes(&packed).unwrap();
        assert_eq!(object["v"], Value::from("x"));
        assert_eq!(object["n"], Value::Int(0));
        assert_eq!(object["tags"], Value::Set(vec![]));
        assert!(!object.contains_key("k"));
    }

    #[test]
    fn missing_object_is_not_found() {
        let mut store = store();
        assert_eq!(get(&mut store, "nope").status, Status::NotFound);
    }

    #[test]
    fn unknown_space_and_attribute_reject() {
        let mut store = store();
        let err = store
            .execute(&Request::Count {
                space: "missing".into(),
                checks: vec![],
            })
            .unwrap_err();
        assert_eq!(err.status, Status::UnknownSpace);

        let request = Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&"a".into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs([("zz", Value::Int(1))])).unwrap(),
        };
        assert_eq!(store.execute(&request).unwrap_err().status, Status::UnknownAttr);
    }

    #[test]
    fn put_wrong_type_rejects() {
        let mut store = store();
        let request = Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&"a".into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs([("n", "text".into())])).unwrap(),
        };
        assert_eq!(store.execute(&request).unwrap_err().status, Status::WrongType);
        assert_eq!(store.object_count("kv"), Some(0));
    }

    #[test]
    fn key_mutation_is_refused() {
        let mut store = store();
        let request = Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&"a".into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs([("k", "b".into())])).unwrap(),
        };
        assert_eq!(store.execute(&request).unwrap_err().status, Status::DontUseKey);
    }

    #[test]
    fn failed_check_leaves_object_untouched() {
        let mut store = store();
        put(&mut store, "a", attrs([("n", Value::Int(1))]));
        let request = Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&"a".into()).unwrap(),
            checks: pack_checks(&[Predicate::equals("n", 2i64)]).unwrap(),
            attributes: pack_attributes(&attrs([("n", Value::Int(5))])).unwrap(),
        };
        assert_eq!(store.execute(&request).unwrap()[0].status, Status::CmpFail);
        let Response::Object(packed) = get(&mut store, "a").response else {
            panic!("expected an object");
        };
        assert_eq!(unpack_attributes(&packed).unwrap()["n"], Value::Int(1));
    }

    #[test]
    fn overflow_is_reported_and_nothing_changes() {
        let mut store = store();
        put(&mut store, "a", attrs([("n", Value::Int(i64::MAX)), ("v", "x".into())]));
        let request = Request::Mutate {
            op: MutateOp::AtomicAdd,
            space: "kv".into(),
            key: pack(&"a".into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs([("n", Value::Int(1))])).unwrap(),
        };
        assert_eq!(store.execute(&request).unwrap()[0].status, Status::Overflow);
    }

    #[test]
    fn search_replies_end_with_done() {
        let mut store = store();
        for key in ["a", "b", "c"] {
            put(&mut store, key, attrs([("v", key.into())]));
        }
        let replies = store
            .execute(&Request::Search {
                space: "kv".into(),
                checks: pack_checks(&[Predicate::greater_than("v", "a")]).unwrap(),
            })
            .unwrap();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[2].status, Status::SearchDone);
    }

    #[test]
    fn space_lifecycle() {
        let mut store = Store::default();
        let added = store
            .execute(&Request::AddSpace {
                description: KV.into(),
            })
            .unwrap();
        assert_eq!(added[0].status, Status::Success);
        let again = store
            .execute(&Request::AddSpace {
                description: KV.into(),
            })
            .unwrap();
        assert_eq!(again[0].status, Status::ServerError);
        assert_eq!(store.space_names(), vec!["kv".to_string()]);

        let removed = store.execute(&Request::RmSpace { name: "kv".into() }).unwrap();
        assert_eq!(removed[0].status, Status::Success);
        let missing = store.execute(&Request::RmSpace { name: "kv".into() }).unwrap();
        assert_eq!(missing[0].status, Status::NotFound);
    }
}
