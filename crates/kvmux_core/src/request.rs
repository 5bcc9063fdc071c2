//! Requests handed to the engine and the responses it completes them with.

use kvmux_codec::{PackedAttribute, PackedCheck, PackedMapAttribute, PackedValue};

/// Whether an operation completes once or streams results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Exactly one completion.
    OneShot,
    /// Any number of items, ended by an explicit done status.
    Streaming,
}

/// Attribute mutation applied to a whole object or a group of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutateOp {
    /// Overwrite attributes, creating the object if needed.
    Put,
    /// Create the object only if it does not exist.
    PutIfNotExist,
    /// Integer or float addition.
    AtomicAdd,
    /// Integer or float subtraction.
    AtomicSub,
    /// Integer or float multiplication.
    AtomicMul,
    /// Integer or float division.
    AtomicDiv,
    /// Integer remainder.
    AtomicMod,
    /// Bitwise and.
    AtomicAnd,
    /// Bitwise or.
    AtomicOr,
    /// Bitwise exclusive or.
    AtomicXor,
    /// Keep the smaller value.
    AtomicMin,
    /// Keep the larger value.
    AtomicMax,
    /// Prepend to a string.
    StringPrepend,
    /// Append to a string.
    StringAppend,
    /// Push onto the front of a list.
    ListLpush,
    /// Push onto the back of a list.
    ListRpush,
    /// Add elements to a set.
    SetAdd,
    /// Remove elements from a set.
    SetRemove,
    /// Intersect a set with the operand.
    SetIntersect,
    /// Union a set with the operand.
    SetUnion,
}

impl MutateOp {
    /// Engine entry point name.
    pub fn name(self) -> &'static str {
        match self {
            MutateOp::Put => "put",
            MutateOp::PutIfNotExist => "put_if_not_exist",
            MutateOp::AtomicAdd => "atomic_add",
            MutateOp::AtomicSub => "atomic_sub",
            MutateOp::AtomicMul => "atomic_mul",
            MutateOp::AtomicDiv => "atomic_div",
            MutateOp::AtomicMod => "atomic_mod",
            MutateOp::AtomicAnd => "atomic_and",
            MutateOp::AtomicOr => "atomic_or",
            MutateOp::AtomicXor => "atomic_xor",
            MutateOp::AtomicMin => "atomic_min",
            MutateOp::AtomicMax => "atomic_max",
            MutateOp::StringPrepend => "string_prepend",
            MutateOp::StringAppend => "string_append",
            MutateOp::ListLpush => "list_lpush",
            MutateOp::ListRpush => "list_rpush",
            MutateOp::SetAdd => "set_add",
            MutateOp::SetRemove => "set_remove",
            MutateOp::SetIntersect => "set_intersect",
            MutateOp::SetUnion => "set_union",
        }
    }
}

/// Mutation applied to entries of a map attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapOp {
    /// Insert or overwrite entries.
    Add,
    /// Remove entries by key.
    Remove,
    /// Add to entry values.
    AtomicAdd,
    /// Subtract from entry values.
    AtomicSub,
    /// Multiply entry values.
    AtomicMul,
    /// Divide entry values.
    AtomicDiv,
    /// Integer remainder of entry values.
    AtomicMod,
    /// Bitwise and of entry values.
    AtomicAnd,
    /// Bitwise or of entry values.
    AtomicOr,
    /// Bitwise exclusive or of entry values.
    AtomicXor,
    /// Keep the smaller entry value.
    AtomicMin,
    /// Keep the larger entry value.
    AtomicMax,
    /// Prepend to string entry values.
    StringPrepend,
    /// Append to string entry values.
    StringAppend,
}

impl MapOp {
    /// Engine entry point name.
    pub fn name(self) -> &'static str {
        match self {
            MapOp::Add => "map_add",
            MapOp::Remove => "map_remove",
            MapOp::AtomicAdd => "map_atomic_add",
            MapOp::AtomicSub => "map_atomic_sub",
            MapOp::AtomicMul => "map_atomic_mul",
            MapOp::AtomicDiv => "map_atomic_div",
            MapOp::AtomicMod => "map_atomic_mod",
            MapOp::AtomicAnd => "map_atomic_and",
            MapOp::AtomicOr => "map_atomic_or",
            MapOp::AtomicXor => "map_atomic_xor",
            MapOp::AtomicMin => "map_atomic_min",
            MapOp::AtomicMax => "map_atomic_max",
            MapOp::StringPrepend => "map_string_prepend",
            MapOp::StringAppend => "map_string_append",
        }
    }
}

/// Direction of a sorted search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// A logical operation, already marshalled into the engine's flat layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Fetch every attribute of an object.
    Get {
        /// Space name.
        space: String,
        /// Packed key.
        key: PackedValue,
    },
    /// Fetch the named attributes of an object.
    GetPartial {
        /// Space name.
        space: String,
        /// Packed key.
        key: PackedValue,
        /// Attribute names to return.
        attributes: Vec<String>,
    },
    /// Mutate one object; non-empty `checks` makes it conditional.
    Mutate {
        /// Mutation.
        op: MutateOp,
        /// Space name.
        space: String,
        /// Packed key.
        key: PackedValue,
        /// Checks that must hold for the mutation to apply.
        checks: Vec<PackedCheck>,
        /// Operands.
        attributes: Vec<PackedAttribute>,
    },
    /// Mutate every object matching `checks`; completes with a count.
    GroupMutate {
        /// Mutation.
        op: MutateOp,
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
        /// Operands.
        attributes: Vec<PackedAttribute>,
    },
    /// Mutate map entries of one object.
    MapMutate {
        /// Mutation.
        op: MapOp,
        /// Space name.
        space: String,
        /// Packed key.
        key: PackedValue,
        /// Checks that must hold for the mutation to apply.
        checks: Vec<PackedCheck>,
        /// Map entries.
        attributes: Vec<PackedMapAttribute>,
    },
    /// Mutate map entries of every object matching `checks`.
    GroupMapMutate {
        /// Mutation.
        op: MapOp,
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
        /// Map entries.
        attributes: Vec<PackedMapAttribute>,
    },
    /// Delete one object; non-empty `checks` makes it conditional.
    Del {
        /// Space name.
        space: String,
        /// Packed key.
        key: PackedValue,
        /// Checks that must hold for the delete to apply.
        checks: Vec<PackedCheck>,
    },
    /// Delete every object matching `checks`; completes with a count.
    GroupDel {
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
    },
    /// Stream every object matching `checks`.
    Search {
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
    },
    /// Stream up to `limit` matching objects ordered by `sort_by`.
    SortedSearch {
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
        /// Attribute to order by.
        sort_by: String,
        /// Maximum number of objects.
        limit: u64,
        /// Order.
        order: SortOrder,
    },
    /// Describe how a search would be executed.
    SearchDescribe {
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
    },
    /// Count the objects matching `checks`.
    Count {
        /// Space name.
        space: String,
        /// Selection.
        checks: Vec<PackedCheck>,
    },
    /// Dump the cluster configuration.
    DumpConfig,
    /// Stream the name of every space.
    ListSpaces,
    /// Create a space from its description.
    AddSpace {
        /// Space description.
        description: String,
    },
    /// Remove a space.
    RmSpace {
        /// Space name.
        name: String,
    },
    /// Check a space description without creating it.
    ValidateSpace {
        /// Space description.
        description: String,
    },
}

impl Request {
    /// Whether the request streams results.
    pub fn kind(&self) -> OperationKind {
        match self {
            Request::Search { .. } | Request::SortedSearch { .. } | Request::ListSpaces => {
                OperationKind::Streaming
            }
            _ => OperationKind::OneShot,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::GetPartial { .. } => "get_partial",
            Request::Mutate { op, .. } => op.name(),
            Request::GroupMutate { .. } => "group_mutate",
            Request::MapMutate { op, .. } => op.name(),
            Request::GroupMapMutate { .. } => "group_map_mutate",
            Request::Del { .. } => "del",
            Request::GroupDel { .. } => "group_del",
            Request::Search { .. } => "search",
            Request::SortedSearch { .. } => "sorted_search",
            Request::SearchDescribe { .. } => "search_describe",
            Request::Count { .. } => "count",
            Request::DumpConfig => "dump_config",
            Request::ListSpaces => "list_spaces",
            Request::AddSpace { .. } => "add_space",
            Request::RmSpace { .. } => "rm_space",
            Request::ValidateSpace { .. } => "validate_space",
        }
    }

    /// Space the request targets, if any.
    pub fn space(&self) -> Option<&str> {
        match self {
            Request::Get { space, .. }
            | Request::GetPartial { space, .. }
            | Request::Mutate { space, .. }
            | Request::GroupMutate { space, .. }
            | Request::MapMutate { space, .. }
            | Request::GroupMapMutate { space, .. }
            | Request::Del { space, .. }
            | Request::GroupDel { space, .. }
            | Request::Search { space, .. }
            | Request::SortedSearch { space, .. }
            | Request::SearchDescribe { space, .. }
            | Request::Count { space, .. } => Some(space),
            Request::RmSpace { name } => Some(name),
            Request::DumpConfig | Request::ListSpaces | Request::AddSpace { .. } => None,
            Request::ValidateSpace { .. } => None,
        }
    }
}

/// Payload of a successful completion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Response {
    /// No payload.
    #[default]
    None,
    /// An object's attributes, still packed.
    Object(Vec<PackedAttribute>),
    /// Number of objects affected or matched.
    Count(u64),
    /// Text: configuration dump, search description or space name.
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmux_codec::{pack, Value};

    fn key() -> PackedValue {
        pack(&Value::from("k")).unwrap()
    }

    #[test]
    fn streaming_kinds() {
        let search = Request::Search {
            space: "s".into(),
            checks: vec![],
        };
        assert_eq!(search.kind(), OperationKind::Streaming);
        assert_eq!(Request::ListSpaces.kind(), OperationKind::Streaming);
        assert_eq!(
            Request::Count {
                space: "s".into(),
                checks: vec![]
            }
            .kind(),
            OperationKind::OneShot
        );
    }

    #[test]
    fn names_follow_the_operation() {
        let req = Request::Mutate {
            op: MutateOp::AtomicAdd,
            space: "kv".into(),
            key: key(),
            checks: vec![],
            attributes: vec![],
        };
        assert_eq!(req.name(), "atomic_add");
        assert_eq!(req.space(), Some("kv"));
        assert_eq!(Request::DumpConfig.space(), None);
    }
}
