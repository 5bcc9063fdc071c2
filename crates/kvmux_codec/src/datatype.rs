//! Datatype tags shared with the engine.
//!
//! The numeric values are significant: container kind, element type and map
//! key type can all be recovered from a tag with mask operations.

use crate::error::{CodecError, CodecResult};

const CONTAINER_MASK: u16 = 9664;
const ELEMENT_MASK: u16 = 9223;
const KEY_MASK: u16 = 56;
const PRIMITIVE_BASE: u16 = 9216;

/// Datatype tag of a packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Datatype {
    /// Untyped primitive.
    Generic = 9216,
    /// Byte string.
    String = 9217,
    /// Signed 64-bit integer.
    Int64 = 9218,
    /// IEEE 754 double.
    Float = 9219,
    /// JSON document.
    Document = 9223,

    /// Empty list.
    ListGeneric = 9280,
    /// List of strings.
    ListString = 9281,
    /// List of integers.
    ListInt64 = 9282,
    /// List of floats.
    ListFloat = 9283,

    /// Empty set.
    SetGeneric = 9344,
    /// Set of strings.
    SetString = 9345,
    /// Set of integers.
    SetInt64 = 9346,
    /// Set of floats.
    SetFloat = 9347,

    /// Empty map.
    MapGeneric = 9408,
    /// Map with string keys and no values.
    MapStringKeyonly = 9416,
    /// String to string.
    MapStringString = 9417,
    /// String to integer.
    MapStringInt64 = 9418,
    /// String to float.
    MapStringFloat = 9419,
    /// Map with integer keys and no values.
    MapInt64Keyonly = 9424,
    /// Integer to string.
    MapInt64String = 9425,
    /// Integer to integer.
    MapInt64Int64 = 9426,
    /// Integer to float.
    MapInt64Float = 9427,
    /// Map with float keys and no values.
    MapFloatKeyonly = 9432,
    /// Float to string.
    MapFloatString = 9433,
    /// Float to integer.
    MapFloatInt64 = 9434,
    /// Float to float.
    MapFloatFloat = 9435,

    /// Returned when the server sends something unintelligible.
    Garbage = 9727,
}

/// Container kind of a datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Not a container.
    Primitive,
    /// Ordered list.
    List,
    /// Sorted set without duplicates.
    Set,
    /// Map sorted by key.
    Map,
}

impl Datatype {
    const ALL: [Datatype; 26] = [
        Datatype::Generic,
        Datatype::String,
        Datatype::Int64,
        Datatype::Float,
        Datatype::Document,
        Datatype::ListGeneric,
        Datatype::ListString,
        Datatype::ListInt64,
        Datatype::ListFloat,
        Datatype::SetGeneric,
        Datatype::SetString,
        Datatype::SetInt64,
        Datatype::SetFloat,
        Datatype::MapGeneric,
        Datatype::MapStringKeyonly,
        Datatype::MapStringString,
        Datatype::MapStringInt64,
        Datatype::MapStringFloat,
        Datatype::MapInt64Keyonly,
        Datatype::MapInt64String,
        Datatype::MapInt64Int64,
        Datatype::MapInt64Float,
        Datatype::MapFloatKeyonly,
        Datatype::MapFloatString,
        Datatype::MapFloatInt64,
        Datatype::MapFloatFloat,
    ];

    /// Returns the numeric tag.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up a datatype by its numeric tag.
    pub fn from_code(code: u16) -> CodecResult<Self> {
        if code == Datatype::Garbage.code() {
            return Ok(Datatype::Garbage);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.code() == code)
            .ok_or(CodecError::UnknownDatatype(code))
    }

    /// Returns the container kind.
    pub fn container(self) -> ContainerKind {
        match self.code() & CONTAINER_MASK {
            9280 => ContainerKind::List,
            9344 => ContainerKind::Set,
            9408 => ContainerKind::Map,
            _ => ContainerKind::Primitive,
        }
    }

    /// Returns true for string, int64, float and the other non-containers.
    pub fn is_primitive(self) -> bool {
        self.container() == ContainerKind::Primitive
    }

    /// Element type of a list or set; value type of a map.
    pub fn element(self) -> CodecResult<Datatype> {
        Self::from_code((self.code() & ELEMENT_MASK) | PRIMITIVE_BASE)
    }

    /// Key type of a map.
    pub fn map_key(self) -> CodecResult<Datatype> {
        Self::from_code(((self.code() & KEY_MASK) >> 3) | PRIMITIVE_BASE)
    }

    /// List of the given element type.
    pub fn list_of(element: Datatype) -> CodecResult<Datatype> {
        Self::from_code(9280 | (element.code() & 7))
    }

    /// Set of the given element type.
    pub fn set_of(element: Datatype) -> CodecResult<Datatype> {
        Self::from_code(9344 | (element.code() & 7))
    }

    /// Map of the given key and value types.
    pub fn map_of(key: Datatype, value: Datatype) -> CodecResult<Datatype> {
        Self::from_code(9408 | ((key.code() & 7) << 3) | (value.code() & 7))
    }
}

impl TryFrom<u16> for Datatype {
    type Error = CodecError;

    fn try_from(code: u16) -> CodecResult<Self> {
        Self::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_masks() {
        assert_eq!(Datatype::ListString.container(), ContainerKind::List);
        assert_eq!(Datatype::SetFloat.container(), ContainerKind::Set);
        assert_eq!(Datatype::MapInt64Float.container(), ContainerKind::Map);
        assert!(Datatype::Int64.is_primitive());
        assert!(Datatype::Document.is_primitive());
    }

    #[test]
    fn element_and_key_extraction() {
        assert_eq!(Datatype::ListInt64.element().unwrap(), Datatype::Int64);
        assert_eq!(Datatype::SetString.element().unwrap(), Datatype::String);
        assert_eq!(Datatype::MapStringInt64.map_key().unwrap(), Datatype::String);
        assert_eq!(Datatype::MapStringInt64.element().unwrap(), Datatype::Int64);
        assert_eq!(Datatype::MapFloatString.map_key().unwrap(), Datatype::Float);
        assert_eq!(Datatype::ListGeneric.element().unwrap(), Datatype::Generic);
    }

    #[test]
    fn container_construction() {
        assert_eq!(
            Datatype::list_of(Datatype::Float).unwrap(),
            Datatype::ListFloat
        );
        assert_eq!(
            Datatype::set_of(Datatype::Int64).unwrap(),
            Datatype::SetInt64
        );
        assert_eq!(
            Datatype::map_of(Datatype::Int64, Datatype::String).unwrap(),
            Datatype::MapInt64String
        );
    }

    #[test]
    fn unknown_code() {
        assert_eq!(
            Datatype::from_code(1234),
            Err(CodecError::UnknownDatatype(1234))
        );
        assert_eq!(Datatype::try_from(9417).unwrap(), Datatype::MapStringString);
    }
}
