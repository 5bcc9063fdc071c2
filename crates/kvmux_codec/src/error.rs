//! Error types for the codec crate.

use crate::datatype::Datatype;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while packing or unpacking values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A list, set or map mixes element types.
    #[error("heterogeneous {container}: expected {expected:?}, found {found:?}")]
    Heterogeneous {
        /// Container kind ("list", "set", "map key", "map value").
        container: &'static str,
        /// Element type established by the first element.
        expected: Datatype,
        /// Offending element type.
        found: Datatype,
    },

    /// Containers cannot hold other containers.
    #[error("nested containers are not supported ({container} inside a container)")]
    NestedContainer {
        /// Kind of the nested container.
        container: &'static str,
    },

    /// Packed bytes do not match the declared datatype.
    #[error("malformed {datatype:?}: {message}")]
    Malformed {
        /// Datatype being decoded.
        datatype: Datatype,
        /// Description of the problem.
        message: String,
    },

    /// Datatype code is not one the codec understands.
    #[error("unknown datatype code {0}")]
    UnknownDatatype(u16),

    /// Datatype is known but cannot be packed or unpacked.
    #[error("unsupported datatype {0:?}")]
    UnsupportedDatatype(Datatype),

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A string element is too long for its 32-bit length prefix.
    #[error("string element of {0} bytes exceeds the 32-bit length prefix")]
    Oversized(usize),
}

impl CodecError {
    /// Create a malformed-input error.
    pub fn malformed(datatype: Datatype, message: impl Into<String>) -> Self {
        Self::Malformed {
            datatype,
            message: message.into(),
        }
    }
}
