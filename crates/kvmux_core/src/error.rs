//! Error types for the client.

use crate::status::Status;
use kvmux_codec::CodecError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur when submitting or completing an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The engine refused the request; nothing was registered.
    #[error("rejected ({status}): {message}")]
    Rejected {
        /// Engine status.
        status: Status,
        /// Engine message.
        message: String,
    },

    /// The operation completed with a non-success status.
    #[error("{status}: {message}")]
    Failed {
        /// Engine status.
        status: Status,
        /// Engine message.
        message: String,
        /// Where in the engine the failure was raised.
        location: String,
    },

    /// An argument could not be marshalled; nothing was submitted.
    #[error("marshalling error: {0}")]
    Codec(#[from] CodecError),

    /// The connection failed while the operation was pending.
    #[error("connection lost ({status}): {message}")]
    ConnectionLost {
        /// Status of the fatal poll.
        status: Status,
        /// Engine message.
        message: String,
    },

    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// No engine handle could be created.
    #[error("cannot connect to {address}:{port}: {message}")]
    Connect {
        /// Coordinator address.
        address: String,
        /// Coordinator port.
        port: u16,
        /// Reason.
        message: String,
    },

    /// The engine answered with a response of the wrong shape.
    #[error("unexpected response, expected {expected}")]
    UnexpectedResponse {
        /// Shape the operation expected.
        expected: &'static str,
    },
}

impl ClientError {
    /// Creates a submission rejection.
    pub fn rejected(status: Status, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Creates a per-operation failure.
    pub fn failed(status: Status, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Failed {
            status,
            message: message.into(),
            location: location.into(),
        }
    }

    /// Creates a loop-fatal failure.
    pub fn connection_lost(status: Status, message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            status,
            message: message.into(),
        }
    }

    /// Status this error corresponds to.
    pub fn status(&self) -> Status {
        match self {
            ClientError::Rejected { status, .. }
            | ClientError::Failed { status, .. }
            | ClientError::ConnectionLost { status, .. } => *status,
            ClientError::Codec(_) => Status::WrongType,
            ClientError::Closed => Status::Interrupted,
            ClientError::Connect { .. } => Status::CoordFail,
            ClientError::UnexpectedResponse { .. } => Status::Internal,
        }
    }

    /// Returns true if the object was not found.
    pub fn is_not_found(&self) -> bool {
        self.status() == Status::NotFound
    }

    /// Returns true if a conditional check failed.
    pub fn is_cmp_fail(&self) -> bool {
        self.status() == Status::CmpFail
    }
}
