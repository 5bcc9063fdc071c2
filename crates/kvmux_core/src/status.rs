//! Engine status codes.

use std::fmt;

/// Status reported by the engine for a submission, a completion or a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// The operation succeeded.
    Success = 8448,
    /// The object does not exist.
    NotFound = 8449,
    /// A search has delivered its last item.
    SearchDone = 8450,
    /// A conditional check failed.
    CmpFail = 8451,
    /// The cluster is in read-only mode.
    ReadOnly = 8452,

    /// The space does not exist.
    UnknownSpace = 8512,
    /// The coordinator could not be reached.
    CoordFail = 8513,
    /// A server reported an error.
    ServerError = 8514,
    /// Polling the network failed.
    PollFailed = 8515,
    /// An integer operation overflowed.
    Overflow = 8516,
    /// The cluster reconfigured while the operation was in flight.
    Reconfigure = 8517,
    /// The operation timed out.
    Timeout = 8519,
    /// An attribute is not part of the space.
    UnknownAttr = 8520,
    /// An attribute was given more than once.
    DupeAttr = 8521,
    /// No operations are outstanding.
    NonePending = 8523,
    /// The key attribute cannot be used here.
    DontUseKey = 8524,
    /// A value has the wrong type for its attribute.
    WrongType = 8525,
    /// Out of memory.
    NoMem = 8526,
    /// The wait was interrupted.
    Interrupted = 8530,
    /// The client was moved to a different cluster.
    ClusterJump = 8531,
    /// Every server responsible for the key is offline.
    Offline = 8533,
    /// The request lacks the required authorization.
    Unauthorized = 8534,

    /// Internal invariant violated.
    Internal = 8573,
    /// The engine raised an exception.
    Exception = 8574,
    /// The engine returned an unrecognised code.
    Garbage = 8575,
}

impl Status {
    const ALL: [Status; 25] = [
        Status::Success,
        Status::NotFound,
        Status::SearchDone,
        Status::CmpFail,
        Status::ReadOnly,
        Status::UnknownSpace,
        Status::CoordFail,
        Status::ServerError,
        Status::PollFailed,
        Status::Overflow,
        Status::Reconfigure,
        Status::Timeout,
        Status::UnknownAttr,
        Status::DupeAttr,
        Status::NonePending,
        Status::DontUseKey,
        Status::WrongType,
        Status::NoMem,
        Status::Interrupted,
        Status::ClusterJump,
        Status::Offline,
        Status::Unauthorized,
        Status::Internal,
        Status::Exception,
        Status::Garbage,
    ];

    /// Every status, in code order.
    pub fn all() -> &'static [Status] {
        &Self::ALL
    }

    /// Returns the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up a status by code. Unknown codes map to [`Status::Garbage`].
    pub fn from_code(code: u16) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .unwrap_or(Status::Garbage)
    }

    /// Upper-case name as the engine spells it.
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::NotFound => "NOTFOUND",
            Status::SearchDone => "SEARCHDONE",
            Status::CmpFail => "CMPFAIL",
            Status::ReadOnly => "READONLY",
            Status::UnknownSpace => "UNKNOWNSPACE",
            Status::CoordFail => "COORDFAIL",
            Status::ServerError => "SERVERERROR",
            Status::PollFailed => "POLLFAILED",
            Status::Overflow => "OVERFLOW",
            Status::Reconfigure => "RECONFIGURE",
            Status::Timeout => "TIMEOUT",
            Status::UnknownAttr => "UNKNOWNATTR",
            Status::DupeAttr => "DUPEATTR",
            Status::NonePending => "NONEPENDING",
            Status::DontUseKey => "DONTUSEKEY",
            Status::WrongType => "WRONGTYPE",
            Status::NoMem => "NOMEM",
            Status::Interrupted => "INTERRUPTED",
            Status::ClusterJump => "CLUSTER_JUMP",
            Status::Offline => "OFFLINE",
            Status::Unauthorized => "UNAUTHORIZED",
            Status::Internal => "INTERNAL",
            Status::Exception => "EXCEPTION",
            Status::Garbage => "GARBAGE",
        }
    }

    /// Human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Status::Success => "operation succeeded",
            Status::NotFound => "object not found",
            Status::SearchDone => "search complete",
            Status::CmpFail => "conditional check failed",
            Status::ReadOnly => "cluster is in read-only mode",
            Status::UnknownSpace => "space does not exist",
            Status::CoordFail => "lost connection to the coordinator",
            Status::ServerError => "server reported an error",
            Status::PollFailed => "polling the network failed",
            Status::Overflow => "integer overflow",
            Status::Reconfigure => "cluster reconfigured during the operation",
            Status::Timeout => "operation timed out",
            Status::UnknownAttr => "attribute is not part of the space",
            Status::DupeAttr => "attribute specified more than once",
            Status::NonePending => "no operations are pending",
            Status::DontUseKey => "the key attribute cannot be used here",
            Status::WrongType => "value has the wrong type for its attribute",
            Status::NoMem => "out of memory",
            Status::Interrupted => "interrupted",
            Status::ClusterJump => "client moved to a different cluster",
            Status::Offline => "all servers for the key are offline",
            Status::Unauthorized => "not authorized",
            Status::Internal => "internal error",
            Status::Exception => "engine raised an exception",
            Status::Garbage => "unrecognised status code",
        }
    }

    /// Returns true for [`Status::Success`].
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Returns true for the statuses `poll` reports when nothing completed.
    ///
    /// These are not failures of the connection.
    pub fn is_idle(self) -> bool {
        matches!(self, Status::Timeout | Status::NonePending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_lookup() {
        for status in Status::all() {
            assert_eq!(Status::from_code(status.code()), *status);
        }
        assert_eq!(Status::Success.code(), 8448);
        assert_eq!(Status::Garbage.code(), 8575);
    }

    #[test]
    fn unknown_code_is_garbage() {
        assert_eq!(Status::from_code(1), Status::Garbage);
        assert_eq!(Status::from(8518), Status::Garbage);
    }

    #[test]
    fn idle_statuses() {
        assert!(Status::Timeout.is_idle());
        assert!(Status::NonePending.is_idle());
        assert!(!Status::PollFailed.is_idle());
    }

    #[test]
    fn display_uses_engine_name() {
        assert_eq!(Status::ClusterJump.to_string(), "CLUSTER_JUMP");
        assert_eq!(Status::CmpFail.message(), "conditional check failed");
    }
}
