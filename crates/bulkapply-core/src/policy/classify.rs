//! Classify status codes into transient (worth resending) and permanent.

use crate::status::{Code, Status};

/// High-level classification of a status for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The operation succeeded.
    Ok,
    /// The store or network hiccupped; resending may succeed.
    Transient,
    /// Resending the same request will fail the same way.
    Permanent,
}

/// Classify a status code.
///
/// Only `UNAVAILABLE`, `ABORTED` and `DEADLINE_EXCEEDED` are transient.
pub fn classify_code(code: Code) -> StatusKind {
    match code {
        Code::Ok => StatusKind::Ok,
        Code::Unavailable | Code::Aborted | Code::DeadlineExceeded => StatusKind::Transient,
        _ => StatusKind::Permanent,
    }
}

pub fn classify(status: &Status) -> StatusKind {
    classify_code(status.code())
}

pub fn is_transient(status: &Status) -> bool {
    classify(status) == StatusKind::Transient
}
