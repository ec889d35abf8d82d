use crate::mutation::RowMutation;

/// Decides whether a row mutation may be resent after a failed or
/// undetermined attempt.
pub trait IdempotencyPolicy: Send + Sync + std::fmt::Debug {
    fn is_idempotent(&self, mutation: &RowMutation) -> bool;
}

/// Treat every mutation as safe to resend. The caller accepts that a
/// server-timestamped cell may be written more than once.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl IdempotencyPolicy for AlwaysRetry {
    fn is_idempotent(&self, _mutation: &RowMutation) -> bool {
        true
    }
}

/// Resend only mutations whose every operation produces the same result
/// when applied twice: no `SetCell` may leave the timestamp to the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeIdempotent;

impl IdempotencyPolicy for SafeIdempotent {
    fn is_idempotent(&self, mutation: &RowMutation) -> bool {
        !mutation.operations().iter().any(|op| op.uses_server_time())
    }
}
