//! Table handle: a shared transport, a table name and policy prototypes.

use std::sync::Arc;

use crate::engine::{BulkApplyCall, CallContext};
use crate::failure::FailureReport;
use crate::mutation::{BulkBatch, RowMutation};
use crate::policy::Policies;
use crate::transport::MutateRowsTransport;

/// Entry point for applying mutations to one table.
///
/// Cheap to share between tasks: each call gets its own row table and fresh
/// retry/backoff instances, and only reads the transport.
#[derive(Debug)]
pub struct Table<T> {
    transport: Arc<T>,
    name: String,
    policies: Policies,
}

impl<T: MutateRowsTransport> Table<T> {
    /// Table handle with default policies.
    pub fn new(transport: Arc<T>, name: impl Into<String>) -> Self {
        Self::with_policies(transport, name, Policies::default())
    }

    pub fn with_policies(transport: Arc<T>, name: impl Into<String>, policies: Policies) -> Self {
        Self {
            transport,
            name: name.into(),
            policies,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Start a call without running it, for callers that want its stats.
    pub fn call(&self, batch: BulkBatch) -> BulkApplyCall<'_, T> {
        BulkApplyCall::new(
            self.transport.as_ref(),
            &self.name,
            batch,
            self.policies.for_call(),
        )
    }

    /// Apply every row in `batch`; no deadline, no cancellation.
    pub async fn bulk_apply(&self, batch: BulkBatch) -> Result<(), FailureReport> {
        self.bulk_apply_with(batch, &CallContext::default()).await
    }

    pub async fn bulk_apply_with(
        &self,
        batch: BulkBatch,
        ctx: &CallContext,
    ) -> Result<(), FailureReport> {
        self.call(batch).run(ctx).await
    }

    /// Apply a single row with the same retry rules as a batch of one.
    pub async fn apply(&self, row: RowMutation) -> Result<(), FailureReport> {
        self.bulk_apply(BulkBatch::new().with(row)).await
    }
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            name: self.name.clone(),
            policies: self.policies.clone(),
        }
    }
}
