//! One attempt: send the outstanding rows and drain the response stream.

use tracing::warn;

use super::context::{sleep_until_opt, CallContext};
use super::rows::RowTable;
use crate::status::Status;
use crate::transport::{AttemptContext, MutateRowsTransport, MutationStream};

/// What one attempt produced.
#[derive(Debug)]
pub(crate) struct AttemptResult {
    /// Original index for each attempt-local index.
    pub(crate) sent: Vec<usize>,
    /// Status reported per attempt-local index; `None` if never reported.
    pub(crate) reported: Vec<Option<Status>>,
    pub(crate) stream_status: Status,
}

/// Send the rows at `sent` and collect their statuses.
///
/// Cancellation or a deadline while the stream is open drops the stream and
/// turns into a `CANCELLED` / `DEADLINE_EXCEEDED` stream status; entries read
/// before that are kept.
pub(crate) async fn run_attempt<T: MutateRowsTransport>(
    transport: &T,
    table_name: &str,
    rows: &RowTable,
    sent: Vec<usize>,
    ctx: &CallContext,
    attempt: u32,
) -> AttemptResult {
    let payload = sent.iter().map(|&i| rows.mutation(i).clone()).collect();
    let cancel = ctx.cancel.child_token();
    let deadline = ctx.attempt_deadline();
    let attempt_ctx = AttemptContext {
        cancel: cancel.clone(),
        deadline,
        attempt,
    };

    let mut reported: Vec<Option<Status>> = vec![None; sent.len()];
    let stream_status = {
        let read = drain(transport, table_name, payload, attempt_ctx, &mut reported);
        tokio::pin!(read);
        tokio::select! {
            status = &mut read => status,
            _ = ctx.cancel.cancelled() => Status::cancelled(),
            _ = sleep_until_opt(deadline) => {
                if ctx.deadline == deadline {
                    Status::deadline_exceeded("call deadline exceeded")
                } else {
                    Status::deadline_exceeded("attempt timed out")
                }
            }
        }
    };
    // Tells the transport the stream is abandoned (no-op if it finished).
    cancel.cancel();

    AttemptResult {
        sent,
        reported,
        stream_status,
    }
}

async fn drain<T: MutateRowsTransport>(
    transport: &T,
    table_name: &str,
    payload: Vec<crate::mutation::RowMutation>,
    ctx: AttemptContext,
    reported: &mut [Option<Status>],
) -> Status {
    let attempt = ctx.attempt;
    let mut stream = transport.mutate_rows(table_name, payload, ctx).await;
    while let Some(entry) = stream.next_entry().await {
        match reported.get_mut(entry.index) {
            None => {
                warn!(
                    attempt,
                    index = entry.index,
                    sent = reported.len(),
                    "stream reported an index outside the attempt; ignoring"
                );
            }
            Some(Some(first)) => {
                warn!(
                    attempt,
                    index = entry.index,
                    first = %first,
                    again = %entry.status,
                    "stream reported an entry twice; keeping the first status"
                );
            }
            Some(slot) => *slot = Some(entry.status),
        }
    }
    stream.finish().await
}
