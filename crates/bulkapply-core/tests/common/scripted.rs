//! Transport double that replays a fixed script of attempts.
//!
//! Each call to `mutate_rows` consumes the next scripted attempt and records
//! the row keys it was sent, so tests can assert what was resent.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bulkapply_core::transport::{
    AttemptContext, EntryStatus, MutateRowsTransport, MutationStream,
};
use bulkapply_core::{Code, RowMutation, Status};

#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
    entries: Vec<EntryStatus>,
    final_status: Status,
    hang: bool,
}

impl ScriptedAttempt {
    /// An attempt that reports nothing and finishes OK.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            final_status: Status::ok(),
            hang: false,
        }
    }

    pub fn entry(mut self, index: usize, code: Code) -> Self {
        self.entries.push(EntryStatus::new(index, Status::from_code(code)));
        self
    }

    pub fn finish(mut self, status: Status) -> Self {
        self.final_status = status;
        self
    }

    /// After the scripted entries, never end the stream.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedAttempt>>,
    sent: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(attempts: Vec<ScriptedAttempt>) -> Self {
        Self {
            script: Mutex::new(attempts.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Row keys sent in each attempt, in order.
    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl MutateRowsTransport for ScriptedTransport {
    type Stream = ScriptedStream;

    async fn mutate_rows(
        &self,
        _table_name: &str,
        rows: Vec<RowMutation>,
        _ctx: AttemptContext,
    ) -> ScriptedStream {
        let keys = rows
            .iter()
            .map(|r| String::from_utf8_lossy(r.row_key()).into_owned())
            .collect();
        self.sent.lock().unwrap().push(keys);
        let attempt = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("engine made more attempts than scripted");
        ScriptedStream {
            entries: attempt.entries.into(),
            final_status: attempt.final_status,
            hang: attempt.hang,
        }
    }
}

#[derive(Debug)]
pub struct ScriptedStream {
    entries: VecDeque<EntryStatus>,
    final_status: Status,
    hang: bool,
}

#[async_trait]
impl MutationStream for ScriptedStream {
    async fn next_entry(&mut self) -> Option<EntryStatus> {
        match self.entries.pop_front() {
            Some(e) => Some(e),
            None if self.hang => std::future::pending().await,
            None => None,
        }
    }

    async fn finish(&mut self) -> Status {
        self.final_status.clone()
    }
}
