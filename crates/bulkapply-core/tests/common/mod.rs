#![allow(dead_code)]

pub mod scripted;

use bulkapply_core::{BulkBatch, Operation, RowMutation};

/// Row with an explicit timestamp, safe to resend.
pub fn idempotent_row(key: &str) -> RowMutation {
    RowMutation::new(key, vec![Operation::set_cell("fam", "col", 0, "baz")])
}

/// Row whose cell timestamp is picked by the server.
pub fn server_time_row(key: &str) -> RowMutation {
    RowMutation::new(key, vec![Operation::set_cell_server_time("fam", "col", "baz")])
}

pub fn batch_of(keys: &[&str]) -> BulkBatch {
    keys.iter().map(|k| idempotent_row(k)).collect()
}
