//! Row mutations and batches.
//!
//! A `RowMutation` is an ordered list of cell edits for one row key; a
//! `BulkBatch` is an ordered list of row mutations whose positions identify
//! rows in failure reports.

mod batch;
mod row;

pub use batch::BulkBatch;
pub use row::{Operation, RowMutation, Timestamp, TimestampRange};
