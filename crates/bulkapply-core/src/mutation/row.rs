use std::fmt;

/// Cell timestamp in microseconds, or left for the server to assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timestamp {
    /// Caller-chosen version; re-applying writes the same cell version.
    Micros(i64),
    /// The store stamps its current time on every application.
    ServerAssigned,
}

/// Half-open `[start, end)` range of cell timestamps in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampRange {
    pub start: i64,
    pub end: i64,
}

impl TimestampRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// One edit inside a row mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SetCell {
        family: String,
        column: Vec<u8>,
        timestamp: Timestamp,
        value: Vec<u8>,
    },
    DeleteFromColumn {
        family: String,
        column: Vec<u8>,
        /// `None` deletes every version of the column.
        range: Option<TimestampRange>,
    },
    DeleteFromFamily {
        family: String,
    },
    DeleteFromRow,
}

impl Operation {
    /// Set a cell at an explicit timestamp (idempotent).
    pub fn set_cell(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        timestamp_micros: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Operation::SetCell {
            family: family.into(),
            column: column.into(),
            timestamp: Timestamp::Micros(timestamp_micros),
            value: value.into(),
        }
    }

    /// Set a cell at whatever time the server applies it (not idempotent).
    pub fn set_cell_server_time(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Operation::SetCell {
            family: family.into(),
            column: column.into(),
            timestamp: Timestamp::ServerAssigned,
            value: value.into(),
        }
    }

    pub fn delete_column(family: impl Into<String>, column: impl Into<Vec<u8>>) -> Self {
        Operation::DeleteFromColumn {
            family: family.into(),
            column: column.into(),
            range: None,
        }
    }

    pub fn delete_column_range(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        range: TimestampRange,
    ) -> Self {
        Operation::DeleteFromColumn {
            family: family.into(),
            column: column.into(),
            range: Some(range),
        }
    }

    pub fn delete_family(family: impl Into<String>) -> Self {
        Operation::DeleteFromFamily {
            family: family.into(),
        }
    }

    pub fn delete_row() -> Self {
        Operation::DeleteFromRow
    }

    /// True when the store would pick a value for this operation at apply time.
    pub fn uses_server_time(&self) -> bool {
        matches!(
            self,
            Operation::SetCell {
                timestamp: Timestamp::ServerAssigned,
                ..
            }
        )
    }
}

/// Ordered operations applied atomically to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    row_key: Vec<u8>,
    operations: Vec<Operation>,
}

impl RowMutation {
    pub fn new(row_key: impl Into<Vec<u8>>, operations: Vec<Operation>) -> Self {
        Self {
            row_key: row_key.into(),
            operations,
        }
    }

    /// Append one operation, builder style.
    pub fn with(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

impl fmt::Display for RowMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {:?} ({} ops)",
            String::from_utf8_lossy(&self.row_key),
            self.operations.len()
        )
    }
}
