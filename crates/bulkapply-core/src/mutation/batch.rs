use super::row::RowMutation;

/// Ordered batch of row mutations. A row's position is its `original_index`,
/// which stays fixed for the lifetime of a bulk-apply call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkBatch {
    rows: Vec<RowMutation>,
}

impl BulkBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; returns the original index it was assigned.
    pub fn push(&mut self, row: RowMutation) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Builder-style append.
    pub fn with(mut self, row: RowMutation) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, original_index: usize) -> Option<&RowMutation> {
        self.rows.get(original_index)
    }

    /// Rows paired with their original index, in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RowMutation)> {
        self.rows.iter().enumerate()
    }

    pub fn into_rows(self) -> Vec<RowMutation> {
        self.rows
    }
}

impl From<Vec<RowMutation>> for BulkBatch {
    fn from(rows: Vec<RowMutation>) -> Self {
        Self { rows }
    }
}

impl FromIterator<RowMutation> for BulkBatch {
    fn from_iter<I: IntoIterator<Item = RowMutation>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
