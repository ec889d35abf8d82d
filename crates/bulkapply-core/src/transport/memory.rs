//! In-process transport backed by an in-memory cell store.
//!
//! Applies mutations for real, so tests and the CLI can check what ended up
//! in the store, and injects faults from a seeded RNG: per-row transient and
//! permanent failures, streams that end before reporting a row they applied,
//! and attempts that finish `ABORTED`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{AttemptContext, EntryStatus, MutateRowsTransport, MutationStream};
use crate::mutation::{Operation, RowMutation, Timestamp};
use crate::status::{Code, Status};

/// Fault injection rates, each a probability in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultPlan {
    /// Row reported `UNAVAILABLE` and not applied.
    pub row_failure_rate: f64,
    /// Row reported `OUT_OF_RANGE` and not applied.
    pub permanent_failure_rate: f64,
    /// Row applied, then the stream ends without reporting it or anything after.
    pub truncate_rate: f64,
    /// Attempt stops at a random row and finishes `ABORTED`.
    pub abort_rate: f64,
    /// Seed for reproducible faults; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl FaultPlan {
    pub fn none() -> Self {
        Self::default()
    }

    fn clamped(self) -> Self {
        let c = |p: f64| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        Self {
            row_failure_rate: c(self.row_failure_rate),
            permanent_failure_rate: c(self.permanent_failure_rate),
            truncate_rate: c(self.truncate_rate),
            abort_rate: c(self.abort_rate),
            seed: self.seed,
        }
    }
}

type Versions = BTreeMap<i64, Vec<u8>>;
type Columns = BTreeMap<Vec<u8>, Versions>;
type Families = BTreeMap<String, Columns>;
type Rows = BTreeMap<Vec<u8>, Families>;

#[derive(Debug, Default)]
struct Store {
    tables: BTreeMap<String, Rows>,
    /// Server clock in microseconds; advances on every server-assigned write.
    clock_micros: i64,
}

impl Store {
    fn apply(&mut self, table: &str, mutation: &RowMutation) {
        let rows = self.tables.entry(table.to_string()).or_default();
        let families = rows.entry(mutation.row_key().to_vec()).or_default();
        for op in mutation.operations() {
            match op {
                Operation::SetCell {
                    family,
                    column,
                    timestamp,
                    value,
                } => {
                    let ts = match timestamp {
                        Timestamp::Micros(t) => *t,
                        Timestamp::ServerAssigned => {
                            self.clock_micros += 1;
                            self.clock_micros
                        }
                    };
                    families
                        .entry(family.clone())
                        .or_default()
                        .entry(column.clone())
                        .or_default()
                        .insert(ts, value.clone());
                }
                Operation::DeleteFromColumn {
                    family,
                    column,
                    range,
                } => {
                    if let Some(columns) = families.get_mut(family) {
                        match range {
                            None => {
                                columns.remove(column);
                            }
                            Some(r) => {
                                if let Some(versions) = columns.get_mut(column) {
                                    versions.retain(|ts, _| !r.contains(*ts));
                                }
                            }
                        }
                    }
                }
                Operation::DeleteFromFamily { family } => {
                    families.remove(family);
                }
                Operation::DeleteFromRow => families.clear(),
            }
        }
        families.retain(|_, columns| {
            columns.retain(|_, versions| !versions.is_empty());
            !columns.is_empty()
        });
        if families.is_empty() {
            rows.remove(mutation.row_key());
        }
    }
}

/// Transport that applies mutations to an in-process store.
#[derive(Debug)]
pub struct InMemoryTransport {
    store: Mutex<Store>,
    rng: Mutex<StdRng>,
    faults: FaultPlan,
    require_existing_tables: bool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_faults(FaultPlan::none())
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        let faults = faults.clamped();
        let rng = match faults.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store: Mutex::new(Store {
                tables: BTreeMap::new(),
                clock_micros: 1_000_000,
            }),
            rng: Mutex::new(rng),
            faults,
            require_existing_tables: false,
        }
    }

    /// Fail attempts against tables that were not created with `create_table`.
    pub fn require_existing_tables(mut self) -> Self {
        self.require_existing_tables = true;
        self
    }

    pub fn create_table(&self, name: &str) {
        self.lock_store().tables.entry(name.to_string()).or_default();
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// All versions of one cell, oldest first.
    pub fn cell_versions(
        &self,
        table: &str,
        row_key: &[u8],
        family: &str,
        column: &[u8],
    ) -> Vec<(i64, Vec<u8>)> {
        self.lock_store()
            .tables
            .get(table)
            .and_then(|rows| rows.get(row_key))
            .and_then(|families| families.get(family))
            .and_then(|columns| columns.get(column))
            .map(|versions| versions.iter().map(|(ts, v)| (*ts, v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn row_exists(&self, table: &str, row_key: &[u8]) -> bool {
        self.lock_store()
            .tables
            .get(table)
            .is_some_and(|rows| rows.contains_key(row_key))
    }

    /// Number of non-empty rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.lock_store().tables.get(table).map_or(0, |rows| rows.len())
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MutateRowsTransport for InMemoryTransport {
    type Stream = MemoryStream;

    async fn mutate_rows(
        &self,
        table_name: &str,
        rows: Vec<RowMutation>,
        ctx: AttemptContext,
    ) -> MemoryStream {
        if ctx.cancel.is_cancelled() {
            return MemoryStream::finished(Vec::new(), Status::cancelled());
        }

        let mut store = self.lock_store();
        if self.require_existing_tables && !store.tables.contains_key(table_name) {
            return MemoryStream::finished(
                Vec::new(),
                Status::new(Code::FailedPrecondition, "no such table"),
            );
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let abort_at = rng
            .random_bool(self.faults.abort_rate)
            .then(|| rng.random_range(0..=rows.len()));
        let mut entries = Vec::with_capacity(rows.len());
        let mut final_status = Status::ok();

        for (index, row) in rows.iter().enumerate() {
            if abort_at == Some(index) {
                final_status = Status::new(Code::Aborted, "injected stream abort");
                break;
            }
            if rng.random_bool(self.faults.permanent_failure_rate) {
                entries.push(EntryStatus::new(index, Status::from_code(Code::OutOfRange)));
                continue;
            }
            if rng.random_bool(self.faults.row_failure_rate) {
                entries.push(EntryStatus::new(index, Status::from_code(Code::Unavailable)));
                continue;
            }
            store.apply(table_name, row);
            if rng.random_bool(self.faults.truncate_rate) {
                // Applied but never reported; the stream ends cleanly.
                break;
            }
            entries.push(EntryStatus::new(index, Status::ok()));
        }
        if abort_at == Some(rows.len()) {
            final_status = Status::new(Code::Aborted, "injected stream abort");
        }
        entries.shuffle(&mut *rng);

        debug!(
            table = table_name,
            attempt = ctx.attempt,
            sent = rows.len(),
            reported = entries.len(),
            status = %final_status,
            "in-memory mutate_rows"
        );
        MemoryStream::finished(entries, final_status)
    }
}

/// Response stream of `InMemoryTransport`; all entries are ready up front.
#[derive(Debug)]
pub struct MemoryStream {
    entries: VecDeque<EntryStatus>,
    final_status: Status,
}

impl MemoryStream {
    fn finished(entries: Vec<EntryStatus>, final_status: Status) -> Self {
        Self {
            entries: entries.into(),
            final_status,
        }
    }
}

#[async_trait]
impl MutationStream for MemoryStream {
    async fn next_entry(&mut self) -> Option<EntryStatus> {
        self.entries.pop_front()
    }

    async fn finish(&mut self) -> Status {
        self.final_status.clone()
    }
}
