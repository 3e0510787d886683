use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Public pipeline operations tracked by [`OperationMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    GetMany,
    Save,
    SaveMany,
    Update,
    UpdateMany,
    Edit,
    EditMany,
    Delete,
    DeleteMany,
    DeleteAll,
    SaveChild,
    UpdateChild,
    DeleteChild,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::Get,
        Operation::GetMany,
        Operation::Save,
        Operation::SaveMany,
        Operation::Update,
        Operation::UpdateMany,
        Operation::Edit,
        Operation::EditMany,
        Operation::Delete,
        Operation::DeleteMany,
        Operation::DeleteAll,
        Operation::SaveChild,
        Operation::UpdateChild,
        Operation::DeleteChild,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::GetMany => "get_many",
            Operation::Save => "save",
            Operation::SaveMany => "save_many",
            Operation::Update => "update",
            Operation::UpdateMany => "update_many",
            Operation::Edit => "edit",
            Operation::EditMany => "edit_many",
            Operation::Delete => "delete",
            Operation::DeleteMany => "delete_many",
            Operation::DeleteAll => "delete_all",
            Operation::SaveChild => "save_child",
            Operation::UpdateChild => "update_child",
            Operation::DeleteChild => "delete_child",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub failures: u64,
    pub total_micros: u64,
}

impl OperationStats {
    pub fn average_micros(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_micros / self.calls
        }
    }
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    total_micros: AtomicU64,
}

/// Lock-free per-operation call statistics.
#[derive(Default)]
pub struct OperationMetrics {
    counters: [Counters; Operation::ALL.len()],
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: Operation, elapsed: Duration, failed: bool) {
        let counters = &self.counters[operation.slot()];
        counters.calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        counters.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn stats(&self, operation: Operation) -> OperationStats {
        let counters = &self.counters[operation.slot()];
        OperationStats {
            calls: counters.calls.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            total_micros: counters.total_micros.load(Ordering::Relaxed),
        }
    }

    /// Stats of every operation called at least once.
    pub fn snapshot(&self) -> BTreeMap<Operation, OperationStats> {
        Operation::ALL
            .iter()
            .map(|op| (*op, self.stats(*op)))
            .filter(|(_, stats)| stats.calls > 0)
            .collect()
    }
}

impl fmt::Debug for OperationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
