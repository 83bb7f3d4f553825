//! Catalog metrics collector.
//!
//! Tracks operation counts, latencies and error rates for monitoring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Catalog operation type for metrics tracking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CatalogOp {
    /// Field declaration.
    CreateField,
    /// Field removal.
    DeleteField,
    /// Field listing.
    ListFields,
    /// Metadata set creation.
    CreateSet,
    /// Metadata set resolution.
    ResolveSet,
    /// Metadata set listing.
    ListSets,
    /// Metadata set removal.
    RemoveSet,
    /// Metadata assignment.
    SetMetadata,
    /// Parameter append.
    SetParameter,
    /// Directory metadata read.
    GetMetadata,
    /// Directory query.
    FindDirectories,
    /// File query.
    FindFiles,
    /// Facet computation.
    CompatibleValues,
    /// Parameter promotion.
    Promote,
    /// Bulk metadata removal.
    RemoveMetadata,
}

impl CatalogOp {
    /// Returns a string representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogOp::CreateField => "create_field",
            CatalogOp::DeleteField => "delete_field",
            CatalogOp::ListFields => "list_fields",
            CatalogOp::CreateSet => "create_set",
            CatalogOp::ResolveSet => "resolve_set",
            CatalogOp::ListSets => "list_sets",
            CatalogOp::RemoveSet => "remove_set",
            CatalogOp::SetMetadata => "set_metadata",
            CatalogOp::SetParameter => "set_parameter",
            CatalogOp::GetMetadata => "get_metadata",
            CatalogOp::FindDirectories => "find_directories",
            CatalogOp::FindFiles => "find_files",
            CatalogOp::CompatibleValues => "compatible_values",
            CatalogOp::Promote => "promote",
            CatalogOp::RemoveMetadata => "remove_metadata",
        }
    }
}

/// Per-operation metrics.
#[derive(Clone, Debug, Default)]
pub struct OpMetrics {
    /// Number of operations.
    pub count: u64,
    /// Number of errors.
    pub errors: u64,
    /// Total duration in microseconds.
    pub total_duration_us: u64,
}

impl OpMetrics {
    /// Returns the average duration in microseconds.
    pub fn avg_duration_us(&self) -> u64 {
        if self.count > 0 {
            self.total_duration_us / self.count
        } else {
            0
        }
    }

    /// Returns the error rate (errors / total operations).
    pub fn error_rate(&self) -> f64 {
        if self.count > 0 {
            self.errors as f64 / self.count as f64
        } else {
            0.0
        }
    }
}

/// Point-in-time view of the catalog metrics.
#[derive(Clone, Debug, Default)]
pub struct CatalogMetrics {
    /// Per-operation metrics.
    pub ops: HashMap<CatalogOp, OpMetrics>,
    /// Total number of operations.
    pub total_ops: u64,
    /// Total number of errors.
    pub total_errors: u64,
    /// Keys stored as parameters because they were not declared.
    pub unsearchable_keys: u64,
    /// Metadata conflicts reported to callers.
    pub conflicts: u64,
}

/// Metrics collector for the catalog.
pub struct MetricsCollector {
    op_metrics: RwLock<HashMap<CatalogOp, OpMetrics>>,
    unsearchable_keys: AtomicU64,
    conflicts: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new MetricsCollector.
    pub fn new() -> Self {
        Self {
            op_metrics: RwLock::new(HashMap::new()),
            unsearchable_keys: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Records one call of `op`.
    pub fn record_op(&self, op: CatalogOp, duration_us: u64, success: bool) {
        let mut metrics = self.op_metrics.write();
        let entry = metrics.entry(op).or_default();
        entry.count += 1;
        entry.errors += u64::from(!success);
        entry.total_duration_us = entry.total_duration_us.saturating_add(duration_us);
    }

    /// Adds keys that were stored as parameters.
    pub fn record_unsearchable(&self, keys: u64) {
        self.unsearchable_keys.fetch_add(keys, Ordering::Relaxed);
    }

    /// Increments the conflict counter.
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets metrics for a specific operation.
    pub fn get_op_metrics(&self, op: CatalogOp) -> OpMetrics {
        self.op_metrics.read().get(&op).cloned().unwrap_or_default()
    }

    /// Creates a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> CatalogMetrics {
        let op_metrics = self.op_metrics.read();
        let mut total_ops = 0u64;
        let mut total_errors = 0u64;

        let ops: HashMap<CatalogOp, OpMetrics> = op_metrics
            .iter()
            .map(|(k, v)| {
                total_ops += v.count;
                total_errors += v.errors;
                (*k, v.clone())
            })
            .collect();

        CatalogMetrics {
            ops,
            total_ops,
            total_errors,
            unsearchable_keys: self.unsearchable_keys.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
