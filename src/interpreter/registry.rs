// Dataset registry - Read-only lookup of in-memory tables
use crate::domain::dataset::Table;

/// Source of the tables a query runs against.
///
/// Implementations are shared across tile tasks and must not change while a
/// dashboard session is live.
pub trait DatasetRegistry: Send + Sync {
    fn table(&self, data_source_id: &str, name: &str) -> Option<&Table>;
}
