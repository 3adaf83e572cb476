// In-memory dataset registry - Tables loaded at startup, keyed by data source
use crate::domain::dataset::Table;
use crate::interpreter::DatasetRegistry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    tables: BTreeMap<String, BTreeMap<String, Table>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `table` under `data_source_id`, returning any table it replaced.
    pub fn insert(&mut self, data_source_id: impl Into<String>, table: Table) -> Option<Table> {
        self.tables
            .entry(data_source_id.into())
            .or_default()
            .insert(table.name.clone(), table)
    }

    #[cfg(test)]
    pub fn with_table(mut self, data_source_id: impl Into<String>, table: Table) -> Self {
        self.insert(data_source_id, table);
        self
    }

    /// Table names for one data source, sorted.
    pub fn table_names(&self, data_source_id: &str) -> Vec<&str> {
        self.tables
            .get(data_source_id)
            .map(|tables| tables.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl DatasetRegistry for InMemoryRegistry {
    fn table(&self, data_source_id: &str, name: &str) -> Option<&Table> {
        self.tables.get(data_source_id)?.get(name)
    }
}
