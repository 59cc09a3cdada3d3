//! In-memory warehouse.
//!
//! Used for `--dry-run` and as the test double for the apply loop. Every
//! statement is appended to a log; table listings come from tables seeded
//! with [`InMemoryWarehouse::with_table`]. Failures are injected by
//! substring match on the statement text or by `(catalog, schema)` pair for
//! listings.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Warehouse, WarehouseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseCall {
    Execute(String),
    ListTables { catalog: String, schema: String },
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouse {
    tables: BTreeMap<(String, String), Vec<String>>,
    failing_statements: Vec<String>,
    failing_listings: BTreeSet<(String, String)>,
    calls: Vec<WarehouseCall>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table; listings return tables in seeding order.
    pub fn with_table(mut self, catalog: &str, schema: &str, table: &str) -> Self {
        self.tables
            .entry((catalog.to_string(), schema.to_string()))
            .or_default()
            .push(table.to_string());
        self
    }

    /// Fail every statement whose text contains `needle`.
    pub fn failing_statement(mut self, needle: &str) -> Self {
        self.failing_statements.push(needle.to_string());
        self
    }

    /// Fail table listings for `catalog.schema`.
    pub fn failing_listing(mut self, catalog: &str, schema: &str) -> Self {
        self.failing_listings
            .insert((catalog.to_string(), schema.to_string()));
        self
    }

    pub fn calls(&self) -> &[WarehouseCall] {
        &self.calls
    }

    /// Statements that were attempted, including the ones that failed.
    pub fn statements(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                WarehouseCall::Execute(sql) => Some(sql.as_str()),
                WarehouseCall::ListTables { .. } => None,
            })
            .collect()
    }

    /// Attempted statements starting with `prefix` (e.g. `"ALTER TABLE"`).
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }
}

impl Warehouse for InMemoryWarehouse {
    fn execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        self.calls.push(WarehouseCall::Execute(sql.to_string()));
        if let Some(needle) = self
            .failing_statements
            .iter()
            .find(|needle| sql.contains(needle.as_str()))
        {
            return Err(WarehouseError::Rejected(format!(
                "statement rejected (matched `{needle}`)"
            )));
        }
        Ok(())
    }

    fn list_tables(&mut self, catalog: &str, schema: &str) -> Result<Vec<String>, WarehouseError> {
        self.calls.push(WarehouseCall::ListTables {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
        });
        let key = (catalog.to_string(), schema.to_string());
        if self.failing_listings.contains(&key) {
            return Err(WarehouseError::Rejected(format!(
                "schema {catalog}.{schema} not found"
            )));
        }
        Ok(self.tables.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_statements_and_listings() -> Result<(), WarehouseError> {
        let mut wh = InMemoryWarehouse::new()
            .with_table("c1", "s1", "t1")
            .with_table("c1", "s1", "t2");
        wh.use_catalog("c1")?;
        let tables = wh.list_tables("c1", "s1")?;
        assert_eq!(tables, vec!["t1".to_string(), "t2".to_string()]);
        assert!(wh.list_tables("c1", "empty")?.is_empty());
        assert_eq!(wh.statements(), vec!["USE CATALOG c1"]);
        assert_eq!(wh.calls().len(), 3);
        Ok(())
    }

    #[test]
    fn injected_failures_are_still_recorded() {
        let mut wh = InMemoryWarehouse::new()
            .failing_statement("ALTER SCHEMA")
            .failing_listing("c1", "s1");
        assert!(wh.execute("ALTER SCHEMA c1.s1 SET TAGS ()").is_err());
        assert!(wh.execute("ALTER CATALOG c1 SET TAGS ()").is_ok());
        assert!(wh.list_tables("c1", "s1").is_err());
        assert_eq!(wh.statements_starting_with("ALTER").len(), 2);
    }

    #[test]
    fn boxed_handle_forwards() -> Result<(), WarehouseError> {
        let mut wh: Box<dyn Warehouse> =
            Box::new(InMemoryWarehouse::new().with_table("c", "s", "t"));
        assert_eq!(wh.list_tables("c", "s")?, vec!["t".to_string()]);
        Ok(())
    }
}
