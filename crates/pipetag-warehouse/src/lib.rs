//! Warehouse session handles.
//!
//! The apply loop never talks to a global session: it receives a
//! `&mut impl Warehouse` and issues one statement at a time through it.
//!
//! Backends:
//! - [`memory::InMemoryWarehouse`]: records statements, serves table listings
//!   from memory, can be told to fail specific statements (dry runs, tests)
//! - [`databricks::DatabricksWarehouse`]: Databricks SQL Statement Execution API
//!   (feature `databricks`)

use thiserror::Error;

#[cfg(feature = "databricks")]
pub mod databricks;
pub mod memory;

pub use memory::InMemoryWarehouse;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse configuration error: {0}")]
    Config(String),
    #[error("failed to reach warehouse at {url}: {message}")]
    Transport { url: String, message: String },
    #[error("warehouse http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("statement {state}: {message}")]
    Statement { state: String, message: String },
    #[error("unexpected warehouse response: {0}")]
    Protocol(String),
    #[error("{0}")]
    Rejected(String),
}

/// A sequential SQL session against one warehouse.
pub trait Warehouse {
    /// Execute a statement to completion, discarding any result rows.
    fn execute(&mut self, sql: &str) -> Result<(), WarehouseError>;

    /// Make `catalog` the active catalog for following statements.
    fn use_catalog(&mut self, catalog: &str) -> Result<(), WarehouseError> {
        self.execute(&pipetag_catalog::statements::use_catalog_sql(catalog))
    }

    /// Names of the tables currently present in `catalog.schema`.
    fn list_tables(&mut self, catalog: &str, schema: &str) -> Result<Vec<String>, WarehouseError>;
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        (**self).execute(sql)
    }

    fn use_catalog(&mut self, catalog: &str) -> Result<(), WarehouseError> {
        (**self).use_catalog(catalog)
    }

    fn list_tables(&mut self, catalog: &str, schema: &str) -> Result<Vec<String>, WarehouseError> {
        (**self).list_tables(catalog, schema)
    }
}
