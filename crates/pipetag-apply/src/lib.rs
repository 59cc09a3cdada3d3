//! Catalog / schema / table tag application.
//!
//! ```text
//! bootstrap:  CREATE CATALOG IF NOT EXISTS c ; CREATE SCHEMA IF NOT EXISTS c.s (×N)
//! apply:      for catalog in document
//!               ALTER CATALOG c SET TAGS (...)               fatal by default
//!               for schema in catalog
//!                 USE CATALOG c
//!                 ALTER SCHEMA c.s SET TAGS (...)            warn + next schema
//!                 list tables in c.s                         warn + next schema
//!                 for table: ALTER TABLE c.s.t SET TAGS (...)  warn + next table
//! ```
//!
//! Tables carry no tags of their own: they receive their schema's fragment.
//! Traversal is depth-first in document order, one statement at a time.
//!
//! [`apply_file`] runs the whole sequence from a document on disk. The
//! document is loaded and validated before the first statement, bootstrap
//! included, reaches the warehouse.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use pipetag_catalog::statements::{create_catalog_sql, create_schema_sql, set_tags_sql};
use pipetag_catalog::{
    load_catalog_document, CatalogDescriptor, CatalogDocument, CatalogLoadError,
    SchemaDescriptor, TagTarget,
};
use pipetag_warehouse::{Warehouse, WarehouseError};

pub const DEFAULT_BOOTSTRAP_CATALOG: &str = "pipeline_catalog";
pub const DEFAULT_BOOTSTRAP_SCHEMAS: [&str; 3] = ["bronze", "silver", "gold"];

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to load catalog tag document {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: CatalogLoadError,
    },
    #[error("failed to bootstrap {object}: {source}")]
    Bootstrap {
        object: String,
        #[source]
        source: WarehouseError,
    },
    #[error("failed to apply tags to catalog '{catalog}': {source}")]
    CatalogTags {
        catalog: String,
        #[source]
        source: WarehouseError,
    },
    #[error("failed to select catalog '{catalog}': {source}")]
    UseCatalog {
        catalog: String,
        #[source]
        source: WarehouseError,
    },
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Catalog and schemas created before any tag is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub catalog: String,
    pub schemas: Vec<String>,
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_BOOTSTRAP_CATALOG.to_string(),
            schemas: DEFAULT_BOOTSTRAP_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Create the bootstrap catalog and schemas if they do not exist.
pub fn bootstrap<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    plan: &BootstrapPlan,
) -> Result<(), ApplyError> {
    warehouse
        .execute(&create_catalog_sql(&plan.catalog))
        .map_err(|source| ApplyError::Bootstrap {
            object: format!("catalog '{}'", plan.catalog),
            source,
        })?;
    for schema in &plan.schemas {
        warehouse
            .execute(&create_schema_sql(&plan.catalog, schema))
            .map_err(|source| ApplyError::Bootstrap {
                object: format!("schema '{}.{}'", plan.catalog, schema),
                source,
            })?;
    }
    tracing::info!(
        catalog = %plan.catalog,
        schemas = plan.schemas.len(),
        "Catalog and schemas created."
    );
    Ok(())
}

// ============================================================================
// Apply
// ============================================================================

/// What to do when `ALTER CATALOG ... SET TAGS` (or `USE CATALOG`) fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogFailurePolicy {
    /// Stop the run with an error.
    #[default]
    Abort,
    /// Record the failure and keep going, like schema and table failures.
    Continue,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub catalog_failures: CatalogFailurePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureScope {
    Catalog,
    Schema,
    TableListing,
    Table,
}

impl FailureScope {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureScope::Catalog => "catalog",
            FailureScope::Schema => "schema",
            FailureScope::TableListing => "table listing",
            FailureScope::Table => "table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub scope: FailureScope,
    /// Dotted object name (`catalog`, `catalog.schema`, `catalog.schema.table`).
    pub object: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub catalogs_tagged: Vec<String>,
    pub schemas_tagged: Vec<String>,
    pub tables_tagged: Vec<String>,
    /// Objects with an empty tag set (no statement issued).
    pub skipped_untagged: Vec<String>,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_in(&self, scope: FailureScope) -> impl Iterator<Item = &ApplyFailure> {
        self.failures.iter().filter(move |f| f.scope == scope)
    }

    fn fail(&mut self, scope: FailureScope, object: String, err: &WarehouseError) {
        tracing::warn!("Could not {} '{}': {}", failure_verb(scope), object, err);
        self.failures.push(ApplyFailure {
            scope,
            object,
            message: err.to_string(),
        });
    }
}

fn failure_verb(scope: FailureScope) -> &'static str {
    match scope {
        FailureScope::Catalog => "apply tags to catalog",
        FailureScope::Schema => "apply tags to schema",
        FailureScope::TableListing => "list tables in schema",
        FailureScope::Table => "apply tags to table",
    }
}

/// Walk `document` and apply tags at catalog, schema and table level.
pub fn apply_document<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    document: &CatalogDocument,
    options: &ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport::default();
    for catalog in &document.catalogs {
        apply_catalog(warehouse, catalog, options, &mut report)?;
    }
    tracing::info!(
        catalogs = report.catalogs_tagged.len(),
        schemas = report.schemas_tagged.len(),
        tables = report.tables_tagged.len(),
        failures = report.failures.len(),
        "All catalog, schema, and table tags processed."
    );
    Ok(report)
}

/// Load the document at `path`, bootstrap (when `plan` is given), then apply.
///
/// A document that fails to load issues no statement at all.
pub fn apply_file<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    path: &Path,
    plan: Option<&BootstrapPlan>,
    options: &ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    let document = load_catalog_document(path).map_err(|source| ApplyError::Load {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        catalogs = document.catalogs.len(),
        schemas = document.schema_count(),
        "Loaded catalog tag document."
    );
    if let Some(plan) = plan {
        bootstrap(warehouse, plan)?;
    }
    apply_document(warehouse, &document, options)
}

fn apply_catalog<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    catalog: &CatalogDescriptor,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) -> Result<(), ApplyError> {
    let target = TagTarget::Catalog {
        catalog: &catalog.name,
    };

    if catalog.tags.is_empty() {
        tracing::info!("No tags for catalog '{}', skipping ALTER CATALOG.", catalog.name);
        report.skipped_untagged.push(catalog.name.clone());
    } else {
        tracing::info!("Applying tags to catalog '{}'...", catalog.name);
        match warehouse.execute(&set_tags_sql(&target, &catalog.tags.to_tag_sql())) {
            Ok(()) => report.catalogs_tagged.push(catalog.name.clone()),
            Err(source) => match options.catalog_failures {
                CatalogFailurePolicy::Abort => {
                    return Err(ApplyError::CatalogTags {
                        catalog: catalog.name.clone(),
                        source,
                    })
                }
                CatalogFailurePolicy::Continue => {
                    report.fail(FailureScope::Catalog, catalog.name.clone(), &source)
                }
            },
        }
    }

    for schema in &catalog.schemas {
        apply_schema(warehouse, &catalog.name, schema, options, report)?;
    }
    Ok(())
}

fn apply_schema<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    catalog: &str,
    schema: &SchemaDescriptor,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) -> Result<(), ApplyError> {
    let target = TagTarget::Schema {
        catalog,
        schema: &schema.name,
    };
    let qualified = target.display_name();

    if schema.tags.is_empty() {
        tracing::info!("No tags for schema '{qualified}', skipping schema and its tables.");
        report.skipped_untagged.push(qualified);
        return Ok(());
    }

    if let Err(source) = warehouse.use_catalog(catalog) {
        match options.catalog_failures {
            CatalogFailurePolicy::Abort => {
                return Err(ApplyError::UseCatalog {
                    catalog: catalog.to_string(),
                    source,
                })
            }
            CatalogFailurePolicy::Continue => {
                report.fail(FailureScope::Catalog, catalog.to_string(), &source);
                return Ok(());
            }
        }
    }

    let tag_sql = schema.tags.to_tag_sql();
    tracing::info!("Applying tags to schema '{qualified}'...");
    if let Err(err) = warehouse.execute(&set_tags_sql(&target, &tag_sql)) {
        report.fail(FailureScope::Schema, qualified, &err);
        return Ok(());
    }
    report.schemas_tagged.push(qualified.clone());

    let tables = match warehouse.list_tables(catalog, &schema.name) {
        Ok(tables) => tables,
        Err(err) => {
            report.fail(FailureScope::TableListing, qualified, &err);
            return Ok(());
        }
    };

    for table in &tables {
        let target = TagTarget::Table {
            catalog,
            schema: &schema.name,
            table,
        };
        let qualified = target.display_name();
        tracing::info!("Applying tags to table '{qualified}'...");
        match warehouse.execute(&set_tags_sql(&target, &tag_sql)) {
            Ok(()) => report.tables_tagged.push(qualified),
            Err(err) => report.fail(FailureScope::Table, qualified, &err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pipetag_catalog::parse_catalog_document;
    use pipetag_warehouse::memory::WarehouseCall;
    use pipetag_warehouse::InMemoryWarehouse;

    const TWO_SCHEMAS: &str = r#"
catalogs:
  c1:
    owner: alice
    schemas:
      a:
        layer: raw
      b:
        layer: curated
"#;

    #[test]
    fn bootstrap_creates_catalog_then_schemas() -> Result<()> {
        let mut wh = InMemoryWarehouse::new();
        bootstrap(&mut wh, &BootstrapPlan::default())?;
        assert_eq!(
            wh.statements(),
            vec![
                "CREATE CATALOG IF NOT EXISTS pipeline_catalog",
                "CREATE SCHEMA IF NOT EXISTS pipeline_catalog.bronze",
                "CREATE SCHEMA IF NOT EXISTS pipeline_catalog.silver",
                "CREATE SCHEMA IF NOT EXISTS pipeline_catalog.gold",
            ]
        );
        Ok(())
    }

    #[test]
    fn bootstrap_failure_is_fatal_and_names_the_object() {
        let mut wh = InMemoryWarehouse::new().failing_statement("pipeline_catalog.silver");
        let err = bootstrap(&mut wh, &BootstrapPlan::default()).unwrap_err();
        assert!(err.to_string().contains("schema 'pipeline_catalog.silver'"), "{err}");
        assert_eq!(wh.statements().len(), 3);
    }

    #[test]
    fn catalog_without_schemas_skips_schema_loop() -> Result<()> {
        let doc = parse_catalog_document("catalogs:\n  c1:\n    owner: alice\n")?;
        let mut wh = InMemoryWarehouse::new();
        let report = apply_document(&mut wh, &doc, &ApplyOptions::default())?;
        assert_eq!(report.catalogs_tagged, vec!["c1"]);
        assert!(report.is_clean());
        assert_eq!(wh.statements().len(), 1);
        assert!(!wh
            .calls()
            .iter()
            .any(|c| matches!(c, WarehouseCall::ListTables { .. })));
        Ok(())
    }

    #[test]
    fn schema_failure_does_not_block_sibling() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new()
            .with_table("c1", "a", "ta")
            .with_table("c1", "b", "tb")
            .failing_statement("ALTER SCHEMA c1.a");
        let report = apply_document(&mut wh, &doc, &ApplyOptions::default())?;

        assert_eq!(report.schemas_tagged, vec!["c1.b"]);
        assert_eq!(report.tables_tagged, vec!["c1.b.tb"]);
        let failures: Vec<_> = report.failures_in(FailureScope::Schema).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].object, "c1.a");
        // No listing for the failed schema.
        assert_eq!(
            wh.calls()
                .iter()
                .filter(|c| matches!(c, WarehouseCall::ListTables { .. }))
                .count(),
            1
        );
        Ok(())
    }

    #[test]
    fn listing_failure_skips_only_that_schema() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new()
            .with_table("c1", "a", "ta")
            .with_table("c1", "b", "tb")
            .failing_listing("c1", "a");
        let report = apply_document(&mut wh, &doc, &ApplyOptions::default())?;

        assert_eq!(report.schemas_tagged, vec!["c1.a", "c1.b"]);
        assert_eq!(report.tables_tagged, vec!["c1.b.tb"]);
        assert_eq!(report.failures_in(FailureScope::TableListing).count(), 1);
        Ok(())
    }

    #[test]
    fn table_failure_continues_with_next_table() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new()
            .with_table("c1", "a", "t1")
            .with_table("c1", "a", "t2")
            .with_table("c1", "a", "t3")
            .failing_statement("ALTER TABLE c1.a.t2");
        let report = apply_document(&mut wh, &doc, &ApplyOptions::default())?;

        assert_eq!(report.tables_tagged, vec!["c1.a.t1", "c1.a.t3"]);
        let failed: Vec<_> = report.failures_in(FailureScope::Table).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].object, "c1.a.t2");
        assert!(failed[0].message.contains("rejected"));
        Ok(())
    }

    #[test]
    fn catalog_failure_aborts_by_default() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new().failing_statement("ALTER CATALOG");
        let err = apply_document(&mut wh, &doc, &ApplyOptions::default()).unwrap_err();
        assert!(matches!(err, ApplyError::CatalogTags { ref catalog, .. } if catalog == "c1"));
        assert_eq!(wh.statements().len(), 1);
        Ok(())
    }

    #[test]
    fn catalog_failure_can_be_downgraded() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new().failing_statement("ALTER CATALOG");
        let options = ApplyOptions {
            catalog_failures: CatalogFailurePolicy::Continue,
        };
        let report = apply_document(&mut wh, &doc, &options)?;
        assert!(report.catalogs_tagged.is_empty());
        assert_eq!(report.failures_in(FailureScope::Catalog).count(), 1);
        assert_eq!(report.schemas_tagged, vec!["c1.a", "c1.b"]);
        Ok(())
    }

    #[test]
    fn use_catalog_precedes_each_schema() -> Result<()> {
        let doc = parse_catalog_document(TWO_SCHEMAS)?;
        let mut wh = InMemoryWarehouse::new();
        apply_document(&mut wh, &doc, &ApplyOptions::default())?;
        assert_eq!(
            wh.statements()
                .iter()
                .map(|s| s.lines().next().unwrap_or_default())
                .collect::<Vec<_>>(),
            vec![
                "ALTER CATALOG c1",
                "USE CATALOG c1",
                "ALTER SCHEMA c1.a",
                "USE CATALOG c1",
                "ALTER SCHEMA c1.b",
            ]
        );
        Ok(())
    }

    #[test]
    fn untagged_levels_issue_no_statements() -> Result<()> {
        let doc = parse_catalog_document(
            "catalogs:\n  c1:\n    schemas:\n      empty:\n      tagged:\n        k: v\n",
        )?;
        let mut wh = InMemoryWarehouse::new()
            .with_table("c1", "empty", "t0")
            .with_table("c1", "tagged", "t1");
        let report = apply_document(&mut wh, &doc, &ApplyOptions::default())?;
        assert_eq!(report.skipped_untagged, vec!["c1", "c1.empty"]);
        assert_eq!(report.tables_tagged, vec!["c1.tagged.t1"]);
        assert!(wh.statements_starting_with("ALTER CATALOG").is_empty());
        Ok(())
    }

    #[test]
    fn tables_receive_schema_fragment() -> Result<()> {
        let doc = parse_catalog_document(
            "catalogs:\n  c1:\n    owner: alice\n    schemas:\n      s1:\n        pii: true\n        layer: raw\n",
        )?;
        let mut wh = InMemoryWarehouse::new().with_table("c1", "s1", "t1");
        apply_document(&mut wh, &doc, &ApplyOptions::default())?;
        let tables = wh.statements_starting_with("ALTER TABLE");
        assert_eq!(
            tables,
            vec!["ALTER TABLE c1.s1.t1\nSET TAGS (\n  \"pii\" = 'True',\n  \"layer\" = 'raw'\n)"]
        );
        Ok(())
    }

    #[test]
    fn invalid_document_reaches_no_warehouse() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tags.yaml");
        for text in ["", "catalogs:\n", "catalogs: {}\n", "owners:\n  - alice\n"] {
            std::fs::write(&path, text)?;
            let mut wh = InMemoryWarehouse::new();
            let err = apply_file(
                &mut wh,
                &path,
                Some(&BootstrapPlan::default()),
                &ApplyOptions::default(),
            )
            .unwrap_err();
            assert!(matches!(err, ApplyError::Load { .. }), "{text:?}: {err}");
            assert!(wh.calls().is_empty(), "{text:?}: {:?}", wh.calls());
        }
        Ok(())
    }

    #[test]
    fn apply_file_bootstraps_then_tags() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tags.yaml");
        std::fs::write(&path, "catalogs:\n  c1:\n    owner: alice\n")?;
        let mut wh = InMemoryWarehouse::new();
        let plan = BootstrapPlan {
            catalog: "c1".to_string(),
            schemas: vec!["raw".to_string()],
        };
        let report = apply_file(&mut wh, &path, Some(&plan), &ApplyOptions::default())?;
        assert_eq!(report.catalogs_tagged, vec!["c1"]);
        let heads: Vec<&str> = wh
            .statements()
            .into_iter()
            .map(|s| s.lines().next().unwrap_or_default())
            .collect();
        assert_eq!(
            heads,
            vec![
                "CREATE CATALOG IF NOT EXISTS c1",
                "CREATE SCHEMA IF NOT EXISTS c1.raw",
                "ALTER CATALOG c1",
            ]
        );

        let mut wh = InMemoryWarehouse::new();
        apply_file(&mut wh, &path, None, &ApplyOptions::default())?;
        assert_eq!(wh.statements().len(), 1);
        Ok(())
    }

    #[test]
    fn boolean_tags_render_title_case() -> Result<()> {
        let doc = parse_catalog_document(
            "catalogs:\n  c1:\n    owner: alice\n    schemas:\n      s1:\n        pii: true\n        certified: false\n",
        )?;
        let mut wh = InMemoryWarehouse::new();
        apply_document(&mut wh, &doc, &ApplyOptions::default())?;
        assert_eq!(
            wh.statements_starting_with("ALTER SCHEMA"),
            vec!["ALTER SCHEMA c1.s1\nSET TAGS (\n  \"pii\" = 'True',\n  \"certified\" = 'False'\n)"]
        );
        Ok(())
    }
}
