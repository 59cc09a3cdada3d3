//! `pipetag apply` / `pipetag validate`.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;

use pipetag_apply::{apply_file, ApplyOptions, ApplyReport, BootstrapPlan, CatalogFailurePolicy};
use pipetag_catalog::statements::set_tags_sql;
use pipetag_catalog::{load_catalog_document, CatalogDocument, TagTarget};
use pipetag_warehouse::{InMemoryWarehouse, Warehouse};

use crate::ApplyArgs;

fn load_document(input: &Path) -> Result<CatalogDocument> {
    load_catalog_document(input)
        .with_context(|| format!("failed to load catalog tag document {}", input.display()))
}

/// Split `catalog.schema.table` for `--assume-table`.
fn parse_table_path(text: &str) -> Result<(&str, &str, &str)> {
    let parts: Vec<&str> = text.split('.').collect();
    match parts.as_slice() {
        [c, s, t] if !c.is_empty() && !s.is_empty() && !t.is_empty() => Ok((*c, *s, *t)),
        _ => Err(anyhow!(
            "invalid --assume-table `{text}` (expected catalog.schema.table)"
        )),
    }
}

fn dry_run_warehouse(args: &ApplyArgs) -> Result<InMemoryWarehouse> {
    let mut wh = InMemoryWarehouse::new();
    for table in &args.assume_tables {
        let (c, s, t) = parse_table_path(table)?;
        wh = wh.with_table(c, s, t);
    }
    Ok(wh)
}

#[cfg(feature = "databricks")]
fn connect_warehouse(args: &ApplyArgs) -> Result<Box<dyn Warehouse>> {
    use pipetag_warehouse::databricks::{DatabricksConfig, DatabricksOverrides, DatabricksWarehouse};

    let overrides = DatabricksOverrides {
        host: args.host.clone(),
        warehouse_id: args.warehouse_id.clone(),
        timeout_secs: args.timeout_secs,
    };
    let config = DatabricksConfig::resolve(&overrides)?;
    println!(
        "{} {} (warehouse {})",
        "Connecting".green().bold(),
        config.host,
        config.warehouse_id
    );
    Ok(Box::new(DatabricksWarehouse::connect(config)?))
}

#[cfg(not(feature = "databricks"))]
fn connect_warehouse(_args: &ApplyArgs) -> Result<Box<dyn Warehouse>> {
    Err(anyhow!(
        "this build has no warehouse backend (rebuild with `--features databricks`, or use --dry-run)"
    ))
}

/// Load, bootstrap and apply against an open session. The session is only borrowed.
fn run_apply<W: Warehouse + ?Sized>(warehouse: &mut W, args: &ApplyArgs) -> Result<ApplyReport> {
    let plan = BootstrapPlan {
        catalog: args.bootstrap_catalog.clone(),
        schemas: args.bootstrap_schemas.clone(),
    };
    let options = ApplyOptions {
        catalog_failures: if args.keep_going {
            CatalogFailurePolicy::Continue
        } else {
            CatalogFailurePolicy::Abort
        },
    };
    let bootstrap_plan = (!args.skip_bootstrap).then_some(&plan);
    Ok(apply_file(warehouse, &args.input, bootstrap_plan, &options)?)
}

fn print_summary(report: &ApplyReport) {
    println!(
        "  {} {} catalogs, {} schemas, {} tables tagged",
        "→".cyan(),
        report.catalogs_tagged.len(),
        report.schemas_tagged.len(),
        report.tables_tagged.len()
    );
    if !report.skipped_untagged.is_empty() {
        println!(
            "  {} {} untagged objects skipped",
            "→".yellow(),
            report.skipped_untagged.len()
        );
    }
    for failure in &report.failures {
        println!(
            "  {} {} '{}': {}",
            "warn:".yellow().bold(),
            failure.scope.as_str(),
            failure.object,
            failure.message
        );
    }
    if report.is_clean() {
        println!("{} all catalog, schema, and table tags applied", "ok".green().bold());
    } else {
        println!(
            "{} finished with {} skipped step(s)",
            "done".yellow().bold(),
            report.failures.len()
        );
    }
}

pub(crate) fn cmd_apply(args: &ApplyArgs) -> Result<()> {
    println!("{} {}", "Applying".green().bold(), args.input.display());

    let report = if args.dry_run {
        let mut wh = dry_run_warehouse(args)?;
        let result = run_apply(&mut wh, args);
        if !wh.calls().is_empty() {
            println!("{}", "-- dry run: statements that would be issued".dimmed());
            for sql in wh.statements() {
                println!("{sql};");
            }
        }
        result?
    } else {
        // Building the client does no I/O; the first request follows the load.
        let mut wh = connect_warehouse(args)?;
        run_apply(&mut wh, args)?
        // `wh` is dropped here, closing the session.
    };

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("  {} {}", "→".cyan(), path.display());
    }

    print_summary(&report);
    Ok(())
}

/// Catalog and schema statements for `validate --statements`.
///
/// Table statements depend on a live listing and are not shown.
fn planned_statements(document: &CatalogDocument) -> Vec<String> {
    let mut out = Vec::new();
    for catalog in &document.catalogs {
        if !catalog.tags.is_empty() {
            out.push(set_tags_sql(
                &TagTarget::Catalog {
                    catalog: &catalog.name,
                },
                &catalog.tags.to_tag_sql(),
            ));
        }
        for schema in &catalog.schemas {
            if schema.tags.is_empty() {
                continue;
            }
            out.push(set_tags_sql(
                &TagTarget::Schema {
                    catalog: &catalog.name,
                    schema: &schema.name,
                },
                &schema.tags.to_tag_sql(),
            ));
        }
    }
    out
}

pub(crate) fn cmd_validate(input: &Path, show_statements: bool) -> Result<()> {
    let document = load_document(input)?;
    println!("{} {}", "ok".green().bold(), input.display());
    for catalog in &document.catalogs {
        println!(
            "  {} {} ({} tags, {} schemas)",
            "→".cyan(),
            catalog.name,
            catalog.tags.len(),
            catalog.schemas.len()
        );
        for schema in &catalog.schemas {
            println!(
                "      {}.{} ({} tags)",
                catalog.name,
                schema.name,
                schema.tags.len()
            );
        }
    }
    if show_statements {
        for sql in planned_statements(&document) {
            println!("{sql};");
        }
    }
    Ok(())
}
