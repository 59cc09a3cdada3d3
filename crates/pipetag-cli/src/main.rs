//! pipetag CLI
//!
//! - `apply`: bootstrap the pipeline catalog and apply catalog/schema/table tags
//!   from a YAML document to a SQL warehouse
//! - `validate`: load a tag document and show what `apply` would issue
//! - `generate-ili`: write the synthetic ILI inspection dataset as CSV

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod apply;
mod ili;

#[derive(Parser)]
#[command(name = "pipetag")]
#[command(
    author,
    version,
    about = "pipetag: catalog tag propagation and synthetic pipeline inspection data"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the bootstrap catalog/schemas, then apply tags from a YAML document.
    ///
    /// Catalog-level failures stop the run (unless `--keep-going`); schema,
    /// table-listing and table failures are reported and skipped.
    Apply(ApplyArgs),

    /// Load and validate a tag document without touching a warehouse.
    Validate {
        /// Catalog tag document.
        #[arg(default_value = pipetag_catalog::DEFAULT_DOCUMENT_PATH)]
        input: PathBuf,
        /// Also print the catalog/schema statements `apply` would issue.
        #[arg(long)]
        statements: bool,
    },

    /// Generate the synthetic ILI (in-line inspection) dataset.
    GenerateIli(IliArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ApplyArgs {
    /// Catalog tag document.
    #[arg(default_value = pipetag_catalog::DEFAULT_DOCUMENT_PATH)]
    pub(crate) input: PathBuf,

    /// Catalog created before tagging.
    #[arg(long, default_value = pipetag_apply::DEFAULT_BOOTSTRAP_CATALOG)]
    pub(crate) bootstrap_catalog: String,
    /// Schema created under the bootstrap catalog (repeatable).
    #[arg(long = "bootstrap-schema", default_values_t = pipetag_apply::DEFAULT_BOOTSTRAP_SCHEMAS.map(String::from))]
    pub(crate) bootstrap_schemas: Vec<String>,
    /// Do not create the bootstrap catalog/schemas.
    #[arg(long)]
    pub(crate) skip_bootstrap: bool,

    /// Report catalog-level failures and continue instead of stopping.
    #[arg(long)]
    pub(crate) keep_going: bool,

    /// Print the statements instead of sending them to a warehouse.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Table assumed to exist during `--dry-run` (`catalog.schema.table`, repeatable).
    #[arg(long = "assume-table", requires = "dry_run")]
    pub(crate) assume_tables: Vec<String>,

    /// Write the apply report as JSON.
    #[arg(long)]
    pub(crate) report: Option<PathBuf>,

    /// Databricks workspace host (default: $DATABRICKS_HOST).
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// SQL warehouse id (default: $DATABRICKS_WAREHOUSE_ID).
    #[arg(long)]
    pub(crate) warehouse_id: Option<String>,
    /// Per-request HTTP timeout in seconds; 0 disables (default: $PIPETAG_SQL_TIMEOUT_SECS or 50).
    #[arg(long)]
    pub(crate) timeout_secs: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct IliArgs {
    /// Output CSV path.
    #[arg(short, long, default_value = pipetag_ili::DEFAULT_OUTPUT_FILE)]
    pub(crate) out: PathBuf,
    /// Records generated per company.
    #[arg(long, default_value_t = pipetag_ili::DEFAULT_RECORDS_PER_COMPANY)]
    pub(crate) records_per_company: usize,
    /// RNG seed.
    #[arg(long, default_value_t = pipetag_ili::DEFAULT_SEED)]
    pub(crate) seed: u64,
    /// Inspection date stamped on every record (YYYY-MM-DD).
    #[arg(long, default_value = pipetag_ili::DEFAULT_INSPECTION_DATE)]
    pub(crate) inspection_date: String,
    /// Rows printed as a preview after writing.
    #[arg(long, default_value_t = 5)]
    pub(crate) preview: usize,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply(args) => apply::cmd_apply(&args),
        Commands::Validate { input, statements } => apply::cmd_validate(&input, statements),
        Commands::GenerateIli(args) => ili::cmd_generate_ili(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_defaults_match_bootstrap_plan() {
        let cli = Cli::parse_from(["pipetag", "apply"]);
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.input, PathBuf::from("pipeline_catalog_oil_data.yaml"));
        assert_eq!(args.bootstrap_catalog, "pipeline_catalog");
        assert_eq!(args.bootstrap_schemas, vec!["bronze", "silver", "gold"]);
        assert!(!args.keep_going && !args.dry_run && !args.skip_bootstrap);
    }

    #[test]
    fn repeated_bootstrap_schemas_replace_defaults() {
        let cli = Cli::parse_from([
            "pipetag",
            "apply",
            "tags.yaml",
            "--bootstrap-schema",
            "raw",
            "--bootstrap-schema",
            "curated",
        ]);
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.input, PathBuf::from("tags.yaml"));
        assert_eq!(args.bootstrap_schemas, vec!["raw", "curated"]);
    }

    #[test]
    fn assume_table_requires_dry_run() {
        let res = Cli::try_parse_from(["pipetag", "apply", "--assume-table", "c.s.t"]);
        assert!(res.is_err());
    }

    #[test]
    fn generate_ili_defaults() {
        let cli = Cli::parse_from(["pipetag", "generate-ili"]);
        let Commands::GenerateIli(args) = cli.command else {
            panic!("expected generate-ili");
        };
        assert_eq!(args.out, PathBuf::from("fake_ili_data_multiple_companies.csv"));
        assert_eq!(args.records_per_company, 100);
        assert_eq!(args.seed, 42);
        assert_eq!(args.inspection_date, "2025-09-30");
    }
}
