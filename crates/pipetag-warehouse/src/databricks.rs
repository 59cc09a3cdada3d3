//! Databricks SQL warehouse backend (Statement Execution API, `/api/2.0/sql/statements`).
//!
//! Each call submits one statement and waits for a terminal state, polling
//! while the warehouse reports `PENDING`/`RUNNING`. `USE CATALOG` is executed
//! and also remembered, because the API is stateless between requests: the
//! remembered catalog is sent as the `catalog` context of later statements.
//!
//! Configuration precedence (per field):
//! 1) explicit override (CLI flag)
//! 2) env var (`DATABRICKS_HOST`, `DATABRICKS_WAREHOUSE_ID`, `PIPETAG_SQL_TIMEOUT_SECS`)
//! 3) default
//!
//! The access token is read from `DATABRICKS_TOKEN` only.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::{Warehouse, WarehouseError};
use pipetag_catalog::statements::{show_tables_sql, use_catalog_sql};

pub const DATABRICKS_HOST_ENV: &str = "DATABRICKS_HOST";
pub const DATABRICKS_TOKEN_ENV: &str = "DATABRICKS_TOKEN";
pub const DATABRICKS_WAREHOUSE_ID_ENV: &str = "DATABRICKS_WAREHOUSE_ID";
pub const PIPETAG_SQL_TIMEOUT_SECS_ENV: &str = "PIPETAG_SQL_TIMEOUT_SECS";

const DEFAULT_SQL_TIMEOUT_SECS: u64 = 50;
/// Server-side wait before the API returns a still-running statement (5..=50s).
const STATEMENT_WAIT_TIMEOUT: &str = "30s";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct DatabricksConfig {
    /// Normalized `https://<workspace-host>` without trailing slash.
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    /// HTTP timeout per request; `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Explicit overrides, usually from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct DatabricksOverrides {
    pub host: Option<String>,
    pub warehouse_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl DatabricksConfig {
    /// Resolve from overrides and the process environment.
    pub fn resolve(overrides: &DatabricksOverrides) -> Result<Self, WarehouseError> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve from overrides and an arbitrary variable lookup.
    pub fn resolve_with(
        overrides: &DatabricksOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, WarehouseError> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = overrides
            .host
            .clone()
            .or_else(|| non_empty(DATABRICKS_HOST_ENV))
            .ok_or_else(|| {
                WarehouseError::Config(format!(
                    "no workspace host (pass --host or set {DATABRICKS_HOST_ENV})"
                ))
            })?;
        let warehouse_id = overrides
            .warehouse_id
            .clone()
            .or_else(|| non_empty(DATABRICKS_WAREHOUSE_ID_ENV))
            .ok_or_else(|| {
                WarehouseError::Config(format!(
                    "no SQL warehouse id (pass --warehouse-id or set {DATABRICKS_WAREHOUSE_ID_ENV})"
                ))
            })?;
        let token = non_empty(DATABRICKS_TOKEN_ENV).ok_or_else(|| {
            WarehouseError::Config(format!(
                "Databricks backend requires {DATABRICKS_TOKEN_ENV} (set it in your env; do not hardcode secrets in scripts)"
            ))
        })?;

        let timeout_secs = match overrides.timeout_secs {
            Some(v) => v,
            None => match non_empty(PIPETAG_SQL_TIMEOUT_SECS_ENV) {
                Some(v) => v.parse::<u64>().map_err(|_| {
                    WarehouseError::Config(format!(
                        "invalid {PIPETAG_SQL_TIMEOUT_SECS_ENV}={v:?} (expected integer seconds; 0 disables)"
                    ))
                })?,
                None => DEFAULT_SQL_TIMEOUT_SECS,
            },
        };

        Ok(DatabricksConfig {
            host: normalize_host(&host),
            token,
            warehouse_id,
            timeout: (timeout_secs != 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }
}

fn normalize_host(host: &str) -> String {
    let mut host = host.trim().to_string();
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    host.trim_end_matches('/').to_string()
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl StatementState {
    fn as_str(self) -> &'static str {
        match self {
            StatementState::Pending => "PENDING",
            StatementState::Running => "RUNNING",
            StatementState::Succeeded => "SUCCEEDED",
            StatementState::Failed => "FAILED",
            StatementState::Canceled => "CANCELED",
            StatementState::Closed => "CLOSED",
        }
    }

    fn is_terminal(self) -> bool {
        !matches!(self, StatementState::Pending | StatementState::Running)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: StatementState,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSchema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultManifest {
    #[serde(default)]
    schema: ResultSchema,
}

#[derive(Debug, Default, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<ResultManifest>,
    #[serde(default)]
    result: Option<ResultData>,
}

fn failure_message(status: &StatementStatus) -> String {
    match &status.error {
        Some(ServiceError {
            error_code: Some(code),
            message: Some(message),
        }) => format!("[{code}] {message}"),
        Some(ServiceError {
            message: Some(message),
            ..
        }) => message.clone(),
        _ => "no error detail returned".to_string(),
    }
}

/// Column of `SHOW TABLES` output that holds the table name.
fn table_name_column(manifest: Option<&ResultManifest>) -> usize {
    manifest
        .and_then(|m| {
            m.schema
                .columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case("tableName"))
        })
        .unwrap_or(1)
}

fn collect_table_names(rows: &[Vec<Option<String>>], column: usize, out: &mut Vec<String>) {
    for row in rows {
        if let Some(Some(name)) = row.get(column) {
            out.push(name.clone());
        }
    }
}

/// Follow a submitted statement through `poll` until it reaches a terminal state.
fn await_terminal(
    mut response: StatementResponse,
    mut poll: impl FnMut(&str) -> Result<StatementResponse, WarehouseError>,
) -> Result<StatementResponse, WarehouseError> {
    while !response.status.state.is_terminal() {
        let statement_id = response.statement_id.clone().ok_or_else(|| {
            WarehouseError::Protocol("running statement has no statement_id".to_string())
        })?;
        response = poll(&statement_id)?;
    }

    match response.status.state {
        StatementState::Succeeded => Ok(response),
        state => Err(WarehouseError::Statement {
            state: state.as_str().to_string(),
            message: failure_message(&response.status),
        }),
    }
}

/// Table names of a finished `SHOW TABLES`, fetching further chunks by link.
fn collect_listing(
    response: StatementResponse,
    mut fetch_chunk: impl FnMut(&str) -> Result<ResultData, WarehouseError>,
) -> Result<Vec<String>, WarehouseError> {
    let column = table_name_column(response.manifest.as_ref());

    let mut tables = Vec::new();
    let mut next = match response.result {
        Some(data) => {
            collect_table_names(&data.data_array, column, &mut tables);
            data.next_chunk_internal_link
        }
        None => None,
    };
    while let Some(link) = next {
        let data = fetch_chunk(&link)?;
        collect_table_names(&data.data_array, column, &mut tables);
        next = data.next_chunk_internal_link;
    }
    Ok(tables)
}

// =============================================================================
// Session
// =============================================================================

pub struct DatabricksWarehouse {
    client: reqwest::blocking::Client,
    config: DatabricksConfig,
    current_catalog: Option<String>,
    statements_issued: usize,
}

impl DatabricksWarehouse {
    pub fn connect(config: DatabricksConfig) -> Result<Self, WarehouseError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| WarehouseError::Config(format!("failed to build http client: {e}")))?;
        tracing::debug!(
            host = %config.host,
            warehouse_id = %config.warehouse_id,
            "opened Databricks SQL session"
        );
        Ok(Self {
            client,
            config,
            current_catalog: None,
            statements_issued: 0,
        })
    }

    fn statements_url(&self) -> String {
        format!("{}/api/2.0/sql/statements", self.config.host)
    }

    fn read_json<T: for<'de> Deserialize<'de>>(
        url: &str,
        resp: reqwest::Result<reqwest::blocking::Response>,
    ) -> Result<T, WarehouseError> {
        let resp = resp.map_err(|e| WarehouseError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(WarehouseError::Http { status, body });
        }
        resp.json()
            .map_err(|e| WarehouseError::Protocol(format!("invalid JSON from {url}: {e}")))
    }

    /// Submit `sql` and wait until it reaches a terminal state.
    fn run_statement(&mut self, sql: &str) -> Result<StatementResponse, WarehouseError> {
        let url = self.statements_url();
        let mut body = json!({
            "warehouse_id": self.config.warehouse_id,
            "statement": sql,
            "wait_timeout": STATEMENT_WAIT_TIMEOUT,
            "on_wait_timeout": "CONTINUE",
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
        });
        if let Some(catalog) = &self.current_catalog {
            body["catalog"] = json!(catalog);
        }

        self.statements_issued += 1;
        tracing::debug!(statement = %sql, "submitting statement");
        let submitted: StatementResponse = Self::read_json(
            &url,
            self.client
                .post(&url)
                .bearer_auth(&self.config.token)
                .json(&body)
                .send(),
        )?;

        await_terminal(submitted, |statement_id| {
            thread::sleep(POLL_INTERVAL);
            let poll_url = format!("{url}/{statement_id}");
            Self::read_json(
                &poll_url,
                self.client
                    .get(&poll_url)
                    .bearer_auth(&self.config.token)
                    .send(),
            )
        })
    }

    fn fetch_chunk(&self, link: &str) -> Result<ResultData, WarehouseError> {
        let url = format!("{}{}", self.config.host, link);
        Self::read_json(
            &url,
            self.client
                .get(&url)
                .bearer_auth(&self.config.token)
                .send(),
        )
    }
}

impl Warehouse for DatabricksWarehouse {
    fn execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        self.run_statement(sql).map(|_| ())
    }

    fn use_catalog(&mut self, catalog: &str) -> Result<(), WarehouseError> {
        self.run_statement(&use_catalog_sql(catalog))?;
        self.current_catalog = Some(catalog.to_string());
        Ok(())
    }

    fn list_tables(&mut self, catalog: &str, schema: &str) -> Result<Vec<String>, WarehouseError> {
        let response = self.run_statement(&show_tables_sql(catalog, schema))?;
        collect_listing(response, |link| self.fetch_chunk(link))
    }
}

impl Drop for DatabricksWarehouse {
    fn drop(&mut self) {
        tracing::debug!(
            statements = self.statements_issued,
            "closed Databricks SQL session"
        );
    }
}
