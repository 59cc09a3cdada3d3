//! Synthetic pipeline in-line-inspection (ILI) records.
//!
//! Fabricates one inspection run per fictitious operator: each record is a
//! "feature" (dent, corrosion, ...) found at some distance along the pipe,
//! with random dimensions and a severity. Output is deterministic for a seed
//! so fixtures can be regenerated byte-for-byte.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Serializer};
use thiserror::Error;

pub const DEFAULT_OUTPUT_FILE: &str = "fake_ili_data_multiple_companies.csv";
pub const DEFAULT_RECORDS_PER_COMPANY: usize = 100;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_INSPECTION_DATE: &str = "2025-09-30";

#[derive(Debug, Error)]
pub enum IliError {
    #[error("records per company must be > 0")]
    NoRecords,
    #[error("at least one company is required")]
    NoCompanies,
    #[error("invalid inspection date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub name: String,
    pub pipeline_id: String,
}

impl Company {
    pub fn new(name: &str, pipeline_id: &str) -> Self {
        Self {
            name: name.to_string(),
            pipeline_id: pipeline_id.to_string(),
        }
    }
}

pub fn default_companies() -> Vec<Company> {
    vec![
        Company::new("FakePipeCo", "PIPE-001"),
        Company::new("ImaginaryFlow", "PIPE-002"),
        Company::new("PhantomPipes", "PIPE-003"),
        Company::new("GhostLine", "PIPE-004"),
    ]
}

pub fn parse_inspection_date(text: &str) -> Result<NaiveDate, IliError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| IliError::InvalidDate(text.to_string()))
}

#[derive(Debug, Clone)]
pub struct IliConfig {
    pub companies: Vec<Company>,
    pub records_per_company: usize,
    pub inspection_date: NaiveDate,
    pub seed: u64,
}

impl Default for IliConfig {
    fn default() -> Self {
        Self {
            companies: default_companies(),
            records_per_company: DEFAULT_RECORDS_PER_COMPANY,
            // 2025-09-30
            inspection_date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap_or_default(),
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeatureType {
    Dent,
    Corrosion,
    Crack,
    #[serde(rename = "Weld Anomaly")]
    WeldAnomaly,
}

impl FeatureType {
    pub const ALL: [FeatureType; 4] = [
        FeatureType::Dent,
        FeatureType::Corrosion,
        FeatureType::Crack,
        FeatureType::WeldAnomaly,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];
}

/// One CSV row. Field order is column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "PipelineID")]
    pub pipeline_id: String,
    #[serde(rename = "InspectionDate")]
    pub inspection_date: NaiveDate,
    #[serde(rename = "FeatureID")]
    pub feature_id: String,
    #[serde(rename = "FeatureType")]
    pub feature_type: FeatureType,
    #[serde(rename = "Location_km")]
    pub location_km: f64,
    #[serde(rename = "Depth_mm")]
    pub depth_mm: f64,
    #[serde(rename = "Length_mm")]
    pub length_mm: f64,
    #[serde(rename = "Width_mm")]
    pub width_mm: f64,
    #[serde(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "RepairRecommended", serialize_with = "title_case_bool")]
    pub repair_recommended: bool,
}

fn title_case_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn pick<T: Copy>(rng: &mut StdRng, xs: &[T]) -> T {
    xs[rng.gen_range(0..xs.len())]
}

/// `<pipeline_id>-FTR-0001`, 1-based.
pub fn feature_id(pipeline_id: &str, index: usize) -> String {
    format!("{pipeline_id}-FTR-{:04}", index + 1)
}

/// Generate all records, company by company.
pub fn generate_records(config: &IliConfig) -> Result<Vec<InspectionRecord>, IliError> {
    if config.records_per_company == 0 {
        return Err(IliError::NoRecords);
    }
    if config.companies.is_empty() {
        return Err(IliError::NoCompanies);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut out = Vec::with_capacity(config.companies.len() * config.records_per_company);
    for company in &config.companies {
        for i in 0..config.records_per_company {
            out.push(InspectionRecord {
                company: company.name.clone(),
                pipeline_id: company.pipeline_id.clone(),
                inspection_date: config.inspection_date,
                feature_id: feature_id(&company.pipeline_id, i),
                feature_type: pick(&mut rng, &FeatureType::ALL),
                location_km: round2(rng.gen_range(0.0..50.0)),
                depth_mm: round2(rng.gen_range(0.5..15.0)),
                length_mm: round2(rng.gen_range(10.0..200.0)),
                width_mm: round2(rng.gen_range(5.0..100.0)),
                severity: pick(&mut rng, &Severity::ALL),
                repair_recommended: rng.gen_bool(0.5),
            });
        }
    }
    Ok(out)
}

/// Write records as CSV with a header row.
pub fn write_csv<W: Write>(records: &[InspectionRecord], writer: W) -> Result<(), IliError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush().map_err(|source| IliError::Io {
        path: "<writer>".to_string(),
        source,
    })?;
    Ok(())
}

pub fn write_csv_file(records: &[InspectionRecord], path: &Path) -> Result<(), IliError> {
    let file = File::create(path).map_err(|source| IliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_csv(records, file)
}

/// CSV text of the first `rows` records (header included), for terminal previews.
pub fn preview_csv(records: &[InspectionRecord], rows: usize) -> Result<String, IliError> {
    let mut buf = Vec::new();
    write_csv(&records[..rows.min(records.len())], &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
