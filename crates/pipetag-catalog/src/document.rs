//! Typed catalog tag documents.
//!
//! ```yaml
//! catalogs:
//!   pipeline_catalog:
//!     owner: data-platform        # catalog tags: every key except `schemas`
//!     schemas:
//!       bronze:
//!         layer: raw              # schema tags, inherited by every table
//! ```
//!
//! The YAML is validated while it is converted, so a malformed shape is
//! reported with its path before any statement reaches the warehouse.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::tags::TagSet;

/// Reserved catalog key holding the schema mapping.
pub const SCHEMAS_KEY: &str = "schemas";
/// Required top-level key.
pub const CATALOGS_KEY: &str = "catalogs";

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("YAML file is missing the 'catalogs' key or is empty")]
    MissingCatalogs,
    #[error("malformed catalog document at `{path}`: {message}")]
    Malformed { path: String, message: String },
}

fn malformed(path: &str, message: impl Into<String>) -> CatalogLoadError {
    CatalogLoadError::Malformed {
        path: path.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub name: String,
    /// Applied to the schema and to every table found in it.
    pub tags: TagSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDescriptor {
    pub name: String,
    pub tags: TagSet,
    /// Empty when the entry has no `schemas` key.
    pub schemas: Vec<SchemaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDocument {
    /// Document order.
    pub catalogs: Vec<CatalogDescriptor>,
}

impl CatalogDocument {
    pub fn schema_count(&self) -> usize {
        self.catalogs.iter().map(|c| c.schemas.len()).sum()
    }

    /// Build a document from an already parsed YAML value.
    pub fn from_value(value: Value) -> Result<Self, CatalogLoadError> {
        let root = match value {
            Value::Null => return Err(CatalogLoadError::MissingCatalogs),
            Value::Mapping(m) => m,
            other => {
                return Err(malformed(
                    "<root>",
                    format!("expected a mapping, found {}", kind_of(&other)),
                ))
            }
        };

        let mut catalogs_value = None;
        for (key, value) in root {
            let key = scalar_key(&key, "<root>")?;
            if key != CATALOGS_KEY {
                return Err(malformed(
                    &key,
                    format!("unknown top-level key (only `{CATALOGS_KEY}` is allowed)"),
                ));
            }
            catalogs_value = Some(value);
        }

        let catalogs = match catalogs_value {
            None | Some(Value::Null) => return Err(CatalogLoadError::MissingCatalogs),
            Some(Value::Mapping(m)) if m.is_empty() => {
                return Err(CatalogLoadError::MissingCatalogs)
            }
            Some(Value::Mapping(m)) => m,
            Some(other) => {
                return Err(malformed(
                    CATALOGS_KEY,
                    format!("expected a mapping of catalogs, found {}", kind_of(&other)),
                ))
            }
        };

        let mut out = Vec::with_capacity(catalogs.len());
        for (name, entry) in catalogs {
            let name = scalar_key(&name, CATALOGS_KEY)?;
            let path = format!("{CATALOGS_KEY}.{name}");
            out.push(catalog_descriptor(name, entry, &path)?);
        }
        Ok(CatalogDocument { catalogs: out })
    }
}

fn catalog_descriptor(
    name: String,
    entry: Value,
    path: &str,
) -> Result<CatalogDescriptor, CatalogLoadError> {
    let entry = match entry {
        Value::Null => Mapping::new(),
        Value::Mapping(m) => m,
        other => {
            return Err(malformed(
                path,
                format!("expected a mapping of tags, found {}", kind_of(&other)),
            ))
        }
    };

    let mut tags = TagSet::new();
    let mut schemas = Vec::new();
    for (key, value) in entry {
        let key = scalar_key(&key, path)?;
        if key == SCHEMAS_KEY {
            schemas = schema_descriptors(value, &format!("{path}.{SCHEMAS_KEY}"))?;
            continue;
        }
        let tag_path = format!("{path}.{key}");
        tags.insert(key, tag_value(value, &tag_path)?);
    }

    Ok(CatalogDescriptor {
        name,
        tags,
        schemas,
    })
}

fn schema_descriptors(value: Value, path: &str) -> Result<Vec<SchemaDescriptor>, CatalogLoadError> {
    let schemas = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(m) => m,
        other => {
            return Err(malformed(
                path,
                format!("expected a mapping of schemas, found {}", kind_of(&other)),
            ))
        }
    };

    let mut out = Vec::with_capacity(schemas.len());
    for (name, tags_value) in schemas {
        let name = scalar_key(&name, path)?;
        let schema_path = format!("{path}.{name}");
        let tags = match tags_value {
            Value::Null => TagSet::new(),
            Value::Mapping(m) => {
                let mut tags = TagSet::new();
                for (key, value) in m {
                    let key = scalar_key(&key, &schema_path)?;
                    let tag_path = format!("{schema_path}.{key}");
                    tags.insert(key, tag_value(value, &tag_path)?);
                }
                tags
            }
            other => {
                return Err(malformed(
                    &schema_path,
                    format!("expected a mapping of tags, found {}", kind_of(&other)),
                ))
            }
        };
        out.push(SchemaDescriptor { name, tags });
    }
    Ok(out)
}

/// Booleans render as `True`/`False`, the form already present on tagged objects.
fn bool_text(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(bool_text(*b).to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_key(key: &Value, path: &str) -> Result<String, CatalogLoadError> {
    scalar_text(key).ok_or_else(|| {
        malformed(
            path,
            format!("keys must be scalars, found {}", kind_of(key)),
        )
    })
}

/// Coerce a scalar tag value to its string form.
fn tag_value(value: Value, path: &str) -> Result<String, CatalogLoadError> {
    scalar_text(&value).ok_or_else(|| {
        malformed(
            path,
            format!(
                "tag values must be strings, booleans or numbers, found {}",
                kind_of(&value)
            ),
        )
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Parse a catalog document from YAML text.
pub fn parse_catalog_document(text: &str) -> Result<CatalogDocument, CatalogLoadError> {
    if text.trim().is_empty() {
        return Err(CatalogLoadError::MissingCatalogs);
    }
    let value: Value = serde_yaml::from_str(text)?;
    CatalogDocument::from_value(value)
}

/// Read and parse a catalog document from disk.
pub fn load_catalog_document(path: &Path) -> Result<CatalogDocument, CatalogLoadError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog_document(&text)
}
