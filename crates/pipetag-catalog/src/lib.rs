//! Catalog tag documents for pipetag.
//!
//! - [`document`]: the typed `catalogs → schemas` tree loaded from YAML
//! - [`tags`]: ordered tag sets and their `SET TAGS` fragment form
//! - [`statements`]: the SQL text sent to the warehouse

pub mod document;
pub mod statements;
pub mod tags;

pub use document::{
    load_catalog_document, parse_catalog_document, CatalogDescriptor, CatalogDocument,
    CatalogLoadError, SchemaDescriptor,
};
pub use statements::TagTarget;
pub use tags::{dict_to_tag_sql, TagSet};

/// Default location of the catalog tag document.
pub const DEFAULT_DOCUMENT_PATH: &str = "pipeline_catalog_oil_data.yaml";
