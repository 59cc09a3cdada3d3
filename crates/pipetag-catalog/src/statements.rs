//! SQL statements issued against the warehouse.
//!
//! Object names are rendered through `sqlparser`'s `ObjectName`/`Ident` so
//! identifiers that are not plain (`[A-Za-z_][A-Za-z0-9_]*`) are
//! backtick-quoted with embedded backticks doubled.

use sqlparser::ast::{Ident, ObjectName};

/// Object kinds that accept `SET TAGS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTarget<'a> {
    Catalog {
        catalog: &'a str,
    },
    Schema {
        catalog: &'a str,
        schema: &'a str,
    },
    Table {
        catalog: &'a str,
        schema: &'a str,
        table: &'a str,
    },
}

impl<'a> TagTarget<'a> {
    pub fn keyword(&self) -> &'static str {
        match self {
            TagTarget::Catalog { .. } => "CATALOG",
            TagTarget::Schema { .. } => "SCHEMA",
            TagTarget::Table { .. } => "TABLE",
        }
    }

    fn parts(&self) -> Vec<&'a str> {
        match *self {
            TagTarget::Catalog { catalog } => vec![catalog],
            TagTarget::Schema { catalog, schema } => vec![catalog, schema],
            TagTarget::Table {
                catalog,
                schema,
                table,
            } => vec![catalog, schema, table],
        }
    }

    /// Dotted display name, unquoted (for log lines).
    pub fn display_name(&self) -> String {
        self.parts().join(".")
    }

    /// Quoted, qualified SQL name.
    pub fn sql_name(&self) -> String {
        object_name(&self.parts())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ident(name: &str) -> Ident {
    if is_plain_identifier(name) {
        Ident::new(name)
    } else {
        Ident::with_quote('`', name)
    }
}

/// Render a dotted, possibly quoted, object name.
pub fn object_name(parts: &[&str]) -> String {
    ObjectName(parts.iter().map(|p| ident(p)).collect()).to_string()
}

pub fn create_catalog_sql(catalog: &str) -> String {
    format!("CREATE CATALOG IF NOT EXISTS {}", object_name(&[catalog]))
}

pub fn create_schema_sql(catalog: &str, schema: &str) -> String {
    format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        object_name(&[catalog, schema])
    )
}

pub fn use_catalog_sql(catalog: &str) -> String {
    format!("USE CATALOG {}", object_name(&[catalog]))
}

pub fn show_tables_sql(catalog: &str, schema: &str) -> String {
    format!("SHOW TABLES IN {}", object_name(&[catalog, schema]))
}

/// `ALTER <kind> <name> SET TAGS (<fragment>)`.
pub fn set_tags_sql(target: &TagTarget<'_>, tag_fragment: &str) -> String {
    format!(
        "ALTER {} {}\nSET TAGS (\n  {}\n)",
        target.keyword(),
        target.sql_name(),
        tag_fragment
    )
}
