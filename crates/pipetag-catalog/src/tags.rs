//! Tag sets and their SQL fragment form.
//!
//! A tag fragment is the clause list that goes inside `SET TAGS ( ... )`:
//!
//! ```text
//! "owner" = 'alice',
//!   "domain" = 'pipelines'
//! ```
//!
//! Keys are rendered as double-quoted strings and values as single-quoted
//! strings. Backslashes and the surrounding quote character are
//! backslash-escaped so a key or value can never close its literal early.

use std::borrow::Cow;

use indexmap::IndexMap;

/// Separator placed between clauses of a tag fragment.
pub const TAG_CLAUSE_SEPARATOR: &str = ",\n  ";

/// Ordered mapping of tag key → tag value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: IndexMap<String, String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag. Re-inserting a key replaces its value and keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize into a `SET TAGS` clause list, preserving insertion order.
    pub fn to_tag_sql(&self) -> String {
        dict_to_tag_sql(self.iter())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = TagSet::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

/// Render ordered `(key, value)` pairs as `"k1" = 'v1',\n  "k2" = 'v2'`.
///
/// An empty input renders as the empty string.
pub fn dict_to_tag_sql<'a, I>(tags: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| {
            format!(
                "\"{}\" = '{}'",
                escape_sql_literal(key, '"'),
                escape_sql_literal(value, '\'')
            )
        })
        .collect::<Vec<_>>()
        .join(TAG_CLAUSE_SEPARATOR)
}

/// Backslash-escape `\` and `quote` so `text` can sit between two `quote` characters.
pub fn escape_sql_literal(text: &str, quote: char) -> Cow<'_, str> {
    if !text.chars().any(|c| c == '\\' || c == quote) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        if c == '\\' || c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}
