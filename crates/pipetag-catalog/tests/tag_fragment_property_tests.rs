use pipetag_catalog::tags::{escape_sql_literal, TAG_CLAUSE_SEPARATOR};
use pipetag_catalog::TagSet;
use proptest::prelude::*;

fn tag_text() -> impl Strategy<Value = String> {
    // Include both quote styles and backslashes; no newlines so clauses split cleanly.
    proptest::string::string_regex("[A-Za-z0-9_ .:'\"\\\\-]{0,12}").unwrap()
}

fn tag_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::vec((tag_text(), tag_text()), 1..8)
}

/// True when `content` never closes a `quote` literal before its end.
fn stays_inside_literal(content: &str, quote: char) -> bool {
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if chars.next().is_none() {
                return false;
            }
        } else if c == quote {
            return false;
        }
    }
    true
}

proptest! {
    #[test]
    fn fragment_has_one_clause_per_tag_in_order(pairs in tag_pairs()) {
        let tags: TagSet = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let fragment = tags.to_tag_sql();
        let clauses: Vec<&str> = fragment.split(TAG_CLAUSE_SEPARATOR).collect();
        prop_assert_eq!(clauses.len(), tags.len());

        for (clause, (key, value)) in clauses.iter().zip(tags.iter()) {
            let expected = format!(
                "\"{}\" = '{}'",
                escape_sql_literal(key, '"'),
                escape_sql_literal(value, '\'')
            );
            prop_assert_eq!(*clause, expected.as_str());
        }
    }

    #[test]
    fn escaped_text_cannot_close_its_literal(text in tag_text()) {
        prop_assert!(stays_inside_literal(&escape_sql_literal(&text, '\''), '\''));
        prop_assert!(stays_inside_literal(&escape_sql_literal(&text, '"'), '"'));
    }

    #[test]
    fn plain_text_is_unchanged(text in "[A-Za-z0-9_ -]{0,16}") {
        let escaped = escape_sql_literal(&text, '\'');
        prop_assert_eq!(escaped.as_ref(), text.as_str());
    }
}
