//! Canonical key/value payload codec.
//!
//! A payload is a mapping from short keys to strings, serialized as
//! `key=value\n` lines **sorted by key**, with `\n` in values escaped as
//! `\n` (backslash-n) and `\` as `\\`. All signatures and content ids are
//! computed over this canonical form, so encoding must be byte-stable:
//! identical field sets always produce identical payloads, and parsing
//! reverses the encoding exactly.

use std::collections::HashMap;

/// Serializes fields into the canonical sorted `key=value\n` form.
///
/// Duplicate keys are kept in sort order; the parser keeps the first
/// occurrence, matching replay behavior across nodes.
pub fn canonical_join(mut fields: Vec<(String, String)>) -> String {
    fields.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));

    let mut payload = String::new();
    for (key, value) in &fields {
        payload.push_str(key);
        payload.push('=');
        for c in value.chars() {
            match c {
                '\n' => payload.push_str("\\n"),
                '\\' => payload.push_str("\\\\"),
                _ => payload.push(c),
            }
        }
        payload.push('\n');
    }
    payload
}

/// Parses a canonical payload back into a map, reversing the escaping.
///
/// Malformed fragments (a key with no `=` before the newline) are
/// skipped rather than failing the whole payload; replay must keep going
/// over foreign events.
pub fn parse_canonical_map(payload: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();

    let mut key = String::new();
    let mut value = String::new();
    let mut reading_key = true;
    let mut escaping = false;

    for c in payload.chars() {
        if reading_key {
            match c {
                '=' => reading_key = false,
                '\n' => key.clear(),
                _ => key.push(c),
            }
            continue;
        }

        if escaping {
            if c == 'n' {
                value.push('\n');
            } else {
                value.push(c);
            }
            escaping = false;
            continue;
        }

        match c {
            '\\' => escaping = true,
            '\n' => {
                if !key.is_empty() {
                    parsed.entry(std::mem::take(&mut key)).or_insert_with(|| std::mem::take(&mut value));
                }
                key.clear();
                value.clear();
                reading_key = true;
            }
            _ => value.push(c),
        }
    }

    if !reading_key && !key.is_empty() {
        parsed.entry(key).or_insert(value);
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_sorts_keys() {
        let payload = canonical_join(vec![
            ("title".into(), "Garlic Pasta".into()),
            ("category".into(), "Dinner".into()),
        ]);
        assert_eq!(payload, "category=Dinner\ntitle=Garlic Pasta\n");
    }

    #[test]
    fn join_is_deterministic_across_input_orders() {
        let a = canonical_join(vec![
            ("b".into(), "2".into()),
            ("a".into(), "1".into()),
            ("c".into(), "3".into()),
        ]);
        let b = canonical_join(vec![
            ("c".into(), "3".into()),
            ("a".into(), "1".into()),
            ("b".into(), "2".into()),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn roundtrip_plain_values() {
        let payload = canonical_join(vec![
            ("recipe_id".into(), "rcp-1".into()),
            ("markdown".into(), "Cook pasta and add garlic butter.".into()),
        ]);
        let parsed = parse_canonical_map(&payload);
        assert_eq!(parsed.get("recipe_id").map(String::as_str), Some("rcp-1"));
        assert_eq!(
            parsed.get("markdown").map(String::as_str),
            Some("Cook pasta and add garlic butter.")
        );
    }

    #[test]
    fn roundtrip_newlines_and_backslashes() {
        let tricky = "line one\nline two\\with backslash\\n literal";
        let payload = canonical_join(vec![("markdown".into(), tricky.into())]);
        let parsed = parse_canonical_map(&payload);
        assert_eq!(parsed.get("markdown").map(String::as_str), Some(tricky));
    }

    #[test]
    fn roundtrip_is_byte_stable() {
        let fields = vec![
            ("a".into(), "one\ntwo".into()),
            ("b".into(), "back\\slash".into()),
        ];
        let payload = canonical_join(fields);
        let parsed = parse_canonical_map(&payload);
        let again = canonical_join(parsed.into_iter().collect());
        assert_eq!(payload, again);
    }

    #[test]
    fn parse_skips_lines_without_separator() {
        let parsed = parse_canonical_map("no-separator-here\nkey=value\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn parse_keeps_value_without_trailing_newline() {
        let parsed = parse_canonical_map("key=value");
        assert_eq!(parsed.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn empty_payload_parses_to_empty_map() {
        assert!(parse_canonical_map("").is_empty());
    }
}
