//! URI templates for resources, e.g. `unity://object/{object_id}`.
//!
//! A template is split on `/`; a segment of the exact form `{name}` is a
//! token, every other segment is literal.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static TOKEN_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{([^{}/]+)\}$").expect("valid token regex"));

fn token_of(segment: &str) -> Option<&str> {
    TOKEN_SEGMENT
        .captures(segment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Token names in the order they appear.
pub fn template_tokens(template: &str) -> Vec<String> {
    template
        .split('/')
        .filter_map(token_of)
        .map(str::to_string)
        .collect()
}

/// True when the template has no tokens.
pub fn is_literal(template: &str) -> bool {
    template.split('/').all(|s| token_of(s).is_none())
}

/// Match a concrete URI against a template, capturing token segments.
pub fn match_uri(template: &str, uri: &str) -> Option<Map<String, Value>> {
    let pattern: Vec<&str> = template.split('/').collect();
    let actual: Vec<&str> = uri.split('/').collect();
    if pattern.len() != actual.len() {
        return None;
    }

    let mut captured = Map::new();
    for (p, a) in pattern.iter().zip(&actual) {
        match token_of(p) {
            Some(token) => {
                if a.is_empty() {
                    return None;
                }
                captured.insert(token.to_string(), Value::String((*a).to_string()));
            }
            None if p == a => {}
            None => return None,
        }
    }
    Some(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_tokens() {
        assert_eq!(
            template_tokens("unity://complex/{type}/{id}/{attribute}/{format}"),
            vec!["type", "id", "attribute", "format"]
        );
        assert!(template_tokens("unity://info").is_empty());
        assert!(is_literal("unity://scene/active"));
        assert!(!is_literal("unity://scene/{scene_name}"));
    }

    #[test]
    fn test_match_uri_captures_tokens() {
        let captured = match_uri(
            "unity://object/{id}/property/{property_name}",
            "unity://object/Main Camera/property/fieldOfView",
        )
        .unwrap();
        assert_eq!(captured["id"], json!("Main Camera"));
        assert_eq!(captured["property_name"], json!("fieldOfView"));
    }

    #[test]
    fn test_match_uri_rejects_mismatch() {
        assert!(match_uri("unity://scene/{name}", "unity://object/x").is_none());
        assert!(match_uri("unity://scene/{name}", "unity://scene/a/b").is_none());
        assert!(match_uri("unity://scene/{name}", "unity://scene/").is_none());
        assert_eq!(match_uri("unity://info", "unity://info").unwrap().len(), 0);
    }
}
