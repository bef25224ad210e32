//! String utility functions.
//!
//! Identifier casing used when deriving capability names from handler
//! identifiers.

/// Convert a PascalCase or camelCase identifier to snake_case.
///
/// Acronym runs stay together: a boundary is placed before an uppercase
/// letter that follows a lowercase one, or before an uppercase letter that
/// starts a new word (a lowercase letter follows it). Existing underscores
/// are never doubled.
///
/// ```text
/// TestURLString -> test_url_string
/// getHTTPResponse -> get_http_response
/// already_snake -> already_snake
/// ```
///
/// Applying the function to its own output is a no-op.
pub fn to_snake_case(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let mut out = String::with_capacity(identifier.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let boundary = prev.is_lowercase() || (next_is_lower && prev != '_');
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// Prefix `name` with `<prefix>_` unless it already carries that prefix.
pub fn with_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        return name.to_string();
    }
    let marker = format!("{}_", prefix);
    if name.starts_with(&marker) {
        name.to_string()
    } else {
        format!("{}{}", marker, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case_pascal() {
        assert_eq!(to_snake_case("ExecuteCode"), "execute_code");
        assert_eq!(to_snake_case("TakeScreenshot"), "take_screenshot");
    }

    #[test]
    fn test_to_snake_case_camel() {
        assert_eq!(to_snake_case("getUnityInfo"), "get_unity_info");
    }

    #[test]
    fn test_to_snake_case_acronyms() {
        assert_eq!(to_snake_case("TestURLString"), "test_url_string");
        assert_eq!(to_snake_case("getHTTPResponse"), "get_http_response");
        assert_eq!(to_snake_case("XMLHttpRequest"), "xml_http_request");
        assert_eq!(to_snake_case("ID"), "id");
    }

    #[test]
    fn test_to_snake_case_digits() {
        assert_eq!(to_snake_case("Vector3D"), "vector3d");
        assert_eq!(to_snake_case("Log2File"), "log2_file");
    }

    #[test]
    fn test_to_snake_case_empty() {
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_to_snake_case_is_idempotent() {
        let samples = [
            "",
            "a",
            "A",
            "already_snake",
            "snake_Case",
            "TestURLString",
            "HTTPServer",
            "ABcDEf",
            "getObjectByID",
            "Log2File",
            "_Private",
            "x_Y_z",
        ];
        for s in samples {
            let once = to_snake_case(s);
            assert_eq!(to_snake_case(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_with_prefix() {
        assert_eq!(with_prefix("editor", "execute_code"), "editor_execute_code");
        assert_eq!(with_prefix("editor", "editor_execute_code"), "editor_execute_code");
        assert_eq!(with_prefix("", "execute_code"), "execute_code");
    }
}
