//! Brace-balanced JSON extraction: the gateway enforces
//! a JSON-shaped response by parsing provider output between the first
//! `{` and the last matching `}`, ignoring braces inside string literals.
//! Malformed output triggers exactly one re-ask with a stricter format
//! instruction — the retry itself lives in `gateway::AiGateway::analyze`.

use crate::error::AiError;
use archivist_core::model::AiAnalysis;

/// Extracts the first balanced `{...}` span from `raw`, tracking string
/// literals and escapes so braces inside a quoted JSON string value don't
/// confuse the balance count.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let start = raw.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses `raw` into an [`AiAnalysis`], applying the brace-balanced
/// extraction first. Returns `MalformedResponse` if no balanced object is
/// found or the object doesn't deserialize.
pub fn parse_analysis(raw: &str) -> Result<AiAnalysis, AiError> {
    let candidate = extract_json_object(raw).ok_or_else(|| {
        AiError::MalformedResponse(format!("no balanced JSON object found in: {}", truncate(raw)))
    })?;
    serde_json::from_str(candidate)
        .map_err(|e| AiError::MalformedResponse(format!("{e}: {}", truncate(candidate))))
}

fn truncate(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", &s[..200])
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_clean_object() {
        let raw = r#"{"summary": "a report"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn extracts_object_with_malformed_prefix() {
        let raw = r#"Here is the analysis: {"summary": "a report"} Hope that helps!"#;
        assert_eq!(extract_json_object(raw), Some(r#"{"summary": "a report"}"#));
    }

    #[test]
    fn extracts_object_with_malformed_suffix() {
        let raw = "{\"summary\": \"ok\"}\n```\nadditional commentary that is not json";
        assert_eq!(extract_json_object(raw), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn extracts_outer_object_around_nested_json() {
        let raw = r#"{"summary": "ok", "categories": ["a", "b"], "nested": {"x": 1}}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn braces_inside_string_values_do_not_confuse_balance() {
        let raw = r#"{"summary": "contains a } brace mid-string"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn no_object_returns_none() {
        assert_eq!(extract_json_object("no json here at all"), None);
    }

    #[test]
    fn parse_analysis_rejects_truncated_response() {
        let err = parse_analysis(r#"{"summary": "truncated"#).unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse(_)));
    }

    #[test]
    fn parse_analysis_succeeds_on_embedded_object() {
        let raw = r#"Sure, here you go: {"summary": "quarterly report", "categories": ["Healthcare"]}"#;
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("quarterly report"));
        assert_eq!(analysis.categories, vec!["Healthcare".to_string()]);
    }
}
