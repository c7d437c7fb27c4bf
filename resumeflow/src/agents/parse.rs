//! Structured-output extraction from model replies.

use serde::de::DeserializeOwned;

use crate::stages::{StageError, StageId};

/// Strips ```json ... ``` or ``` ... ``` fences around a reply.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped.strip_suffix("```").map_or(stripped, str::trim)
        }
        None => text,
    }
}

/// Finds the first balanced `{ ... }` block, ignoring braces inside strings.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = strip_json_fences(text);
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the structured output of `stage` from a model reply.
///
/// A reply without a usable object is a transient failure: the next sample
/// may well be valid.
pub fn parse_structured<T: DeserializeOwned>(stage: StageId, reply: &str) -> Result<T, StageError> {
    let block = extract_json_object(reply).ok_or_else(|| {
        StageError::transient(stage, "model reply contained no JSON object")
    })?;
    serde_json::from_str(block).map_err(|e| {
        StageError::transient(stage, format!("model reply did not match schema: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobRequirements;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_from_prose() {
        let reply = "Sure! Here it is: {\"a\": {\"b\": 1}} and some trailing text {\"c\": 2}";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let reply = r#"{"text": "a } tricky \" { value"}"#;
        assert_eq!(extract_json_object(reply), Some(reply));
    }

    #[test]
    fn test_extract_unbalanced() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn test_parse_structured() {
        let reply = "```json\n{\"title\": \"Senior AI Engineer\", \"keywords\": [\"LLM\"]}\n```";
        let parsed: JobRequirements = parse_structured(StageId::AnalyzeJob, reply).unwrap();
        assert_eq!(parsed.title, "Senior AI Engineer");
        assert_eq!(parsed.keywords, vec!["LLM".to_string()]);
    }

    #[test]
    fn test_parse_failure_is_transient() {
        let err = parse_structured::<JobRequirements>(StageId::AnalyzeJob, "I cannot help")
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.stage, StageId::AnalyzeJob);

        let err = parse_structured::<JobRequirements>(StageId::AnalyzeJob, r#"{"title": 5}"#)
            .unwrap_err();
        assert!(err.is_transient());
    }
}
