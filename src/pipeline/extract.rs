//! Tolerant JSON extraction from backend responses.

use serde_json::Value;

/// Extract the first JSON object or array from free-form model output.
/// Handles markdown code fences and leading/trailing chatter by scanning
/// for the first balanced `{...}` or `[...]` span.
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let mut text = text.trim();

    // Unwrap a markdown code fence if present.
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            text = after[..end].trim();
        }
    }

    let obj_start = text.find('{');
    let arr_start = text.find('[');
    let (open, close, start) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if o < a => ('{', '}', o),
        (Some(o), None) => ('{', '}', o),
        (_, Some(a)) => ('[', ']', a),
        (None, None) => return serde_json::from_str(text).ok(),
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return serde_json::from_str(&text[start..=start + i]).ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn fenced_object_with_chatter() {
        let text = "Sure, here you go:\n```json\n{\"short\": \"hi\"}\n```\nHope that helps!";
        assert_eq!(extract_json(text), Some(json!({"short": "hi"})));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scan() {
        let text = r#"prefix {"a": "has } brace", "b": 2} suffix"#;
        assert_eq!(
            extract_json(text),
            Some(json!({"a": "has } brace", "b": 2}))
        );
    }

    #[test]
    fn array_before_object() {
        assert_eq!(extract_json(r#"[1, 2] {"a": 1}"#), Some(json!([1, 2])));
    }

    #[test]
    fn no_json_yields_none() {
        assert_eq!(extract_json("just words"), None);
    }
}
