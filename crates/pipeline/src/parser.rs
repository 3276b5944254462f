//! Response parser — pulls a structured intent out of free-form reply text.
//!
//! Backends wrap their JSON in prose or code fences often enough that strict
//! decoding of the whole reply is useless. A bracket scanner that understands
//! string literals finds balanced `{...}` spans; the first top-level span that
//! decodes to an object with a string `message` wins.

use dirflow_core::intent::StructuredIntent;
use serde_json::Value;

/// Parse a raw backend reply. Never fails.
pub fn parse(raw: &str) -> StructuredIntent {
    let mut from = 0;

    while let Some((start, end)) = next_object_span(raw, from) {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&raw[start..end]) {
            if let Some(message) = obj.get("message").and_then(Value::as_str) {
                let commands = match obj.get("commands") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                return StructuredIntent::parsed(message, commands);
            }
        }
        from = end;
    }

    StructuredIntent::degraded(raw)
}

/// Byte range of the next balanced object starting at or after `from`.
///
/// An opening brace that never balances is skipped and scanning resumes
/// just after it.
fn next_object_span(raw: &str, mut from: usize) -> Option<(usize, usize)> {
    loop {
        let start = from + raw.get(from..)?.find('{')?;
        match balanced_end(raw, start) {
            Some(end) => return Some((start, end)),
            None => from = start + 1,
        }
    }
}

/// End (exclusive) of the object opening at `start`, if it closes.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
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
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirflow_core::intent::PARSE_WARNING;
    use serde_json::json;

    #[test]
    fn plain_json_object() {
        let intent = parse(r#"{"message":"ok","commands":[{"action":"create_file","path":"a.txt"}]}"#);
        assert!(intent.success);
        assert_eq!(intent.message, "ok");
        assert_eq!(intent.commands, vec![json!({"action": "create_file", "path": "a.txt"})]);
        assert!(intent.warning.is_none());
    }

    #[test]
    fn json_inside_prose_and_fences() {
        let raw = "Sure! Here you go:\n```json\n{\"message\": \"Listing files\", \"commands\": [{\"action\": \"list_files\"}]}\n```\nAnything else?";
        let intent = parse(raw);
        assert!(intent.success);
        assert_eq!(intent.message, "Listing files");
        assert_eq!(intent.commands.len(), 1);
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_scanner() {
        let raw = r#"{"message": "use {braces} and \"quotes\" freely }", "commands": []}"#;
        let intent = parse(raw);
        assert!(intent.success);
        assert_eq!(intent.message, r#"use {braces} and "quotes" freely }"#);
    }

    #[test]
    fn first_object_with_message_wins() {
        let raw = r#"{"note": "no message here"} then {"message": "first"} and {"message": "second"}"#;
        assert_eq!(parse(raw).message, "first");
    }

    #[test]
    fn stray_open_brace_is_skipped() {
        let raw = r#"Look at this { and then {"message": "recovered", "commands": []}"#;
        let intent = parse(raw);
        assert!(intent.success);
        assert_eq!(intent.message, "recovered");
    }

    #[test]
    fn non_array_commands_become_empty() {
        let intent = parse(r#"{"message": "hi", "commands": {"action": "list_files"}}"#);
        assert!(intent.success);
        assert!(intent.commands.is_empty());
    }

    #[test]
    fn totality_on_bad_input() {
        for raw in [
            "",
            "just words",
            "{",
            "}{",
            r#"{"commands": []}"#,
            r#"{"message": 42}"#,
            "{not json at all}",
            "日本語の応答です",
        ] {
            let intent = parse(raw);
            assert!(!intent.success, "{raw:?} should degrade");
            assert_eq!(intent.message, raw);
            assert!(intent.commands.is_empty());
            assert_eq!(intent.warning.as_deref(), Some(PARSE_WARNING));
        }
    }

    #[test]
    fn multibyte_text_around_json() {
        let raw = "了解しました。{\"message\": \"コピーします\", \"commands\": []} 以上です。";
        let intent = parse(raw);
        assert!(intent.success);
        assert_eq!(intent.message, "コピーします");
    }
}
