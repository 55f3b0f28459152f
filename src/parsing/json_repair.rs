use serde_json::Value;
use tracing::debug;

use crate::parsing::scan::scan;

/// Best-effort conversion of a JSON-shaped candidate into parseable JSON.
///
/// Text that already parses after cleanup is returned untouched; anything
/// else is treated as output cut off by the model's token budget and closed
/// structurally. The result is not guaranteed to parse. Running the repair
/// on its own output is a no-op.
pub fn repair_json(text: &str) -> String {
    let cleaned = strip_trailing_commas(&strip_control_chars(text));
    if serde_json::from_str::<Value>(&cleaned).is_ok() {
        return cleaned;
    }
    repair_truncated_json(&cleaned)
}

/// Drops ASCII control characters other than newline, carriage return and tab.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|ch| !(*ch < ' ' && !matches!(ch, '\n' | '\r' | '\t')))
        .collect()
}

/// Removes commas whose next non-whitespace character closes an object or
/// array. Commas inside string literals are left alone.
pub fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escape = false;

    for (idx, &byte) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == b'"' {
                in_string = false;
            }
            out.push(byte);
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b',' => {
                let next = bytes[idx + 1..]
                    .iter()
                    .find(|candidate| !candidate.is_ascii_whitespace());
                if matches!(next, Some(b'}') | Some(b']')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(byte);
    }

    // Only ASCII commas were removed, so the bytes are still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Closes JSON that was cut off mid-document.
pub fn repair_truncated_json(text: &str) -> String {
    let mut body = text.trim_end().to_string();

    if let Some(start) = scan(&body).open_string {
        debug!(offset = start, "dropping unterminated string");
        body.truncate(start);
    }
    trim_dangling_tail(&mut body);

    let closers = scan(&body).closers();
    if !closers.is_empty() {
        debug!(closers = %closers, "appending closers to truncated json");
    }
    body.push_str(&closers);
    strip_trailing_commas(&body)
}

/// Repeatedly removes whatever cannot stand before a closing bracket: a
/// trailing comma, a `key:` with no value, a key with no colon, or an
/// incomplete bare literal.
fn trim_dangling_tail(body: &mut String) {
    loop {
        let trimmed = body.trim_end().len();
        body.truncate(trimmed);
        let Some(last) = body.as_bytes().last().copied() else {
            return;
        };

        match last {
            b',' => {
                body.pop();
            }
            b':' => {
                body.pop();
                let trimmed = body.trim_end().len();
                body.truncate(trimmed);
                let state = scan(body);
                match state.string_ending_at(body.len().saturating_sub(1)) {
                    Some((key_start, _)) => body.truncate(key_start),
                    None => return,
                }
            }
            b'"' => {
                let state = scan(body);
                if let Some(start) = state.open_string {
                    body.truncate(start);
                    continue;
                }
                let Some((key_start, _)) = state.string_ending_at(body.len() - 1) else {
                    return;
                };
                if state.innermost() != Some(b'{') {
                    return;
                }
                let before = body[..key_start].trim_end().as_bytes().last().copied();
                if !matches!(before, Some(b'{') | Some(b',')) {
                    return;
                }
                body.truncate(key_start);
            }
            byte if is_bare_token_byte(byte) => {
                let start = body
                    .bytes()
                    .rposition(|candidate| !is_bare_token_byte(candidate))
                    .map(|idx| idx + 1)
                    .unwrap_or(0);
                if is_complete_literal(&body[start..]) {
                    return;
                }
                body.truncate(start);
            }
            _ => return,
        }
    }
}

fn is_bare_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'+')
}

fn is_complete_literal(token: &str) -> bool {
    matches!(token, "true" | "false" | "null")
        || serde_json::from_str::<serde_json::Number>(token).is_ok()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{repair_json, strip_control_chars, strip_trailing_commas};

    fn parses(text: &str) -> Value {
        serde_json::from_str(text).unwrap_or_else(|err| panic!("{text:?} did not parse: {err}"))
    }

    #[test]
    fn valid_json_is_returned_unchanged() {
        let text = r#"{"title": "Trip", "chapters": [{"title": "Day 1"}]}"#;
        assert_eq!(repair_json(text), text);
    }

    #[test]
    fn trailing_commas_outside_strings_are_removed() {
        assert_eq!(strip_trailing_commas(r#"{"a": [1, 2,], }"#), r#"{"a": [1, 2] }"#);
        assert_eq!(strip_trailing_commas(r#"{"a": ",]"}"#), r#"{"a": ",]"}"#);
    }

    #[test]
    fn control_characters_are_stripped_except_whitespace() {
        assert_eq!(strip_control_chars("a\u{0}b\u{1f}c\n\td"), "abc\n\td");
    }

    #[test]
    fn truncated_string_value_drops_its_key() {
        let repaired = repair_json(r#"{"title": "Trip", "subtitle": "Summer of"#);
        assert_eq!(parses(&repaired), json!({"title": "Trip"}));
    }

    #[test]
    fn truncated_array_element_keeps_completed_items() {
        let repaired = repair_json(r#"{"tags": ["beach", "sun"#);
        assert_eq!(parses(&repaired), json!({"tags": ["beach"]}));
    }

    #[test]
    fn dangling_colon_and_key_are_removed() {
        assert_eq!(parses(&repair_json(r#"{"a": 1, "b":"#)), json!({"a": 1}));
        assert_eq!(parses(&repair_json(r#"{"a": 1, "b""#)), json!({"a": 1}));
    }

    #[test]
    fn incomplete_literals_are_removed() {
        assert_eq!(parses(&repair_json(r#"{"a": tru"#)), json!({}));
        assert_eq!(parses(&repair_json(r#"[1, -"#)), json!([1]));
        assert_eq!(parses(&repair_json(r#"[1, 2.5"#)), json!([1, 2.5]));
    }

    #[test]
    fn key_with_escaped_quote_is_removed_exactly() {
        let repaired = repair_json(r#"{"ok": 1, "say \"hi\"": "unfinis"#);
        assert_eq!(parses(&repaired), json!({"ok": 1}));
    }

    #[test]
    fn nested_closers_are_appended_in_reverse_order() {
        let repaired = repair_json(r#"{"chapters": [{"spreads": [{"layout_id": "TWO_BALANCED""#);
        assert_eq!(
            parses(&repaired),
            json!({"chapters": [{"spreads": [{"layout_id": "TWO_BALANCED"}]}]})
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let inputs = [
            r#"{"a": [1, 2,"#,
            r#"{"a": {"b": "c"#,
            r#"[{"x": 1}, {"y":"#,
            r#"{"a": 1}}"#,
            "not json at all",
        ];
        for input in inputs {
            let once = repair_json(input);
            assert_eq!(repair_json(&once), once, "input {input:?}");
        }
    }
}
