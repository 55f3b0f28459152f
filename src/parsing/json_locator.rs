use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

const FENCE: &str = "```";

fn fenced_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
    })
}

/// Best-guess JSON payload inside free model text. Never fails; when nothing
/// JSON-shaped is found the input comes back as-is.
pub fn locate_json(text: &str) -> &str {
    if let Some(inner) = fenced_block_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
    {
        debug!(bytes = inner.len(), "json located in fenced block");
        return inner.as_str();
    }

    let body = after_unclosed_fence(text);
    let Some(start) = body.find(['{', '[']) else {
        return text;
    };

    if let Some(found) = balanced_from(body, start) {
        return found;
    }
    if let Some(found) = greedy_from(body, start) {
        debug!(bytes = found.len(), "json located by greedy match");
        return found;
    }
    &body[start..]
}

/// Content after an opening fence whose closing fence never arrived.
fn after_unclosed_fence(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let rest = &text[open + FENCE.len()..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.trim_start()
}

/// Substring from `start` to its matching closer, counting only the opener's
/// own bracket type and skipping string literals.
fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let opener = bytes[start];
    let closer = if opener == b'{' { b'}' } else { b']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (idx, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        if byte == b'"' {
            in_string = true;
        } else if byte == opener {
            depth += 1;
        } else if byte == closer {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=idx]);
            }
        }
    }
    None
}

/// Widest match from the first opener to the last closer of either kind.
fn greedy_from(text: &str, start: usize) -> Option<&str> {
    let end = text.rfind(['}', ']'])?;
    (end > start).then(|| &text[start..=end])
}
