//! String-literal-aware structural scan of JSON-like text.
//!
//! Works on bytes: every structural character is ASCII and can never appear
//! inside a multi-byte UTF-8 sequence, so all recorded offsets are valid
//! `str` slice boundaries.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Scan {
    /// Completed string literals as `(opening quote, closing quote)` offsets.
    pub strings: Vec<(usize, usize)>,
    /// Offset of the opening quote of a string the text ends inside of.
    pub open_string: Option<usize>,
    /// Unmatched `{` / `[` in nesting order.
    pub open: Vec<(usize, u8)>,
}

impl Scan {
    pub fn closers(&self) -> String {
        self.open
            .iter()
            .rev()
            .map(|(_, opener)| if *opener == b'{' { '}' } else { ']' })
            .collect()
    }

    pub fn innermost(&self) -> Option<u8> {
        self.open.last().map(|(_, opener)| *opener)
    }

    /// The completed string literal whose closing quote sits at `end`.
    pub fn string_ending_at(&self, end: usize) -> Option<(usize, usize)> {
        self.strings
            .iter()
            .rev()
            .find(|(_, close)| *close == end)
            .copied()
    }
}

pub(crate) fn scan(text: &str) -> Scan {
    let mut result = Scan::default();
    let mut in_string = false;
    let mut escape = false;
    let mut string_start = 0;

    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match byte {
                b'\\' => escape = true,
                b'"' => {
                    in_string = false;
                    result.strings.push((string_start, idx));
                }
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => {
                in_string = true;
                string_start = idx;
            }
            b'{' | b'[' => result.open.push((idx, byte)),
            b'}' | b']' => {
                result.open.pop();
            }
            _ => {}
        }
    }

    if in_string {
        result.open_string = Some(string_start);
    }
    result
}

/// Offset of the bracket closing the opener at `start`.
pub(crate) fn matching_close(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (idx, byte) in text.bytes().enumerate().skip(start) {
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
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Nesting depth at `offset`, or `None` when the offset is inside a string.
pub(crate) fn depth_at(text: &str, offset: usize) -> Option<usize> {
    let prefix = text.get(..offset)?;
    let state = scan(prefix);
    if state.open_string.is_some() {
        None
    } else {
        Some(state.open.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{depth_at, matching_close, scan};

    #[test]
    fn matching_close_skips_nested_and_quoted_brackets() {
        let text = r#"x [{"a": "]"}, [1]] tail"#;
        assert_eq!(matching_close(text, 2), Some(18));
        assert_eq!(matching_close("[1, [2]", 0), None);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let state = scan(r#"{"a": "[{", "b": ["#);
        assert_eq!(state.open.len(), 2);
        assert_eq!(state.closers(), "]}");
        assert!(state.open_string.is_none());
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let text = r#"{"say \"hi\"": "x"#;
        let state = scan(text);
        assert_eq!(state.strings, vec![(1, 12)]);
        assert_eq!(state.open_string, Some(15));
    }

    #[test]
    fn depth_is_reported_outside_strings_only() {
        let text = r#"{"title": "a", "chapters": [{"title": "b"}]}"#;
        assert_eq!(depth_at(text, 1), Some(1));
        assert_eq!(depth_at(text, 29), Some(3));
        assert_eq!(depth_at(text, 12), None);
    }
}
