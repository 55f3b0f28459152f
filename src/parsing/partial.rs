//! Field-by-field salvage of narrative output that never parsed as a whole.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::core::types::{BookDraft, ChapterDraft, PhotoAnalysis};
use crate::parsing::chapters::parse_chapters;
use crate::parsing::fallback::fallback_draft;
use crate::parsing::json_repair::repair_json;
use crate::parsing::pages::{flatten_chapters_to_pages, BookFrame};
use crate::parsing::scan::{depth_at, matching_close};
use crate::parsing::ParseError;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartialFields {
    pub title: Option<String>,
    pub subtitle: String,
    pub chapters: Vec<ChapterDraft>,
}

fn string_field_pattern(field: &str) -> Regex {
    let pattern = format!(r#""{field}"\s*:\s*"((?:[^"\\]|\\.)*)""#);
    Regex::new(&pattern).expect("string field pattern is valid")
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| string_field_pattern("title"))
}

fn subtitle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| string_field_pattern("subtitle"))
}

fn chapters_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""chapters"\s*:\s*\["#).expect("chapters pattern is valid"))
}

/// First occurrence of a string field directly inside the root object.
fn top_level_string(text: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures_iter(text)
        .filter(|caps| caps.get(0).is_some_and(|whole| depth_at(text, whole.start()) == Some(1)))
        .filter_map(|caps| caps.get(1))
        .map(|raw| {
            serde_json::from_str::<String>(&format!("\"{}\"", raw.as_str()))
                .unwrap_or_else(|_| raw.as_str().to_string())
        })
        .find(|value| !value.is_empty())
}

fn top_level_chapters(text: &str) -> Vec<ChapterDraft> {
    let Some(found) = chapters_pattern()
        .find_iter(text)
        .find(|found| depth_at(text, found.start()) == Some(1))
    else {
        return vec![];
    };

    let open = found.end() - 1;
    let slice = match matching_close(text, open) {
        Some(close) => &text[open..=close],
        None => &text[open..],
    };
    match serde_json::from_str::<Value>(&repair_json(slice)) {
        Ok(Value::Array(items)) => {
            let mut doc = Map::new();
            doc.insert("chapters".to_string(), Value::Array(items));
            parse_chapters(&doc)
        }
        Ok(_) => vec![],
        Err(err) => {
            warn!(error = %err, "chapters array could not be recovered");
            vec![]
        }
    }
}

pub fn extract_partial_fields(text: &str) -> PartialFields {
    PartialFields {
        title: top_level_string(text, title_pattern()),
        subtitle: top_level_string(text, subtitle_pattern()).unwrap_or_default(),
        chapters: top_level_chapters(text),
    }
}

/// Builds a draft from whatever top-level fields survive in `text`. A title
/// with chapters yields a draft of its own; a title alone is grafted onto the
/// fallback draft.
pub fn recover_partial(
    text: &str,
    photo_count: usize,
    analyses: Option<&[PhotoAnalysis]>,
) -> Result<BookDraft, ParseError> {
    let fields = extract_partial_fields(text);
    let Some(title) = fields.title else {
        return Err(ParseError::Unrecoverable);
    };

    if !fields.chapters.is_empty() {
        info!(title = %title, chapters = fields.chapters.len(), "partial recovery kept chapters");
        let pages = flatten_chapters_to_pages(&fields.chapters, &BookFrame::titled(title.clone()));
        return Ok(BookDraft {
            title,
            subtitle: fields.subtitle,
            pages,
            chapters: fields.chapters,
            ..BookDraft::default()
        });
    }

    info!(title = %title, "partial recovery kept title only");
    let mut draft = fallback_draft(photo_count, analyses);
    draft.title = title;
    draft.subtitle = fields.subtitle;
    Ok(draft)
}
