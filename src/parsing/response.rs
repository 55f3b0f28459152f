use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::types::{
    BookDraft, CoverOption, DesignInstructions, LongformTextBlock, PhotoAnalysis, PhotoCluster,
    SmartQuestion, SystemNotes, DEFAULT_TITLE,
};
use crate::parsing::chapters::parse_chapters;
use crate::parsing::coerce;
use crate::parsing::fallback::fallback_draft;
use crate::parsing::json_locator::locate_json;
use crate::parsing::json_repair::repair_json;
use crate::parsing::pages::{dedication_text, flatten_chapters_to_pages, parse_pages, BookFrame};
use crate::parsing::partial::recover_partial;
use crate::parsing::ParseError;

const DEFAULT_ANSWER_TYPE: &str = "single_choice";
const DEFAULT_BLOCK_PLACEMENT: &str = "between_chapters";
const UNKNOWN_LABEL: &str = "unknown";

/// Locates the payload and parses it, repairing once on failure.
fn parse_lenient(raw: &str) -> Result<Value, ParseError> {
    let candidate = locate_json(raw);
    serde_json::from_str::<Value>(candidate)
        .or_else(|err| {
            debug!(error = %err, "initial parse failed, repairing");
            serde_json::from_str::<Value>(&repair_json(candidate))
        })
        .map_err(ParseError::from)
}

// ── Photo analysis ───────────────────────────────────────────────────────────

fn extract_photo_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("photos") {
            Some(Value::Array(items)) => items,
            Some(_) => vec![],
            None if map.contains_key("photo_index") => vec![Value::Object(map)],
            None => {
                warn!("photo analysis parsed but had an unexpected shape");
                vec![]
            }
        },
        _ => vec![],
    }
}

fn analysis_from_map(map: &Map<String, Value>, position: usize) -> PhotoAnalysis {
    let photo_index = coerce::index(map.get("photo_index")).unwrap_or(position as u32);
    PhotoAnalysis {
        description: coerce::text(map.get("description")),
        scene_type: coerce::text(map.get("scene_type")),
        emotion: coerce::text(map.get("emotion")),
        people_count: coerce::index(map.get("people_count")).unwrap_or(0),
        tags: coerce::string_list(map.get("tags")),
        suggested_caption: coerce::text(map.get("suggested_caption")),
        story_relevance: coerce::text(map.get("story_relevance")),
        cluster_id: coerce::index(map.get("cluster_id")),
        estimated_date_hint: coerce::text(map.get("estimated_date_hint")),
        hero_candidate: coerce::boolean(map.get("hero_candidate")),
        face_regions: coerce::crop_boxes(map.get("face_regions")),
        safe_crop_box: coerce::crop_box(map.get("safe_crop_box")),
        date_confidence: coerce::unit_float(map.get("date_confidence"), 0.0),
        aspect_ratio: coerce::float(map.get("aspect_ratio"), 1.0),
        ..PhotoAnalysis::new(photo_index)
    }
}

/// Analyses as reported by one model call, with the call's own (local)
/// indices. An item without a usable index takes its list position.
pub fn parse_photo_analysis(raw: &str) -> Vec<PhotoAnalysis> {
    match parse_lenient(raw) {
        Ok(value) => {
            let analyses: Vec<PhotoAnalysis> = extract_photo_list(value)
                .iter()
                .enumerate()
                .filter_map(|(position, item)| {
                    item.as_object().map(|map| analysis_from_map(map, position))
                })
                .collect();
            info!(items = analyses.len(), "photo analysis parsed");
            analyses
        }
        Err(err) => {
            warn!(error = %err, "photo analysis unrecoverable");
            vec![]
        }
    }
}

// ── Clusters ─────────────────────────────────────────────────────────────────

pub(crate) fn cluster_from_map(map: &Map<String, Value>) -> Option<PhotoCluster> {
    let cluster_id = coerce::text(map.get("cluster_id"));
    if cluster_id.is_empty() {
        debug!("skipping cluster without an id");
        return None;
    }
    Some(PhotoCluster {
        cluster_id,
        label_guess: coerce::text_or(map.get("label_guess"), UNKNOWN_LABEL),
        label_confidence: coerce::unit_float(map.get("label_confidence"), 0.0),
        time_range: coerce::object_or_empty(map.get("time_range")),
        image_ids: coerce::index_list(map.get("image_ids")),
        hero_candidates: coerce::index_list(map.get("hero_candidates")),
        cohesion_score: coerce::unit_float(map.get("cohesion_score"), 0.0),
        notes: coerce::text(map.get("notes")),
    })
}

fn clusters_from(value: Option<&Value>) -> Vec<PhotoCluster> {
    coerce::array(value)
        .iter()
        .filter_map(Value::as_object)
        .filter_map(cluster_from_map)
        .collect()
}

/// Clusters the model declared alongside an analysis, if any.
pub fn parse_clusters_from_analysis(raw: &str) -> Vec<PhotoCluster> {
    match parse_lenient(raw) {
        Ok(Value::Object(map)) => clusters_from(map.get("clusters")),
        _ => vec![],
    }
}

// ── Narrative ────────────────────────────────────────────────────────────────

fn question_from_map(map: &Map<String, Value>) -> SmartQuestion {
    SmartQuestion {
        question_id: coerce::text(map.get("question_id")),
        reason: coerce::text(map.get("reason")),
        question_text: coerce::text(map.get("question_text")),
        answer_type: coerce::text_or(map.get("answer_type"), DEFAULT_ANSWER_TYPE),
        choices: coerce::string_list(map.get("choices")),
        applies_to: coerce::object_or_empty(map.get("applies_to")),
    }
}

fn longform_blocks(value: Option<&Value>) -> Vec<LongformTextBlock> {
    coerce::array(value)
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let map = item.as_object()?;
            Some(LongformTextBlock {
                block_index: coerce::index(map.get("block_index")).unwrap_or(position as u32),
                placement: coerce::text_or(map.get("placement"), DEFAULT_BLOCK_PLACEMENT),
                heading: coerce::text(map.get("heading")),
                body: coerce::text(map.get("body")),
            })
        })
        .collect()
}

fn covers(value: Option<&Value>) -> Vec<CoverOption> {
    coerce::array(value)
        .iter()
        .filter_map(|item| match serde_json::from_value::<CoverOption>(item.clone()) {
            Ok(cover) => Some(cover),
            Err(err) => {
                debug!(error = %err, "skipping malformed cover option");
                None
            }
        })
        .collect()
}

/// A non-empty object deserialized leniently; malformed values are dropped.
fn optional_section<T: serde::de::DeserializeOwned>(value: Option<&Value>, name: &str) -> Option<T> {
    let map = coerce::object(value).filter(|map| !map.is_empty())?;
    match serde_json::from_value::<T>(Value::Object(map.clone())) {
        Ok(section) => Some(section),
        Err(err) => {
            debug!(section = name, error = %err, "skipping malformed section");
            None
        }
    }
}

/// Maps a parsed document onto a draft. Fails when the document is not an
/// object or carries neither chapters nor pages, so the caller can move on to
/// the next recovery step.
pub fn parse_draft_value(value: Value) -> Result<BookDraft, ParseError> {
    let Value::Object(doc) = value else {
        return Err(ParseError::Shape("narrative is not a json object".to_string()));
    };

    let chapters = parse_chapters(&doc);
    let mut pages = parse_pages(coerce::array(doc.get("pages")));
    if chapters.is_empty() && pages.is_empty() {
        return Err(ParseError::Shape("narrative has no chapters or pages".to_string()));
    }
    if pages.is_empty() {
        pages = flatten_chapters_to_pages(&chapters, &BookFrame::from_document(&doc));
    }

    let metadata = coerce::object(doc.get("metadata"));
    let meta = |key: &str| metadata.and_then(|map| map.get(key));

    let draft = BookDraft {
        title: coerce::text_or(doc.get("title"), DEFAULT_TITLE),
        subtitle: coerce::text(doc.get("subtitle")),
        dedication: dedication_text(&doc),
        overall_narrative: coerce::text(doc.get("overall_narrative")),
        pages,
        chapters,
        longform_blocks: longform_blocks(doc.get("longform_blocks")),
        love_letter_text: coerce::text(doc.get("love_letter_text")),
        audio_qr_chapter_labels: coerce::string_list(doc.get("audio_qr_chapter_labels")),
        anniversary_cover_text: coerce::text(doc.get("anniversary_cover_text")),
        mini_reel_frames: coerce::string_list(doc.get("mini_reel_frames")),
        edit_suggestions: coerce::string_list(doc.get("edit_suggestions")),
        vibe: coerce::text(meta("vibe")),
        structure_template: coerce::text(meta("template")),
        title_options: coerce::array(doc.get("titles"))
            .iter()
            .filter(|item| item.is_object())
            .cloned()
            .collect(),
        covers: covers(doc.get("covers")),
        closing_page: coerce::object_or_empty(doc.get("closing_page")),
        clusters: clusters_from(doc.get("clusters")),
        questions_for_user: coerce::array(doc.get("questions_for_user"))
            .iter()
            .filter_map(Value::as_object)
            .map(question_from_map)
            .collect(),
        design_instructions: optional_section::<DesignInstructions>(
            doc.get("design_instructions"),
            "design_instructions",
        ),
        notes_for_system: optional_section::<SystemNotes>(
            doc.get("notes_for_system"),
            "notes_for_system",
        ),
        confidence: coerce::object_or_empty(meta("confidence")),
        ..BookDraft::default()
    };
    info!(
        title = %draft.title,
        chapters = draft.chapters.len(),
        pages = draft.pages.len(),
        "narrative parsed"
    );
    Ok(draft)
}

fn decode_draft(text: &str) -> Result<BookDraft, ParseError> {
    serde_json::from_str::<Value>(text)
        .map_err(ParseError::from)
        .and_then(parse_draft_value)
}

/// Strict-then-repaired parse of narrative text, without partial recovery or
/// fallback.
pub fn parse_draft_text(raw: &str) -> Result<BookDraft, ParseError> {
    parse_lenient(raw).and_then(parse_draft_value)
}

/// Always yields a draft: parse, then repair and parse, then partial
/// recovery, then the deterministic fallback.
pub fn parse_narrative(
    raw: &str,
    photo_count: usize,
    analyses: Option<&[PhotoAnalysis]>,
) -> BookDraft {
    let candidate = locate_json(raw);
    decode_draft(candidate).unwrap_or_else(|err| {
        warn!(error = %err, "narrative parse failed, repairing");
        let repaired = repair_json(candidate);
        decode_draft(&repaired)
            .inspect(|_| info!("narrative repair succeeded"))
            .or_else(|err| {
                warn!(error = %err, "repaired narrative failed, trying partial recovery");
                recover_partial(&repaired, photo_count, analyses)
            })
            .unwrap_or_else(|err| {
                warn!(error = %err, "partial recovery failed, using fallback draft");
                fallback_draft(photo_count, analyses)
            })
    })
}

// ── Auxiliary calls ──────────────────────────────────────────────────────────

/// Follow-up questions from a bare array or `{"questions": [...]}`.
pub fn parse_questions(raw: &str) -> Vec<SmartQuestion> {
    let items = match parse_lenient(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut map)) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => vec![],
        },
        _ => vec![],
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(question_from_map)
        .collect()
}

/// Trims the reply and strips one pair of matching surrounding quotes.
pub fn parse_regenerated_text(raw: &str) -> String {
    let text = raw.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        parse_clusters_from_analysis, parse_draft_value, parse_photo_analysis, parse_questions,
        parse_regenerated_text,
    };
    use crate::parsing::ParseError;

    #[test]
    fn photo_lists_come_in_three_shapes() {
        assert_eq!(parse_photo_analysis(r#"[{"photo_index": 1}, {}]"#).len(), 2);
        assert_eq!(
            parse_photo_analysis(r#"{"photos": [{"photo_index": 0}]}"#)[0].photo_index,
            0
        );
        let single = parse_photo_analysis(r#"{"photo_index": 3, "cluster_id": "2"}"#);
        assert_eq!(single[0].photo_index, 3);
        assert_eq!(single[0].cluster_id, Some(2));
        assert!(parse_photo_analysis(r#"{"unexpected": true}"#).is_empty());
        assert!(parse_photo_analysis("no json").is_empty());
    }

    #[test]
    fn missing_photo_index_takes_list_position() {
        let analyses = parse_photo_analysis(r#"[{"photo_index": 0}, {"description": "x"}]"#);
        assert_eq!(analyses[1].photo_index, 1);
        assert_eq!(analyses[1].description, "x");
    }

    #[test]
    fn negative_ids_are_treated_as_absent() {
        let analyses = parse_photo_analysis(
            r#"[{"photo_index": -1, "description": "stray"},
                {"photo_index": 1, "cluster_id": -1},
                {"photo_index": 2, "cluster_id": 0}]"#,
        );
        assert_eq!(analyses[0].photo_index, 0);
        assert_eq!(analyses[0].description, "stray");
        assert_eq!(analyses[1].cluster_id, None);
        assert_eq!(analyses[2].cluster_id, Some(0));
    }

    #[test]
    fn model_clusters_keep_their_values() {
        let clusters = parse_clusters_from_analysis(
            r#"{"photos": [], "clusters": [{"cluster_id": 4, "label_guess": "Paris",
                "label_confidence": 0.8, "image_ids": [0, 1], "hero_candidates": [1]},
                {"label_guess": "no id"}]}"#,
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cluster_id, "4");
        assert_eq!(clusters[0].label_guess, "Paris");
        assert_eq!(clusters[0].hero_candidates, vec![1]);
        assert!(parse_clusters_from_analysis("[1, 2]").is_empty());
    }

    #[test]
    fn documents_without_content_are_shape_errors() {
        assert!(matches!(
            parse_draft_value(json!([1, 2])),
            Err(ParseError::Shape(_))
        ));
        assert!(matches!(
            parse_draft_value(json!({"title": "Only"})),
            Err(ParseError::Shape(_))
        ));
    }

    #[test]
    fn auxiliary_sections_are_mapped_leniently() {
        let draft = parse_draft_value(json!({
            "title": "Ours",
            "chapters": [{"title": "One", "spreads": []}],
            "metadata": {"vibe": "cozy", "template": "seasons", "confidence": {"overall": 0.7}},
            "covers": [{"cover_id": "c1"}, {"cover_id": 5}],
            "design_instructions": {"mood_words": ["warm"]},
            "notes_for_system": {},
            "longform_blocks": [{"heading": "Letter"}],
            "questions_for_user": [{"question_text": "Where?"}]
        }))
        .expect("draft");

        assert_eq!(draft.vibe, "cozy");
        assert_eq!(draft.structure_template, "seasons");
        assert_eq!(draft.confidence, json!({"overall": 0.7}));
        assert_eq!(draft.covers.len(), 1);
        assert_eq!(
            draft.design_instructions.expect("design").mood_words,
            vec!["warm".to_string()]
        );
        assert!(draft.notes_for_system.is_none());
        assert_eq!(draft.longform_blocks[0].placement, "between_chapters");
        assert_eq!(draft.questions_for_user[0].answer_type, "single_choice");
        assert_eq!(draft.pages.len(), 3);
    }

    #[test]
    fn questions_accept_list_or_wrapper() {
        assert_eq!(parse_questions(r#"[{"question_id": "q1"}]"#).len(), 1);
        assert_eq!(parse_questions(r#"{"questions": [{}, {}]}"#).len(), 2);
        assert!(parse_questions(r#"{"other": []}"#).is_empty());
        assert!(parse_questions("nothing").is_empty());
    }

    #[test]
    fn regenerated_text_loses_one_pair_of_quotes() {
        assert_eq!(parse_regenerated_text("  \"Hello there\"\n"), "Hello there");
        assert_eq!(parse_regenerated_text("'single'"), "single");
        assert_eq!(parse_regenerated_text("\"\"nested\"\""), "\"nested\"");
        assert_eq!(parse_regenerated_text("\"unbalanced"), "\"unbalanced");
        assert_eq!(parse_regenerated_text("\""), "\"");
    }
}
