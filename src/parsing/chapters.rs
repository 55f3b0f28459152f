use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::{
    normalize_layout, ChapterDraft, LayoutKind, PageElement, RegenPolicy, SpreadDraft,
};
use crate::parsing::coerce;

const DEFAULT_FREE_REMAKES: u32 = 3;

pub fn parse_page_element(map: &Map<String, Value>) -> PageElement {
    PageElement {
        element_type: coerce::text_or(map.get("type"), "image"),
        image_id: coerce::index(map.get("image_id")),
        crop_box: coerce::crop_box(map.get("crop_box")),
        caption: coerce::text(map.get("caption")),
        caption_style: coerce::text(map.get("caption_style")),
        text: coerce::text(map.get("text")),
        placement_hint: coerce::text(map.get("placement_hint")),
        style: coerce::text(map.get("style")),
    }
}

fn parse_regen_policy(value: Option<&Value>) -> Option<RegenPolicy> {
    let map = coerce::object(value).filter(|map| !map.is_empty())?;
    Some(RegenPolicy {
        free_remakes_remaining: coerce::index(map.get("free_remakes_remaining"))
            .unwrap_or(DEFAULT_FREE_REMAKES),
        estimated_credits_if_regen: coerce::object_or_empty(map.get("estimated_credits_if_regen")),
    })
}

/// Fills empty text slots from nested elements, but only when the spread has
/// no top-level text at all.
fn promote_element_text(spread: &mut SpreadDraft) {
    if spread.has_text() {
        return;
    }
    for element in &spread.elements {
        match element.element_type.as_str() {
            "image" if !element.caption.is_empty() && spread.caption_text.is_empty() => {
                spread.caption_text = element.caption.clone();
            }
            "quote" if !element.text.is_empty() && spread.quote_text.is_empty() => {
                spread.quote_text = element.text.clone();
            }
            "text_block" if !element.text.is_empty() && spread.body_text.is_empty() => {
                spread.body_text = element.text.clone();
            }
            _ => {}
        }
    }
}

pub fn parse_spread(map: &Map<String, Value>, position: u32) -> SpreadDraft {
    let spread_index = coerce::index(map.get("spread_index")).unwrap_or(position);
    let mut spread = SpreadDraft::new(spread_index, LayoutKind::HeroFullbleed);

    let layout = coerce::text_of(map, &["layout_id", "layout_type"]);
    if !layout.is_empty() {
        spread.layout_type = normalize_layout(&layout);
    }

    spread.photo_indices = coerce::index_list(map.get("photo_indices"));
    for page in coerce::array(map.get("pages")) {
        let elements = coerce::array(page.get("elements"));
        for element in elements.iter().filter_map(Value::as_object) {
            let element = parse_page_element(element);
            if element.element_type == "image" {
                if let Some(image_id) = element.image_id {
                    if !spread.photo_indices.contains(&image_id) {
                        spread.photo_indices.push(image_id);
                    }
                }
            }
            spread.elements.push(element);
        }
    }

    spread.heading_text = coerce::text(map.get("heading_text"));
    spread.body_text = coerce::text(map.get("body_text"));
    spread.caption_text = coerce::text(map.get("caption_text"));
    spread.quote_text = coerce::text(map.get("quote_text"));
    promote_element_text(&mut spread);

    spread.image_look_override = coerce::text(map.get("image_look_override"));
    spread.ai_generated_image_prompt = coerce::text(map.get("ai_generated_image_prompt"));
    spread.assigned_clusters = coerce::string_list(map.get("assigned_clusters"));
    spread.design_notes = coerce::text(map.get("design_notes"));
    spread.regen_policy = parse_regen_policy(map.get("regen_policy"));
    spread
}

pub fn parse_spreads(raw: &[Value]) -> Vec<SpreadDraft> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, item)| match item.as_object() {
            Some(map) => Some(parse_spread(map, position as u32)),
            None => {
                debug!(position, "skipping non-object spread");
                None
            }
        })
        .collect()
}

/// Chapters in source order. A missing or unusable index takes the chapter's
/// position among the chapters parsed so far.
pub fn parse_chapters(doc: &Map<String, Value>) -> Vec<ChapterDraft> {
    let mut chapters: Vec<ChapterDraft> = vec![];
    for item in coerce::array(doc.get("chapters")) {
        let Some(map) = item.as_object() else {
            debug!("skipping non-object chapter");
            continue;
        };
        let position = chapters.len() as u32;
        let raw_index = map.get("chapter_index").or_else(|| map.get("chapter_id"));
        chapters.push(ChapterDraft {
            chapter_index: coerce::chapter_index(raw_index, position),
            title: coerce::text(map.get("title")),
            blurb: coerce::text(map.get("blurb")),
            spreads: parse_spreads(coerce::array(map.get("spreads"))),
        });
    }
    chapters
}
