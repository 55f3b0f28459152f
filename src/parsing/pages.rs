use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::{
    is_two_sided_layout, normalize_layout, ChapterDraft, LayoutKind, PageDraft, PageSide, PageType,
    DEFAULT_TITLE,
};
use crate::parsing::coerce;

pub const DEDICATION_HEADING: &str = "For Us";
pub const BACK_COVER_HEADING: &str = "The End";
pub const DEFAULT_CLOSING_TEXT: &str = "Here's to many more memories together.";

/// Book-level text that frames the flattened content pages.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub title: String,
    pub dedication: String,
    pub closing_text: String,
}

impl BookFrame {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            dedication: String::new(),
            closing_text: DEFAULT_CLOSING_TEXT.to_string(),
        }
    }

    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let closing_text = coerce::object(doc.get("closing_page"))
            .map(|closing| coerce::text_or(closing.get("text"), DEFAULT_CLOSING_TEXT))
            .unwrap_or_else(|| DEFAULT_CLOSING_TEXT.to_string());
        Self {
            title: coerce::text_or(doc.get("title"), DEFAULT_TITLE),
            dedication: dedication_text(doc),
            closing_text,
        }
    }
}

/// `dedication`, or the text of a `dedication_page` object.
pub fn dedication_text(doc: &Map<String, Value>) -> String {
    let direct = coerce::text(doc.get("dedication"));
    if !direct.is_empty() {
        return direct;
    }
    coerce::object(doc.get("dedication_page"))
        .map(|page| coerce::text(page.get("text")))
        .unwrap_or_default()
}

/// Derives print pages from chapters: cover, dedication, one page per spread
/// (two for photo-and-text layouts) and a back cover, numbered from 1.
pub fn flatten_chapters_to_pages(chapters: &[ChapterDraft], frame: &BookFrame) -> Vec<PageDraft> {
    let mut pages: Vec<PageDraft> = vec![];

    let mut cover = PageDraft::new(1, PageType::Cover, LayoutKind::HeroFullbleed);
    cover.photo_indices = chapters
        .first()
        .and_then(|chapter| chapter.spreads.first())
        .and_then(|spread| spread.photo_indices.first().copied())
        .into_iter()
        .collect();
    cover.heading_text = frame.title.clone();
    pages.push(cover);

    let mut dedication = PageDraft::new(2, PageType::Dedication, LayoutKind::Dedication);
    dedication.heading_text = DEDICATION_HEADING.to_string();
    dedication.body_text = frame.dedication.clone();
    pages.push(dedication);

    for spread in chapters.iter().flat_map(|chapter| chapter.spreads.iter()) {
        let number = pages.len() as u32 + 1;
        let mut page = PageDraft::new(number, PageType::Content, LayoutKind::HeroFullbleed);
        page.layout_type = spread.layout_type.clone();

        if is_two_sided_layout(&spread.layout_type) {
            let mut left = page.clone();
            left.photo_indices = spread.photo_indices.clone();
            left.caption_text = spread.caption_text.clone();
            left.page_side = Some(PageSide::Left);
            pages.push(left);

            let mut right = page;
            right.page_number = number + 1;
            right.heading_text = spread.heading_text.clone();
            right.body_text = spread.body_text.clone();
            right.quote_text = spread.quote_text.clone();
            right.page_side = Some(PageSide::Right);
            pages.push(right);
            continue;
        }

        page.photo_indices = spread.photo_indices.clone();
        page.heading_text = spread.heading_text.clone();
        page.body_text = spread.body_text.clone();
        page.caption_text = spread.caption_text.clone();
        page.quote_text = spread.quote_text.clone();
        pages.push(page);
    }

    let mut back_cover = PageDraft::new(
        pages.len() as u32 + 1,
        PageType::BackCover,
        LayoutKind::QuotePage,
    );
    back_cover.heading_text = BACK_COVER_HEADING.to_string();
    back_cover.body_text = frame.closing_text.clone();
    pages.push(back_cover);

    debug!(pages = pages.len(), "flattened chapters into pages");
    pages
}

/// A page list supplied directly by the model.
pub fn parse_pages(raw: &[Value]) -> Vec<PageDraft> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let Some(map) = item.as_object() else {
                debug!(position, "skipping non-object page");
                return None;
            };
            let number = coerce::index(map.get("page_number")).unwrap_or(position as u32 + 1);
            let page_type = PageType::from_str(&coerce::text(map.get("page_type")));
            let mut page = PageDraft::new(number, page_type, LayoutKind::HeroFullbleed);
            let layout = coerce::text(map.get("layout_type"));
            if !layout.is_empty() {
                page.layout_type = normalize_layout(&layout);
            }
            page.photo_indices = coerce::index_list(map.get("photo_indices"));
            page.heading_text = coerce::text(map.get("heading_text"));
            page.body_text = coerce::text(map.get("body_text"));
            page.caption_text = coerce::text(map.get("caption_text"));
            page.quote_text = coerce::text(map.get("quote_text"));
            page.page_side = PageSide::from_str(&coerce::text(map.get("page_side")));
            Some(page)
        })
        .collect()
}
