//! Deterministic book draft used when nothing usable came back from the model.

use std::collections::BTreeSet;

use tracing::warn;

use crate::core::types::{
    BookDraft, ChapterDraft, LayoutKind, PageDraft, PageType, PhotoAnalysis, SpreadDraft,
    DEFAULT_TITLE,
};
use crate::parsing::pages::{BACK_COVER_HEADING, DEDICATION_HEADING, DEFAULT_CLOSING_TEXT};

pub const FALLBACK_QUOTES: [&str; 5] = [
    "The best thing to hold onto in life is each other.",
    "In all the world, there is no heart for me like yours.",
    "Every love story is beautiful, but ours is my favorite.",
    "Together is a wonderful place to be.",
    "Love is not about how many days you've been together, it's about how much you love each other every single day.",
];

pub const FALLBACK_BLURBS: [&str; 5] = [
    "Where it all began, the first sparks of something beautiful.",
    "Growing closer with every shared sunrise and quiet evening.",
    "Adventures near and far that wrote themselves into our story.",
    "The moments that made us laugh until we couldn't breathe.",
    "Looking ahead to everything still waiting for us together.",
];

const CHAPTER_TITLES: [&str; 5] = [
    "The Beginning",
    "Growing Together",
    "Adventures",
    "Special Moments",
    "Today & Tomorrow",
];

/// Layout rotation within a chapter, with the photos each layout consumes.
const LAYOUT_CYCLE: [(LayoutKind, usize); 7] = [
    (LayoutKind::HeroFullbleed, 1),
    (LayoutKind::TwoBalanced, 2),
    (LayoutKind::PhotoPlusQuote, 2),
    (LayoutKind::ThreeGrid, 3),
    (LayoutKind::HeroFullbleed, 1),
    (LayoutKind::FourGrid, 4),
    (LayoutKind::QuotePage, 0),
];

const REFLECT_HEADING: &str = "A Moment to Reflect";
const DEFAULT_BODY: &str = "A special moment we shared.";
const FALLBACK_SUBTITLE: &str = "A collection of moments";
const FALLBACK_DEDICATION: &str = "To us and the memories we share.";
const FALLBACK_DEDICATION_PAGE: &str = "A collection of our favorite moments together.";
const FALLBACK_NARRATIVE: &str = "A journey through our favorite moments together.";

/// Three to five chapters for larger sets, one per photo for tiny ones.
pub fn fallback_chapter_count(photo_count: usize) -> usize {
    if photo_count > 4 {
        (photo_count / 3).clamp(3, 5)
    } else {
        photo_count.max(1)
    }
}

/// The layout for the `position`-th spread of a chapter. Layouts needing more
/// photos than remain degrade to a single hero.
pub fn pick_fallback_layout(position: usize, photos_remaining: usize) -> (LayoutKind, usize) {
    let (layout, needed) = LAYOUT_CYCLE[position % LAYOUT_CYCLE.len()];
    if needed > photos_remaining {
        (LayoutKind::HeroFullbleed, photos_remaining.min(1))
    } else {
        (layout, needed)
    }
}

struct AnalysisLookup<'a> {
    analyses: &'a [PhotoAnalysis],
}

impl<'a> AnalysisLookup<'a> {
    fn get(&self, photo_index: u32) -> Option<&'a PhotoAnalysis> {
        self.analyses
            .get(photo_index as usize)
            .filter(|analysis| analysis.photo_index == photo_index)
            .or_else(|| {
                self.analyses
                    .iter()
                    .find(|analysis| analysis.photo_index == photo_index)
            })
    }

    fn caption(&self, photo_index: u32) -> String {
        self.get(photo_index)
            .map(|analysis| analysis.suggested_caption.clone())
            .filter(|caption| !caption.is_empty())
            .unwrap_or_else(|| format!("Memory {}", photo_index + 1))
    }

    fn body(&self, photo_index: u32) -> String {
        let Some(analysis) = self.get(photo_index) else {
            return DEFAULT_BODY.to_string();
        };
        [&analysis.story_relevance, &analysis.description]
            .into_iter()
            .find(|text| !text.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_BODY.to_string())
    }

    /// Prefers scene labels, then emotions, of the chapter's photos.
    fn blurb(&self, chapter_position: usize, photos: &[u32]) -> String {
        let mut scenes = BTreeSet::new();
        let mut emotions = BTreeSet::new();
        for analysis in photos.iter().filter_map(|index| self.get(*index)) {
            if !analysis.scene_type.is_empty() {
                scenes.insert(analysis.scene_type.as_str());
            }
            if !analysis.emotion.is_empty() {
                emotions.insert(analysis.emotion.as_str());
            }
        }
        if !scenes.is_empty() {
            let listed: Vec<&str> = scenes.into_iter().take(3).collect();
            return format!(
                "Moments captured in {}, each one a piece of the story.",
                listed.join(", ")
            );
        }
        if !emotions.is_empty() {
            let listed: Vec<&str> = emotions.into_iter().take(2).collect();
            return format!(
                "A chapter filled with {} moments we'll always cherish.",
                listed.join(" and ")
            );
        }
        FALLBACK_BLURBS[chapter_position % FALLBACK_BLURBS.len()].to_string()
    }
}

fn content_page(number: usize, spread: &SpreadDraft) -> PageDraft {
    let mut page = PageDraft::new(number as u32, PageType::Content, LayoutKind::HeroFullbleed);
    page.layout_type = spread.layout_type.clone();
    page.photo_indices = spread.photo_indices.clone();
    page.heading_text = spread.heading_text.clone();
    page.body_text = spread.body_text.clone();
    page.caption_text = spread.caption_text.clone();
    page.quote_text = spread.quote_text.clone();
    page
}

/// A complete draft built from the photo count alone, enriched with any
/// analyses available. Every photo lands in exactly one spread.
pub fn fallback_draft(photo_count: usize, analyses: Option<&[PhotoAnalysis]>) -> BookDraft {
    warn!(photo_count, "generating fallback draft");
    let lookup = AnalysisLookup {
        analyses: analyses.unwrap_or(&[]),
    };

    let mut pages = vec![];
    let mut cover = PageDraft::new(1, PageType::Cover, LayoutKind::HeroFullbleed);
    if photo_count > 0 {
        cover.photo_indices = vec![0];
    }
    cover.heading_text = DEFAULT_TITLE.to_string();
    pages.push(cover);

    let mut dedication = PageDraft::new(2, PageType::Dedication, LayoutKind::Dedication);
    dedication.heading_text = DEDICATION_HEADING.to_string();
    dedication.body_text = FALLBACK_DEDICATION_PAGE.to_string();
    pages.push(dedication);

    let chapter_count = fallback_chapter_count(photo_count);
    let base = photo_count / chapter_count;
    let remainder = photo_count % chapter_count;

    let mut chapters = Vec::with_capacity(chapter_count);
    let mut next_photo = 0usize;
    let mut quote_cursor = 0usize;
    let mut next_quote = || {
        let quote = FALLBACK_QUOTES[quote_cursor % FALLBACK_QUOTES.len()];
        quote_cursor += 1;
        quote.to_string()
    };

    for position in 0..chapter_count {
        let chapter_start = next_photo;
        let chapter_end = chapter_start + base + usize::from(position < remainder);
        let mut spreads = vec![];

        while next_photo < chapter_end {
            let (layout, consume) = pick_fallback_layout(spreads.len(), chapter_end - next_photo);
            let mut spread = SpreadDraft::new(spreads.len() as u32, layout);
            spread.photo_indices = (next_photo..next_photo + consume).map(|i| i as u32).collect();

            if let Some(first) = spread.photo_indices.first().copied() {
                spread.body_text = lookup.body(first);
                spread.caption_text = lookup.caption(first);
            }
            if matches!(layout, LayoutKind::QuotePage | LayoutKind::PhotoPlusQuote) {
                spread.quote_text = next_quote();
            }
            if layout == LayoutKind::QuotePage {
                spread.heading_text = REFLECT_HEADING.to_string();
            }

            pages.push(content_page(pages.len() + 1, &spread));
            next_photo += consume;
            spreads.push(spread);
        }

        let chapter_photos: Vec<u32> = (chapter_start..chapter_end).map(|i| i as u32).collect();
        chapters.push(ChapterDraft {
            chapter_index: position as u32,
            title: CHAPTER_TITLES
                .get(position)
                .map(|title| title.to_string())
                .unwrap_or_else(|| format!("Chapter {}", position + 1)),
            blurb: lookup.blurb(position, &chapter_photos),
            spreads,
        });

        if position > 0 && position % 2 == 0 && position < chapter_count - 1 {
            let mut breather =
                PageDraft::new(pages.len() as u32 + 1, PageType::Content, LayoutKind::QuotePage);
            breather.quote_text = next_quote();
            pages.push(breather);
        }
    }

    let mut back_cover =
        PageDraft::new(pages.len() as u32 + 1, PageType::BackCover, LayoutKind::QuotePage);
    back_cover.heading_text = BACK_COVER_HEADING.to_string();
    back_cover.body_text = DEFAULT_CLOSING_TEXT.to_string();
    pages.push(back_cover);

    BookDraft {
        subtitle: FALLBACK_SUBTITLE.to_string(),
        dedication: FALLBACK_DEDICATION.to_string(),
        overall_narrative: FALLBACK_NARRATIVE.to_string(),
        pages,
        chapters,
        ..BookDraft::default()
    }
}

#[cfg(test)]
mod tests {
    use super::{fallback_chapter_count, pick_fallback_layout, FALLBACK_BLURBS};
    use crate::core::types::{LayoutKind, PhotoAnalysis};

    #[test]
    fn chapter_count_scales_with_photos() {
        assert_eq!(fallback_chapter_count(0), 1);
        assert_eq!(fallback_chapter_count(3), 3);
        assert_eq!(fallback_chapter_count(4), 4);
        assert_eq!(fallback_chapter_count(5), 3);
        assert_eq!(fallback_chapter_count(12), 4);
        assert_eq!(fallback_chapter_count(100), 5);
    }

    #[test]
    fn oversized_layouts_degrade_to_hero() {
        assert_eq!(pick_fallback_layout(3, 2), (LayoutKind::HeroFullbleed, 1));
        assert_eq!(pick_fallback_layout(6, 0), (LayoutKind::QuotePage, 0));
        assert_eq!(pick_fallback_layout(8, 5), (LayoutKind::TwoBalanced, 2));
    }

    #[test]
    fn blurbs_prefer_scene_labels_then_emotions() {
        let mut beach = PhotoAnalysis::new(0);
        beach.scene_type = "beach".to_string();
        let mut joyful = PhotoAnalysis::new(1);
        joyful.emotion = "joyful".to_string();
        let analyses = vec![beach, joyful];
        let lookup = super::AnalysisLookup {
            analyses: &analyses,
        };

        assert_eq!(
            lookup.blurb(0, &[0, 1]),
            "Moments captured in beach, each one a piece of the story."
        );
        assert_eq!(
            lookup.blurb(0, &[1]),
            "A chapter filled with joyful moments we'll always cherish."
        );
        assert_eq!(lookup.blurb(6, &[]), FALLBACK_BLURBS[1]);
    }
}
