use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Our Memory Book";
pub const DEFAULT_TEMPLATE_SLUG: &str = "romantic";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
}

// ── Layouts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutKind {
    HeroFullbleed,
    TwoBalanced,
    ThreeGrid,
    FourGrid,
    SixMontage,
    #[serde(rename = "WALL_8_10")]
    Wall810,
    PhotoPlusQuote,
    CollagePlusLetter,
    QuotePage,
    Dedication,
    TocSimple,
}

/// Legacy spellings some models still emit.
const LEGACY_LAYOUT_ALIASES: &[(&str, LayoutKind)] = &[
    ("single-photo", LayoutKind::HeroFullbleed),
    ("two-photo", LayoutKind::TwoBalanced),
    ("full-bleed", LayoutKind::HeroFullbleed),
    ("text-only", LayoutKind::QuotePage),
];

impl LayoutKind {
    pub const ALL: [LayoutKind; 11] = [
        Self::HeroFullbleed,
        Self::TwoBalanced,
        Self::ThreeGrid,
        Self::FourGrid,
        Self::SixMontage,
        Self::Wall810,
        Self::PhotoPlusQuote,
        Self::CollagePlusLetter,
        Self::QuotePage,
        Self::Dedication,
        Self::TocSimple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeroFullbleed => "HERO_FULLBLEED",
            Self::TwoBalanced => "TWO_BALANCED",
            Self::ThreeGrid => "THREE_GRID",
            Self::FourGrid => "FOUR_GRID",
            Self::SixMontage => "SIX_MONTAGE",
            Self::Wall810 => "WALL_8_10",
            Self::PhotoPlusQuote => "PHOTO_PLUS_QUOTE",
            Self::CollagePlusLetter => "COLLAGE_PLUS_LETTER",
            Self::QuotePage => "QUOTE_PAGE",
            Self::Dedication => "DEDICATION",
            Self::TocSimple => "TOC_SIMPLE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// Layouts that print as a photo page on the left and a text page on the right.
    pub fn is_two_sided(&self) -> bool {
        matches!(self, Self::PhotoPlusQuote | Self::CollagePlusLetter)
    }
}

/// Maps legacy layout spellings onto the canonical names. Anything else is
/// returned unchanged so the renderer can decide what to do with it.
pub fn normalize_layout(raw: &str) -> String {
    LEGACY_LAYOUT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, kind)| kind.as_str().to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn is_two_sided_layout(layout: &str) -> bool {
    LayoutKind::parse(layout).is_some_and(|kind| kind.is_two_sided())
}

// ── Photos ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PhotoInput {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CropBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Default for CropBox {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoMetadata {
    pub photo_index: u32,
    pub original_filename: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub orientation: Orientation,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoAnalysis {
    pub photo_index: u32,
    pub description: String,
    pub scene_type: String,
    pub emotion: String,
    pub people_count: u32,
    pub tags: Vec<String>,
    pub suggested_caption: String,
    pub story_relevance: String,
    pub cluster_id: Option<u32>,
    pub estimated_date_hint: String,
    pub hero_candidate: bool,
    pub face_regions: Vec<CropBox>,
    pub safe_crop_box: CropBox,
    pub date_confidence: f64,
    pub aspect_ratio: f64,
}

impl PhotoAnalysis {
    pub fn new(photo_index: u32) -> Self {
        Self {
            photo_index,
            description: String::new(),
            scene_type: String::new(),
            emotion: String::new(),
            people_count: 0,
            tags: vec![],
            suggested_caption: String::new(),
            story_relevance: String::new(),
            cluster_id: None,
            estimated_date_hint: String::new(),
            hero_candidate: false,
            face_regions: vec![],
            safe_crop_box: CropBox::default(),
            date_confidence: 0.0,
            aspect_ratio: 1.0,
        }
    }

    /// Stand-in for a photo the model skipped.
    pub fn placeholder(photo_index: u32) -> Self {
        Self {
            description: format!("Photo {}", photo_index + 1),
            scene_type: "casual".to_string(),
            emotion: "happy".to_string(),
            ..Self::new(photo_index)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoCluster {
    pub cluster_id: String,
    pub label_guess: String,
    pub label_confidence: f64,
    pub time_range: Value,
    pub image_ids: Vec<u32>,
    pub hero_candidates: Vec<u32>,
    pub cohesion_score: f64,
    pub notes: String,
}

// ── Draft hierarchy ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub image_id: Option<u32>,
    pub crop_box: CropBox,
    pub caption: String,
    pub caption_style: String,
    pub text: String,
    pub placement_hint: String,
    pub style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegenPolicy {
    pub free_remakes_remaining: u32,
    pub estimated_credits_if_regen: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpreadDraft {
    pub spread_index: u32,
    pub layout_type: String,
    pub photo_indices: Vec<u32>,
    pub heading_text: String,
    pub body_text: String,
    pub caption_text: String,
    pub quote_text: String,
    pub image_look_override: String,
    pub ai_generated_image_prompt: String,
    pub elements: Vec<PageElement>,
    pub assigned_clusters: Vec<String>,
    pub design_notes: String,
    pub regen_policy: Option<RegenPolicy>,
}

impl SpreadDraft {
    pub fn new(spread_index: u32, layout: LayoutKind) -> Self {
        Self {
            spread_index,
            layout_type: layout.as_str().to_string(),
            photo_indices: vec![],
            heading_text: String::new(),
            body_text: String::new(),
            caption_text: String::new(),
            quote_text: String::new(),
            image_look_override: String::new(),
            ai_generated_image_prompt: String::new(),
            elements: vec![],
            assigned_clusters: vec![],
            design_notes: String::new(),
            regen_policy: None,
        }
    }

    pub fn has_text(&self) -> bool {
        !(self.heading_text.is_empty()
            && self.body_text.is_empty()
            && self.caption_text.is_empty()
            && self.quote_text.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterDraft {
    pub chapter_index: u32,
    pub title: String,
    pub blurb: String,
    pub spreads: Vec<SpreadDraft>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Cover,
    Dedication,
    Content,
    BackCover,
}

impl PageType {
    pub fn from_str(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cover" | "front_cover" => Self::Cover,
            "dedication" => Self::Dedication,
            "back_cover" | "closing" => Self::BackCover,
            _ => Self::Content,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageDraft {
    pub page_number: u32,
    pub page_type: PageType,
    pub layout_type: String,
    pub photo_indices: Vec<u32>,
    pub heading_text: String,
    pub body_text: String,
    pub caption_text: String,
    pub quote_text: String,
    pub page_side: Option<PageSide>,
}

impl PageDraft {
    pub fn new(page_number: u32, page_type: PageType, layout: LayoutKind) -> Self {
        Self {
            page_number,
            page_type,
            layout_type: layout.as_str().to_string(),
            photo_indices: vec![],
            heading_text: String::new(),
            body_text: String::new(),
            caption_text: String::new(),
            quote_text: String::new(),
            page_side: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LongformTextBlock {
    pub block_index: u32,
    pub placement: String,
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoverOption {
    pub cover_id: String,
    pub cover_style: String,
    pub cover_art_prompt: String,
    pub typography_notes: String,
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesignInstructions {
    pub mood_words: Vec<String>,
    pub typography: String,
    pub spacing: String,
    pub do_not_use: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SystemNotes {
    pub hard_constraints_applied: Vec<String>,
    pub soft_preferences_applied: Vec<String>,
    pub known_uncertainties: Vec<String>,
    pub suggested_next_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmartQuestion {
    pub question_id: String,
    pub reason: String,
    pub question_text: String,
    pub answer_type: String,
    pub choices: Vec<String>,
    pub applies_to: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub subtitle: String,
    pub dedication: String,
    pub overall_narrative: String,
    pub template_slug: String,
    pub pages: Vec<PageDraft>,
    pub chapters: Vec<ChapterDraft>,
    pub longform_blocks: Vec<LongformTextBlock>,
    pub love_letter_text: String,
    pub audio_qr_chapter_labels: Vec<String>,
    pub anniversary_cover_text: String,
    pub mini_reel_frames: Vec<String>,
    pub edit_suggestions: Vec<String>,
    pub vibe: String,
    pub structure_template: String,
    pub title_options: Vec<Value>,
    pub covers: Vec<CoverOption>,
    pub closing_page: Value,
    pub clusters: Vec<PhotoCluster>,
    pub questions_for_user: Vec<SmartQuestion>,
    pub design_instructions: Option<DesignInstructions>,
    pub notes_for_system: Option<SystemNotes>,
    pub confidence: Value,
}

impl Default for BookDraft {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            subtitle: String::new(),
            dedication: String::new(),
            overall_narrative: String::new(),
            template_slug: DEFAULT_TEMPLATE_SLUG.to_string(),
            pages: vec![],
            chapters: vec![],
            longform_blocks: vec![],
            love_letter_text: String::new(),
            audio_qr_chapter_labels: vec![],
            anniversary_cover_text: String::new(),
            mini_reel_frames: vec![],
            edit_suggestions: vec![],
            vibe: String::new(),
            structure_template: String::new(),
            title_options: vec![],
            covers: vec![],
            closing_page: Value::Object(Default::default()),
            clusters: vec![],
            questions_for_user: vec![],
            design_instructions: None,
            notes_for_system: None,
            confidence: Value::Object(Default::default()),
        }
    }
}

impl BookDraft {
    /// The slug is the one field callers may change after a draft is built.
    pub fn with_template_slug(mut self, slug: impl Into<String>) -> Self {
        self.template_slug = slug.into();
        self
    }

    /// Photo indices placed by chapter spreads, in reading order.
    pub fn spread_photo_indices(&self) -> Vec<u32> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.spreads.iter())
            .flat_map(|spread| spread.photo_indices.iter().copied())
            .collect()
    }

    /// Every photo index the renderer will need, from pages and spreads alike.
    pub fn referenced_photo_indices(&self) -> BTreeSet<u32> {
        self.pages
            .iter()
            .flat_map(|page| page.photo_indices.iter().copied())
            .chain(self.spread_photo_indices())
            .collect()
    }

    pub fn count_pages(&self, page_type: PageType) -> usize {
        self.pages
            .iter()
            .filter(|page| page.page_type == page_type)
            .count()
    }
}

// ── Requests / responses ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageDensity {
    Dense,
    #[default]
    Balanced,
    Airy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionAnswer {
    pub question_id: String,
    pub answer_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BookGenerationRequest {
    pub template_slug: String,
    pub structure_template: String,
    pub user_story_text: String,
    pub partner_names: Vec<String>,
    pub relationship_type: String,
    pub special_occasion: String,
    pub vibe: String,
    pub image_look: String,
    pub image_density: ImageDensity,
    pub question_answers: Vec<QuestionAnswer>,
    pub constraints: Vec<String>,
}

impl Default for BookGenerationRequest {
    fn default() -> Self {
        Self {
            template_slug: DEFAULT_TEMPLATE_SLUG.to_string(),
            structure_template: "classic_timeline".to_string(),
            user_story_text: String::new(),
            partner_names: vec![],
            relationship_type: "couple".to_string(),
            special_occasion: String::new(),
            vibe: "romantic_warm".to_string(),
            image_look: "natural".to_string(),
            image_density: ImageDensity::Balanced,
            question_answers: vec![],
            constraints: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegenerateTextRequest {
    pub chapter_index: u32,
    pub spread_index: u32,
    pub field_name: String,
    pub current_text: String,
    pub instruction: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProviderKeyResponse {
    pub stored: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Analyzing,
    AnalyzingRetryPerBatch,
    Clustering,
    Narrating,
    NarratingRetry,
    Done,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::AnalyzingRetryPerBatch => "analyzing_retry_per_batch",
            Self::Clustering => "clustering",
            Self::Narrating => "narrating",
            Self::NarratingRetry => "narrating_retry",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub stage: GenerationStage,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookGenerationResponse {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub draft: BookDraft,
    pub photo_analyses: Vec<PhotoAnalysis>,
    pub clusters: Vec<PhotoCluster>,
    pub estimated_pages: usize,
    pub trace: Vec<StageRecord>,
}
