//! Turns raw model text into typed drafts.
//!
//! Every public entry point here is total: malformed output degrades through
//! repair, partial recovery and finally a deterministic fallback draft.
//! [`ParseError`] only travels between the stages of that cascade.

use thiserror::Error;

pub mod chapters;
pub mod coerce;
pub mod fallback;
pub mod json_locator;
pub mod json_repair;
pub mod pages;
pub mod partial;
pub mod response;
mod scan;

pub use fallback::fallback_draft;
pub use json_locator::locate_json;
pub use json_repair::repair_json;
pub use response::{
    parse_clusters_from_analysis, parse_draft_text, parse_draft_value, parse_narrative,
    parse_photo_analysis, parse_questions, parse_regenerated_text,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected document shape: {0}")]
    Shape(String),
    #[error("nothing recoverable in model output")]
    Unrecoverable,
}
