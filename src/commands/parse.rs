use std::path::Path;

use tracing::info;

use crate::{
    core::{errors::AppResult, types::BookDraft},
    parsing::parse_narrative,
};

/// Runs the offline recovery cascade over model output saved to disk.
pub async fn parse_saved_output(path: &Path, photo_count: usize) -> AppResult<BookDraft> {
    let raw = tokio::fs::read_to_string(path).await?;
    info!(path = %path.display(), bytes = raw.len(), photo_count, "parsing saved model output");
    Ok(parse_narrative(&raw, photo_count, None))
}
