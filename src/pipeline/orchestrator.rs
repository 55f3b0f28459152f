use std::collections::BTreeMap;
use std::ops::Range;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::Settings;
use crate::core::errors::{AppError, AppResult};
use crate::core::types::{
    BookDraft, BookGenerationRequest, BookGenerationResponse, GenerationStage, PhotoAnalysis,
    PhotoInput, PhotoMetadata, RegenerateTextRequest, SmartQuestion, StageRecord,
};
use crate::parsing::{
    parse_clusters_from_analysis, parse_narrative, parse_photo_analysis, parse_questions,
    parse_regenerated_text,
};
use crate::pipeline::batches::{merge_batches, plan_batches, BatchAnalysis, MergedAnalysis};
use crate::pipeline::metadata::extract_all_metadata;
use crate::pipeline::prompts::PromptBuilder;
use crate::providers::rate_limit::{with_rate_limit_retry, RetryPolicy};
use crate::providers::{InlineImage, ModelClient, ModelRequest, ModelResponse};

/// Narratives with this many chapters or fewer are retried once when the
/// photo set is larger than [`THIN_NARRATIVE_MIN_PHOTOS`].
pub const THIN_NARRATIVE_MAX_CHAPTERS: usize = 1;
pub const THIN_NARRATIVE_MIN_PHOTOS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub analysis_max_tokens: u32,
    pub narrative_max_tokens: u32,
    pub analysis_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            analysis_max_tokens: settings.analysis_max_tokens,
            narrative_max_tokens: settings.narrative_max_tokens,
            analysis_concurrency: settings.analysis_concurrency.max(1),
            retry: RetryPolicy {
                max_retries: settings.rate_limit_retries,
                delay: settings.rate_limit_delay,
            },
        }
    }
}

/// One analysis call's outcome plus how many rate-limit retries it needed.
struct BatchOutcome {
    batch: BatchAnalysis,
    retries: usize,
}

/// Drives one generation request through analysis, clustering and narration.
pub struct BookOrchestrator<C, P> {
    client: C,
    prompts: P,
    config: OrchestratorConfig,
}

impl<C: ModelClient, P: PromptBuilder> BookOrchestrator<C, P> {
    pub fn new(client: C, prompts: P, config: OrchestratorConfig) -> Self {
        Self {
            client,
            prompts,
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn call_model(&self, request: &ModelRequest) -> AppResult<(ModelResponse, usize)> {
        let mut retries = 0usize;
        let response = with_rate_limit_retry(
            self.config.retry,
            || self.client.generate_content(request),
            |_| retries += 1,
        )
        .await?;
        Ok((response, retries))
    }

    async fn analyze_batch(
        &self,
        photos: &[PhotoInput],
        metadata: &[PhotoMetadata],
        range: Range<usize>,
    ) -> AppResult<BatchOutcome> {
        let local_metadata: Vec<PhotoMetadata> = metadata[range.clone()]
            .iter()
            .enumerate()
            .map(|(local, item)| PhotoMetadata {
                photo_index: local as u32,
                ..item.clone()
            })
            .collect();

        let request = ModelRequest {
            prompt: self
                .prompts
                .photo_analysis_prompt(range.len(), &local_metadata),
            images: photos[range.clone()]
                .iter()
                .map(|photo| InlineImage {
                    mime_type: photo.mime_type.clone(),
                    bytes: photo.bytes.clone(),
                })
                .collect(),
            max_output_tokens: Some(self.config.analysis_max_tokens),
        };

        info!(start = range.start, end = range.end, "analysing photo batch");
        let (response, retries) = self.call_model(&request).await?;
        let analyses = parse_photo_analysis(&response.text);
        let clusters = parse_clusters_from_analysis(&response.text);
        info!(
            start = range.start,
            analyses = analyses.len(),
            clusters = clusters.len(),
            "photo batch parsed"
        );

        Ok(BatchOutcome {
            batch: BatchAnalysis {
                range,
                analyses,
                clusters,
            },
            retries,
        })
    }

    /// Runs every analysis batch, at most `analysis_concurrency` at a time.
    /// Any failed batch fails the whole stage.
    async fn analyze_photos(
        &self,
        photos: &[PhotoInput],
        metadata: &[PhotoMetadata],
        trace: &mut Vec<StageRecord>,
    ) -> AppResult<MergedAnalysis> {
        let ranges = plan_batches(photos.len(), self.config.batch_size);
        let batched = ranges.len() > 1;
        trace.push(StageRecord {
            stage: GenerationStage::Analyzing,
            detail: format!("{} photos in {} batch(es)", photos.len(), ranges.len()),
        });

        let outcomes: Vec<BatchOutcome> = stream::iter(
            ranges
                .into_iter()
                .map(|range| self.analyze_batch(photos, metadata, range)),
        )
        .buffered(self.config.analysis_concurrency.max(1))
        .try_collect()
        .await?;

        let mut batches = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if batched {
                let mut detail = format!(
                    "photos {}-{}",
                    outcome.batch.range.start,
                    outcome.batch.range.end.saturating_sub(1)
                );
                if outcome.retries > 0 {
                    detail.push_str(&format!(", {} rate-limit retries", outcome.retries));
                }
                trace.push(StageRecord {
                    stage: GenerationStage::AnalyzingRetryPerBatch,
                    detail,
                });
            }
            batches.push(outcome.batch);
        }

        let mut merged = merge_batches(photos.len(), batches);
        for analysis in &mut merged.analyses {
            if let Some(item) = metadata.get(analysis.photo_index as usize) {
                analysis.aspect_ratio = item.aspect_ratio;
            }
        }
        Ok(merged)
    }

    /// Narrative call with one retry when the result is too thin for the
    /// photo count. The retry wins only with strictly more chapters.
    async fn narrate(
        &self,
        request: &BookGenerationRequest,
        merged: &MergedAnalysis,
        trace: &mut Vec<StageRecord>,
    ) -> AppResult<BookDraft> {
        let photo_count = merged.analyses.len();
        let model_request = ModelRequest {
            prompt: self
                .prompts
                .narrative_prompt(request, &merged.analyses, &merged.clusters),
            images: vec![],
            max_output_tokens: Some(self.config.narrative_max_tokens),
        };

        trace.push(StageRecord {
            stage: GenerationStage::Narrating,
            detail: format!("{photo_count} photos, {} clusters", merged.clusters.len()),
        });
        let (response, _) = self.call_model(&model_request).await?;
        let draft = parse_narrative(&response.text, photo_count, Some(&merged.analyses));
        info!(
            chapters = draft.chapters.len(),
            pages = draft.pages.len(),
            "narrative drafted"
        );

        if draft.chapters.len() > THIN_NARRATIVE_MAX_CHAPTERS
            || photo_count <= THIN_NARRATIVE_MIN_PHOTOS
        {
            return Ok(draft);
        }

        warn!(
            chapters = draft.chapters.len(),
            photo_count, "narrative too thin, retrying once"
        );
        let (retry_response, _) = self.call_model(&model_request).await?;
        let retry = parse_narrative(&retry_response.text, photo_count, Some(&merged.analyses));
        let adopted = retry.chapters.len() > draft.chapters.len();
        trace.push(StageRecord {
            stage: GenerationStage::NarratingRetry,
            detail: format!(
                "{} -> {} chapters, {}",
                draft.chapters.len(),
                retry.chapters.len(),
                if adopted { "adopted" } else { "kept original" }
            ),
        });

        if adopted {
            info!(chapters = retry.chapters.len(), "narrative retry adopted");
            Ok(retry)
        } else {
            warn!("narrative retry did not add chapters, keeping original");
            Ok(draft)
        }
    }

    /// The full pipeline for one request. Model output problems never fail
    /// the call; only upstream model failures do.
    pub async fn generate(
        &self,
        request: &BookGenerationRequest,
        photos: &[PhotoInput],
    ) -> AppResult<BookGenerationResponse> {
        let request_id = Uuid::new_v4();
        info!(%request_id, photos = photos.len(), "generation started");

        let metadata = extract_all_metadata(photos);
        let mut trace = vec![];

        let merged = self.analyze_photos(photos, &metadata, &mut trace).await?;
        trace.push(StageRecord {
            stage: GenerationStage::Clustering,
            detail: format!("{} clusters", merged.clusters.len()),
        });

        let draft = self
            .narrate(request, &merged, &mut trace)
            .await?
            .with_template_slug(request.template_slug.clone());
        trace.push(StageRecord {
            stage: GenerationStage::Done,
            detail: format!("{} pages", draft.pages.len()),
        });
        info!(%request_id, pages = draft.pages.len(), "generation finished");

        Ok(BookGenerationResponse {
            request_id,
            generated_at: Utc::now(),
            estimated_pages: draft.pages.len(),
            draft,
            photo_analyses: merged.analyses,
            clusters: merged.clusters,
            trace,
        })
    }

    pub async fn analyze(&self, photos: &[PhotoInput]) -> AppResult<Vec<PhotoAnalysis>> {
        let metadata = extract_all_metadata(photos);
        let mut trace = vec![];
        Ok(self
            .analyze_photos(photos, &metadata, &mut trace)
            .await?
            .analyses)
    }

    pub async fn generate_questions(
        &self,
        photos: &[PhotoInput],
        partner_names: &[String],
        relationship_type: &str,
    ) -> AppResult<Vec<SmartQuestion>> {
        let analyses = self.analyze(photos).await?;
        let request = ModelRequest::text(self.prompts.questions_prompt(
            &analyses,
            partner_names,
            relationship_type,
        ));
        let (response, _) = self.call_model(&request).await?;
        let questions = parse_questions(&response.text);
        info!(questions = questions.len(), "follow-up questions parsed");
        Ok(questions)
    }

    pub async fn regenerate_text(&self, request: &RegenerateTextRequest) -> AppResult<String> {
        let model_request = ModelRequest::text(self.prompts.regenerate_text_prompt(request));
        let (response, _) = self.call_model(&model_request).await?;
        Ok(parse_regenerated_text(&response.text))
    }
}

/// Photo bytes for every index the draft references, keyed by index.
pub fn photo_data_for_draft(
    draft: &BookDraft,
    photos: &[PhotoInput],
) -> AppResult<BTreeMap<u32, Vec<u8>>> {
    draft
        .referenced_photo_indices()
        .into_iter()
        .map(|index| {
            photos
                .get(index as usize)
                .map(|photo| (index, photo.bytes.clone()))
                .ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "draft references photo {index} but only {} were supplied",
                        photos.len()
                    ))
                })
        })
        .collect()
}
