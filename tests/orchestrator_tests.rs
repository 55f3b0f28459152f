use std::collections::VecDeque;
use std::future::Future;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use memorybook_lib::core::errors::{AppError, AppResult};
use memorybook_lib::core::types::{
    BookGenerationRequest, GenerationStage, Orientation, PhotoInput, RegenerateTextRequest,
};
use memorybook_lib::pipeline::metadata::extract_photo_metadata;
use memorybook_lib::pipeline::orchestrator::{BookOrchestrator, OrchestratorConfig};
use memorybook_lib::pipeline::prompts::MemoryBookPromptBuilder;
use memorybook_lib::providers::rate_limit::RetryPolicy;
use memorybook_lib::providers::{ModelClient, ModelRequest, ModelResponse};
use serde_json::json;

/// Replays canned replies in call order and records every request.
struct ScriptedClient {
    replies: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    fn with_replies(replies: Vec<AppResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(vec![]),
        }
    }

    fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ModelClient for ScriptedClient {
    fn generate_content(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = AppResult<ModelResponse>> + Send {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Internal("script exhausted".to_string())));
        async move {
            reply.map(|text| ModelResponse {
                text,
                images: vec![],
            })
        }
    }
}

fn photos(count: usize) -> Vec<PhotoInput> {
    (0..count)
        .map(|index| PhotoInput {
            file_name: format!("photo_{index}.jpg"),
            mime_type: "image/jpeg".to_string(),
            bytes: vec![index as u8; 4],
        })
        .collect()
}

fn config(batch_size: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size,
        analysis_max_tokens: 1_000,
        narrative_max_tokens: 2_000,
        analysis_concurrency: 1,
        retry: RetryPolicy {
            max_retries: 1,
            delay: Duration::ZERO,
        },
    }
}

fn analysis_reply(count: usize) -> AppResult<String> {
    let items: Vec<_> = (0..count)
        .map(|index| json!({"photo_index": index, "scene_type": "park", "cluster_id": 0}))
        .collect();
    Ok(json!({ "photos": items }).to_string())
}

fn narrative_reply(chapters: usize, photos_per_chapter: usize) -> AppResult<String> {
    let chapters: Vec<_> = (0..chapters)
        .map(|chapter| {
            let first = chapter * photos_per_chapter;
            let indices: Vec<usize> = (first..first + photos_per_chapter).collect();
            json!({
                "chapter_index": chapter,
                "title": format!("Chapter {chapter}"),
                "spreads": [{"layout_id": "FOUR_GRID", "photo_indices": indices}]
            })
        })
        .collect();
    Ok(format!(
        "```json\n{}\n```",
        json!({"title": "Picnics", "chapters": chapters})
    ))
}

fn stages(trace: &[memorybook_lib::core::types::StageRecord]) -> Vec<GenerationStage> {
    trace.iter().map(|record| record.stage).collect()
}

#[tokio::test]
async fn batched_analysis_is_renumbered_into_one_sequence() {
    let client = ScriptedClient::with_replies(vec![
        analysis_reply(10),
        analysis_reply(10),
        analysis_reply(5),
        narrative_reply(5, 5),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(25))
        .await
        .expect("generation succeeds");

    let indices: Vec<u32> = response
        .photo_analyses
        .iter()
        .map(|analysis| analysis.photo_index)
        .collect();
    assert_eq!(indices, (0..25).collect::<Vec<u32>>());

    let cluster_ids: Vec<&str> = response
        .clusters
        .iter()
        .map(|cluster| cluster.cluster_id.as_str())
        .collect();
    assert_eq!(cluster_ids, vec!["0", "1", "2"]);
    assert_eq!(response.clusters[2].image_ids, (20..25).collect::<Vec<u32>>());

    let requests = orchestrator.client().requests();
    let image_counts: Vec<usize> = requests.iter().map(|request| request.images.len()).collect();
    assert_eq!(image_counts, vec![10, 10, 5, 0]);
    assert_eq!(requests[0].max_output_tokens, Some(1_000));
    assert_eq!(requests[3].max_output_tokens, Some(2_000));

    assert_eq!(
        stages(&response.trace),
        vec![
            GenerationStage::Analyzing,
            GenerationStage::AnalyzingRetryPerBatch,
            GenerationStage::AnalyzingRetryPerBatch,
            GenerationStage::AnalyzingRetryPerBatch,
            GenerationStage::Clustering,
            GenerationStage::Narrating,
            GenerationStage::Done,
        ]
    );
    assert_eq!(response.draft.chapters.len(), 5);
    assert_eq!(response.draft.template_slug, "romantic");
    assert_eq!(response.estimated_pages, response.draft.pages.len());
}

#[tokio::test]
async fn skipped_photos_are_padded_with_placeholders() {
    let reply = json!([{"photo_index": 0}, {"photo_index": 2}, {"photo_index": 9}]).to_string();
    let client = ScriptedClient::with_replies(vec![Ok(reply)]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let analyses = orchestrator.analyze(&photos(3)).await.expect("analysis");

    assert_eq!(analyses.len(), 3);
    assert_eq!(analyses[1].photo_index, 1);
    assert_eq!(analyses[1].description, "Photo 2");
}

#[tokio::test]
async fn thin_narrative_retry_is_kept_only_when_richer() {
    let client = ScriptedClient::with_replies(vec![
        analysis_reply(6),
        narrative_reply(1, 6),
        narrative_reply(1, 6),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));
    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(6))
        .await
        .expect("generation succeeds");

    assert_eq!(orchestrator.client().requests().len(), 3);
    assert_eq!(response.draft.chapters.len(), 1);
    let retry = response
        .trace
        .iter()
        .find(|record| record.stage == GenerationStage::NarratingRetry)
        .expect("retry recorded");
    assert!(retry.detail.contains("kept original"));

    let client = ScriptedClient::with_replies(vec![
        analysis_reply(6),
        narrative_reply(1, 6),
        narrative_reply(3, 2),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));
    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(6))
        .await
        .expect("generation succeeds");

    assert_eq!(response.draft.chapters.len(), 3);
    assert_eq!(response.draft.spread_photo_indices(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn small_books_are_not_retried() {
    let client = ScriptedClient::with_replies(vec![analysis_reply(4), narrative_reply(1, 4)]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(4))
        .await
        .expect("generation succeeds");

    assert_eq!(orchestrator.client().requests().len(), 2);
    assert!(!stages(&response.trace).contains(&GenerationStage::NarratingRetry));
    assert!(!stages(&response.trace).contains(&GenerationStage::AnalyzingRetryPerBatch));
}

#[tokio::test]
async fn garbage_narrative_still_produces_a_book() {
    let client = ScriptedClient::with_replies(vec![
        analysis_reply(3),
        Ok("I'm sorry, I can only describe photos.".to_string()),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(3))
        .await
        .expect("generation succeeds");

    let mut placed = response.draft.spread_photo_indices();
    placed.sort_unstable();
    assert_eq!(placed, vec![0, 1, 2]);
    assert!(response.draft.chapters[0].blurb.contains("park"));
}

#[tokio::test]
async fn rate_limited_calls_are_retried_once() {
    let client = ScriptedClient::with_replies(vec![
        Err(AppError::ProviderRateLimited),
        analysis_reply(2),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let analyses = orchestrator.analyze(&photos(2)).await.expect("retry succeeds");
    assert_eq!(analyses.len(), 2);
    assert_eq!(orchestrator.client().requests().len(), 2);

    let client = ScriptedClient::with_replies(vec![
        Err(AppError::ProviderRateLimited),
        Err(AppError::ProviderRateLimited),
    ]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));
    let err = orchestrator
        .analyze(&photos(2))
        .await
        .expect_err("retries exhausted");
    assert_eq!(err.code(), "RATE_LIMIT_EXHAUSTED");
}

#[tokio::test]
async fn upstream_failures_fail_the_request() {
    let client = ScriptedClient::with_replies(vec![Err(AppError::ProviderAuth)]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let err = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(2))
        .await
        .expect_err("auth failure propagates");
    assert_eq!(err.code(), "PROVIDER_AUTH");
    assert_eq!(orchestrator.client().requests().len(), 1);
}

#[tokio::test]
async fn questions_follow_analysis() {
    let questions = json!({"questions": [
        {"question_id": "q1", "question_text": "Where was this?", "choices": ["Park", "Beach"]},
        {"question_id": "q2", "question_text": "Who took it?", "answer_type": "free_text"}
    ]});
    let client = ScriptedClient::with_replies(vec![analysis_reply(2), Ok(questions.to_string())]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let parsed = orchestrator
        .generate_questions(&photos(2), &["Ana".to_string(), "Leo".to_string()], "couple")
        .await
        .expect("questions");

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].answer_type, "single_choice");
    assert_eq!(parsed[1].answer_type, "free_text");
    let requests = orchestrator.client().requests();
    assert!(requests[1].prompt.contains("Ana"));
    assert!(requests[1].images.is_empty());
}

#[tokio::test]
async fn regenerated_text_is_unquoted() {
    let client = ScriptedClient::with_replies(vec![Ok("  \"A softer line.\"\n".to_string())]);
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, config(10));

    let text = orchestrator
        .regenerate_text(&RegenerateTextRequest {
            chapter_index: 0,
            spread_index: 1,
            field_name: "caption_text".to_string(),
            current_text: "A line.".to_string(),
            instruction: "softer".to_string(),
            context: String::new(),
        })
        .await
        .expect("regenerated");

    assert_eq!(text, "A softer line.");
    assert!(orchestrator.client().requests()[0].prompt.contains("A line."));
}

/// Answers analysis batches after a delay that shrinks with the batch's first
/// photo, so earlier batches finish last. Photo bytes carry the global index.
struct SlowFirstClient {
    fail_at: Option<u8>,
    finished: Arc<Mutex<Vec<u8>>>,
}

impl ModelClient for SlowFirstClient {
    fn generate_content(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = AppResult<ModelResponse>> + Send {
        let first = request.images.first().map(|image| image.bytes[0]);
        let count = request.images.len();
        let fail_at = self.fail_at;
        let finished = Arc::clone(&self.finished);
        async move {
            let Some(first) = first else {
                return narrative_reply(3, 4).map(|text| ModelResponse {
                    text,
                    images: vec![],
                });
            };
            tokio::time::sleep(Duration::from_millis(60 - u64::from(first) * 5)).await;
            finished.lock().expect("finished lock").push(first);
            if fail_at == Some(first) {
                return Err(AppError::ProviderInvalidResponse("status 500".to_string()));
            }
            let items: Vec<_> = (0..count)
                .map(|local| {
                    json!({"photo_index": local, "description": format!("d{}", first as usize + local)})
                })
                .collect();
            Ok(ModelResponse {
                text: json!(items).to_string(),
                images: vec![],
            })
        }
    }
}

fn concurrent_config() -> OrchestratorConfig {
    OrchestratorConfig {
        analysis_concurrency: 3,
        ..config(4)
    }
}

#[tokio::test]
async fn concurrent_batches_merge_in_photo_order() {
    let finished = Arc::new(Mutex::new(vec![]));
    let client = SlowFirstClient {
        fail_at: None,
        finished: Arc::clone(&finished),
    };
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, concurrent_config());

    let response = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(10))
        .await
        .expect("generation succeeds");

    assert_eq!(*finished.lock().expect("finished lock"), vec![8, 4, 0]);
    let descriptions: Vec<&str> = response
        .photo_analyses
        .iter()
        .map(|analysis| analysis.description.as_str())
        .collect();
    let expected: Vec<String> = (0..10).map(|index| format!("d{index}")).collect();
    assert_eq!(descriptions, expected);
    let indices: Vec<u32> = response
        .photo_analyses
        .iter()
        .map(|analysis| analysis.photo_index)
        .collect();
    assert_eq!(indices, (0..10).collect::<Vec<u32>>());
}

#[tokio::test]
async fn one_failed_batch_fails_the_analysis_stage() {
    let client = SlowFirstClient {
        fail_at: Some(4),
        finished: Arc::new(Mutex::new(vec![])),
    };
    let orchestrator = BookOrchestrator::new(client, MemoryBookPromptBuilder, concurrent_config());

    let err = orchestrator
        .generate(&BookGenerationRequest::default(), &photos(10))
        .await
        .expect_err("batch failure propagates");
    assert_eq!(err.code(), "PROVIDER_INVALID_RESPONSE");
}

#[test]
fn metadata_reads_real_image_dimensions() {
    let image = image::RgbImage::new(40, 20);
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");

    let photo = PhotoInput {
        file_name: "wide.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: bytes.into_inner(),
    };
    let metadata = extract_photo_metadata(3, &photo);

    assert_eq!(metadata.photo_index, 3);
    assert_eq!((metadata.width, metadata.height), (40, 20));
    assert_eq!(metadata.aspect_ratio, 2.0);
    assert_eq!(metadata.orientation, Orientation::Landscape);
    assert_eq!(metadata.checksum.len(), 64);
}
