use std::path::{Path, PathBuf};

use crate::{
    core::{
        config::Settings,
        errors::{AppError, AppResult},
        types::{BookGenerationRequest, BookGenerationResponse, Provider, SmartQuestion},
    },
    pipeline::{
        metadata::load_photos_from_paths,
        orchestrator::{BookOrchestrator, OrchestratorConfig},
        prompts::MemoryBookPromptBuilder,
    },
    providers::gemini::GeminiClient,
    security::keyring,
    AppState,
};

pub type GeminiOrchestrator = BookOrchestrator<GeminiClient, MemoryBookPromptBuilder>;

pub fn gemini_orchestrator(settings: &Settings) -> AppResult<GeminiOrchestrator> {
    let api_key = keyring::resolve_api_key(settings, Provider::Gemini)?;
    let client = GeminiClient::new(
        settings.gemini_model.clone(),
        api_key,
        settings.request_timeout,
    )?;
    Ok(BookOrchestrator::new(
        client,
        MemoryBookPromptBuilder,
        OrchestratorConfig::from(settings),
    ))
}

/// Reads a generation request from a JSON file; absent fields take defaults.
pub async fn load_request(path: Option<&Path>) -> AppResult<BookGenerationRequest> {
    let Some(path) = path else {
        return Ok(BookGenerationRequest::default());
    };
    let raw = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::InvalidInput(format!("invalid request file {}: {err}", path.display()))
    })
}

fn require_photos(photo_paths: &[PathBuf]) -> AppResult<()> {
    if photo_paths.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one photo is required".to_string(),
        ));
    }
    Ok(())
}

pub async fn generate_book(
    state: &AppState,
    photo_paths: &[PathBuf],
    request: &BookGenerationRequest,
) -> AppResult<BookGenerationResponse> {
    require_photos(photo_paths)?;
    let photos = load_photos_from_paths(photo_paths).await?;
    let orchestrator = gemini_orchestrator(&state.settings)?;
    orchestrator.generate(request, &photos).await
}

pub async fn generate_questions(
    state: &AppState,
    photo_paths: &[PathBuf],
    partner_names: &[String],
    relationship_type: &str,
) -> AppResult<Vec<SmartQuestion>> {
    require_photos(photo_paths)?;
    let photos = load_photos_from_paths(photo_paths).await?;
    let orchestrator = gemini_orchestrator(&state.settings)?;
    orchestrator
        .generate_questions(&photos, partner_names, relationship_type)
        .await
}
