use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error};

use crate::core::errors::{AppError, AppResult};
use crate::providers::{InlineImage, ModelClient, ModelRequest, ModelResponse};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Network(err.to_string()))?;
        Ok(Self {
            http,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Image-capable models are asked for image output as well as text.
    fn response_modalities(&self) -> Vec<&'static str> {
        if self.model.to_ascii_lowercase().contains("image") {
            vec!["TEXT", "IMAGE"]
        } else {
            vec!["TEXT"]
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{GEMINI_API_BASE}/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    pub fn build_payload(&self, request: &ModelRequest) -> Value {
        let mut parts: Vec<Value> = request
            .images
            .iter()
            .map(|image| {
                serde_json::json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": BASE64.encode(&image.bytes),
                    }
                })
            })
            .collect();
        parts.push(serde_json::json!({ "text": request.prompt }));

        let mut generation_config = serde_json::json!({
            "responseModalities": self.response_modalities(),
        });
        if let Some(max_tokens) = request.max_output_tokens {
            generation_config["maxOutputTokens"] = Value::from(max_tokens);
        }

        serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": generation_config
        })
    }
}

impl ModelClient for GeminiClient {
    async fn generate_content(&self, request: &ModelRequest) -> AppResult<ModelResponse> {
        let payload = self.build_payload(request);
        debug!(
            model = %self.model,
            images = request.images.len(),
            prompt_chars = request.prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::ProviderTimeout
                } else {
                    AppError::Network(err.to_string())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(AppError::ProviderAuth),
            StatusCode::TOO_MANY_REQUESTS => return Err(AppError::ProviderRateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("RESOURCE_EXHAUSTED") {
                    return Err(AppError::ProviderRateLimited);
                }
                error!(%status, "model call failed");
                return Err(AppError::ProviderInvalidResponse(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AppError::ProviderInvalidResponse(err.to_string()))?;
        parse_generate_response(&body)
    }
}

/// Splits a `generateContent` body into joined text and decoded inline images.
pub fn parse_generate_response(body: &Value) -> AppResult<ModelResponse> {
    let parts = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|items: &Vec<Value>| items.first())
        .and_then(|item: &Value| item.get("content"))
        .and_then(|content: &Value| content.get("parts"))
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| {
            AppError::ProviderBlocked(
                "the response may have been blocked by safety filters".to_string(),
            )
        })?;

    let mut text_parts: Vec<&str> = vec![];
    let mut images = vec![];
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            text_parts.push(text);
            continue;
        }
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|err| AppError::ProviderInvalidResponse(format!("inline image: {err}")))?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();
        images.push(InlineImage { mime_type, bytes });
    }

    Ok(ModelResponse {
        text: text_parts.join("\n"),
        images,
    })
}
