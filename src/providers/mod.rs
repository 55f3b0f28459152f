pub mod gemini;
pub mod rate_limit;

use std::future::Future;

use crate::core::errors::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRequest {
    pub prompt: String,
    pub images: Vec<InlineImage>,
    pub max_output_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub images: Vec<InlineImage>,
}

/// A generative model reached over some transport. Implementations map their
/// failures onto `AppError`; retry policy lives with the caller.
pub trait ModelClient: Send + Sync {
    fn generate_content(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = AppResult<ModelResponse>> + Send;
}
