use serde::ser::SerializeStruct;
use thiserror::Error;

pub const RATE_LIMIT_USER_MESSAGE: &str =
    "AI rate limit reached. Please wait a moment and try again.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("provider auth failed")]
    ProviderAuth,
    #[error("provider rate limited (429 RESOURCE_EXHAUSTED)")]
    ProviderRateLimited,
    #[error("provider timeout")]
    ProviderTimeout,
    #[error("provider returned no content: {0}")]
    ProviderBlocked(String),
    #[error("provider invalid response: {0}")]
    ProviderInvalidResponse(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{}", RATE_LIMIT_USER_MESSAGE)]
    RateLimitExhausted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::ProviderAuth => "PROVIDER_AUTH",
            Self::ProviderRateLimited => "PROVIDER_RATE_LIMITED",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderBlocked(_) => "PROVIDER_BLOCKED",
            Self::ProviderInvalidResponse(_) => "PROVIDER_INVALID_RESPONSE",
            Self::Network(_) => "NETWORK_ERROR",
            Self::RateLimitExhausted => "RATE_LIMIT_EXHAUSTED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimited
                | Self::RateLimitExhausted
                | Self::ProviderTimeout
                | Self::Network(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn serializes_code_and_message() {
        let value = serde_json::to_value(AppError::RateLimitExhausted).expect("serialize");
        assert_eq!(value["code"], "RATE_LIMIT_EXHAUSTED");
        assert_eq!(
            value["message"],
            "AI rate limit reached. Please wait a moment and try again."
        );
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(AppError::ProviderTimeout.retryable());
        assert!(AppError::Network("reset".to_string()).retryable());
        assert!(!AppError::ProviderAuth.retryable());
        assert!(!AppError::InvalidInput("empty".to_string()).retryable());
    }
}
