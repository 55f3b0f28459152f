use crate::core::{
    config::Settings,
    errors::{AppError, AppResult},
    types::Provider,
};

const KEYRING_SERVICE: &str = "memorybook";

fn username_for_provider(provider: &Provider) -> &'static str {
    match provider {
        Provider::Gemini => "gemini",
    }
}

pub fn set_provider_key(provider: Provider, api_key: &str) -> AppResult<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username_for_provider(&provider))
        .map_err(|err| AppError::Internal(err.to_string()))?;
    entry
        .set_password(api_key.trim())
        .map_err(|err| AppError::Internal(err.to_string()))
}

pub fn get_provider_key(provider: Provider) -> AppResult<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username_for_provider(&provider))
        .map_err(|err| AppError::Internal(err.to_string()))?;
    entry
        .get_password()
        .map_err(|_err| AppError::ProviderAuth)
}

/// The configured key wins; otherwise the one stored in the OS keyring.
pub fn resolve_api_key(settings: &Settings, provider: Provider) -> AppResult<String> {
    match settings.gemini_api_key.as_deref() {
        Some(key) => Ok(key.to_string()),
        None => get_provider_key(provider),
    }
}
