pub mod commands;
pub mod core;
pub mod parsing;
pub mod pipeline;
pub mod providers;
pub mod security;

use tracing_subscriber::EnvFilter;

use crate::core::{config::Settings, errors::AppResult};

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
}

impl AppState {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            settings: Settings::from_env()?,
        })
    }
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable. Calling it twice is harmless.
pub fn init_tracing(settings: &Settings) {
    let filter =
        EnvFilter::try_new(settings.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
