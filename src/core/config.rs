use std::time::Duration;

use crate::core::errors::{AppError, AppResult};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub gemini_model: String,
    pub gemini_api_key: Option<String>,
    pub batch_size: usize,
    pub analysis_max_tokens: u32,
    pub narrative_max_tokens: u32,
    pub analysis_concurrency: usize,
    pub rate_limit_retries: usize,
    pub rate_limit_delay: Duration,
    pub request_timeout: Duration,
    pub log_level: String,
    pub http_debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_key: None,
            batch_size: 10,
            analysis_max_tokens: 32_768,
            narrative_max_tokens: 65_536,
            analysis_concurrency: 1,
            rate_limit_retries: 1,
            rate_limit_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
            log_level: "info".to_string(),
            http_debug: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from defaults overridden by whatever `lookup` returns.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut settings = Self::default();

        if let Some(model) = get("MEMORYBOOK_GEMINI_MODEL") {
            settings.gemini_model = model;
        }
        settings.gemini_api_key = get("GEMINI_API_KEY");
        if let Some(raw) = get("MEMORYBOOK_BATCH_SIZE") {
            settings.batch_size = parse_number::<usize>("MEMORYBOOK_BATCH_SIZE", &raw)?.max(1);
        }
        if let Some(raw) = get("MEMORYBOOK_ANALYSIS_MAX_TOKENS") {
            settings.analysis_max_tokens = parse_number("MEMORYBOOK_ANALYSIS_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = get("MEMORYBOOK_NARRATIVE_MAX_TOKENS") {
            settings.narrative_max_tokens = parse_number("MEMORYBOOK_NARRATIVE_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = get("MEMORYBOOK_ANALYSIS_CONCURRENCY") {
            settings.analysis_concurrency =
                parse_number::<usize>("MEMORYBOOK_ANALYSIS_CONCURRENCY", &raw)?.max(1);
        }
        if let Some(raw) = get("MEMORYBOOK_RATE_LIMIT_RETRIES") {
            settings.rate_limit_retries = parse_number("MEMORYBOOK_RATE_LIMIT_RETRIES", &raw)?;
        }
        if let Some(raw) = get("MEMORYBOOK_RATE_LIMIT_DELAY_SECS") {
            settings.rate_limit_delay =
                Duration::from_secs(parse_number("MEMORYBOOK_RATE_LIMIT_DELAY_SECS", &raw)?);
        }
        if let Some(raw) = get("MEMORYBOOK_REQUEST_TIMEOUT_SECS") {
            settings.request_timeout =
                Duration::from_secs(parse_number("MEMORYBOOK_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        settings.log_level = match get("MEMORYBOOK_LOG")
            .unwrap_or_else(|| "info".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            level @ ("trace" | "debug" | "warn" | "error") => level.to_string(),
            _ => "info".to_string(),
        };
        settings.http_debug = matches!(
            get("MEMORYBOOK_HTTP_DEBUG")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "1" | "true" | "yes" | "on"
        );

        Ok(settings)
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> String {
        if self.http_debug {
            self.log_level.clone()
        } else {
            format!("{},reqwest=warn,hyper=warn,hyper_util=warn", self.log_level)
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>()
        .map_err(|_| AppError::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::Settings;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.rate_limit_retries, 1);
    }

    #[test]
    fn overrides_are_applied_and_clamped() {
        let settings = Settings::from_lookup(lookup(&[
            ("MEMORYBOOK_BATCH_SIZE", "0"),
            ("MEMORYBOOK_ANALYSIS_CONCURRENCY", "3"),
            ("MEMORYBOOK_RATE_LIMIT_DELAY_SECS", "2"),
            ("MEMORYBOOK_LOG", "DEBUG"),
            ("GEMINI_API_KEY", "  secret  "),
        ]))
        .expect("settings");

        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.analysis_concurrency, 3);
        assert_eq!(settings.rate_limit_delay, Duration::from_secs(2));
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.gemini_api_key.as_deref(), Some("secret"));
        assert!(settings.log_filter().contains("reqwest=warn"));
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let err = Settings::from_lookup(lookup(&[("MEMORYBOOK_BATCH_SIZE", "ten")]))
            .expect_err("expected config error");
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("MEMORYBOOK_BATCH_SIZE"));
    }
}
