//! Pipeline configuration (§6, §11 ambient stack).
//!
//! Loaded from a TOML file with every field defaulted so an empty file is
//! a valid configuration. Each component (`dlq-monitor`, `dlq-analyzer`,
//! `dlq-executor`) reads the sections it needs out of one shared
//! [`PipelineConfig`]. The three spec-named runtime toggles
//! (`auto_replay_enabled`, `llm_classification_enabled`,
//! `incident_integration_enabled`) live entirely behind
//! [`crate::feature_flags::FeatureFlags`], not here: this config is loaded
//! once at startup, while those toggles are meant to flip without a
//! redeploy.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The TOML body could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A parsed configuration value failed validation.
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Monitor-section configuration (§4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Substring used to discover DLQs by name.
    pub dlq_name_pattern: String,
    /// Maximum messages requested per long-poll.
    pub max_messages_per_poll: u32,
    /// Visibility timeout, in seconds, applied to each receive.
    pub visibility_timeout_s: u32,
    /// Long-poll wait time, in seconds.
    pub long_poll_wait_s: u32,
    /// Hard cap on `retry_count` in the Ledger path (§4.1); at or above
    /// this the Monitor drops the message instead of enriching it.
    pub max_retries_monitor: u32,
    /// Trailing window, in milliseconds, used for the deployment
    /// correlation and recent-deployments lookups (§4.1, §4.2).
    pub systemic_window_ms: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dlq_name_pattern: "-dlq".to_string(),
            max_messages_per_poll: 10,
            visibility_timeout_s: 300,
            long_poll_wait_s: 10,
            max_retries_monitor: 3,
            systemic_window_ms: 900_000,
        }
    }
}

impl MonitorConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_messages_per_poll == 0 {
            return Err(ConfigError::ValidationError(
                "max_messages_per_poll must be > 0".to_string(),
            ));
        }
        if !(5..=10).contains(&self.long_poll_wait_s) {
            return Err(ConfigError::ValidationError(
                "long_poll_wait_s must be in 5..=10".to_string(),
            ));
        }
        Ok(())
    }

    /// The visibility timeout as a [`Duration`].
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_s as u64)
    }
}

/// Analyzer-section configuration (§4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum heuristic-rule confidence required to short-circuit the LLM.
    pub confidence_threshold: f64,
    /// Minimum `similar_failures_last_hour` for the deployment-correlation rule.
    pub systemic_min_similar: u32,
    /// Cache entry TTL, in hours.
    pub cache_ttl_hours: i64,
    /// Classification record TTL, in days.
    pub record_ttl_days: u32,
    /// The LLM model identifier passed through to `dlq-llm`.
    pub llm_model: String,
    /// Maximum tokens requested per LLM call.
    pub llm_max_tokens: u32,
    /// Decode temperature; must stay ≤ 0.2 (§4.2 step 4).
    pub llm_temperature: f32,
    /// LLM call timeout, in milliseconds.
    pub llm_timeout_ms: u64,
    /// Base delay, in seconds, for the `Replay` recommendation's backoff
    /// formula — shares the formula in [`retry_delay_s`] with
    /// [`ExecutorConfig`], since the Analyzer computes the delay it
    /// recommends and the Executor recomputes the same delay on retries
    /// the record didn't originate (§4.2, §4.3, §8).
    pub backoff_base_s: u32,
    /// Maximum delay, in seconds, the backoff formula saturates at.
    pub backoff_max_s: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            systemic_min_similar: 10,
            cache_ttl_hours: 1,
            record_ttl_days: 30,
            llm_model: "claude-3-5-haiku-20241022".to_string(),
            llm_max_tokens: 512,
            llm_temperature: 0.2,
            llm_timeout_ms: 10_000,
            backoff_base_s: 30,
            backoff_max_s: 900,
        }
    }
}

impl AnalyzerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "confidence_threshold must be in 0.0..=1.0".to_string(),
            ));
        }
        if self.llm_temperature > 0.2 {
            return Err(ConfigError::ValidationError(
                "llm_temperature must be <= 0.2 (§4.2 step 4)".to_string(),
            ));
        }
        if self.llm_model.is_empty() {
            return Err(ConfigError::ValidationError(
                "llm_model cannot be empty".to_string(),
            ));
        }
        if self.backoff_max_s < self.backoff_base_s {
            return Err(ConfigError::ValidationError(
                "backoff_max_s must be >= backoff_base_s".to_string(),
            ));
        }
        Ok(())
    }

    /// The LLM call timeout as a [`Duration`].
    #[must_use]
    pub const fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    /// The delay the Analyzer recommends for a `Replay` action at
    /// `retry_count` (§4.2, §8): see [`retry_delay_s`].
    #[must_use]
    pub fn retry_delay_s(&self, retry_count: u32) -> u32 {
        retry_delay_s(self.backoff_base_s, self.backoff_max_s, retry_count)
    }
}

/// `min(base_s * 2^retry_count, max_s)`, the exponential backoff formula
/// shared by [`AnalyzerConfig::retry_delay_s`] (which recommends the delay)
/// and [`ExecutorConfig::retry_delay_s`] (which recomputes it for retries a
/// record didn't originate) (§4.2, §4.3, §8).
#[must_use]
pub fn retry_delay_s(base_s: u32, max_s: u32, retry_count: u32) -> u32 {
    let scaled = u64::from(base_s).saturating_mul(1u64 << retry_count.min(32));
    scaled.min(u64::from(max_s)) as u32
}

/// Executor-section configuration (§4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard cap on `retry_count` in the Retry handler (§4.3); a
    /// second, belt-and-braces guard beyond the Monitor's own cap.
    pub max_retries_executor: u32,
    /// Base delay, in seconds, for the exponential backoff formula.
    pub backoff_base_s: u32,
    /// Maximum delay, in seconds, the backoff formula saturates at.
    pub backoff_max_s: u32,
    /// Ledger entry TTL, in days.
    pub ledger_ttl_days: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries_executor: 5,
            backoff_base_s: 30,
            backoff_max_s: 900,
            ledger_ttl_days: 7,
        }
    }
}

impl ExecutorConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_base_s == 0 {
            return Err(ConfigError::ValidationError(
                "backoff_base_s must be > 0".to_string(),
            ));
        }
        if self.backoff_max_s < self.backoff_base_s {
            return Err(ConfigError::ValidationError(
                "backoff_max_s must be >= backoff_base_s".to_string(),
            ));
        }
        Ok(())
    }

    /// `min(backoff_base_s * 2^retry_count, backoff_max_s)` (§4.3, §8).
    #[must_use]
    pub fn retry_delay_s(&self, retry_count: u32) -> u32 {
        retry_delay_s(self.backoff_base_s, self.backoff_max_s, retry_count)
    }
}

/// Top-level configuration shared by every component (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Project name, used to build the incident source identifier
    /// (`"<project>-dlq-<source_queue>"`) and dedup key (§4.3, §11).
    pub project: String,
    /// Monitor-specific settings.
    pub monitor: MonitorConfig,
    /// Analyzer-specific settings.
    pub analyzer: AnalyzerConfig,
    /// Executor-specific settings.
    pub executor: ExecutorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project: "dlq".to_string(),
            monitor: MonitorConfig::default(),
            analyzer: AnalyzerConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from a TOML document. Missing sections and
    /// fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if `body` is not valid TOML for
    /// this shape, or [`ConfigError::ValidationError`] if a parsed value
    /// fails validation.
    pub fn from_toml(body: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(body).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any section fails validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor.validate()?;
        self.analyzer.validate()?;
        self.executor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_toml_document_yields_defaults() {
        let config = PipelineConfig::from_toml("").expect("empty toml is valid");
        assert_eq!(config.monitor.dlq_name_pattern, "-dlq");
        assert_eq!(config.executor.max_retries_executor, 5);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [analyzer]
            confidence_threshold = 0.9
            "#,
        )
        .expect("valid partial toml");
        assert!((config.analyzer.confidence_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.analyzer.llm_model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn rejects_temperature_above_ceiling() {
        let config = AnalyzerConfig {
            llm_temperature: 0.5,
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_saturates_at_five_retries() {
        let config = ExecutorConfig::default();
        assert_eq!(config.retry_delay_s(0), 30);
        assert_eq!(config.retry_delay_s(1), 60);
        assert_eq!(config.retry_delay_s(5), 900);
        assert_eq!(config.retry_delay_s(10), 900);
    }
}
