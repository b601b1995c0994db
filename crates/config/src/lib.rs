//! Configuration loading, validation, and management for docsage.
//!
//! Loads configuration from `~/.docsage/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use docsage_core::{AgentLimits, RetrievalMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docsage/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation service (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for every generation call
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Control-loop limits and features
    #[serde(default)]
    pub agent: AgentSection,

    /// Document backends
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Admission control for generation calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Run artifacts
    #[serde(default)]
    pub output: OutputConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("retrieval", &self.retrieval)
            .field("rate_limit", &self.rate_limit)
            .field("output", &self.output)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Per-provider overrides.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

// ── [agent] ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_attempts")]
    pub max_retrieval_attempts: u32,

    #[serde(default = "default_attempts")]
    pub max_quality_attempts: u32,

    #[serde(default = "default_max_total_iterations")]
    pub max_total_iterations: u32,

    /// Scores at or above this are accepted
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,

    #[serde(default = "default_loop_window")]
    pub loop_window: usize,

    /// Run the relevance/safety gate before routing
    #[serde(default = "default_true")]
    pub relevance_gate: bool,

    /// Extract keywords and fan out the first retrieval
    #[serde(default = "default_true")]
    pub multi_query: bool,

    /// Framework the assistant answers questions about
    #[serde(default = "default_framework")]
    pub framework: String,
}

fn default_attempts() -> u32 {
    3
}
fn default_max_total_iterations() -> u32 {
    5
}
fn default_quality_threshold() -> u8 {
    7
}
fn default_loop_window() -> usize {
    3
}
fn default_framework() -> String {
    "LangGraph/LangChain".into()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retrieval_attempts: default_attempts(),
            max_quality_attempts: default_attempts(),
            max_total_iterations: default_max_total_iterations(),
            quality_threshold: default_quality_threshold(),
            loop_window: default_loop_window(),
            relevance_gate: true,
            multi_query: true,
            framework: default_framework(),
        }
    }
}

// ── [retrieval] ───────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,

    /// JSON chunk index produced by the ingestion pipeline
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_top_k")]
    pub local_top_k: usize,

    #[serde(default = "default_top_k")]
    pub web_max_results: usize,

    /// Domains searched first in web mode
    #[serde(default = "default_official_domains")]
    pub official_domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_api_key: Option<String>,

    #[serde(default = "default_web_api_url")]
    pub web_api_url: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index.json")
}
fn default_top_k() -> usize {
    10
}
fn default_official_domains() -> Vec<String> {
    vec![
        "langchain-ai.github.io".into(),
        "python.langchain.com".into(),
        "docs.langchain.com".into(),
    ]
}
fn default_web_api_url() -> String {
    "https://api.tavily.com".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            index_path: default_index_path(),
            local_top_k: default_top_k(),
            web_max_results: default_top_k(),
            official_domains: default_official_domains(),
            web_api_key: None,
            web_api_url: default_web_api_url(),
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("mode", &self.mode)
            .field("index_path", &self.index_path)
            .field("local_top_k", &self.local_top_k)
            .field("web_max_results", &self.web_max_results)
            .field("official_domains", &self.official_domains)
            .field("web_api_key", &redact(&self.web_api_key))
            .field("web_api_url", &self.web_api_url)
            .finish()
    }
}

// ── [rate_limit] ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Ceiling on generation calls per minute across all runs
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

// Free tier allows 15 RPM
fn default_rpm() -> u32 {
    10
}
fn default_burst() -> u32 {
    1
}
fn default_max_in_flight() -> usize {
    4
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            burst: default_burst(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

// ── [output] ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_true")]
    pub save: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docsage/config.toml).
    ///
    /// Environment variables override the file:
    /// - `DOCSAGE_API_KEY`, `GOOGLE_API_KEY`, `OPENAI_API_KEY` (generation key, in that order)
    /// - `TAVILY_API_KEY` (web search key)
    /// - `DOCSAGE_PROVIDER`, `DOCSAGE_MODEL`, `DOCSAGE_MODE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("DOCSAGE_API_KEY")
                .or_else(|| lookup("GOOGLE_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if self.retrieval.web_api_key.is_none() {
            self.retrieval.web_api_key = lookup("TAVILY_API_KEY");
        }

        if let Some(provider) = lookup("DOCSAGE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("DOCSAGE_MODEL") {
            self.default_model = model;
        }

        if let Some(mode) = lookup("DOCSAGE_MODE") {
            self.retrieval.mode = mode.parse().map_err(ConfigError::ValidationError)?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docsage")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let agent = &self.agent;
        if agent.max_retrieval_attempts == 0
            || agent.max_quality_attempts == 0
            || agent.max_total_iterations == 0
        {
            return Err(ConfigError::ValidationError(
                "agent attempt and iteration limits must be at least 1".into(),
            ));
        }

        if agent.quality_threshold > 10 {
            return Err(ConfigError::ValidationError(
                "agent.quality_threshold must be between 0 and 10".into(),
            ));
        }

        if agent.loop_window < 2 {
            return Err(ConfigError::ValidationError(
                "agent.loop_window must be at least 2".into(),
            ));
        }

        if self.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.requests_per_minute must be at least 1".into(),
            ));
        }

        if self.retrieval.local_top_k == 0 || self.retrieval.web_max_results == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval result counts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// The loop limits consumed by the orchestrator.
    pub fn agent_limits(&self) -> AgentLimits {
        AgentLimits {
            max_retrieval_attempts: self.agent.max_retrieval_attempts,
            max_quality_attempts: self.agent.max_quality_attempts,
            max_total_iterations: self.agent.max_total_iterations,
            quality_threshold: self.agent.quality_threshold,
            loop_window: self.agent.loop_window,
        }
    }

    /// Check if a generation API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentSection::default(),
            retrieval: RetrievalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            output: OutputConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
