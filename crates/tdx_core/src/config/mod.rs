//! Process configuration.
//!
//! Merges a TOML file with `TDX_`-prefixed environment variables (`__` separates
//! sections, e.g. `TDX_EMAIL__PASSWORD`). Loaded once at start-up and passed by
//! reference into every component; nothing mutates it afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::domain::SummaryColumns;
use crate::error::{AppError, ErrorKind};

pub const DEFAULT_CONFIG_FILE: &str = "tabledigest.toml";
pub const ENV_PREFIX: &str = "TDX_";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub columns: SummaryColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_table() -> String {
    "details".to_string()
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_tokens() -> u32 {
    512
}
fn default_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("embedding_model", &self.embedding_model)
            .field("completion_model", &self.completion_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_top_k() -> u32 {
    2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./storage")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
        }
    }
}

/// How the SMTP session is secured.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connect, then a required `STARTTLS` upgrade (submission on 587).
    #[default]
    StartTls,
    /// TLS from the first byte (implicit TLS on 465).
    Tls,
    /// No encryption. Only for local relays and test servers.
    Plaintext,
}

#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    pub sender: String,
    #[serde(default)]
    pub password: String,
    pub recipient: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}
fn default_subject() -> String {
    "TableDigest Analysis Results".to_string()
}
fn default_smtp_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field("sender", &self.sender)
            .field("password", &redacted(&self.password))
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_question")]
    pub question: String,
    #[serde(default = "default_text_column")]
    pub text_column: String,
}

fn default_question() -> String {
    "What are the patterns in the values and dates?".to_string()
}
fn default_text_column() -> String {
    "text_content".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            question: default_question(),
            text_column: default_text_column(),
        }
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl AppConfig {
    /// Load `path` (when present) overlaid with `TDX_*` environment variables.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
            .map_err(|e| e.with_details(format!("path={}", path.display())))
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, AppError> {
        let config: AppConfig = figment.extract().map_err(|e| {
            AppError::new(ErrorKind::Config, "CONFIG_INVALID", "Failed to read configuration")
                .with_details(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: &str| AppError::new(ErrorKind::Config, "CONFIG_INVALID", msg);

        if self.database.table.trim().is_empty() {
            return Err(invalid("database.table must not be empty"));
        }
        if self.retrieval.top_k < 1 {
            return Err(invalid("retrieval.top_k must be >= 1"));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(invalid("provider.temperature must be in [0.0, 2.0]")
                .with_details(format!("temperature={}", self.provider.temperature)));
        }
        if self.provider.max_tokens == 0 {
            return Err(invalid("provider.max_tokens must be > 0"));
        }
        if self.pipeline.text_column.trim().is_empty() {
            return Err(invalid("pipeline.text_column must not be empty"));
        }
        Ok(())
    }
}
