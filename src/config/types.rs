use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable checked first for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Command printing the API key, tried after env and secrets.toml
    #[serde(default)]
    pub api_key_command: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> u64 {
    60
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key_command: None,
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    #[serde(default)]
    pub existing_subject: ExistingSubjectPolicy,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("subjects")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base_path: default_base_path(),
            existing_subject: ExistingSubjectPolicy::default(),
        }
    }
}

/// What `initialize_subject` does when the subject directory already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExistingSubjectPolicy {
    /// Report a conflict and leave the existing subject untouched
    #[default]
    Reject,
    /// Create whatever is missing and keep what is already there
    Reuse,
}

impl std::fmt::Display for ExistingSubjectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistingSubjectPolicy::Reject => write!(f, "reject"),
            ExistingSubjectPolicy::Reuse => write!(f, "reuse"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: LogLevel::Quiet,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    /// The tracing filter directive this level stands for
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<Vec<String>, Vec<String>> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.gemini.model.trim().is_empty() {
            errors.push("Gemini model name is required".to_string());
        }
        if self.gemini.api_key_env.trim().is_empty() {
            errors.push("gemini.api_key_env must name an environment variable".to_string());
        }
        match Url::parse(&self.gemini.endpoint) {
            Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {
                if url.scheme() == "http" {
                    warnings.push(format!("Endpoint {} is not using https", self.gemini.endpoint));
                }
            }
            Ok(url) => errors.push(format!("Unsupported endpoint scheme: {}", url.scheme())),
            Err(e) => errors.push(format!("Invalid endpoint '{}': {}", self.gemini.endpoint, e)),
        }
        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            errors.push(format!(
                "Temperature must be between 0 and 2 (got {})",
                self.gemini.temperature
            ));
        }
        if self.gemini.timeout_seconds == 0 {
            errors.push("gemini.timeout_seconds must be greater than zero".to_string());
        }
        if self.store.base_path.as_os_str().is_empty() {
            errors.push("store.base_path is required".to_string());
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }
}
