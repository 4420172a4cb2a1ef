mod types;

pub use types::*;

use crate::error::{Result, StudyError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the XDG-compliant config directory
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "study-companion")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| StudyError::Config("Could not determine config directory".to_string()))
}

/// Get the config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the secrets store path
pub fn secrets_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("secrets.toml"))
}

/// Load config from the given path, or the default location.
/// A missing file yields the default configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Save config to a specific path
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Look up a key in a flat `secrets.toml`.
/// Missing or unreadable files count as "no secret".
pub fn read_secret(path: &Path, key: &str) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let table: toml::Table = match toml::from_str(&content) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable secrets file");
            return None;
        }
    };
    table
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Execute the API key command and return its trimmed output
pub fn run_key_command(command: &str) -> Result<String> {
    let output = if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", command]).output()
    } else {
        Command::new("sh").args(["-c", command]).output()
    };

    match output {
        Ok(output) => {
            if output.status.success() {
                let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if key.is_empty() {
                    Err(StudyError::Config("API key command returned empty output".to_string()))
                } else {
                    Ok(key)
                }
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(StudyError::Config(format!(
                    "API key command failed: {}",
                    stderr.trim()
                )))
            }
        }
        Err(e) => Err(StudyError::Config(format!(
            "Failed to execute API key command: {}",
            e
        ))),
    }
}

/// Redact sensitive information from config for display
pub fn redact_config(config: &Config) -> Config {
    let mut redacted = config.clone();
    if redacted.gemini.api_key_command.is_some() {
        redacted.gemini.api_key_command = Some("[REDACTED]".to_string());
    }
    redacted
}
