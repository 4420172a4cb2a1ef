use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    GeneralError = 1,
    ConfigurationError = 2,
    ModelFailure = 3,
    PersistenceFailure = 4,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("No API key found (set {0} or add it to the secrets store)")]
    MissingCredential(String),

    #[error("AI model is not available")]
    ModelUnavailable,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model request timed out after {0} seconds")]
    ModelTimeout(u64),

    #[error("Model invocation failed after {attempts} attempt(s): {source}")]
    Invocation {
        attempts: u32,
        #[source]
        source: Box<StudyError>,
    },

    #[error("Model reply did not match the expected shape: {0}")]
    SchemaMismatch(String),

    #[error("Failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML document error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Subject already exists: {0}")]
    SubjectExists(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Module '{module}' already exists in subject '{subject}'")]
    ModuleExists { subject: String, module: String },

    #[error("Module '{module}' not found in subject '{subject}'")]
    ModuleNotFound { subject: String, module: String },

    #[error("Invalid name '{0}': must be a plain directory name")]
    InvalidName(String),

    #[error("Feature '{feature}' is switched off for module '{module}'")]
    FeatureDisabled { feature: String, module: String },

    #[error("Subject store locked by another process")]
    StoreLocked,

    #[error("User cancelled operation")]
    UserCancelled,
}

impl StudyError {
    /// Build a persistence error for the given path
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StudyError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Convert error to appropriate exit status
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            StudyError::Config(_)
            | StudyError::ConfigInvalid(_)
            | StudyError::MissingCredential(_) => ExitStatus::ConfigurationError,

            StudyError::ModelUnavailable
            | StudyError::Model(_)
            | StudyError::ModelTimeout(_)
            | StudyError::Invocation { .. }
            | StudyError::SchemaMismatch(_) => ExitStatus::ModelFailure,

            StudyError::Persistence { .. }
            | StudyError::Io(_)
            | StudyError::TomlParse(_)
            | StudyError::TomlSerialize(_)
            | StudyError::TomlEdit(_)
            | StudyError::Json(_)
            | StudyError::StoreLocked => ExitStatus::PersistenceFailure,

            StudyError::SubjectExists(_)
            | StudyError::SubjectNotFound(_)
            | StudyError::ModuleExists { .. }
            | StudyError::ModuleNotFound { .. }
            | StudyError::InvalidName(_)
            | StudyError::FeatureDisabled { .. }
            | StudyError::UserCancelled => ExitStatus::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_keeps_original_source() {
        let err = StudyError::Invocation {
            attempts: 1,
            source: Box::new(StudyError::Model("quota exceeded".to_string())),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Model error: quota exceeded"));
        assert_eq!(err.exit_status(), ExitStatus::ModelFailure);
    }

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(
            StudyError::MissingCredential("GOOGLE_API_KEY".to_string()).exit_status(),
            ExitStatus::ConfigurationError
        );
        assert_eq!(StudyError::StoreLocked.exit_status(), ExitStatus::PersistenceFailure);
        assert_eq!(
            StudyError::SubjectExists("Physics".to_string()).exit_status(),
            ExitStatus::GeneralError
        );
    }
}
