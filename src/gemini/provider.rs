use crate::config::{self, GeminiConfig};
use crate::error::{Result, StudyError};
use async_trait::async_trait;
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::client::GeminiConnector;

/// Something that can answer a prompt, optionally constrained to a JSON schema.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, prompt: &str, schema: Option<&OutputSchema>) -> Result<String>;
}

/// Builds a backend from a resolved API key.
pub trait Connector: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn ModelBackend>>;
}

/// JSON schema a structured reply must conform to
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    schema: serde_json::Value,
}

impl OutputSchema {
    /// Derive the schema for `T`, with nested types inlined
    pub fn of<T: JsonSchema>() -> Self {
        let generator = SchemaSettings::draft2020_12()
            .with(|s| s.inline_subschemas = true)
            .into_generator();
        let mut schema = generator.into_root_schema_for::<T>().to_value();
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        OutputSchema {
            name: T::schema_name().into_owned(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.schema
    }
}

/// A usable model, optionally bound to an output schema
#[derive(Clone)]
pub struct ModelHandle {
    backend: Arc<dyn ModelBackend>,
    schema: Option<OutputSchema>,
}

impl ModelHandle {
    pub fn schema(&self) -> Option<&OutputSchema> {
        self.schema.as_ref()
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String> {
        self.backend.generate(prompt, self.schema.as_ref()).await
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("schema", &self.schema.as_ref().map(|s| s.name()))
            .finish_non_exhaustive()
    }
}

/// Where the API key comes from. First non-empty source wins:
/// environment variable, then `secrets.toml`, then the key command.
#[derive(Debug, Clone)]
pub struct Credentials {
    env_var: String,
    secrets_file: Option<PathBuf>,
    command: Option<String>,
    explicit: Option<String>,
}

impl Credentials {
    pub fn new(env_var: impl Into<String>) -> Self {
        Credentials {
            env_var: env_var.into(),
            secrets_file: None,
            command: None,
            explicit: None,
        }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        let mut credentials = Credentials::new(&config.api_key_env);
        credentials.secrets_file = config::secrets_path().ok();
        credentials.command = config
            .api_key_command
            .clone()
            .filter(|c| !c.trim().is_empty());
        credentials
    }

    #[cfg(test)]
    pub(crate) fn fixed(key: &str) -> Self {
        let mut credentials = Credentials::new("STUDY_COMPANION_UNUSED");
        credentials.explicit = Some(key.to_string());
        credentials
    }

    #[cfg(test)]
    pub fn with_secrets_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_file = Some(path.into());
        self
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve the API key, or `None` when no source yields one
    pub fn resolve(&self) -> Option<String> {
        if let Some(key) = self.explicit.as_ref() {
            return Some(key.clone());
        }

        if let Ok(value) = std::env::var(&self.env_var) {
            if !value.trim().is_empty() {
                debug!(source = "env", "resolved API key");
                return Some(value.trim().to_string());
            }
        }

        if let Some(key) = self
            .secrets_file
            .as_deref()
            .and_then(|path| config::read_secret(path, &self.env_var))
        {
            debug!(source = "secrets", "resolved API key");
            return Some(key);
        }

        if let Some(command) = self.command.as_deref() {
            match config::run_key_command(command) {
                Ok(key) => {
                    debug!(source = "command", "resolved API key");
                    return Some(key);
                }
                Err(e) => warn!(error = %e, "API key command did not yield a key"),
            }
        }

        None
    }
}

/// Lazily builds and caches the session's model backend
pub struct ModelProvider {
    credentials: Credentials,
    connector: Arc<dyn Connector>,
    cached: Option<Arc<dyn ModelBackend>>,
}

impl ModelProvider {
    /// Provider talking to the Gemini REST API
    pub fn new(config: &GeminiConfig) -> Self {
        ModelProvider::with_connector(
            Credentials::from_config(config),
            Arc::new(GeminiConnector::new(config.clone())),
        )
    }

    pub fn with_connector(credentials: Credentials, connector: Arc<dyn Connector>) -> Self {
        ModelProvider {
            credentials,
            connector,
            cached: None,
        }
    }

    #[cfg(test)]
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Return a handle, building the backend if none is cached.
    ///
    /// Never fails loudly: a missing credential or a connector error is
    /// logged and yields `None`.
    pub fn get_model(&mut self, schema: Option<OutputSchema>, force_reinit: bool) -> Option<ModelHandle> {
        if force_reinit && self.cached.take().is_some() {
            debug!("discarded cached model handle");
        }

        if self.cached.is_none() {
            let Some(api_key) = self.credentials.resolve() else {
                let err = StudyError::MissingCredential(self.credentials.env_var().to_string());
                error!(error = %err, "cannot initialize model");
                return None;
            };

            match self.connector.connect(&api_key) {
                Ok(backend) => {
                    info!("initialized model handle");
                    self.cached = Some(backend);
                }
                Err(e) => {
                    error!(error = %e, "failed to initialize model");
                    return None;
                }
            }
        }

        let backend = self.cached.as_ref().map(Arc::clone)?;
        Some(ModelHandle { backend, schema })
    }

    /// Drop the cached backend and build a fresh one
    pub fn rebuild(&mut self) -> Option<ModelHandle> {
        self.get_model(None, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::FakeModel;
    use crate::gemini::{GeneratedComponent, SyllabusTopics};
    use tempfile::tempdir;

    #[test]
    fn test_missing_credential_returns_none() {
        let dir = tempdir().unwrap();
        let fake = FakeModel::new();
        let credentials = Credentials::new("STUDY_COMPANION_TEST_KEY_THAT_IS_NEVER_SET")
            .with_secrets_file(dir.path().join("secrets.toml"));
        let mut provider = ModelProvider::with_connector(credentials, Arc::new(fake.clone()));

        assert!(provider.get_model(None, false).is_none());
        assert!(provider.get_model(Some(OutputSchema::of::<SyllabusTopics>()), true).is_none());
        assert!(!provider.is_cached());
        assert_eq!(fake.connects(), 0);
    }

    #[test]
    fn test_secrets_file_supplies_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "STUDY_COMPANION_TEST_SECRET_KEY = \"from-secrets\"\n").unwrap();

        let credentials =
            Credentials::new("STUDY_COMPANION_TEST_SECRET_KEY").with_secrets_file(&path);
        assert_eq!(credentials.resolve().as_deref(), Some("from-secrets"));
    }

    #[test]
    fn test_handle_is_cached_until_forced() {
        let fake = FakeModel::new();
        let mut provider = fake.provider();

        assert!(provider.get_model(None, false).is_some());
        assert!(provider.get_model(None, false).is_some());
        assert_eq!(fake.connects(), 1);

        assert!(provider.rebuild().is_some());
        assert_eq!(fake.connects(), 2);
    }

    #[test]
    fn test_connector_failure_returns_none() {
        let fake = FakeModel::new().refuse_connects_after(0);
        let mut provider = fake.provider();
        assert!(provider.get_model(None, false).is_none());
        assert!(!provider.is_cached());
    }

    #[test]
    fn test_schema_is_bound_to_handle() {
        let fake = FakeModel::new();
        let mut provider = fake.provider();
        let handle = provider
            .get_model(Some(OutputSchema::of::<GeneratedComponent>()), false)
            .unwrap();
        assert_eq!(handle.schema().map(|s| s.name()), Some("GeneratedComponent"));

        let raw = provider.get_model(None, false).unwrap();
        assert!(raw.schema().is_none());
    }

    #[test]
    fn test_output_schema_is_inlined() {
        let schema = OutputSchema::of::<SyllabusTopics>();
        let json = schema.as_json();
        assert!(json.get("$schema").is_none());
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["topics"]["items"]["type"], "object");
        assert!(json["properties"]["topics"]["items"]["properties"]
            .get("summary")
            .is_some());
    }
}
