mod client;
mod invoker;
mod prompt;
mod provider;
mod response;
#[cfg(test)]
pub(crate) mod testing;

pub use invoker::{invoke_validated, invoke_with_retry};
pub use prompt::*;
pub use provider::{Connector, Credentials, ModelBackend, ModelHandle, ModelProvider, OutputSchema};
pub use response::*;

use crate::error::{Result, StudyError};
use crate::store::ContentKind;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Returned by text generators when no model can be built
pub const MODEL_UNAVAILABLE: &str = "Error: AI model is not available.";

/// Returned by `visual_map` when no DOT block can be recovered
pub const FALLBACK_MAP: &str = r#"digraph G { error[label="Failed to generate map"]; }"#;

const DOT_TAGS: &[&str] = &["dot", "graphviz"];
const HTML_TAGS: &[&str] = &["html"];

/// Generates study content; owns the session's model provider
pub struct ContentGenerator {
    provider: ModelProvider,
}

impl ContentGenerator {
    pub fn new(provider: ModelProvider) -> Self {
        ContentGenerator { provider }
    }

    /// Fail with `ModelUnavailable` unless a model can be built
    pub fn ensure_available(&mut self) -> Result<()> {
        match self.provider.get_model(None, false) {
            Some(_) => Ok(()),
            None => Err(StudyError::ModelUnavailable),
        }
    }

    /// `None` means no model could be built
    async fn dispatch<T, F>(&mut self, prompt: &str, schema: Option<OutputSchema>, validate: F) -> Result<Option<T>>
    where
        F: Fn(String) -> Result<T>,
    {
        let Some(handle) = self.provider.get_model(schema, false) else {
            return Ok(None);
        };
        invoke_validated(&mut self.provider, &handle, prompt, validate)
            .await
            .map(Some)
    }

    /// Free-form request
    pub async fn ask_text(&mut self, prompt: &str) -> Result<Reply<String>> {
        Ok(match self.dispatch(prompt, None, Ok).await? {
            Some(text) => Reply::Text(text),
            None => Reply::Failed(FailureKind::Unavailable),
        })
    }

    /// Request constrained to `T`'s JSON schema. A reply that does not
    /// validate is retried once like any other failed send.
    pub async fn ask_structured<T>(&mut self, prompt: &str) -> Result<Reply<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let validate = |raw: String| parse_structured::<T>(&raw);
        match self.dispatch(prompt, Some(OutputSchema::of::<T>()), validate).await {
            Ok(Some(value)) => Ok(Reply::Structured(value)),
            Ok(None) => Ok(Reply::Failed(FailureKind::Unavailable)),
            Err(StudyError::Invocation { source, .. }) if matches!(*source, StudyError::SchemaMismatch(_)) => {
                warn!(error = %source, "discarding reply that does not match the requested schema");
                Ok(Reply::Failed(FailureKind::SchemaMismatch(source.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    /// Topics in syllabus order, or `None` when unavailable or malformed
    pub async fn extract_topics(&mut self, syllabus: &str) -> Result<Option<SyllabusTopics>> {
        let prompt = build_topic_extraction_prompt(syllabus);
        Ok(self.ask_structured::<SyllabusTopics>(&prompt).await?.structured())
    }

    pub async fn explain(&mut self, topic: &str, context: &StudyContext) -> Result<String> {
        let prompt = build_explanation_prompt(topic, context);
        Ok(self.ask_text(&prompt).await?.text_or(MODEL_UNAVAILABLE))
    }

    /// DOT source for a concept map; `FALLBACK_MAP` when none can be recovered
    pub async fn visual_map(&mut self, topic: &str, context: &StudyContext) -> Result<String> {
        let prompt = build_visual_map_prompt(topic, context);
        let reply = self.ask_text(&prompt).await?;
        let graph = match reply {
            Reply::Text(text) => extract_fenced(&text, DOT_TAGS).filter(|g| !g.is_empty()),
            _ => None,
        };
        Ok(graph.unwrap_or_else(|| {
            warn!(topic, "no graph found in reply, using fallback map");
            FALLBACK_MAP.to_string()
        }))
    }

    pub async fn quiz(&mut self, topic: &str) -> Result<Option<GeneratedComponent>> {
        self.creative_component(&build_quiz_request(topic)).await
    }

    pub async fn creative_component(&mut self, request: &str) -> Result<Option<GeneratedComponent>> {
        let prompt = build_component_prompt(request);
        Ok(self.ask_structured::<GeneratedComponent>(&prompt).await?.structured())
    }

    pub async fn mnemonics(&mut self, topic: &str) -> Result<String> {
        let prompt = build_mnemonics_prompt(topic);
        Ok(self.ask_text(&prompt).await?.text_or(MODEL_UNAVAILABLE))
    }

    /// HTML fragment for the web-folio, or `None` when no model is available
    pub async fn web_fragment(
        &mut self,
        topic: &str,
        content: &str,
        kind: ContentKind,
    ) -> Result<Option<String>> {
        let prompt = build_web_fragment_prompt(topic, content, kind);
        Ok(match self.ask_text(&prompt).await? {
            Reply::Text(text) => Some(
                extract_fenced(&text, HTML_TAGS).unwrap_or_else(|| text.trim().to_string()),
            ),
            _ => None,
        })
    }
}
