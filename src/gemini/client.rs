use super::provider::{Connector, ModelBackend, OutputSchema};
use crate::config::GeminiConfig;
use crate::error::{Result, StudyError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Builds a fresh HTTP client per connect
pub struct GeminiConnector {
    config: GeminiConfig,
}

impl GeminiConnector {
    pub fn new(config: GeminiConfig) -> Self {
        GeminiConnector { config }
    }
}

impl Connector for GeminiConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn ModelBackend>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .build()
            .map_err(|e| StudyError::Model(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Arc::new(GeminiBackend {
            client,
            api_key: api_key.to_string(),
            url: generate_url(&self.config.endpoint, &self.config.model),
            temperature: self.config.temperature,
            timeout_seconds: self.config.timeout_seconds,
        }))
    }
}

/// Gemini `generateContent` over REST
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    url: String,
    temperature: f32,
    timeout_seconds: u64,
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, schema: Option<&OutputSchema>) -> Result<String> {
        let request = build_request(prompt, self.temperature, schema);
        debug!(url = %self.url, structured = schema.is_some(), "sending generateContent request");

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StudyError::ModelTimeout(self.timeout_seconds)
                } else {
                    StudyError::Model(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StudyError::Model(format!(
                "API returned status {}: {}",
                status,
                body.trim()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| StudyError::Model(format!("Failed to parse response: {}", e)))?;

        reply_text(body)
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

fn build_request<'a>(
    prompt: &'a str,
    temperature: f32,
    schema: Option<&'a OutputSchema>,
) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature,
            response_mime_type: schema.map(|_| "application/json"),
            response_json_schema: schema.map(|s| s.as_json()),
        },
    }
}

/// Concatenate the text parts of the first candidate
fn reply_text(body: GenerateResponse) -> Result<String> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(StudyError::Model(format!("Prompt blocked: {}", reason)));
    }

    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| StudyError::Model("No response candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(StudyError::Model(format!(
            "Empty response (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeneratedComponent;

    #[test]
    fn test_generate_url() {
        assert_eq!(
            generate_url("https://generativelanguage.googleapis.com/v1beta/", "gemini-flash-latest"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_free_form_request_has_no_schema() {
        let request = build_request("Explain entropy", 0.7, None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Explain entropy");
        assert!(json["generationConfig"].get("responseMimeType").is_none());
        assert!(json["generationConfig"].get("responseJsonSchema").is_none());
    }

    #[test]
    fn test_structured_request_carries_schema() {
        let schema = OutputSchema::of::<GeneratedComponent>();
        let request = build_request("Make a quiz", 0.7, Some(&schema));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            json["generationConfig"]["responseJsonSchema"]["properties"]["html"]["type"],
            "string"
        );
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(body).unwrap(), "Hello, world");
    }

    #[test]
    fn test_reply_text_rejects_empty_and_blocked() {
        let empty: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"finishReason": "SAFETY"}]}"#,
        )
        .unwrap();
        let err = reply_text(empty).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let blocked: GenerateResponse = serde_json::from_str(
            r#"{"promptFeedback": {"blockReason": "OTHER"}}"#,
        )
        .unwrap();
        assert!(reply_text(blocked).unwrap_err().to_string().contains("blocked"));

        let none: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(reply_text(none).is_err());
    }
}
