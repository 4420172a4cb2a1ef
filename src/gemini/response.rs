use crate::error::{Result, StudyError};
use crate::store::slugify;
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A single, well-defined topic extracted from a syllabus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Topic {
    /// The descriptive name of the topic.
    pub name: String,
    /// A concise, one-sentence summary of the topic.
    pub summary: String,
}

impl Topic {
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// A structured list of topics derived from a syllabus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyllabusTopics {
    /// The structured list of topics parsed from the syllabus, in syllabus order.
    pub topics: Vec<Topic>,
}

/// Self-contained code for an interactive component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedComponent {
    /// The complete, self-contained HTML markup for the component, without <html> or <head>.
    pub html: String,
    /// The complete CSS for the component.
    pub css: String,
    /// Optional JavaScript driving the component's interactivity.
    #[serde(default)]
    pub javascript: Option<String>,
}

/// Outcome of a model request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Structured(T),
    Text(String),
    Failed(FailureKind),
}

/// Why no usable reply came back (invocation errors travel as `Err`)
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Unavailable,
    SchemaMismatch(String),
}

impl<T> Reply<T> {
    pub fn structured(self) -> Option<T> {
        match self {
            Reply::Structured(value) => Some(value),
            _ => None,
        }
    }

    /// The free-form text, or `fallback` for anything else
    pub fn text_or(self, fallback: &str) -> String {
        match self {
            Reply::Text(text) => text,
            _ => fallback.to_string(),
        }
    }

    #[cfg(test)]
    pub fn is_failed(&self) -> bool {
        matches!(self, Reply::Failed(_))
    }
}

/// Parse a structured reply, tolerating fences and surrounding prose
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let value = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value,
        Err(_) => extract_json(trimmed)
            .ok_or_else(|| StudyError::SchemaMismatch("no JSON object found in reply".to_string()))?,
    };
    serde_json::from_value(value).map_err(|e| StudyError::SchemaMismatch(e.to_string()))
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)```").expect("Invalid fence pattern")
    })
}

/// Body of the first fenced block tagged with one of `tags`, trimmed
pub fn extract_fenced(text: &str, tags: &[&str]) -> Option<String> {
    fence_pattern()
        .captures_iter(text)
        .find(|caps| {
            let tag = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
        })
        .and_then(|caps| caps.get(2))
        .map(|body| body.as_str().trim().to_string())
}

/// First JSON object in a reply: a fenced block, else the first `{` that
/// starts a complete value
fn extract_json(text: &str) -> Option<serde_json::Value> {
    if let Some(body) = extract_fenced(text, &["json", ""]) {
        if let Ok(value) = serde_json::from_str(&body) {
            return Some(value);
        }
    }

    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<serde_json::Value>()
            .next()
            .and_then(|value| value.ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let topics: SyllabusTopics =
            parse_structured(r#"{"topics": [{"name": "Kinematics", "summary": "Motion."}]}"#)
                .unwrap();
        assert_eq!(topics.topics[0].name, "Kinematics");
    }

    #[test]
    fn test_extract_json_markdown() {
        let input = "```json\n{\"html\": \"<p>hi</p>\", \"css\": \"p {}\"}\n```";
        let component: GeneratedComponent = parse_structured(input).unwrap();
        assert_eq!(component.html, "<p>hi</p>");
        assert!(component.javascript.is_none());
    }

    #[test]
    fn test_extract_json_with_text() {
        let input = "Here you go:\n{\"topics\": []}\nGood luck!";
        let topics: SyllabusTopics = parse_structured(input).unwrap();
        assert!(topics.topics.is_empty());
    }

    #[test]
    fn test_extract_json_braces_inside_strings() {
        let bare = r#"{"html": "<p>Which character closes a block? }</p>", "css": "p {}", "javascript": null}"#;
        let component: GeneratedComponent = parse_structured(bare).unwrap();
        assert_eq!(component.html, "<p>Which character closes a block? }</p>");
        assert_eq!(component.css, "p {}");

        let wrapped = format!("Sure! {{ see below }}\n{}\nThat is all.", bare);
        let component: GeneratedComponent = parse_structured(&wrapped).unwrap();
        assert_eq!(component.css, "p {}");
    }

    #[test]
    fn test_schema_mismatch() {
        let err = parse_structured::<GeneratedComponent>(r#"{"html": "<p></p>"}"#).unwrap_err();
        assert!(matches!(err, StudyError::SchemaMismatch(_)));
        assert!(parse_structured::<SyllabusTopics>("no json at all").is_err());
    }

    #[test]
    fn test_extract_fenced_picks_first_matching_tag() {
        let reply = "Intro\n```python\nprint(1)\n```\n```dot\n  digraph A { a -> b; }  \n```\n```dot\ndigraph B {}\n```";
        assert_eq!(
            extract_fenced(reply, &["dot", "graphviz"]).as_deref(),
            Some("digraph A { a -> b; }")
        );
        assert_eq!(extract_fenced(reply, &["html"]), None);
    }

    #[test]
    fn test_extract_fenced_is_case_insensitive() {
        let reply = "```Graphviz\ndigraph G {}\n```";
        assert_eq!(
            extract_fenced(reply, &["dot", "graphviz"]).as_deref(),
            Some("digraph G {}")
        );
    }

    #[test]
    fn test_reply_accessors() {
        let reply: Reply<String> = Reply::Failed(FailureKind::Unavailable);
        assert!(reply.is_failed());
        assert_eq!(reply.text_or("fallback"), "fallback");

        let reply: Reply<u8> = Reply::Structured(7);
        assert_eq!(reply.structured(), Some(7));
    }

    #[test]
    fn test_topic_slug() {
        let topic = Topic {
            name: "Newton's Laws of Motion".to_string(),
            summary: String::new(),
        };
        assert_eq!(topic.slug(), "newton-s-laws-of-motion");
    }
}
