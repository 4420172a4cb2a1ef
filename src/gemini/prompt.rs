use crate::store::ContentKind;

/// Background the model gets alongside a topic
#[derive(Debug, Clone, Default)]
pub struct StudyContext {
    pub subject: String,
    pub description: Option<String>,
    pub module: Option<String>,
    pub topic_summary: Option<String>,
    /// Cross-module concept notes, concept -> note
    pub concepts: Vec<(String, String)>,
}

impl StudyContext {
    pub fn for_subject(subject: &str) -> Self {
        StudyContext {
            subject: subject.to_string(),
            ..Default::default()
        }
    }

    /// Render as prompt lines, skipping empty fields
    pub fn render(&self) -> String {
        let mut lines = vec![format!("SUBJECT: {}", self.subject)];
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            lines.push(format!("SUBJECT DESCRIPTION: {}", description.trim()));
        }
        if let Some(module) = self.module.as_deref().filter(|m| !m.trim().is_empty()) {
            lines.push(format!("MODULE: {}", module));
        }
        if let Some(summary) = self.topic_summary.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("TOPIC SUMMARY: {}", summary.trim()));
        }
        if !self.concepts.is_empty() {
            lines.push("RELATED CONCEPTS FROM OTHER MODULES:".to_string());
            for (concept, note) in &self.concepts {
                lines.push(format!("- {}: {}", concept, note));
            }
        }
        lines.join("\n")
    }
}

/// Build the prompt that turns a syllabus into topics
pub fn build_topic_extraction_prompt(syllabus: &str) -> String {
    format!(r#"You are an expert instructional designer. Your task is to parse the following syllabus and identify the main learning topics.
For each topic, provide a clear name and a concise one-sentence summary.
Keep the topics in the order they appear in the syllabus.

Syllabus Text:
---
{syllabus}
---

Respond with ONLY a JSON object of the form {{"topics": [{{"name": "...", "summary": "..."}}]}}."#,
        syllabus = syllabus.trim()
    )
}

/// Build the prompt for a Markdown explanation of a topic
pub fn build_explanation_prompt(topic: &str, context: &StudyContext) -> String {
    format!(r#"**Persona:** Act as an expert instructional designer.
**Task:** Generate a comprehensive, Markdown-formatted explanation for the topic: '{topic}'.
**Methodology:** Use fragmentation, simplification, concept linking, and an exam-oriented approach.
Break the topic into small sections, explain each in plain language, link it to related concepts,
and finish with the points most likely to be examined.

**Context:**
{context}"#,
        topic = topic,
        context = context.render()
    )
}

/// Build the prompt for a Graphviz concept map
pub fn build_visual_map_prompt(topic: &str, context: &StudyContext) -> String {
    format!(r#"You are an expert at visualising knowledge. Create a concept map for the topic '{topic}'.

{context}

REQUIREMENTS:
- Use the Graphviz DOT language with a single `digraph`.
- Put the topic at the centre and connect 6-12 key concepts with labelled edges.
- Keep node labels short (at most 5 words).

Return the graph inside a single fenced code block tagged `dot`, e.g.
```dot
digraph G {{ ... }}
```"#,
        topic = topic,
        context = context.render()
    )
}

/// Component request for a multiple-choice quiz
pub fn build_quiz_request(topic: &str) -> String {
    format!(
        "Create a multiple-choice quiz with 3-4 questions for the topic '{}'. \
The quiz should be a self-contained HTML component with CSS for styling and simple \
JavaScript to show feedback on selection.",
        topic
    )
}

/// Build the prompt for a self-contained HTML/CSS/JS component
pub fn build_component_prompt(request: &str) -> String {
    format!(r#"You are an expert frontend developer. Generate self-contained HTML and CSS for the following component request.
Put any JavaScript in the `javascript` field rather than inline <script> tags. Do not use external resources.

User Request: "{request}"

Respond with ONLY a JSON object with the fields "html", "css" and "javascript"."#,
        request = request.trim()
    )
}

/// Build the prompt for memory aids
pub fn build_mnemonics_prompt(topic: &str) -> String {
    format!(r#"You are a memory coach helping a student prepare for an exam.
Create memorable mnemonics for the topic '{topic}':
- at least one acronym or acrostic for its key terms,
- one short rhyme or vivid image,
- a one-line explanation of what each mnemonic encodes.

Format the answer in Markdown."#,
        topic = topic
    )
}

/// Build the prompt that turns saved content into a web-folio fragment
pub fn build_web_fragment_prompt(topic: &str, content: &str, kind: ContentKind) -> String {
    format!(r#"You are formatting study notes for a personal static website.
Convert the following {kind} about '{topic}' into a clean HTML fragment.

RULES:
- Output a single <article> element; no <html>, <head> or <body>.
- Keep all information; use headings, lists and <pre> where they fit.
- Do not add external resources or inline scripts.

CONTENT:
---
{content}
---

Return the fragment inside a single fenced code block tagged `html`."#,
        kind = kind.label(),
        topic = topic,
        content = content.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_render_skips_empty_fields() {
        let context = StudyContext {
            subject: "Physics".to_string(),
            description: Some("  ".to_string()),
            module: Some("Mechanics".to_string()),
            topic_summary: None,
            concepts: vec![("Energy".to_string(), "Conserved in closed systems".to_string())],
        };
        let rendered = context.render();
        assert!(rendered.contains("SUBJECT: Physics"));
        assert!(rendered.contains("MODULE: Mechanics"));
        assert!(!rendered.contains("DESCRIPTION"));
        assert!(rendered.contains("- Energy: Conserved in closed systems"));
    }

    #[test]
    fn test_topic_prompt_includes_syllabus() {
        let prompt = build_topic_extraction_prompt("\n Week 1: Vectors \n");
        assert!(prompt.contains("---\nWeek 1: Vectors\n---"));
        assert!(prompt.contains(r#"{"topics": [{"name""#));
    }

    #[test]
    fn test_visual_map_prompt_asks_for_dot_fence() {
        let prompt = build_visual_map_prompt("Entropy", &StudyContext::for_subject("Thermo"));
        assert!(prompt.contains("```dot"));
        assert!(prompt.contains("digraph G { ... }"));
    }

    #[test]
    fn test_web_fragment_prompt_names_kind() {
        let prompt = build_web_fragment_prompt("Entropy", "S = k ln W", ContentKind::VisualMap);
        assert!(prompt.contains("concept map about 'Entropy'"));
    }
}
