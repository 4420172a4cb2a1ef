//! The per-subject web-folio and the page templates around it.

use super::context::{ModuleContext, SubjectContext};
use super::types::ContentKind;
use crate::error::{Result, StudyError};
use crate::gemini::GeneratedComponent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const FOLIO_VERSION: u32 = 1;

/// The single insertion point of the folio page
pub const ENTRIES_SLOT: &str = "<!-- folio:entries -->";

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<link rel="stylesheet" href="style.css">
</head>
<body>
<header><h1>{{TITLE}}</h1></header>
<main id="folio">
<!-- folio:entries -->
</main>
<script src="script.js"></script>
</body>
</html>
"#;

pub const DEFAULT_STYLE: &str = r#"body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 60rem; padding: 1rem 2rem; line-height: 1.5; }
header { border-bottom: 2px solid #335; margin-bottom: 1.5rem; }
.folio-entry { border: 1px solid #ccd; border-radius: 6px; padding: 0.5rem 1.25rem; margin-bottom: 1.25rem; }
.folio-entry h2 { cursor: pointer; font-size: 1.2rem; }
.folio-entry h2 small { color: #667; font-weight: normal; margin-left: 0.5rem; }
.folio-entry.collapsed > :not(h2) { display: none; }
.folio-empty { color: #667; font-style: italic; }
"#;

pub const DEFAULT_SCRIPT: &str = r#"document.querySelectorAll('.folio-entry h2').forEach(function (heading) {
  heading.addEventListener('click', function () {
    heading.parentElement.classList.toggle('collapsed');
  });
});
"#;

/// `template.html`, used to render generated components standalone
pub const COMPONENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
{{CSS}}
</style>
</head>
<body>
{{HTML}}
<script>
{{JS}}
</script>
</body>
</html>
"#;

/// A piece of content saved into the folio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolioEntry {
    pub topic: String,
    pub topic_slug: String,
    pub kind: ContentKind,
    pub html: String,
    pub saved_at: DateTime<Utc>,
}

/// Contents of `folio.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folio {
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<FolioEntry>,
}

impl Default for Folio {
    fn default() -> Self {
        Folio {
            version: FOLIO_VERSION,
            entries: Vec::new(),
        }
    }
}

impl Folio {
    /// Load from disk; a missing file is an empty folio
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Folio::default()),
            Err(e) => Err(StudyError::persistence(path, e)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Insert, or replace the entry for the same topic and kind in place.
    /// Returns true when an entry was replaced.
    pub fn upsert(&mut self, entry: FolioEntry) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.topic_slug == entry.topic_slug && e.kind == entry.kind)
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }
}

/// Render `index.html` with every entry in the slot
pub fn render_index(title: &str, folio: &Folio) -> String {
    let entries = if folio.entries.is_empty() {
        "<p class=\"folio-empty\">Nothing saved yet.</p>".to_string()
    } else {
        folio
            .entries
            .iter()
            .map(render_entry)
            .collect::<Vec<_>>()
            .join("\n")
    };

    INDEX_TEMPLATE
        .replace("{{TITLE}}", &escape_html(title))
        .replace(ENTRIES_SLOT, &entries)
}

fn render_entry(entry: &FolioEntry) -> String {
    format!(
        "<section class=\"folio-entry\" id=\"{slug}-{kind}\" data-topic=\"{slug}\" data-kind=\"{kind}\">\n<h2>{topic}<small>{label}</small></h2>\n{html}\n</section>",
        slug = entry.topic_slug,
        kind = entry.kind.as_str(),
        topic = escape_html(&entry.topic),
        label = entry.kind.label(),
        html = entry.html
    )
}

/// Fill a component template's `{{CSS}}`, `{{HTML}}` and `{{JS}}` placeholders
pub fn render_component(template: &str, component: &GeneratedComponent) -> String {
    template
        .replace("{{CSS}}", &component.css)
        .replace("{{JS}}", component.javascript.as_deref().unwrap_or_default())
        .replace("{{HTML}}", &component.html)
}

/// A component as a self-contained folio fragment: scoped wrapper, its
/// style, markup and script
pub fn component_fragment(component: &GeneratedComponent) -> String {
    let mut fragment = String::from("<div class=\"folio-component\">\n");
    if !component.css.trim().is_empty() {
        fragment.push_str(&format!("<style>\n{}\n</style>\n", component.css.trim()));
    }
    fragment.push_str(component.html.trim());
    fragment.push('\n');
    if let Some(script) = component.javascript.as_deref().filter(|js| !js.trim().is_empty()) {
        fragment.push_str(&format!("<script>\n{}\n</script>\n", script.trim()));
    }
    fragment.push_str("</div>");
    fragment
}

/// Standalone study page for a subject, or for one of its modules
pub fn render_study_page(subject: &SubjectContext, module: Option<&ModuleContext>) -> String {
    let mut body = String::new();

    match module {
        Some(module) => {
            body.push_str(&format!("<h1>{}</h1>\n", escape_html(&module.name)));
            body.push_str(&format!(
                "<p>Module of <a href=\"../index.html\">{}</a></p>\n",
                escape_html(&subject.name)
            ));
            body.push_str(&topic_list(subject, &module.topics));
            let features: Vec<&str> = module.features.iter().map(String::as_str).collect();
            body.push_str(&format!(
                "<p class=\"features\">Enabled: {}</p>\n",
                escape_html(&features.join(", "))
            ));
        }
        None => {
            body.push_str(&format!("<h1>{}</h1>\n", escape_html(&subject.name)));
            if !subject.description.trim().is_empty() {
                body.push_str(&format!("<p>{}</p>\n", escape_html(&subject.description)));
            }
            body.push_str("<p><a href=\"index.html\">Open the web-folio</a></p>\n");
            if !subject.concepts.is_empty() {
                body.push_str("<h2>Concepts</h2>\n<dl>\n");
                for (concept, note) in &subject.concepts {
                    body.push_str(&format!(
                        "<dt>{}</dt><dd>{}</dd>\n",
                        escape_html(concept),
                        escape_html(note)
                    ));
                }
                body.push_str("</dl>\n");
            }
        }
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{style}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(module.map(|m| m.name.as_str()).unwrap_or(&subject.name)),
        style = DEFAULT_STYLE,
        body = body
    )
}

fn topic_list(subject: &SubjectContext, topics: &[(String, String)]) -> String {
    if topics.is_empty() {
        return "<p class=\"folio-empty\">No topics extracted.</p>\n".to_string();
    }
    let mut list = String::from("<ol class=\"topics\">\n");
    for (slug, name) in topics {
        let saved = subject.saved_kinds(slug);
        if saved.is_empty() {
            list.push_str(&format!("<li>{}</li>\n", escape_html(name)));
        } else {
            list.push_str(&format!(
                "<li><a href=\"../index.html#{}-{}\">{}</a> <small>{}</small></li>\n",
                slug,
                saved[0],
                escape_html(name),
                escape_html(&saved.join(", "))
            ));
        }
    }
    list.push_str("</ol>\n");
    list
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
