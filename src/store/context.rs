//! Context records (`context.toml`) for subjects and modules.
//!
//! Records are flat string tables. Edits go through `toml_edit` so hand
//! edits, comments and key order survive a rewrite.

use super::types::ContentKind;
use crate::error::Result;
use crate::gemini::Topic;
use serde::Serialize;
use toml_edit::{value, DocumentMut, Item, Table};

/// `[subject]`, `[concepts]`, `[saved_content]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectContext {
    pub name: String,
    pub description: String,
    pub created: Option<String>,
    /// Cross-module concept notes
    pub concepts: Vec<(String, String)>,
    /// Topic slug -> comma-joined content kinds
    pub saved_content: Vec<(String, String)>,
}

impl SubjectContext {
    pub fn new(name: &str, description: &str) -> Self {
        SubjectContext {
            name: name.to_string(),
            description: description.to_string(),
            created: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let doc: DocumentMut = text.parse()?;
        Ok(SubjectContext::from_document(&doc))
    }

    pub fn from_document(doc: &DocumentMut) -> Self {
        SubjectContext {
            name: string_at(doc, "subject", "name").unwrap_or_default(),
            description: string_at(doc, "subject", "description").unwrap_or_default(),
            created: string_at(doc, "subject", "created"),
            concepts: string_pairs(doc, "concepts"),
            saved_content: string_pairs(doc, "saved_content"),
        }
    }

    pub fn to_document(&self) -> DocumentMut {
        let mut doc = DocumentMut::new();

        let mut subject = Table::new();
        subject.insert("name", value(self.name.as_str()));
        subject.insert("description", value(self.description.as_str()));
        if let Some(created) = self.created.as_deref() {
            subject.insert("created", value(created));
        }
        doc.insert("subject", Item::Table(subject));
        doc.insert("concepts", Item::Table(pairs_table(&self.concepts)));
        doc.insert("saved_content", Item::Table(pairs_table(&self.saved_content)));
        doc
    }

    /// Content kinds recorded for a topic slug
    pub fn saved_kinds(&self, topic_slug: &str) -> Vec<&str> {
        self.saved_content
            .iter()
            .find(|(slug, _)| slug == topic_slug)
            .map(|(_, kinds)| split_tags(kinds))
            .unwrap_or_default()
    }
}

/// `[module]`, `[topics]`, `[summaries]`, `[features]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleContext {
    pub subject: String,
    pub name: String,
    /// Topic slug -> topic name, in extraction order
    pub topics: Vec<(String, String)>,
    /// Topic slug -> one-sentence summary from extraction
    pub summaries: Vec<(String, String)>,
    /// Enabled feature keys
    pub features: Vec<String>,
}

impl ModuleContext {
    /// New module record with every feature switched on
    pub fn new(subject: &str, name: &str, topics: &[Topic]) -> Self {
        let mut mapping: Vec<(String, String)> = Vec::with_capacity(topics.len());
        let mut summaries = Vec::new();
        for topic in topics {
            let slug = topic.slug();
            if slug.is_empty() || mapping.iter().any(|(s, _)| *s == slug) {
                continue;
            }
            if !topic.summary.trim().is_empty() {
                summaries.push((slug.clone(), topic.summary.trim().to_string()));
            }
            mapping.push((slug, topic.name.clone()));
        }

        ModuleContext {
            subject: subject.to_string(),
            name: name.to_string(),
            topics: mapping,
            summaries,
            features: ContentKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let doc: DocumentMut = text.parse()?;
        Ok(ModuleContext::from_document(&doc))
    }

    pub fn from_document(doc: &DocumentMut) -> Self {
        ModuleContext {
            subject: string_at(doc, "module", "subject").unwrap_or_default(),
            name: string_at(doc, "module", "name").unwrap_or_default(),
            topics: string_pairs(doc, "topics"),
            summaries: string_pairs(doc, "summaries"),
            features: string_pairs(doc, "features")
                .into_iter()
                .filter(|(_, v)| v == "true")
                .map(|(k, _)| k)
                .collect(),
        }
    }

    pub fn to_document(&self) -> DocumentMut {
        let mut doc = DocumentMut::new();

        let mut module = Table::new();
        module.insert("subject", value(self.subject.as_str()));
        module.insert("name", value(self.name.as_str()));
        doc.insert("module", Item::Table(module));
        doc.insert("topics", Item::Table(pairs_table(&self.topics)));
        doc.insert("summaries", Item::Table(pairs_table(&self.summaries)));

        let mut features = Table::new();
        for feature in &self.features {
            features.insert(feature, value("true"));
        }
        doc.insert("features", Item::Table(features));
        doc
    }

    pub fn feature_enabled(&self, kind: ContentKind) -> bool {
        self.features.iter().any(|f| f == kind.as_str())
    }

    /// Name of the topic with this slug
    pub fn topic_name(&self, slug: &str) -> Option<&str> {
        self.topics
            .iter()
            .find(|(s, _)| s == slug)
            .map(|(_, name)| name.as_str())
    }

    pub fn topic_summary(&self, slug: &str) -> Option<&str> {
        self.summaries
            .iter()
            .find(|(s, _)| s == slug)
            .map(|(_, summary)| summary.as_str())
    }
}

/// Add `kind` to the topic's ledger entry. Returns false if already present.
pub fn record_saved_content(doc: &mut DocumentMut, topic_slug: &str, kind: ContentKind) -> bool {
    let table = ensure_table(doc, "saved_content");
    let existing = table
        .get(topic_slug)
        .and_then(Item::as_str)
        .map(str::to_string)
        .unwrap_or_default();

    let mut tags = split_tags(&existing);
    if tags.contains(&kind.as_str()) {
        return false;
    }
    tags.push(kind.as_str());
    let joined = tags.join(",");
    table.insert(topic_slug, value(joined));
    true
}

/// Set or replace a cross-module concept note
pub fn set_concept_note(doc: &mut DocumentMut, concept: &str, note: &str) {
    ensure_table(doc, "concepts").insert(concept, value(note));
}

/// Switch a module feature on (`"true"`) or off (key removed)
pub fn set_feature(doc: &mut DocumentMut, kind: ContentKind, enabled: bool) {
    let table = ensure_table(doc, "features");
    if enabled {
        table.insert(kind.as_str(), value("true"));
    } else {
        table.remove(kind.as_str());
    }
}

fn ensure_table<'a>(doc: &'a mut DocumentMut, name: &str) -> &'a mut Table {
    let item = doc.entry(name).or_insert(Item::Table(Table::new()));
    if !item.is_table() {
        *item = Item::Table(Table::new());
    }
    match item.as_table_mut() {
        Some(table) => table,
        None => unreachable!("item was just made a table"),
    }
}

fn split_tags(joined: &str) -> Vec<&str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn string_at(doc: &DocumentMut, table: &str, key: &str) -> Option<String> {
    doc.get(table)
        .and_then(Item::as_table_like)
        .and_then(|t| t.get(key))
        .and_then(Item::as_str)
        .map(str::to_string)
}

fn string_pairs(doc: &DocumentMut, table: &str) -> Vec<(String, String)> {
    doc.get(table)
        .and_then(Item::as_table_like)
        .map(|t| {
            t.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.to_string(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn pairs_table(pairs: &[(String, String)]) -> Table {
    let mut table = Table::new();
    for (k, v) in pairs {
        table.insert(k, value(v.as_str()));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.to_string(),
            summary: format!("About {}", name),
        }
    }

    #[test]
    fn test_subject_context_roundtrip() {
        let mut context = SubjectContext::new("Physics", "First-year mechanics");
        context.concepts.push(("Energy".to_string(), "Links mechanics and thermo".to_string()));
        let text = context.to_document().to_string();

        assert!(text.contains("[subject]"));
        assert!(text.contains("[saved_content]"));
        assert_eq!(SubjectContext::parse(&text).unwrap(), context);
    }

    #[test]
    fn test_module_context_defaults_all_features() {
        let context = ModuleContext::new("Physics", "Mechanics", &[topic("Vectors"), topic("Kinematics")]);
        for kind in ContentKind::ALL {
            assert!(context.feature_enabled(kind));
        }
        let text = context.to_document().to_string();
        assert!(text.contains("quiz = \"true\""));

        let parsed = ModuleContext::parse(&text).unwrap();
        assert_eq!(parsed.topics[0], ("vectors".to_string(), "Vectors".to_string()));
        assert_eq!(parsed.topics[1].0, "kinematics");
        assert_eq!(parsed.topic_name("kinematics"), Some("Kinematics"));
        assert_eq!(parsed.topic_summary("vectors"), Some("About Vectors"));
        assert_eq!(parsed, context);
    }

    #[test]
    fn test_record_without_summaries_still_parses() {
        let text = "[module]\nsubject = \"Physics\"\nname = \"Old\"\n\n[topics]\nvectors = \"Vectors\"\n";
        let parsed = ModuleContext::parse(text).unwrap();
        assert_eq!(parsed.topic_name("vectors"), Some("Vectors"));
        assert_eq!(parsed.topic_summary("vectors"), None);
    }

    #[test]
    fn test_module_context_drops_duplicate_slugs() {
        let context = ModuleContext::new("Physics", "Mechanics", &[topic("Vectors"), topic("vectors!")]);
        assert_eq!(context.topics.len(), 1);
    }

    #[test]
    fn test_empty_topics_still_writes_table() {
        let context = ModuleContext::new("Physics", "Empty", &[]);
        let text = context.to_document().to_string();
        assert!(text.contains("[topics]"));
        assert!(ModuleContext::parse(&text).unwrap().topics.is_empty());
    }

    #[test]
    fn test_record_saved_content_is_idempotent() {
        let mut doc = SubjectContext::new("Physics", "").to_document();
        assert!(record_saved_content(&mut doc, "entropy", ContentKind::Explanation));
        assert!(!record_saved_content(&mut doc, "entropy", ContentKind::Explanation));
        assert!(record_saved_content(&mut doc, "entropy", ContentKind::Quiz));

        let context = SubjectContext::from_document(&doc);
        assert_eq!(context.saved_kinds("entropy"), vec!["explanation", "quiz"]);
        assert!(doc.to_string().contains("entropy = \"explanation,quiz\""));
    }

    #[test]
    fn test_record_saved_content_keeps_hand_edits() {
        let text = "# my physics notes\n[subject]\nname = \"Physics\"\n\n[saved_content]\nvectors = \"quiz\"\n";
        let mut doc: DocumentMut = text.parse().unwrap();
        record_saved_content(&mut doc, "vectors", ContentKind::Mnemonics);

        let out = doc.to_string();
        assert!(out.starts_with("# my physics notes"));
        assert!(out.contains("vectors = \"quiz,mnemonics\""));
    }

    #[test]
    fn test_set_feature_removes_key_when_disabled() {
        let mut doc = ModuleContext::new("Physics", "Mechanics", &[]).to_document();
        set_feature(&mut doc, ContentKind::Quiz, false);
        let context = ModuleContext::from_document(&doc);
        assert!(!context.feature_enabled(ContentKind::Quiz));
        assert!(!doc.to_string().contains("quiz"));

        set_feature(&mut doc, ContentKind::Quiz, true);
        assert!(ModuleContext::from_document(&doc).feature_enabled(ContentKind::Quiz));
    }

    #[test]
    fn test_set_concept_note() {
        let mut doc = DocumentMut::new();
        set_concept_note(&mut doc, "Energy", "Conserved");
        set_concept_note(&mut doc, "Energy", "Conserved in closed systems");
        let context = SubjectContext::from_document(&doc);
        assert_eq!(
            context.concepts,
            vec![("Energy".to_string(), "Conserved in closed systems".to_string())]
        );
    }
}
