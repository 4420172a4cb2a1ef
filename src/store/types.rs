use super::context::{ModuleContext, SubjectContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Kinds of generated content; doubles as module feature flags and ledger tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Explanation,
    Quiz,
    VisualMap,
    Mnemonics,
    Component,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Explanation,
        ContentKind::Quiz,
        ContentKind::VisualMap,
        ContentKind::Mnemonics,
        ContentKind::Component,
    ];

    /// Key used in context records
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Explanation => "explanation",
            ContentKind::Quiz => "quiz",
            ContentKind::VisualMap => "visual_map",
            ContentKind::Mnemonics => "mnemonics",
            ContentKind::Component => "component",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Explanation => "explanation",
            ContentKind::Quiz => "quiz",
            ContentKind::VisualMap => "concept map",
            ContentKind::Mnemonics => "mnemonics",
            ContentKind::Component => "interactive component",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ContentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized || (normalized == "map" && *k == ContentKind::VisualMap))
            .ok_or_else(|| {
                format!(
                    "unknown content kind '{}' (expected one of: explanation, quiz, visual_map, mnemonics, component)",
                    s
                )
            })
    }
}

/// One subject as found on disk
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectEntry {
    pub context: Option<SubjectContext>,
    pub syllabus: Option<String>,
    pub modules: BTreeMap<String, ModuleEntry>,
}

/// One module as found on disk
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleEntry {
    pub context: Option<ModuleContext>,
    pub syllabus: Option<String>,
    /// Topic slug -> topic name, in stored order
    pub topics: Vec<(String, String)>,
}

/// Subject name -> subject
pub type Structure = BTreeMap<String, SubjectEntry>;

/// Result of saving content into a web-folio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolioUpdate {
    /// An entry for the same topic and kind was replaced
    pub replaced: bool,
    /// The kind was not yet in the ledger for this topic
    pub newly_recorded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_parse() {
        assert_eq!("quiz".parse::<ContentKind>().unwrap(), ContentKind::Quiz);
        assert_eq!("visual-map".parse::<ContentKind>().unwrap(), ContentKind::VisualMap);
        assert_eq!("Map".parse::<ContentKind>().unwrap(), ContentKind::VisualMap);
        assert!("flashcards".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_content_kind_serde_matches_keys() {
        for kind in ContentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
