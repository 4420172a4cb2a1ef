mod context;
mod folio;
mod lock;
mod types;

pub use context::{ModuleContext, SubjectContext};
pub use types::*;

use crate::config::{ExistingSubjectPolicy, StoreConfig};
use crate::error::{Result, StudyError};
use crate::gemini::{ContentGenerator, GeneratedComponent};
use folio::{Folio, FolioEntry};
use lock::StoreLock;
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_edit::DocumentMut;
use tracing::{debug, info, warn};

const LOCK_TIMEOUT_SECS: u64 = 5;

const CONTEXT_FILE: &str = "context.toml";
const SYLLABUS_FILE: &str = "syllabus.txt";
const TEMPLATE_FILE: &str = "template.html";
const INDEX_FILE: &str = "index.html";
const STYLE_FILE: &str = "style.css";
const SCRIPT_FILE: &str = "script.js";
const FOLIO_FILE: &str = "folio.json";
const ARTIFACT_FILE: &str = "study.html";
const COMPONENTS_DIR: &str = "components";

/// Turn a name into a lowercase, hyphen-separated key
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(48)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

/// Reject names that are not a single plain directory component
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name == COMPONENTS_DIR;
    if invalid {
        Err(StudyError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// The on-disk subject/module hierarchy
#[derive(Debug, Clone)]
pub struct Store {
    base_path: PathBuf,
    policy: ExistingSubjectPolicy,
}

impl Store {
    pub fn new(base_path: impl Into<PathBuf>, policy: ExistingSubjectPolicy) -> Self {
        Store {
            base_path: base_path.into(),
            policy,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Store::new(&config.base_path, config.existing_subject)
    }

    pub fn subject_dir(&self, subject: &str) -> Result<PathBuf> {
        validate_name(subject)?;
        Ok(self.base_path.join(subject))
    }

    pub fn module_dir(&self, subject: &str, module: &str) -> Result<PathBuf> {
        validate_name(module)?;
        Ok(self.subject_dir(subject)?.join(module))
    }

    /// Create a subject with its syllabus, context record, component
    /// template and an empty web-folio.
    ///
    /// An existing subject is a conflict under `Reject`; under `Reuse`
    /// only missing files are created.
    pub fn initialize_subject(&self, name: &str, syllabus: &str, description: Option<&str>) -> Result<PathBuf> {
        let dir = self.subject_dir(name)?;

        if dir.exists() {
            match self.policy {
                ExistingSubjectPolicy::Reject => {
                    return Err(StudyError::SubjectExists(name.to_string()));
                }
                ExistingSubjectPolicy::Reuse => {
                    debug!(subject = name, "subject exists, filling in missing files");
                }
            }
        }

        self.create_subject_files(&dir, name, syllabus, description.unwrap_or_default())?;
        info!(subject = name, path = %dir.display(), "initialized subject");
        Ok(dir)
    }

    fn create_subject_files(&self, dir: &Path, name: &str, syllabus: &str, description: &str) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| StudyError::persistence(dir, e))?;

        write_if_absent(&dir.join(SYLLABUS_FILE), syllabus)?;
        write_if_absent(
            &dir.join(CONTEXT_FILE),
            &SubjectContext::new(name, description).to_document().to_string(),
        )?;
        write_if_absent(&dir.join(TEMPLATE_FILE), folio::COMPONENT_TEMPLATE)?;
        write_if_absent(&dir.join(STYLE_FILE), folio::DEFAULT_STYLE)?;
        write_if_absent(&dir.join(SCRIPT_FILE), folio::DEFAULT_SCRIPT)?;
        write_if_absent(&dir.join(INDEX_FILE), &folio::render_index(name, &Folio::default()))?;
        Ok(())
    }

    /// Create a module from its syllabus, extracting the topic map with the model.
    ///
    /// The parent subject is created if missing. When no topics come back the
    /// module is still written with an empty topic map; when no model can be
    /// built nothing is written.
    pub async fn initialize_module(
        &self,
        generator: &mut ContentGenerator,
        subject: &str,
        module: &str,
        syllabus: &str,
    ) -> Result<ModuleContext> {
        let subject_dir = self.subject_dir(subject)?;
        let module_dir = self.module_dir(subject, module)?;

        let context_path = module_dir.join(CONTEXT_FILE);
        if context_path.exists() {
            match self.policy {
                ExistingSubjectPolicy::Reject => {
                    return Err(StudyError::ModuleExists {
                        subject: subject.to_string(),
                        module: module.to_string(),
                    });
                }
                ExistingSubjectPolicy::Reuse => {
                    debug!(subject, module, "module exists, keeping its record");
                    return ModuleContext::parse(&read_file(&context_path)?);
                }
            }
        }

        generator.ensure_available()?;

        if !subject_dir.exists() {
            self.create_subject_files(&subject_dir, subject, "", "")?;
            info!(subject, "created parent subject for module");
        }

        let topics = match generator.extract_topics(syllabus).await? {
            Some(extracted) => extracted.topics,
            None => {
                warn!(subject, module, "no topics could be extracted from the syllabus");
                Vec::new()
            }
        };

        let context = ModuleContext::new(subject, module, &topics);
        fs::create_dir_all(&module_dir).map_err(|e| StudyError::persistence(&module_dir, e))?;
        write_file(&module_dir.join(SYLLABUS_FILE), syllabus)?;
        write_file(&context_path, &context.to_document().to_string())?;

        info!(subject, module, topics = context.topics.len(), "initialized module");
        Ok(context)
    }

    /// Format `content` as HTML, save it into the subject's web-folio and
    /// record `kind` against the topic in the saved-content ledger.
    pub async fn update_web_folio(
        &self,
        generator: &mut ContentGenerator,
        subject: &str,
        topic: &str,
        content: &str,
        kind: ContentKind,
    ) -> Result<FolioUpdate> {
        let dir = self.existing_subject_dir(subject)?;
        let topic_slug = slugify(topic);
        if topic_slug.is_empty() {
            return Err(StudyError::InvalidName(topic.to_string()));
        }

        let html = generator
            .web_fragment(topic, content, kind)
            .await?
            .ok_or(StudyError::ModelUnavailable)?;

        self.record_folio_entry(&dir, subject, topic, topic_slug, kind, html).await
    }

    /// Save a generated component into the web-folio as-is, with its style
    /// and script, and record `kind` in the ledger. No model call is made.
    pub async fn save_component_to_folio(
        &self,
        subject: &str,
        topic: &str,
        component: &GeneratedComponent,
        kind: ContentKind,
    ) -> Result<FolioUpdate> {
        let dir = self.existing_subject_dir(subject)?;
        let topic_slug = slugify(topic);
        if topic_slug.is_empty() {
            return Err(StudyError::InvalidName(topic.to_string()));
        }

        let html = folio::component_fragment(component);
        self.record_folio_entry(&dir, subject, topic, topic_slug, kind, html).await
    }

    async fn record_folio_entry(
        &self,
        dir: &Path,
        subject: &str,
        topic: &str,
        topic_slug: String,
        kind: ContentKind,
        html: String,
    ) -> Result<FolioUpdate> {
        let _lock = StoreLock::acquire_async(dir, Duration::from_secs(LOCK_TIMEOUT_SECS)).await?;

        let folio_path = dir.join(FOLIO_FILE);
        let mut folio = Folio::load(&folio_path)?;
        let replaced = folio.upsert(FolioEntry {
            topic: topic.to_string(),
            topic_slug: topic_slug.clone(),
            kind,
            html,
            saved_at: Utc::now(),
        });
        write_file(&folio_path, &folio.to_json()?)?;
        write_file(&dir.join(INDEX_FILE), &folio::render_index(subject, &folio))?;
        write_if_absent(&dir.join(STYLE_FILE), folio::DEFAULT_STYLE)?;
        write_if_absent(&dir.join(SCRIPT_FILE), folio::DEFAULT_SCRIPT)?;

        let mut doc = self.subject_document(dir, subject)?;
        let newly_recorded = context::record_saved_content(&mut doc, &topic_slug, kind);
        if newly_recorded {
            write_file(&dir.join(CONTEXT_FILE), &doc.to_string())?;
        }

        info!(subject, topic, kind = %kind, replaced, "saved content to web-folio");
        Ok(FolioUpdate {
            replaced,
            newly_recorded,
        })
    }

    /// Walk the hierarchy. Missing or unreadable pieces become empty values.
    pub fn load_structure(&self) -> Structure {
        load_structure(&self.base_path)
    }

    pub fn subject_context(&self, subject: &str) -> Result<SubjectContext> {
        let dir = self.existing_subject_dir(subject)?;
        Ok(SubjectContext::from_document(&self.subject_document(&dir, subject)?))
    }

    pub fn subject_syllabus(&self, subject: &str) -> Result<Option<String>> {
        let dir = self.existing_subject_dir(subject)?;
        read_optional(&dir.join(SYLLABUS_FILE))
    }

    pub fn module_context(&self, subject: &str, module: &str) -> Result<ModuleContext> {
        self.existing_subject_dir(subject)?;
        let path = self.module_dir(subject, module)?.join(CONTEXT_FILE);
        match read_optional(&path)? {
            Some(text) => ModuleContext::parse(&text),
            None => Err(StudyError::ModuleNotFound {
                subject: subject.to_string(),
                module: module.to_string(),
            }),
        }
    }

    /// Add or replace a cross-module concept note
    pub fn add_concept_note(&self, subject: &str, concept: &str, note: &str) -> Result<()> {
        let dir = self.existing_subject_dir(subject)?;
        let _lock = StoreLock::acquire(&dir, Duration::from_secs(LOCK_TIMEOUT_SECS))?;

        let mut doc = self.subject_document(&dir, subject)?;
        context::set_concept_note(&mut doc, concept, note);
        write_file(&dir.join(CONTEXT_FILE), &doc.to_string())
    }

    /// Switch a module feature on or off
    pub fn set_feature(&self, subject: &str, module: &str, kind: ContentKind, enabled: bool) -> Result<()> {
        let dir = self.existing_subject_dir(subject)?;
        let path = self.module_dir(subject, module)?.join(CONTEXT_FILE);
        let _lock = StoreLock::acquire(&dir, Duration::from_secs(LOCK_TIMEOUT_SECS))?;

        let text = read_optional(&path)?.ok_or_else(|| StudyError::ModuleNotFound {
            subject: subject.to_string(),
            module: module.to_string(),
        })?;
        let mut doc: DocumentMut = text.parse()?;
        context::set_feature(&mut doc, kind, enabled);
        write_file(&path, &doc.to_string())
    }

    /// Render a component through the subject's `template.html`
    pub fn render_component(&self, subject: &str, component: &GeneratedComponent) -> Result<String> {
        let dir = self.existing_subject_dir(subject)?;
        let template = match read_optional(&dir.join(TEMPLATE_FILE))? {
            Some(template) => template,
            None => {
                warn!(subject, "template.html missing, using the built-in template");
                folio::COMPONENT_TEMPLATE.to_string()
            }
        };
        Ok(folio::render_component(&template, component))
    }

    /// Write a rendered component page under `components/` and return its path
    pub fn save_component(&self, subject: &str, name: &str, component: &GeneratedComponent) -> Result<PathBuf> {
        let page = self.render_component(subject, component)?;
        let dir = self.subject_dir(subject)?.join(COMPONENTS_DIR);
        fs::create_dir_all(&dir).map_err(|e| StudyError::persistence(&dir, e))?;

        let slug = slugify(name);
        let file_name = if slug.is_empty() { "component".to_string() } else { slug };
        let path = dir.join(format!("{}.html", file_name));
        write_file(&path, &page)?;
        Ok(path)
    }

    /// Generate a standalone study page for a subject or module
    pub fn write_artifact(&self, subject: &str, module: Option<&str>) -> Result<PathBuf> {
        let subject_context = self.subject_context(subject)?;
        let (page, dir) = match module {
            Some(module) => {
                let module_context = self.module_context(subject, module)?;
                (
                    folio::render_study_page(&subject_context, Some(&module_context)),
                    self.module_dir(subject, module)?,
                )
            }
            None => (
                folio::render_study_page(&subject_context, None),
                self.subject_dir(subject)?,
            ),
        };

        let path = dir.join(ARTIFACT_FILE);
        write_file(&path, &page)?;
        info!(subject, path = %path.display(), "wrote study page");
        Ok(path)
    }

    fn existing_subject_dir(&self, subject: &str) -> Result<PathBuf> {
        let dir = self.subject_dir(subject)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StudyError::SubjectNotFound(subject.to_string()))
        }
    }

    /// The subject's context document, or a fresh one if the file is gone
    fn subject_document(&self, dir: &Path, subject: &str) -> Result<DocumentMut> {
        match read_optional(&dir.join(CONTEXT_FILE))? {
            Some(text) => Ok(text.parse()?),
            None => Ok(SubjectContext::new(subject, "").to_document()),
        }
    }
}

/// Walk `base_path` into subject -> {context, modules -> {topics}}.
/// Never fails: absent or malformed pieces are reported as empty.
pub fn load_structure(base_path: &Path) -> Structure {
    let mut structure = Structure::new();

    for (name, dir) in child_dirs(base_path) {
        let context = read_lenient(&dir.join(CONTEXT_FILE), SubjectContext::parse);
        let syllabus = read_optional(&dir.join(SYLLABUS_FILE)).ok().flatten();

        let mut modules = std::collections::BTreeMap::new();
        for (module_name, module_dir) in child_dirs(&dir) {
            if module_name == COMPONENTS_DIR {
                continue;
            }
            let module_context = read_lenient(&module_dir.join(CONTEXT_FILE), ModuleContext::parse);
            let topics = module_context
                .as_ref()
                .map(|c| c.topics.clone())
                .unwrap_or_default();
            modules.insert(
                module_name,
                ModuleEntry {
                    context: module_context,
                    syllabus: read_optional(&module_dir.join(SYLLABUS_FILE)).ok().flatten(),
                    topics,
                },
            );
        }

        structure.insert(
            name,
            SubjectEntry {
                context,
                syllabus,
                modules,
            },
        );
    }

    structure
}

fn child_dirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            (!name.starts_with('.')).then_some((name, path))
        })
        .collect();
    dirs.sort();
    dirs
}

fn read_lenient<T>(path: &Path, parse: impl Fn(&str) -> Result<T>) -> Option<T> {
    let text = read_optional(path).ok().flatten()?;
    match parse(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable context record");
            None
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StudyError::persistence(path, e)),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| StudyError::persistence(path, e))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| StudyError::persistence(path, e))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_file(path, contents)
}
