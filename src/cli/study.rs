use crate::cli::{open_generator, open_store};
use crate::config::Config;
use crate::error::{Result, StudyError};
use crate::gemini::{ContentGenerator, GeneratedComponent, StudyContext, FALLBACK_MAP, MODEL_UNAVAILABLE};
use crate::store::{slugify, ContentKind, FolioUpdate, ModuleContext, Store, SubjectContext};
use crate::ui;
use std::fs;
use std::path::Path;

/// Text generators reachable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateKind {
    Explain,
    Map,
    Mnemonics,
}

impl GenerateKind {
    fn content_kind(self) -> ContentKind {
        match self {
            GenerateKind::Explain => ContentKind::Explanation,
            GenerateKind::Map => ContentKind::VisualMap,
            GenerateKind::Mnemonics => ContentKind::Mnemonics,
        }
    }
}

/// Run explain, map or mnemonics for one topic
pub async fn run_generate(
    config: &Config,
    kind: GenerateKind,
    subject: &str,
    topic: &str,
    module: Option<&str>,
    save: bool,
) -> Result<()> {
    let store = open_store(config);
    let (context, topic) = prepare(&store, subject, topic, module, kind.content_kind())?;
    let mut generator = open_generator(config);

    let spinner = ui::Spinner::new(&format!("Generating {} for {}...", kind.content_kind().label(), topic));
    let result = match kind {
        GenerateKind::Explain => generator.explain(&topic, &context).await,
        GenerateKind::Map => generator.visual_map(&topic, &context).await,
        GenerateKind::Mnemonics => generator.mnemonics(&topic).await,
    };
    spinner.finish_and_clear();
    let content = result?;

    if content == MODEL_UNAVAILABLE {
        return Err(StudyError::ModelUnavailable);
    }
    println!("{}", content);

    if !save {
        return Ok(());
    }
    if content == FALLBACK_MAP {
        ui::print_warning("No concept map could be generated; nothing was saved");
        return Ok(());
    }
    save_to_folio(&store, &mut generator, subject, &topic, &content, kind.content_kind()).await
}

/// Generate a quiz component for one topic
pub async fn run_quiz(
    config: &Config,
    subject: &str,
    topic: &str,
    module: Option<&str>,
    save: bool,
    out: Option<&Path>,
) -> Result<()> {
    let store = open_store(config);
    let (_, topic) = prepare(&store, subject, topic, module, ContentKind::Quiz)?;
    let mut generator = open_generator(config);

    let spinner = ui::Spinner::new(&format!("Building a quiz on {}...", topic));
    let result = generator.quiz(&topic).await;
    spinner.finish_and_clear();
    let component = result?.ok_or_else(no_component)?;

    write_component(&store, subject, &format!("{} quiz", topic), &component, out)?;
    if save {
        let update = store
            .save_component_to_folio(subject, &topic, &component, ContentKind::Quiz)
            .await?;
        report_saved(&update, ContentKind::Quiz, &topic);
    }
    Ok(())
}

/// Generate a free-form component for a subject
pub async fn run_create(config: &Config, subject: &str, request: &str, out: Option<&Path>) -> Result<()> {
    let store = open_store(config);
    store.subject_context(subject)?;
    let mut generator = open_generator(config);

    let spinner = ui::Spinner::new("Building component...");
    let result = generator.creative_component(request).await;
    spinner.finish_and_clear();
    let component = result?.ok_or_else(no_component)?;

    write_component(&store, subject, request, &component, out)
}

/// List stored module topics, or extract topics from the subject syllabus
pub async fn run_topics(config: &Config, subject: &str, module: Option<&str>) -> Result<()> {
    let store = open_store(config);

    if let Some(module) = module {
        let context = store.module_context(subject, module)?;
        if context.topics.is_empty() {
            ui::print_info("This module has no topics");
        }
        for (slug, name) in &context.topics {
            println!("{:<40} {}", name, slug);
        }
        return Ok(());
    }

    let syllabus = store
        .subject_syllabus(subject)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StudyError::Config(format!("Subject '{}' has no syllabus", subject)))?;
    let mut generator = open_generator(config);

    let spinner = ui::Spinner::new("Extracting topics...");
    let result = generator.extract_topics(&syllabus).await;
    spinner.finish_and_clear();

    let Some(extracted) = result? else {
        ui::print_warning("No topics could be extracted");
        return Ok(());
    };
    for (index, topic) in extracted.topics.iter().enumerate() {
        println!("{:>3}. {}", index + 1, topic.name);
        if !topic.summary.trim().is_empty() {
            println!("     {}", topic.summary.trim());
        }
    }
    Ok(())
}

/// Write a standalone study page
pub fn run_export(config: &Config, subject: &str, module: Option<&str>) -> Result<()> {
    let path = open_store(config).write_artifact(subject, module)?;
    ui::print_success(&format!("Wrote {}", path.display()));
    Ok(())
}

/// Print the subject/module/topic hierarchy
pub fn run_structure(config: &Config, json: bool) -> Result<()> {
    let structure = open_store(config).load_structure();

    if json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
        return Ok(());
    }

    if structure.is_empty() {
        ui::print_info("No subjects yet");
        return Ok(());
    }
    for (subject, entry) in &structure {
        println!("{}", subject);
        for (module, module_entry) in &entry.modules {
            println!("  {}", module);
            for (_, topic) in &module_entry.topics {
                println!("    - {}", topic);
            }
        }
    }
    Ok(())
}

/// Check the subject, module and feature switch; build the prompt context
/// and resolve the topic name.
fn prepare(
    store: &Store,
    subject: &str,
    topic: &str,
    module: Option<&str>,
    kind: ContentKind,
) -> Result<(StudyContext, String)> {
    let subject_context = store.subject_context(subject)?;
    let module_context = match module {
        Some(module) => {
            let context = store.module_context(subject, module)?;
            ensure_feature(&context, kind)?;
            Some(context)
        }
        None => None,
    };

    let topic = resolve_topic(module_context.as_ref(), topic);
    let context = study_context(&subject_context, module_context.as_ref(), &topic);
    Ok((context, topic))
}

fn ensure_feature(module: &ModuleContext, kind: ContentKind) -> Result<()> {
    if module.feature_enabled(kind) {
        Ok(())
    } else {
        Err(StudyError::FeatureDisabled {
            feature: kind.to_string(),
            module: module.name.clone(),
        })
    }
}

/// Map a topic slug or loosely typed name onto the module's stored name
fn resolve_topic(module: Option<&ModuleContext>, topic: &str) -> String {
    module
        .and_then(|m| m.topic_name(&slugify(topic)))
        .map(str::to_string)
        .unwrap_or_else(|| topic.trim().to_string())
}

fn study_context(subject: &SubjectContext, module: Option<&ModuleContext>, topic: &str) -> StudyContext {
    StudyContext {
        subject: subject.name.clone(),
        description: Some(subject.description.clone()).filter(|d| !d.trim().is_empty()),
        module: module.map(|m| m.name.clone()),
        topic_summary: module
            .and_then(|m| m.topic_summary(&slugify(topic)))
            .map(str::to_string),
        concepts: subject.concepts.clone(),
    }
}

fn no_component() -> StudyError {
    StudyError::Model("the model did not return a usable component".to_string())
}

fn write_component(
    store: &Store,
    subject: &str,
    name: &str,
    component: &GeneratedComponent,
    out: Option<&Path>,
) -> Result<()> {
    let path = match out {
        Some(path) => {
            let page = store.render_component(subject, component)?;
            fs::write(path, page).map_err(|e| StudyError::persistence(path, e))?;
            path.to_path_buf()
        }
        None => store.save_component(subject, name, component)?,
    };
    ui::print_success(&format!("Wrote {}", path.display()));
    Ok(())
}

async fn save_to_folio(
    store: &Store,
    generator: &mut ContentGenerator,
    subject: &str,
    topic: &str,
    content: &str,
    kind: ContentKind,
) -> Result<()> {
    let spinner = ui::Spinner::new("Saving to web-folio...");
    let result = store.update_web_folio(generator, subject, topic, content, kind).await;
    spinner.finish_and_clear();

    report_saved(&result?, kind, topic);
    Ok(())
}

fn report_saved(update: &FolioUpdate, kind: ContentKind, topic: &str) {
    let action = if update.replaced { "Updated" } else { "Added" };
    ui::print_success(&format!("{} {} for '{}' in the web-folio", action, kind.label(), topic));
}
