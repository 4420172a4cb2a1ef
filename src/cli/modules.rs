use crate::cli::{open_generator, open_store, read_syllabus, ModuleCommands};
use crate::config::Config;
use crate::error::{Result, StudyError};
use crate::store::ContentKind;
use crate::ui;

/// Run module subcommands
pub async fn run_modules(config: &Config, command: ModuleCommands) -> Result<()> {
    match command {
        ModuleCommands::New {
            subject,
            module,
            syllabus,
        } => new_module(config, &subject, &module, syllabus.as_deref()).await,
        ModuleCommands::Feature {
            subject,
            module,
            kind,
            on,
            off,
        } => set_feature(config, &subject, &module, &kind, on && !off),
    }
}

async fn new_module(
    config: &Config,
    subject: &str,
    module: &str,
    syllabus: Option<&std::path::Path>,
) -> Result<()> {
    let store = open_store(config);
    store.module_dir(subject, module)?;
    let syllabus = read_syllabus(syllabus, module)?;
    let mut generator = open_generator(config);

    let spinner = ui::Spinner::new("Extracting topics...");
    let context = match store.initialize_module(&mut generator, subject, module, &syllabus).await {
        Ok(context) => {
            spinner.finish_and_clear();
            context
        }
        Err(e) => {
            spinner.finish_with_error(&e.to_string());
            return Err(e);
        }
    };

    if context.topics.is_empty() {
        ui::print_warning("No topics were extracted; the module was created without any");
    } else {
        ui::print_heading(&format!("{} / {}", subject, module));
        for (index, (_, name)) in context.topics.iter().enumerate() {
            println!("{:>3}. {}", index + 1, name);
        }
        ui::print_blank();
    }
    ui::print_success(&format!(
        "Created module '{}' with {} topic(s)",
        module,
        context.topics.len()
    ));
    Ok(())
}

fn set_feature(config: &Config, subject: &str, module: &str, kind: &str, enabled: bool) -> Result<()> {
    let kind: ContentKind = kind.parse().map_err(StudyError::Config)?;
    open_store(config).set_feature(subject, module, kind, enabled)?;

    let state = if enabled { "on" } else { "off" };
    ui::print_success(&format!("Switched {} {} for {}/{}", kind.label(), state, subject, module));
    Ok(())
}
