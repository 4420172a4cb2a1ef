mod config_cmd;
mod init;
mod modules;
mod study;
mod subjects;

pub use config_cmd::run_config;
pub use init::run_init;
pub use modules::run_modules;
pub use study::{run_create, run_export, run_generate, run_quiz, run_structure, run_topics, GenerateKind};
pub use subjects::run_subjects;

use crate::config::Config;
use crate::error::{Result, StudyError};
use crate::gemini::{ContentGenerator, ModelProvider};
use crate::store::Store;
use crate::ui;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "study")]
#[command(author, version, about = "Turn syllabi into explanations, quizzes, concept maps and a web-folio")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (can repeat: -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Log format: text (default) or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage subjects
    Subject {
        #[command(subcommand)]
        command: SubjectCommands,
    },

    /// Manage modules within a subject
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// List a module's topics, or extract topics from the subject syllabus
    Topics {
        subject: String,

        #[arg(long, short)]
        module: Option<String>,
    },

    /// Explain a topic
    Explain {
        subject: String,
        topic: String,

        #[arg(long, short)]
        module: Option<String>,

        /// Save the result into the subject's web-folio
        #[arg(long)]
        save: bool,
    },

    /// Generate a concept map (Graphviz DOT) for a topic
    Map {
        subject: String,
        topic: String,

        #[arg(long, short)]
        module: Option<String>,

        /// Save the result into the subject's web-folio
        #[arg(long)]
        save: bool,
    },

    /// Generate mnemonics for a topic
    Mnemonics {
        subject: String,
        topic: String,

        #[arg(long, short)]
        module: Option<String>,

        /// Save the result into the subject's web-folio
        #[arg(long)]
        save: bool,
    },

    /// Generate an interactive quiz for a topic
    Quiz {
        subject: String,
        topic: String,

        #[arg(long, short)]
        module: Option<String>,

        /// Save the quiz into the subject's web-folio
        #[arg(long)]
        save: bool,

        /// Write the rendered quiz page to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Generate a free-form interactive component
    Create {
        subject: String,
        request: String,

        /// Write the rendered page to this file instead of the subject's components/
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Write a standalone study page for a subject or module
    Export {
        subject: String,

        #[arg(long, short)]
        module: Option<String>,
    },

    /// Show every subject, module and topic on disk
    Structure {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Create a subject
    New {
        name: String,

        /// Read the syllabus from this file
        #[arg(long, value_name = "FILE")]
        syllabus: Option<PathBuf>,

        #[arg(long)]
        description: Option<String>,
    },

    /// List subjects
    List,

    /// Add or replace a cross-module concept note
    Note {
        subject: String,
        concept: String,
        note: String,
    },
}

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Create a module and extract its topics
    New {
        subject: String,
        module: String,

        /// Read the syllabus from this file
        #[arg(long, value_name = "FILE")]
        syllabus: Option<PathBuf>,
    },

    /// Switch a generation feature on or off for a module
    Feature {
        subject: String,
        module: String,

        /// explanation, quiz, visual_map, mnemonics or component
        kind: String,

        #[arg(long, conflicts_with = "off", required_unless_present = "off")]
        on: bool,

        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show config (secrets redacted)
    Show,

    /// Validate config file
    Validate,

    /// Print config file path
    Path,
}

/// Store for the configured base path and policy
pub(crate) fn open_store(config: &Config) -> Store {
    Store::from_config(&config.store)
}

/// Generator backed by the configured Gemini model
pub(crate) fn open_generator(config: &Config) -> ContentGenerator {
    ContentGenerator::new(ModelProvider::new(&config.gemini))
}

/// Syllabus text from `--syllabus`, or typed into the editor when interactive
pub(crate) fn read_syllabus(path: Option<&Path>, what: &str) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|e| StudyError::persistence(path, e)),
        None if ui::is_interactive() => ui::prompt_editor(&format!("Syllabus for {}:", what)),
        None => Err(StudyError::Config(
            "Syllabus required (use --syllabus FILE)".to_string(),
        )),
    }
}
