use crate::cli::ConfigCommands;
use crate::config;
use crate::error::{Result, StudyError};
use crate::ui;
use std::path::Path;

/// Run config subcommands
pub fn run_config(config_override: Option<&Path>, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show_config(config_override),
        ConfigCommands::Validate => validate_config(config_override),
        ConfigCommands::Path => print_path(config_override),
    }
}

fn show_config(config_override: Option<&Path>) -> Result<()> {
    let config = config::load_config(config_override)?;
    let redacted = config::redact_config(&config);
    let content = toml::to_string_pretty(&redacted)
        .map_err(|e| StudyError::Config(format!("Failed to serialize config: {}", e)))?;
    println!("{}", content);
    Ok(())
}

fn validate_config(config_override: Option<&Path>) -> Result<()> {
    let config = config::load_config(config_override)?;

    match config.validate() {
        Ok(warnings) => {
            for warning in warnings {
                ui::print_warning(&warning);
            }
            ui::print_success("Config is valid");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                ui::print_error(error);
            }
            Err(StudyError::ConfigInvalid(format!(
                "{} problem(s) found",
                errors.len()
            )))
        }
    }
}

fn print_path(config_override: Option<&Path>) -> Result<()> {
    let path = match config_override {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}
