use crate::config::{self, Config};
use crate::error::Result;
use crate::ui;
use std::path::Path;

/// Run the init command
pub fn run_init(config_override: Option<&Path>, force: bool) -> Result<()> {
    let config_path = match config_override {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };

    if config_path.exists() && !force {
        ui::print_warning(&format!(
            "Config file already exists at {}",
            config_path.display()
        ));
        ui::print_info("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    config::save_config_to(&config, &config_path)?;

    ui::print_success(&format!(
        "Created config file at {}",
        config_path.display()
    ));
    match config::secrets_path() {
        Ok(secrets) => ui::print_info(&format!(
            "Set {} (or add it to {}) to enable generation",
            config.gemini.api_key_env,
            secrets.display()
        )),
        Err(_) => ui::print_info(&format!(
            "Set {} to enable generation",
            config.gemini.api_key_env
        )),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run_init(Some(&path), false).unwrap();
        let config = config::load_config(Some(&path)).unwrap();
        assert_eq!(config.gemini.api_key_env, "GOOGLE_API_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gemini]\nmodel = \"custom\"\n").unwrap();

        run_init(Some(&path), false).unwrap();
        assert_eq!(config::load_config(Some(&path)).unwrap().gemini.model, "custom");

        run_init(Some(&path), true).unwrap();
        assert_eq!(
            config::load_config(Some(&path)).unwrap().gemini.model,
            "gemini-flash-latest"
        );
    }
}
