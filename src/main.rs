mod cli;
mod config;
mod error;
mod gemini;
mod store;
mod ui;

use clap::Parser;
use cli::{Cli, Commands, GenerateKind};
use config::{Config, LogFormat, Settings};
use error::{ExitStatus, StudyError};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    ui::set_quiet_mode(cli.quiet);

    // Logging needs the settings table, so a broken config is reported after setup
    let loaded = config::load_config(cli.config.as_deref());
    let settings = loaded.as_ref().map(|c| c.settings.clone()).unwrap_or_default();
    setup_logging(cli.verbose, cli.quiet, cli.log_format.as_deref(), &settings);

    // init must work even when the existing file is broken
    let init_force = match &cli.command {
        Some(Commands::Init { force }) => Some(*force),
        _ => None,
    };

    let result = match (init_force, loaded) {
        (Some(force), _) => cli::run_init(cli.config.as_deref(), force).map(|_| ExitStatus::Success),
        (None, Ok(config)) => run_command(cli, config).await,
        (None, Err(e)) => Err(e),
    };

    match result {
        Ok(status) => status.into(),
        Err(e) => {
            ui::print_error(&e.to_string());
            e.exit_status().into()
        }
    }
}

async fn run_command(cli: Cli, config: Config) -> Result<ExitStatus, StudyError> {
    let config_override = cli.config.as_deref();

    match cli.command {
        Some(Commands::Init { force }) => cli::run_init(config_override, force)?,

        Some(Commands::Config { command }) => cli::run_config(config_override, command)?,

        Some(Commands::Subject { command }) => cli::run_subjects(&config, command)?,

        Some(Commands::Module { command }) => cli::run_modules(&config, command).await?,

        Some(Commands::Topics { subject, module }) => {
            cli::run_topics(&config, &subject, module.as_deref()).await?
        }

        Some(Commands::Explain {
            subject,
            topic,
            module,
            save,
        }) => {
            cli::run_generate(&config, GenerateKind::Explain, &subject, &topic, module.as_deref(), save)
                .await?
        }

        Some(Commands::Map {
            subject,
            topic,
            module,
            save,
        }) => {
            cli::run_generate(&config, GenerateKind::Map, &subject, &topic, module.as_deref(), save)
                .await?
        }

        Some(Commands::Mnemonics {
            subject,
            topic,
            module,
            save,
        }) => {
            cli::run_generate(&config, GenerateKind::Mnemonics, &subject, &topic, module.as_deref(), save)
                .await?
        }

        Some(Commands::Quiz {
            subject,
            topic,
            module,
            save,
            out,
        }) => {
            cli::run_quiz(&config, &subject, &topic, module.as_deref(), save, out.as_deref()).await?
        }

        Some(Commands::Create { subject, request, out }) => {
            cli::run_create(&config, &subject, &request, out.as_deref()).await?
        }

        Some(Commands::Export { subject, module }) => {
            cli::run_export(&config, &subject, module.as_deref())?
        }

        Some(Commands::Structure { json }) => cli::run_structure(&config, json)?,

        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().ok();
        }
    }

    Ok(ExitStatus::Success)
}

fn setup_logging(verbose: u8, quiet: bool, format: Option<&str>, settings: &Settings) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => settings.log_level.as_filter(),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let json = match format {
        Some(format) => format.eq_ignore_ascii_case("json"),
        None => settings.log_format == LogFormat::Json,
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().without_time().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
