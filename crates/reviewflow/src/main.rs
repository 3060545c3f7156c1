//! Reviewflow command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reviewflow::config::default_config_path;
use reviewflow_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "reviewflow", about = "Content review routing and archival pipeline")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.reviewflow/config.toml)
    #[arg(short = 'c', long, global = true, env = "REVIEWFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the intake and routing loops until Ctrl-C
    Run,

    /// Run one intake cycle
    Intake {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one routing pass
    Route {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Archive finished rows and files into a sprint folder
    Archive {
        /// Sprint name; also the archive folder name
        sprint: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the processing log, newest first
    Log {
        /// Only entries for this file
        #[arg(long)]
        file_id: Option<String>,

        /// Only this action (intake, intake_skipped, route_secondary_review, ...)
        #[arg(long)]
        action: Option<String>,

        /// Only this status (success, error)
        #[arg(long)]
        status: Option<String>,

        /// Maximum entries to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Success and error counts per action
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config and create empty local tables and folders
    Init {
        /// Overwrite an existing config file with defaults
        #[arg(long)]
        force: bool,
    },
}

fn command_wants_json(cmd: &Commands) -> bool {
    match cmd {
        Commands::Intake { json }
        | Commands::Route { json }
        | Commands::Archive { json, .. }
        | Commands::Log { json, .. }
        | Commands::Stats { json } => *json,
        Commands::Run | Commands::Init { .. } => false,
    }
}

fn run_command(cli: Cli) -> Result<u8> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = match cli.command {
        Commands::Init { force: true } => reviewflow::ReviewflowConfig::default(),
        _ => cli::load_config(&config_path)?,
    };

    init_logging(LogConfig {
        app_name: "reviewflow",
        verbose: cli.verbose,
        log_dir: config.backends.log_dir.clone(),
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        match cli.command {
            Commands::Run => cli::run::run(&config).await.map(|()| 0),
            Commands::Intake { json } => cli::cycle::intake(&config, json).await.map(|()| 0),
            Commands::Route { json } => cli::cycle::route(&config, json).await.map(|()| 0),
            Commands::Archive { sprint, json } => cli::archive::run(&config, &sprint, json).await,
            Commands::Log {
                file_id,
                action,
                status,
                limit,
                json,
            } => cli::log::run(
                &config,
                cli::log::LogArgs {
                    file_id,
                    action,
                    status,
                    limit,
                    json,
                },
            )
            .await
            .map(|()| 0),
            Commands::Stats { json } => cli::stats::run(&config, json).await.map(|()| 0),
            Commands::Init { force } => cli::init::run(&config_path, &config, force).await.map(|()| 0),
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    match run_command(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if json_mode {
                let payload = serde_json::json!({ "error": format!("{:#}", err) });
                eprintln!("{}", payload);
            } else {
                eprint!("{}", cli::error::render(&err));
                eprintln!();
            }
            ExitCode::from(1)
        }
    }
}
