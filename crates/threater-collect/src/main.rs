//! threater-collect - main entry point

use clap::Parser;
use std::process;
use threater_collect::commands::{self, Context};
use threater_collect::error::EXIT_OK;
use threater_collect::{parse_error_exit_code, CheckpointCommand, Cli, Commands};
use threater_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env before clap reads THREATER_* defaults
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = parse_error_exit_code(&e);
            let _ = e.print();
            process::exit(code);
        },
    };

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("threater-collect")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env().unwrap_or(log_config);

    // Collection works without logging; a broken LOG_* setting is only reported
    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    let code = match execute_command(&cli).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        },
    };

    // Flush the file appender before exiting
    drop(guard);
    process::exit(code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> threater_collect::Result<()> {
    let ctx = Context::load(cli.config.as_deref(), cli.state_dir())?;

    match &cli.command {
        Commands::Run {
            stream,
            output,
            max_pages,
        } => commands::collect::run(&ctx, stream, output.as_deref(), *max_pages)
            .await
            .map(|_| ()),

        Commands::RunEnabled { output } => commands::collect::run_enabled(&ctx, output.as_deref())
            .await
            .map(|_| ()),

        Commands::Streams => commands::streams::run(&ctx).await,

        Commands::Checkpoint { command } => match command {
            CheckpointCommand::Show { stream } => {
                commands::checkpoint::show(&ctx, stream).await.map(|_| ())
            },
            CheckpointCommand::Reset { stream } => {
                commands::checkpoint::reset(&ctx, stream).await.map(|_| ())
            },
        },

        Commands::Check => commands::check::run(&ctx).await,

        Commands::Health { output } => commands::health::run(&ctx, output.as_deref()).await,
    }
}
