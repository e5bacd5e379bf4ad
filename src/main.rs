mod cli_logger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use cli_logger::CliLogger;
use proftrack::{
    CollectCommand, DEFAULT_OUTPUT_ROOT, GoToolchain, InspectCommand, Settings,
    ToolsCommand, TrackCommand, collect_command, inspect_command, tools_command, track_command,
};

const LOG_ENV: &str = "PROFTRACK_LOG";

#[derive(Debug, Parser)]
#[command(name = "proftrack", version, about = "Collect Go benchmark profiles and track regressions between runs")]
struct Cli {
    /// Machine-readable output.
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    no_color: bool,
    /// Config file (default: config_template.json at the module root).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT_ROOT)]
    output_root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect profiles into a tag.
    Collect {
        #[command(subcommand)]
        command: CollectCommand,
    },
    /// Compare profiles and apply the regression gate.
    Track {
        #[command(subcommand)]
        command: TrackCommand,
    },
    /// List benchmarks, tags, collected profiles, or the configuration.
    Inspect {
        #[command(subcommand)]
        command: InspectCommand,
    },
    /// benchstat and callgrind helpers.
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);
    let logger = CliLogger::new(cli.json, cli.no_color);
    match run(&cli, &logger) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let fallback = if json { "warn" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, logger: &CliLogger) -> Result<u8> {
    let settings = Settings::resolve(
        cli.output_root.clone(),
        cli.config.clone(),
        std::env::current_dir()?,
    );
    let config = settings.load_config()?;
    let toolchain = GoToolchain::default();

    match &cli.command {
        Command::Collect { command } => {
            let out = collect_command(&config, &settings, &toolchain, command)?;
            logger.print_serialized(&out)?;
            Ok(0)
        }
        Command::Track { command } => {
            let outcome = track_command(&config, &settings, command)?;
            logger.print_track(&outcome)?;
            Ok(outcome.exit_code())
        }
        Command::Inspect { command } => {
            let out = inspect_command(&settings, command)?;
            logger.print_serialized(&out)?;
            Ok(0)
        }
        Command::Tools { command } => {
            let out = tools_command(&settings, &toolchain, command)?;
            logger.print_serialized(&out)?;
            Ok(0)
        }
    }
}
