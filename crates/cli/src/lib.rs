pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "intake",
    about = "Real-estate intake operator CLI",
    long_about = "Inspect configuration, check readiness, validate client records and run an offline intake smoke test.",
    after_help = "Examples:\n  intake doctor --json\n  intake config\n  intake validate client.json\n  intake smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run a scripted offline intake session with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM readiness, voice server and field schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate a JSON client record and print its summary or open questions")]
    Validate {
        #[arg(help = "Path to a JSON object of collected client fields")]
        file: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Validate { file } => commands::validate::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
