mod driver;
mod listing;
mod sweep;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "shardvm", about = "Bytecode VM password challenge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for the secret phrase and verify it (default).
    Check,
    /// Print a listing of the generated verification program.
    Disasm {
        /// Also print the raw program bytes.
        #[arg(long)]
        hex: bool,
    },
    /// Run every single-character mutation and prefix of a phrase.
    Sweep {
        #[arg(short, long)]
        phrase: String,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => driver::run_check(),
        Commands::Disasm { hex } => {
            listing::print_listing(hex)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sweep { phrase } => {
            sweep::run_sweep(phrase.as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
