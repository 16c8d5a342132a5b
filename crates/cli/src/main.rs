// caselink CLI - headless missing / unidentified person record linkage

mod exit_codes;
mod link;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "caselink")]
#[command(about = "Rank candidate matches between missing and unidentified person records")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a linkage sweep from a TOML config file
    #[command(after_help = "\
Examples:
  caselink run linkage.toml
  caselink run linkage.toml --json
  caselink run linkage.toml --output result.json
  caselink run linkage.toml --out-dir /srv/sweeps/2024-06 --threads 8")]
    Run {
        /// Path to the linkage .toml config file
        config: PathBuf,

        /// Also print the JSON result to stdout (the summary stays on stderr)
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write artifacts here instead of the config's output.dir
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Worker threads (overrides the config's `threads`)
        #[arg(long, env = "CASELINK_THREADS")]
        threads: Option<usize>,

        /// Skip writing artifact files
        #[arg(long)]
        no_artifacts: bool,
    },

    /// Validate a linkage config without running
    #[command(after_help = "\
Examples:
  caselink validate linkage.toml")]
    Validate {
        /// Path to the linkage .toml config file
        config: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: caselink <command> [options]");
            eprintln!("       caselink --help for more information");
            Ok(())
        }
        Some(Commands::Run { config, json, output, out_dir, threads, no_artifacts }) => {
            link::cmd_run(link::RunArgs {
                config_path: config,
                json_output: json,
                output_file: output,
                out_dir,
                threads,
                write_artifacts: !no_artifacts,
            })
        }
        Some(Commands::Validate { config }) => link::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
