//! tmc command-line tool
//!
//! Parses names files, accumulates feature statistics over labeled data and
//! writes target-aligned, purely numeric copies of data files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tmc_logging::{init_logging, LogConfig};
use tracing::debug;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "tmc", about = "Target-aligned feature preparation for names/data files")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Configuration file (default: $TMC_HOME/config.toml when present)
    #[arg(long, global = true, env = "TMC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a names file and print the regenerated description
    Names {
        /// Names file to parse
        names: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Accumulate per-feature statistics over a labeled data file
    Stats {
        /// Names file describing the data columns
        names: PathBuf,

        /// Labeled data file
        data: PathBuf,

        /// Target label encoded as 0
        #[arg(long)]
        negative: Option<String>,

        /// Target label encoded as 1
        #[arg(long)]
        positive: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Derive a transform from training data and rewrite data files
    Transform {
        /// Names file describing the data columns
        names: PathBuf,

        /// Training data the transform is derived from (also rewritten)
        train: PathBuf,

        /// Additional data files to rewrite with the same transform
        #[arg(short = 'a', long = "apply")]
        apply: Vec<PathBuf>,

        /// Output directory (default: next to the training file)
        #[arg(short = 'o', long)]
        out_dir: Option<PathBuf>,

        /// Ignore continuous features with |correlation| at or below this value
        #[arg(long)]
        ignore_below: Option<f64>,

        /// Infix inserted into output file names (default: "transformed")
        #[arg(long)]
        suffix: Option<String>,

        /// Target label encoded as 0
        #[arg(long)]
        negative: Option<String>,

        /// Target label encoded as 1
        #[arg(long)]
        positive: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split weighted stock-prediction rows into balanced 0/1 example pairs
    Reweight {
        /// Data file whose last two columns are `weight,label`
        data: PathBuf,
    },

    /// Show resolved paths and effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(cmd: &Commands) -> bool {
    match cmd {
        Commands::Names { json, .. } => *json,
        Commands::Stats { json, .. } => *json,
        Commands::Transform { json, .. } => *json,
        Commands::Config { json } => *json,
        Commands::Reweight { .. } => false,
    }
}

/// Only the commands that read settings load the config file.
fn load_config(path: Option<&Path>) -> Result<cli::config::ResolvedConfig> {
    let config = cli::config::TmcConfig::resolve(path)?;
    debug!(source = ?config.source, "resolved configuration");
    Ok(config)
}

fn run_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Names { names, json } => cli::names::run(cli::names::NamesArgs { names, json }),
        Commands::Stats {
            names,
            data,
            negative,
            positive,
            json,
        } => cli::stats::run(
            cli::stats::StatsArgs {
                names,
                data,
                negative,
                positive,
                json,
            },
            &load_config(config_path)?.config,
        ),
        Commands::Transform {
            names,
            train,
            apply,
            out_dir,
            ignore_below,
            suffix,
            negative,
            positive,
            json,
        } => cli::transform::run(
            cli::transform::TransformArgs {
                names,
                train,
                apply,
                out_dir,
                ignore_below,
                suffix,
                negative,
                positive,
                json,
            },
            &load_config(config_path)?.config,
        ),
        Commands::Reweight { data } => cli::reweight::run(cli::reweight::ReweightArgs { data }),
        Commands::Config { json } => {
            cli::config::run(cli::config::ConfigArgs { json }, &load_config(config_path)?)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let _log_guard = match init_logging(LogConfig {
        app_name: "tmc",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
