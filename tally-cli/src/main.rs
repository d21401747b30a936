use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_ingest::HeaderFallback;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod config;
mod report;
mod state;

use commands::{AnalyzeArgs, Classifier};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("TALLY_BUILD_SHA"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    long_version = LONG_VERSION,
    about = "Clean, categorize, and summarize bank transaction exports"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.tally/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fail instead of guessing when description/amount headers are missing
    #[arg(long, global = true)]
    strict_headers: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Standardize a raw export and save the cleaned CSV
    Clean {
        /// Raw bank or card CSV
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "transactions_clean.csv")]
        output: PathBuf,
    },

    /// Label rows with the keyword rules
    Rules {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "transactions_labeled.csv")]
        output: PathBuf,

        /// TOML rules file (default: config, then built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Train the category model from hand-labeled rows
    Train {
        /// CSV with description_clean and manual_category columns
        #[arg(long, default_value = "data/transactions_labeled_final.csv")]
        data: PathBuf,

        #[arg(long, default_value = "models")]
        model_dir: PathBuf,
    },

    /// Categorize a statement and print spend analytics
    Analyze {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "transactions_categorized.csv")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Classifier::Model)]
        classifier: Classifier,

        /// Model artifact (default: model.path from config)
        #[arg(long)]
        model: Option<PathBuf>,

        /// TOML rules file for --classifier rules
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Rows to print before the summary
        #[arg(long, default_value_t = 25)]
        preview: usize,
    },

    /// Manage ~/.tally/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
    /// Print the config file location
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();

    let config_file = cli.config.as_deref();

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(config_file),
            ConfigCommand::Show => config::show_config(config_file),
            ConfigCommand::Path => {
                match config_file {
                    Some(p) => println!("{}", p.display()),
                    None => println!("{}", config::config_path()?.display()),
                }
                Ok(())
            }
        };
    }

    let mut cfg = config::load_config(config_file)?;
    if cli.strict_headers {
        cfg.ingest.header_fallback = HeaderFallback::Strict;
    }

    match cli.command {
        Command::Clean { input, output } => commands::cmd_clean(&cfg, &input, &output),
        Command::Rules {
            input,
            output,
            rules,
        } => commands::cmd_rules(&cfg, &input, &output, rules.as_deref()),
        Command::Train { data, model_dir } => {
            commands::cmd_train(&cfg, &data, &model_dir).map(|_| ())
        }
        Command::Analyze {
            input,
            output,
            classifier,
            model,
            rules,
            preview,
        } => commands::cmd_analyze(
            &cfg,
            AnalyzeArgs {
                input: &input,
                output: &output,
                classifier,
                model: model.as_deref(),
                rules: rules.as_deref(),
                preview,
            },
        ),
        Command::Config { .. } => Ok(()),
    }
}
