//! Lintel CLI - Command-line interface for the Lintel validation engine

mod commands;
mod logger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, cleanse, validate};

#[derive(Parser)]
#[command(name = "lintel")]
#[command(about = "Validate and repair BIM element graphs", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model against a rule configuration
    Validate {
        /// Path to model file
        model: String,

        /// Path to engine configuration
        #[arg(long)]
        config: String,

        /// Apply actions and save the model
        #[arg(long)]
        fix: bool,

        /// Preview actions without saving
        #[arg(long)]
        dry_run: bool,

        /// Show diff of changes
        #[arg(long)]
        output_diff: bool,

        /// Report relation cycles and dangling relations
        #[arg(long)]
        strict: bool,

        /// Root element key (repeatable); defaults to the model's roots
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Compile a configuration and summarize it
    Check {
        /// Path to engine configuration
        config: String,
    },

    /// Remove every parameter whose name starts with a prefix
    Cleanse {
        /// Path to model file
        model: String,

        /// Parameter name prefix to remove
        #[arg(long, default_value = "")]
        prefix: String,

        /// Save the cleansed model
        #[arg(long)]
        fix: bool,

        /// Show diff of changes
        #[arg(long)]
        output_diff: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Commands::Validate {
            model,
            config,
            fix,
            dry_run,
            output_diff,
            strict,
            roots,
            format,
        } => validate::run(validate::ValidateArgs {
            model,
            config,
            fix,
            dry_run,
            output_diff,
            strict,
            roots,
            format,
        }),
        Commands::Check { config } => check::run(&config),
        Commands::Cleanse {
            model,
            prefix,
            fix,
            output_diff,
        } => cleanse::run(cleanse::CleanseArgs {
            model,
            prefix,
            fix,
            output_diff,
        }),
    }
}
