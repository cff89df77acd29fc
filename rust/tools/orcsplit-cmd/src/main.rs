use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "orcsplit-cmd")]
#[command(about = "Command-line utility for split-aware ORC metadata operations")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON file with reader options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the file tail: stripes, schema and file properties
    Inspect {
        /// Path to the ORC file
        file: String,
    },

    /// Divide the file into byte-range splits and show the stripes each one reads
    Splits {
        /// Split size in bytes
        #[arg(long)]
        split_size: u64,

        /// Path to the ORC file
        file: String,
    },

    /// Count the rows of a split (the whole file by default)
    Count {
        /// Split start offset
        #[arg(long, default_value_t = 0)]
        start: u64,

        /// Split length in bytes (to the end of the file if not specified)
        #[arg(long)]
        length: Option<u64>,

        /// Path to the ORC file
        file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let options = commands::load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { file } => commands::inspect::run(file, options),
        Commands::Splits { split_size, file } => commands::splits::run(file, split_size, options),
        Commands::Count {
            start,
            length,
            file,
        } => commands::count::run(file, start, length, options),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp(None);
    let _ = builder.try_init();
}
