//! tbl CLI - Command-line tools for table images.

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::ElemKind;
use logging::{TracingConfig, init_tracing};
use std::path::PathBuf;

/// tbl - Inspect, validate and build hybrid array/map table images.
#[derive(Parser)]
#[command(name = "tbl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Element kind of the outermost table
    #[arg(short, long, value_enum, default_value_t = ElemKind::F64, global = true)]
    elem: ElemKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe an image: header, segments, contents and nested tables
    Inspect {
        /// Path to the image file
        file: PathBuf,

        /// List every map slot with its probe statistics
        #[arg(long)]
        entries: bool,
    },

    /// Validate an image and every table embedded in it
    Validate {
        /// Path to the image file
        file: PathBuf,
    },

    /// Print one value from an image
    Get {
        /// Path to the image file
        file: PathBuf,

        /// Key to read
        key: String,

        /// Nested tables to descend through first (e.g. "a/b/c")
        #[arg(short, long)]
        path: Option<String>,

        /// Print the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build an image from a JSON document
    Pack {
        /// Path to the JSON document
        input: PathBuf,

        /// Path of the image to write
        output: PathBuf,

        /// Shrink every dimension to its contents before writing
        #[arg(long)]
        compact: bool,
    },

    /// Manage images in a directory store
    Store {
        /// Store directory
        #[arg(short, long)]
        dir: PathBuf,

        #[command(subcommand)]
        action: StoreAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StoreAction {
    /// Validate an image file and store it under a key
    Put {
        /// Blob key
        key: String,

        /// Path to the image file
        file: PathBuf,
    },

    /// Write the image stored under a key to a file
    Get {
        /// Blob key
        key: String,

        /// Path of the file to write
        file: PathBuf,
    },

    /// List stored keys
    List,

    /// Remove the image stored under a key
    Remove {
        /// Blob key
        key: String,
    },
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    init_tracing(&TracingConfig::from_env(filter))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Inspect { file, entries } => commands::inspect::run(&file, cli.elem, entries),
        Commands::Validate { file } => commands::validate::run(&file, cli.elem),
        Commands::Get {
            file,
            key,
            path,
            json,
        } => commands::get::run(&file, &key, path.as_deref(), cli.elem, json),
        Commands::Pack {
            input,
            output,
            compact,
        } => commands::pack::run(&input, &output, cli.elem, compact),
        Commands::Store { dir, action } => match action {
            StoreAction::Put { key, file } => commands::store::put(&dir, &key, &file, cli.elem),
            StoreAction::Get { key, file } => commands::store::get(&dir, &key, &file),
            StoreAction::List => commands::store::list(&dir),
            StoreAction::Remove { key } => commands::store::remove(&dir, &key),
        },
        Commands::Version => commands::version::run(),
    }
}
