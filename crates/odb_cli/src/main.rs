//! ODB CLI
//!
//! Command-line tools for ODB columnar record files.
//!
//! # Commands
//!
//! - `strings` - Build the string dictionary from sorted, unique lines
//! - `encode` - Encode delimited text to ODB format
//! - `decode` - Decode ODB records to delimited text
//! - `print` - Print ODB records as a table
//! - `cat` (`cut`) - Output fields and records from files with like schemas
//! - `paste` - Paste the fields of different files side by side
//! - `sort` - Sort files in place by the given fields and merge them
//! - `schema` - Display the header of ODB files
//!
//! Binary output written to a terminal is shown through `odb print`; text
//! output goes through a pager.

mod codec;
mod commands;
mod options;
mod output;

use clap::{Parser, Subcommand};
use options::{inputs_or_stdin, Options};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// ODB columnar record tools.
#[derive(Parser)]
#[command(name = "odb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the string dictionary (-s) from sorted, unique lines
    Strings {
        /// Text files, one string per line
        files: Vec<PathBuf>,
    },

    /// Encode delimited text with the schema given by -f
    Encode {
        /// Output the text of string fields instead, one per line
        #[arg(short = 'x', long)]
        extract: bool,

        /// Delimited text files
        files: Vec<PathBuf>,
    },

    /// Decode records to delimited text
    Decode {
        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Print records in tabular format
    Print {
        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Output data from files with like schemas
    #[command(alias = "cut")]
    Cat {
        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Paste fields from different files
    Paste {
        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Sort by the fields given by -f (in place), then merge
    Sort {
        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Display file schemas
    Schema {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// ODB files
        files: Vec<PathBuf>,
    },

    /// Show version information
    Version,
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let options = &cli.options;
    match cli.command {
        Commands::Strings { files } => {
            let stats = commands::strings::run(&inputs_or_stdin(&files), &options.strings)?;
            if options.verbose {
                eprintln!(
                    "{}: {} strings, longest {} bytes",
                    options.strings.display(),
                    stats.count,
                    stats.max_string_length
                );
            }
        }
        Commands::Encode { extract, files } => {
            commands::encode::run(&inputs_or_stdin(&files), extract, options)?;
        }
        Commands::Decode { files } => {
            commands::decode::run(&inputs_or_stdin(&files), false, options)?;
        }
        Commands::Print { files } => {
            commands::decode::run(&inputs_or_stdin(&files), true, options)?;
        }
        Commands::Cat { files } => {
            commands::cat::run(&inputs_or_stdin(&files), options)?;
        }
        Commands::Paste { files } => {
            commands::paste::run(&inputs_or_stdin(&files), options)?;
        }
        Commands::Sort { files } => {
            commands::sort::run(&inputs_or_stdin(&files), options)?;
        }
        Commands::Schema { format, files } => {
            commands::schema::run(&inputs_or_stdin(&files), &format)?;
        }
        Commands::Version => {
            println!("ODB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ODB Core v{}", odb_core::VERSION);
        }
    }
    Ok(())
}

/// True if the error was caused by the reader of our output going away.
fn is_broken_pipe(err: &(dyn Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(err) = source {
        let io_err = err
            .downcast_ref::<io::Error>()
            .or_else(|| match err.downcast_ref::<odb_core::CoreError>() {
                Some(odb_core::CoreError::Io(e)) => Some(e),
                _ => None,
            });
        if io_err.is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe) {
            return true;
        }
        source = err.source();
    }
    false
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout may carry binary records. Successful runs
    // are silent unless verbose.
    let filter = if cli.options.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(err.as_ref()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("odb: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
