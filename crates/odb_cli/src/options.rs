//! Options shared by every command.

use crate::codec::FloatStyle;
use clap::Args;
use odb_core::{
    Config, Range, SlotOrdering, DEFAULT_DATE_FORMAT, DEFAULT_STRINGS_PATH,
    DEFAULT_TIMESTAMP_FORMAT,
};
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

/// Options accepted before or after the command name.
#[derive(Debug, Args)]
pub struct Options {
    /// Use FILE as the string dictionary
    #[arg(short, long, global = true, value_name = "FILE", default_value = DEFAULT_STRINGS_PATH)]
    pub strings: PathBuf,

    /// Delimit fields by CHAR
    #[arg(short, long, global = true, value_name = "CHAR", default_value = "\t")]
    pub delim: String,

    /// Comma-separated fields (schema, cut or sort keys)
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    pub fields: Option<String>,

    /// Output a range slice of records (start:step:stop)
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    pub range: Option<Range>,

    /// Output at most N records per input
    #[arg(short = 'n', long, global = true, value_name = "N")]
    pub count: Option<u64>,

    /// Output with line numbers, starting at START
    #[arg(
        short = 'N',
        long,
        global = true,
        value_name = "START",
        num_args = 0..=1,
        default_missing_value = "1",
        require_equals = true
    )]
    pub line_numbers: Option<i64>,

    /// Use %e to print floats
    #[arg(short = 'e', long, global = true, conflicts_with_all = ["float_g", "float_exact"])]
    pub float_e: bool,

    /// Use %g to print floats
    #[arg(short = 'g', long, global = true, conflicts_with = "float_exact")]
    pub float_g: bool,

    /// Print floats with every digit needed to encode them back unchanged
    #[arg(short = 'E', long, global = true)]
    pub float_exact: bool,

    /// Timestamp format; empty treats timestamps as floats
    #[arg(short = 'T', long, global = true, value_name = "FMT")]
    pub timestamp: Option<String>,

    /// Date format; empty treats dates as floats
    #[arg(short = 'D', long, global = true, value_name = "FMT")]
    pub date: Option<String>,

    /// PostgreSQL decode mode, creating TABLE
    #[arg(short = 'P', long, global = true, value_name = "TABLE")]
    pub psql: Option<String>,

    /// Suppress output for sort
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Act as if standard output were a terminal
    #[arg(short = 'y', long, global = true, conflicts_with = "no_tty")]
    pub tty: bool,

    /// Act as if standard output were not a terminal
    #[arg(short = 'Y', long, global = true)]
    pub no_tty: bool,

    /// Compare float fields numerically when sorting
    #[arg(long, global = true)]
    pub typed_floats: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

fn time_format(arg: Option<&str>, default: &str) -> Option<String> {
    match arg {
        None => Some(default.to_string()),
        Some("") => None,
        Some(format) => Some(format.to_string()),
    }
}

impl Options {
    /// Builds the core configuration.
    pub fn config(&self) -> Config {
        let ordering = if self.typed_floats {
            SlotOrdering::Typed
        } else {
            SlotOrdering::RawBits
        };
        Config::new()
            .strings_path(&self.strings)
            .timestamp_format(time_format(self.timestamp.as_deref(), DEFAULT_TIMESTAMP_FORMAT))
            .date_format(time_format(self.date.as_deref(), DEFAULT_DATE_FORMAT))
            .slot_ordering(ordering)
    }

    /// Returns true if output should go to a viewer.
    pub fn is_tty(&self) -> bool {
        if self.no_tty {
            false
        } else {
            self.tty || io::stdout().is_terminal()
        }
    }

    pub fn float_style(&self) -> FloatStyle {
        match (self.float_e, self.float_g, self.float_exact) {
            (true, _, _) => FloatStyle::Exponent,
            (_, true, _) => FloatStyle::General,
            (_, _, true) => FloatStyle::Exact,
            _ => FloatStyle::Fixed,
        }
    }

    /// Returns the field delimiter for encoding.
    pub fn delim_byte(&self) -> Result<u8, Box<dyn std::error::Error>> {
        self.delim
            .bytes()
            .next()
            .ok_or_else(|| "delimiter must not be empty".into())
    }

    /// Arguments for an `odb print` process that displays binary output.
    pub fn print_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["print".into(), "--strings".into()];
        args.push(self.strings.clone().into_os_string());
        if let Some(format) = &self.timestamp {
            args.push(format!("--timestamp={format}").into());
        }
        if let Some(format) = &self.date {
            args.push(format!("--date={format}").into());
        }
        if self.float_e {
            args.push("--float-e".into());
        }
        if self.float_g {
            args.push("--float-g".into());
        }
        if self.float_exact {
            args.push("--float-exact".into());
        }
        if let Some(start) = self.line_numbers {
            args.push(format!("--line-numbers={start}").into());
        }
        if self.verbose {
            args.push("--verbose".into());
        }
        args
    }
}

/// Returns `files`, or standard input if none are given.
pub fn inputs_or_stdin(files: &[PathBuf]) -> Vec<PathBuf> {
    if files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        files.to_vec()
    }
}
