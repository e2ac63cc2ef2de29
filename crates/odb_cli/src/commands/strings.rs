//! Strings command implementation.

use super::for_each_line;
use odb_core::{DictionaryBuilder, DictionaryStats};
use std::path::{Path, PathBuf};

/// Builds the dictionary at `output` from sorted, unique lines.
pub fn run(files: &[PathBuf], output: &Path) -> Result<DictionaryStats, Box<dyn std::error::Error>> {
    let mut builder = DictionaryBuilder::new();
    for_each_line(files, |line| Ok(builder.push(line)?))?;
    Ok(builder.write_file(output)?)
}
