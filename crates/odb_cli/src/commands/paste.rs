//! Paste command implementation.

use crate::options::Options;
use crate::output::Output;
use odb_core::{paste, Input};
use odb_storage::Access;
use std::path::PathBuf;
use tracing::info;

/// Writes the records of all inputs side by side.
pub fn run(files: &[PathBuf], options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = files
        .iter()
        .map(|path| Input::open(path, Access::Read))
        .collect::<Result<Vec<_>, _>>()?;
    let mut output = Output::binary(options)?;
    let records = paste(inputs, output.writer())?;
    info!(records, inputs = files.len(), "pasted records");
    Ok(output.finish()?)
}
