//! Sort command implementation.

use crate::options::Options;
use crate::output::Output;
use odb_core::sort_and_merge;
use std::path::PathBuf;

/// Sorts every input in place, then merges them to the output unless quiet.
pub fn run(files: &[PathBuf], options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let ordering = options.config().slot_ordering;
    let fields = options.fields.as_deref();
    if options.quiet {
        sort_and_merge(files, fields, ordering, None)?;
        return Ok(());
    }
    let mut output = Output::binary(options)?;
    sort_and_merge(files, fields, ordering, Some(output.writer()))?;
    Ok(output.finish()?)
}
