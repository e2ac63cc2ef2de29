//! Cat (cut) command implementation.

use crate::options::Options;
use crate::output::Output;
use odb_core::{cat, open_all, Projection};
use odb_storage::Access;
use std::path::PathBuf;
use tracing::info;

/// Writes the selected fields and records of inputs with like schemas.
pub fn run(files: &[PathBuf], options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let (header, inputs) = open_all(files, Access::Read)?;
    let projection = match options.fields.as_deref() {
        Some(spec) => Projection::parse(spec, &header)?,
        None => Projection::identity(&header),
    };
    let range = options.range.unwrap_or_default();
    let limit = options.count.unwrap_or(u64::MAX);

    let mut output = Output::binary(options)?;
    let records = cat(inputs, &projection, range, limit, output.writer())?;
    info!(
        records,
        fields = projection.header().field_count(),
        %range,
        "wrote records"
    );
    Ok(output.finish()?)
}
