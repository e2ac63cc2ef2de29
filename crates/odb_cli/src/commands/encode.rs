//! Encode command implementation.

use super::{dictionary_for, for_each_line};
use crate::codec::{split_fields, LineEncoder};
use crate::options::Options;
use crate::output::Output;
use odb_core::{RecordEncoder, RecordWriter};
use odb_format::{FieldType, Header};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Encodes delimited text lines into an ODB stream.
///
/// With `extract`, writes the text of every string field instead, one per
/// line, as input for the strings command.
pub fn run(
    files: &[PathBuf],
    extract: bool,
    options: &Options,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = options
        .fields
        .as_deref()
        .ok_or("use -f to provide a field schema")?;
    let header = Header::parse_schema(schema)?;
    let delim = options.delim_byte()?;

    if extract {
        let mut output = Output::stdout();
        extract_strings(files, &header, delim, output.writer())?;
        return Ok(output.finish()?);
    }

    let config = options.config();
    let parse_header = config.effective_header(&header);
    let dictionary = dictionary_for(&header, &config.strings_path)?;
    let encoder = RecordEncoder::new(&parse_header, dictionary.as_ref())?;
    let lines = LineEncoder::new(&parse_header, encoder, &config, delim);

    let mut output = Output::binary(options)?;
    let records = encode(files, &header, &lines, output.writer())?;
    info!(records, fields = header.field_count(), "encoded records");
    Ok(output.finish()?)
}

/// Writes `header`, then one record per line of `files`.
pub fn encode<W: Write>(
    files: &[PathBuf],
    header: &Header,
    lines: &LineEncoder<'_>,
    sink: W,
) -> Result<u64, Box<dyn std::error::Error>> {
    let mut writer = RecordWriter::create(sink, header)?;
    for_each_line(files, |line| Ok(writer.write_slots(&lines.encode_line(line)?)?))?;
    writer.flush()?;
    Ok(writer.records_written())
}

fn extract_strings(
    files: &[PathBuf],
    header: &Header,
    delim: u8,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let positions: Vec<usize> = header
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.field_type() == FieldType::String)
        .map(|(i, _)| i)
        .collect();
    for_each_line(files, |line| {
        let fields = split_fields(line, header.field_count(), delim)?;
        for &i in &positions {
            out.write_all(fields[i])?;
            out.write_all(b"\n")?;
        }
        Ok(())
    })?;
    Ok(())
}
