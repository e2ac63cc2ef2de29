//! Decode and print command implementation.

use super::dictionary_for;
use crate::codec::{write_psql_preamble, write_psql_trailer, FloatStyle, RowStyle, RowWriter};
use crate::options::Options;
use crate::output::{Output, Viewer};
use odb_core::{open_all, Config, Input, RecordDecoder};
use odb_format::Header;
use odb_storage::Access;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Text representation of decoded records.
#[derive(Debug, Clone)]
pub enum Format {
    /// Delimited fields.
    Delimited,
    /// Aligned columns with a heading.
    Table,
    /// A PostgreSQL script creating and filling a table.
    Psql {
        /// Table name.
        table: String,
    },
}

/// How decoded records are rendered.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub format: Format,
    /// Field separator for delimited and PostgreSQL output.
    pub delim: String,
    pub floats: FloatStyle,
    /// First line number, if numbering.
    pub line_number: Option<i64>,
}

impl DecodeOptions {
    /// Options for `decode` (`table` false) or `print` (`table` true).
    pub fn from_options(options: &Options, table: bool) -> Self {
        let format = match (&options.psql, table) {
            (_, true) => Format::Table,
            (Some(name), false) => Format::Psql {
                table: name.clone(),
            },
            (None, false) => Format::Delimited,
        };
        Self {
            format,
            delim: options.delim.clone(),
            floats: options.float_style(),
            line_number: options.line_numbers,
        }
    }
}

/// Decodes ODB inputs to text.
pub fn run(
    files: &[PathBuf],
    table: bool,
    options: &Options,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.config();
    let decode_options = DecodeOptions::from_options(options, table);
    let viewer = match decode_options.format {
        Format::Psql { .. } => Viewer::Psql,
        _ => Viewer::Pager,
    };
    let (header, inputs) = open_all(files, Access::Read)?;
    let mut output = Output::text(options, viewer)?;
    let rows = decode(inputs, &header, &config, &decode_options, output.writer())?;
    debug!(rows, "decoded records");
    Ok(output.finish()?)
}

/// Writes every record of `inputs` as text. Returns the number of rows.
pub fn decode(
    inputs: Vec<Input>,
    header: &Header,
    config: &Config,
    options: &DecodeOptions,
    out: &mut dyn Write,
) -> Result<u64, Box<dyn std::error::Error>> {
    let header = config.effective_header(header);
    let dictionary = dictionary_for(&header, &config.strings_path)?;
    let decoder = RecordDecoder::new(&header, dictionary.as_ref())?;

    let style = match options.format {
        Format::Table => RowStyle::Table {
            string_width: dictionary
                .as_ref()
                .map_or(0, |d| d.max_string_length() as usize),
        },
        Format::Delimited | Format::Psql { .. } => RowStyle::Delimited {
            delim: options.delim.clone(),
        },
    };
    if let Format::Psql { table } = &options.format {
        write_psql_preamble(table, &header, out)?;
    }
    let mut writer = RowWriter::new(style, options.floats, config, options.line_number);
    writer.write_heading(&header, out)?;

    let mut rows = 0;
    let mut record = vec![0u8; header.layout().record_size()];
    for input in inputs {
        let mut records = input.into_records();
        while records.read_into(&mut record)? {
            writer.write_row(&decoder.decode(&record)?, out)?;
            rows += 1;
        }
    }

    if let Format::Psql { .. } = options.format {
        write_psql_trailer(out)?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_core::{DictionaryBuilder, RecordWriter};
    use std::fs::File;
    use std::path::Path;
    use tempfile::tempdir;

    fn delimited() -> DecodeOptions {
        DecodeOptions {
            format: Format::Delimited,
            delim: "\t".into(),
            floats: FloatStyle::Fixed,
            line_number: None,
        }
    }

    fn write_odb(path: &Path, header: &Header, rows: &[Vec<i64>]) {
        let mut writer = RecordWriter::create(File::create(path).unwrap(), header).unwrap();
        for row in rows {
            writer.write_slots(row).unwrap();
        }
        writer.flush().unwrap();
    }

    fn decode_files(paths: &[&Path], config: &Config, options: &DecodeOptions) -> String {
        let (header, inputs) = open_all(paths, Access::Read).unwrap();
        let mut out = Vec::new();
        decode(inputs, &header, config, options, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn decodes_strings_and_times() {
        let dir = tempdir().unwrap();
        let dict = dir.path().join("strings.idx");
        DictionaryBuilder::build_file(&dict, ["ant", "bee"]).unwrap();
        let header = Header::parse_schema("name:string,n:int,at:timestamp").unwrap();
        let path = dir.path().join("a.odb");
        write_odb(&path, &header, &[vec![1, 7, 86_401f64.to_bits() as i64]]);

        let config = Config::new().strings_path(&dict);
        assert_eq!(
            decode_files(&[&path], &config, &delimited()),
            "bee\t7\t1970-01-02 00:00:01\n"
        );

        let raw = Config::new().strings_path(&dict).timestamp_format(None);
        assert_eq!(
            decode_files(&[&path], &raw, &delimited()),
            "bee\t7\t86401.000000\n"
        );
    }

    #[test]
    fn concatenates_inputs_with_line_numbers() {
        let dir = tempdir().unwrap();
        let header = Header::parse_schema("n:int").unwrap();
        let a = dir.path().join("a.odb");
        let b = dir.path().join("b.odb");
        write_odb(&a, &header, &[vec![1], vec![2]]);
        write_odb(&b, &header, &[vec![3]]);

        let options = DecodeOptions {
            delim: ",".into(),
            line_number: Some(1),
            ..delimited()
        };
        assert_eq!(
            decode_files(&[&a, &b], &Config::default(), &options),
            "1,1\n2,2\n3,3\n"
        );
    }

    #[test]
    fn psql_script() {
        let dir = tempdir().unwrap();
        let header = Header::parse_schema("n:int,x:float").unwrap();
        let a = dir.path().join("a.odb");
        write_odb(&a, &header, &[vec![4, 0.25f64.to_bits() as i64]]);

        let options = DecodeOptions {
            format: Format::Psql { table: "t".into() },
            ..delimited()
        };
        let text = decode_files(&[&a], &Config::default(), &options);
        assert!(text.starts_with("create table \"t\" (\n"));
        assert!(text.ends_with("copy \"t\" from stdin;\n4\t0.250000\n\\.\n"));
    }

    #[test]
    fn missing_dictionary_is_reported() {
        let dir = tempdir().unwrap();
        let header = Header::parse_schema("s:string").unwrap();
        let a = dir.path().join("a.odb");
        write_odb(&a, &header, &[vec![0]]);

        let config = Config::new().strings_path(dir.path().join("missing.idx"));
        let (header, inputs) = open_all(&[&a], Access::Read).unwrap();
        let err = decode(inputs, &header, &config, &delimited(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("missing.idx"));
    }
}
