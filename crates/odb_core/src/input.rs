//! Opened ODB inputs.

use crate::error::CoreResult;
use crate::record::RecordReader;
use odb_format::{FormatError, Header};
use odb_storage::{Access, FileHandle};
use std::path::Path;
use tracing::debug;

/// A locked input whose header has been read.
///
/// The handle is positioned at the first record after [`Input::open`].
#[derive(Debug)]
pub struct Input {
    handle: FileHandle,
    header: Header,
}

impl Input {
    /// Opens `path` (or standard input for `"-"`) and reads its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the header is invalid.
    /// Header errors name the input.
    pub fn open(path: &Path, access: Access) -> CoreResult<Self> {
        let mut handle = FileHandle::open(path, access)?;
        let header = Header::read(&mut handle).map_err(|err| match err {
            FormatError::UnexpectedEof { .. } => {
                FormatError::unexpected_eof(format!("reading header of {}", handle.name()))
            }
            other => other,
        })?;
        debug!(
            input = handle.name(),
            fields = header.field_count(),
            "opened input"
        );
        Ok(Self { handle, header })
    }

    /// Returns the header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the display name of the input.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Returns the underlying handle.
    #[must_use]
    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    /// Returns the underlying handle mutably.
    pub fn handle_mut(&mut self) -> &mut FileHandle {
        &mut self.handle
    }

    /// Returns the number of records, or `None` for streams.
    ///
    /// # Errors
    ///
    /// Returns an unexpected EOF error if the file ends inside a record.
    pub fn record_count(&self) -> CoreResult<Option<u64>> {
        if !self.handle.is_seekable() {
            return Ok(None);
        }
        let size = self.handle.len()?;
        Ok(Some(self.header.layout().record_count(size).map_err(|_| {
            FormatError::unexpected_eof(format!("in {}", self.handle.name()))
        })?))
    }

    /// Borrows the input as a record reader at its current position.
    pub fn records(&mut self) -> RecordReader<&mut FileHandle> {
        let layout = self.header.layout();
        let name = self.handle.name().to_string();
        RecordReader::new(&mut self.handle, layout, name)
    }

    /// Consumes the input, returning a record reader at its current position.
    #[must_use]
    pub fn into_records(self) -> RecordReader<FileHandle> {
        let layout = self.header.layout();
        let name = self.handle.name().to_string();
        RecordReader::new(self.handle, layout, name)
    }
}

/// Opens every path and checks that all headers are compatible with the
/// first one.
///
/// # Errors
///
/// Returns an error if `paths` is empty, an input cannot be opened, or a
/// header differs from the first (naming the offending input).
pub fn open_all<P: AsRef<Path>>(paths: &[P], access: Access) -> CoreResult<(Header, Vec<Input>)> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let input = Input::open(path.as_ref(), access)?;
        if let Some(first) = inputs.first().map(Input::header) {
            first.check_compatible(input.header(), input.name())?;
        }
        inputs.push(input);
    }
    let header = inputs
        .first()
        .map(|input| input.header().clone())
        .ok_or_else(|| crate::error::CoreError::invalid_input("no inputs"))?;
    Ok((header, inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::record::RecordWriter;
    use std::fs::File;
    use tempfile::tempdir;

    fn write_odb(path: &Path, schema: &str, rows: &[&[i64]]) {
        let header = Header::parse_schema(schema).unwrap();
        let mut writer = RecordWriter::create(File::create(path).unwrap(), &header).unwrap();
        for row in rows {
            writer.write_slots(row).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn open_reads_header_and_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.odb");
        write_odb(&path, "a:int,b:int", &[&[1, 2], &[3, 4]]);

        let mut input = Input::open(&path, Access::Read).unwrap();
        assert_eq!(input.header().field_count(), 2);
        assert_eq!(input.record_count().unwrap(), Some(2));
        let mut records = input.records();
        assert_eq!(records.read_slots().unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn truncated_header_names_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.odb");
        let bytes = Header::parse_schema("a:int").unwrap().to_bytes();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let err = Input::open(&path, Access::Read).unwrap_err();
        assert!(err.is_unexpected_eof());
        assert!(err.to_string().contains("short.odb"));
    }

    #[test]
    fn open_all_rejects_mismatch() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.odb");
        let b = dir.path().join("b.odb");
        write_odb(&a, "x:int", &[]);
        write_odb(&b, "x:float", &[]);

        let err = open_all(&[&a, &b], Access::Read).unwrap_err();
        match err {
            CoreError::Format(FormatError::SchemaMismatch { name }) => {
                assert!(name.ends_with("b.odb"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn open_all_requires_inputs() {
        let paths: [&Path; 0] = [];
        assert!(open_all(&paths, Access::Read).is_err());
    }
}
