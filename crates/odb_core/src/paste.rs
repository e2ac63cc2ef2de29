//! Side-by-side concatenation of inputs.

use crate::error::{CoreError, CoreResult};
use crate::input::Input;
use crate::record::RecordWriter;
use odb_format::Header;
use std::io::Write;
use tracing::debug;

/// Writes the concatenated header of `inputs`, then each record of the first
/// input followed by the matching records of the others.
///
/// Returns the number of combined records written.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the inputs hold different numbers
/// of records, or an error if a read or write fails.
pub fn paste<W: Write>(inputs: Vec<Input>, sink: W) -> CoreResult<u64> {
    let header = Header::concat(inputs.iter().map(Input::header))?;
    let mut writer = RecordWriter::create(sink, &header)?;
    let mut readers: Vec<_> = inputs.into_iter().map(Input::into_records).collect();
    let mut buffers: Vec<Vec<u8>> = readers
        .iter()
        .map(|r| vec![0u8; r.layout().record_size()])
        .collect();
    let mut combined = Vec::with_capacity(header.layout().record_size());

    loop {
        let mut done = 0;
        for (reader, buf) in readers.iter_mut().zip(&mut buffers) {
            if !reader.read_into(buf)? {
                debug!(input = reader.name(), "paste input exhausted");
                done += 1;
            }
        }
        if done == readers.len() {
            break;
        }
        if done > 0 {
            return Err(CoreError::invalid_input("unequal records in inputs"));
        }
        combined.clear();
        for buf in &buffers {
            combined.extend_from_slice(buf);
        }
        writer.write_record(&combined)?;
    }

    writer.flush()?;
    Ok(writer.records_written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_storage::Access;
    use std::fs::File;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_odb(path: &Path, schema: &str, rows: &[&[i64]]) {
        let header = Header::parse_schema(schema).unwrap();
        let mut writer = RecordWriter::create(File::create(path).unwrap(), &header).unwrap();
        for row in rows {
            writer.write_slots(row).unwrap();
        }
        writer.flush().unwrap();
    }

    fn open(path: &Path) -> Input {
        Input::open(path, Access::Read).unwrap()
    }

    #[test]
    fn pastes_records_side_by_side() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.odb");
        let b = dir.path().join("b.odb");
        write_odb(&a, "x:int", &[&[1], &[2]]);
        write_odb(&b, "y:int,z:int", &[&[10, 11], &[20, 21]]);

        let mut out = Vec::new();
        assert_eq!(paste(vec![open(&a), open(&b)], &mut out).unwrap(), 2);

        let mut cursor = out.as_slice();
        let header = Header::read(&mut cursor).unwrap();
        assert_eq!(header, Header::parse_schema("x:int,y:int,z:int").unwrap());
        let expected: Vec<u8> = [1i64, 10, 11, 2, 20, 21]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(cursor, expected.as_slice());
    }

    #[test]
    fn unequal_lengths_rejected() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.odb");
        let b = dir.path().join("b.odb");
        write_odb(&a, "x:int", &[&[1], &[2]]);
        write_odb(&b, "y:int", &[&[10]]);

        let err = paste(vec![open(&a), open(&b)], Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "unequal records in inputs");
    }
}
