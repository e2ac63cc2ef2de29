//! CLI command implementations.

pub mod cat;
pub mod decode;
pub mod encode;
pub mod paste;
pub mod schema;
pub mod sort;
pub mod strings;

use crate::codec::trim_newline;
use odb_core::Dictionary;
use odb_format::Header;
use odb_storage::{Access, FileHandle};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Calls `f` with every line of every file, newlines removed.
pub(crate) fn for_each_line<F>(files: &[PathBuf], mut f: F) -> Result<u64, Box<dyn std::error::Error>>
where
    F: FnMut(&[u8]) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut lines = 0;
    let mut line = Vec::new();
    for path in files {
        let mut reader = BufReader::new(FileHandle::open(path, Access::Read)?);
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            f(trim_newline(&line))?;
            lines += 1;
        }
        debug!(input = %path.display(), lines, "read text input");
    }
    Ok(lines)
}

/// Opens the dictionary if `header` has string fields.
pub(crate) fn dictionary_for(
    header: &Header,
    path: &Path,
) -> Result<Option<Dictionary>, Box<dyn std::error::Error>> {
    if header.string_field_count() == 0 {
        return Ok(None);
    }
    Ok(Some(Dictionary::open(path)?))
}
