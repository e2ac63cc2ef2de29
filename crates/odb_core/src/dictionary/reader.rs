//! Dictionary lookups.

use super::mph::{ChdHash, PerfectHash};
use super::{align_up, TRAILER_SIZE};
use crate::error::{CoreError, CoreResult};
use odb_storage::{Access, FileHandle, MappedRegion};
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use tracing::debug;

enum Data {
    Mapped {
        region: MappedRegion,
        // Keeps the shared lock for as long as the map is alive.
        _handle: FileHandle,
    },
    Owned(Vec<u8>),
}

impl Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Data::Mapped { region, .. } => region,
            Data::Owned(bytes) => bytes,
        }
    }
}

/// A read-only string dictionary.
///
/// Opened files are memory-mapped under a shared lock.
pub struct Dictionary<H = ChdHash> {
    data: Data,
    hash: H,
    count: u64,
    max_len: u64,
    strings_off: usize,
    strings_end: usize,
    offsets_off: usize,
    reverse_off: usize,
}

impl Dictionary {
    /// Opens and maps the dictionary file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or is not a
    /// valid dictionary.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_hash(path)
    }

    /// Loads a dictionary from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] if the bytes are not a valid dictionary.
    pub fn from_bytes(bytes: Vec<u8>) -> CoreResult<Self> {
        Self::from_bytes_with_hash(bytes)
    }
}

impl<H: PerfectHash> Dictionary<H> {
    /// Opens a dictionary file built with hash type `H`.
    ///
    /// # Errors
    ///
    /// See [`Dictionary::open`].
    pub fn open_with_hash(path: &Path) -> CoreResult<Self> {
        let handle = FileHandle::open(path, Access::Read)?;
        let file = handle
            .file()
            .ok_or_else(|| CoreError::invalid_input("dictionary must be a regular file"))?;
        let region = MappedRegion::map(file, path)?;
        let dict = Self::parse(Data::Mapped {
            region,
            _handle: handle,
        })?;
        debug!(
            path = %path.display(),
            strings = dict.count,
            "opened string dictionary"
        );
        Ok(dict)
    }

    /// Loads a dictionary built with hash type `H` from bytes.
    ///
    /// # Errors
    ///
    /// See [`Dictionary::from_bytes`].
    pub fn from_bytes_with_hash(bytes: Vec<u8>) -> CoreResult<Self> {
        Self::parse(Data::Owned(bytes))
    }

    fn parse(data: Data) -> CoreResult<Self> {
        let len = data.len();
        if len < TRAILER_SIZE {
            return Err(CoreError::corrupted(format!(
                "file of {len} bytes is too short"
            )));
        }
        let trailer_off = len - TRAILER_SIZE;
        let field = |i: usize| read_i64(&data, trailer_off + i * 8);
        let [max_len, hash_off, reverse_off, offsets_off, strings_off, count] =
            [0, 1, 2, 3, 4, 5].map(field);

        if count <= 0 || max_len < 0 {
            return Err(CoreError::corrupted(format!(
                "bad trailer (count {count}, max length {max_len})"
            )));
        }
        let count = count as u64;
        let section = |name: &str, offset: i64| -> CoreResult<usize> {
            match usize::try_from(offset) {
                Ok(o) if o <= trailer_off && align_up(o as u64) == o as u64 => Ok(o),
                _ => Err(CoreError::corrupted(format!(
                    "{name} section offset {offset} out of range"
                ))),
            }
        };
        let strings_off = section("strings", strings_off)?;
        let offsets_off = section("offsets", offsets_off)?;
        let reverse_off = section("reverse map", reverse_off)?;
        let hash_off = section("hash", hash_off)?;

        let table = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(8))
            .ok_or_else(|| CoreError::corrupted("string count out of range"))?;
        let ordered = strings_off <= offsets_off
            && offsets_off.checked_add(table).is_some_and(|end| end <= reverse_off)
            && reverse_off.checked_add(table).is_some_and(|end| end <= hash_off);
        if !ordered {
            return Err(CoreError::corrupted("sections overlap"));
        }

        let hash = H::from_bytes(&data[hash_off..trailer_off])?;
        if hash.len() as u64 != count {
            return Err(CoreError::corrupted(format!(
                "hash covers {} keys, dictionary holds {count}",
                hash.len()
            )));
        }

        Ok(Self {
            data,
            hash,
            count,
            max_len: max_len as u64,
            strings_off,
            strings_end: offsets_off,
            offsets_off,
            reverse_off,
        })
    }

    /// Returns the number of strings.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Returns true if the dictionary holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the length of the longest string in bytes.
    #[must_use]
    pub fn max_string_length(&self) -> u64 {
        self.max_len
    }

    /// Returns the index of `s`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownString`] if `s` is not in the dictionary.
    pub fn string_to_index(&self, s: &[u8]) -> CoreResult<i64> {
        let slot = self.hash.search(s);
        let index = read_i64(&self.data, self.reverse_off + slot as usize * 8);
        if index < 0 || index as u64 >= self.count {
            return Err(CoreError::unknown_string(s));
        }
        match self.string_at(index as u64) {
            Ok(stored) if stored == s => Ok(index),
            _ => Err(CoreError::unknown_string(s)),
        }
    }

    /// Returns the string at `index`, without its terminating NUL.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StringIndexOutOfRange`] unless `0 <= index < len`
    /// - [`CoreError::Corrupted`] if the stored offset is inconsistent
    pub fn index_to_string(&self, index: i64) -> CoreResult<&[u8]> {
        if index < 0 || index as u64 >= self.count {
            return Err(CoreError::StringIndexOutOfRange {
                index,
                count: self.count,
            });
        }
        self.string_at(index as u64)
    }

    fn string_at(&self, index: u64) -> CoreResult<&[u8]> {
        let offset = read_i64(&self.data, self.offsets_off + index as usize * 8);
        let start = usize::try_from(offset)
            .ok()
            .filter(|&o| o >= self.strings_off && o < self.strings_end)
            .ok_or_else(|| {
                CoreError::corrupted(format!("string {index} has offset {offset}"))
            })?;
        // Every string after the first follows the previous terminator.
        if index > 0 && (start == self.strings_off || self.data[start - 1] != 0) {
            return Err(CoreError::corrupted(format!(
                "string {index} at offset {offset} does not follow a terminator"
            )));
        }
        let section = &self.data[start..self.strings_end];
        let len = section.iter().position(|&b| b == 0).ok_or_else(|| {
            CoreError::corrupted(format!("string {index} is not terminated"))
        })?;
        Ok(&section[..len])
    }

    /// Iterates over the strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = CoreResult<&[u8]>> + '_ {
        (0..self.count).map(move |i| self.string_at(i))
    }
}

impl<H> fmt::Debug for Dictionary<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("count", &self.count)
            .field("max_len", &self.max_len)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    i64::from_le_bytes(buf)
}
