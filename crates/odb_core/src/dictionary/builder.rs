//! Dictionary construction.

use super::mph::{ChdHash, PerfectHash};
use super::{align_up, TRAILER_SIZE};
use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Summary of a built dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryStats {
    /// Number of strings.
    pub count: u64,
    /// Length of the longest string in bytes.
    pub max_string_length: u64,
    /// Size of the dictionary file in bytes.
    pub file_size: u64,
}

/// Collects strings and writes a dictionary file.
///
/// # Example
///
/// ```
/// use odb_core::{Dictionary, DictionaryBuilder};
///
/// let mut builder = DictionaryBuilder::new();
/// for s in ["apple", "banana", "cherry"] {
///     builder.push(s.as_bytes()).unwrap();
/// }
/// let mut bytes = Vec::new();
/// builder.finish(&mut bytes).unwrap();
///
/// let dict = Dictionary::from_bytes(bytes).unwrap();
/// assert_eq!(dict.string_to_index(b"banana").unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct DictionaryBuilder<H = ChdHash> {
    /// Concatenated strings, each followed by NUL.
    buf: Vec<u8>,
    /// Start of each string in `buf`.
    starts: Vec<usize>,
    max_len: usize,
    _hash: PhantomData<H>,
}

impl DictionaryBuilder {
    /// Creates an empty builder using [`ChdHash`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_hash()
    }
}

impl Default for DictionaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: PerfectHash> DictionaryBuilder<H> {
    /// Creates an empty builder for hash type `H`.
    #[must_use]
    pub fn with_hash() -> Self {
        Self {
            buf: Vec::new(),
            starts: Vec::new(),
            max_len: 0,
            _hash: PhantomData,
        }
    }

    /// Returns the number of strings pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Returns true if no strings have been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    fn get(&self, i: usize) -> &[u8] {
        let start = self.starts[i];
        let end = self.starts.get(i + 1).map_or(self.buf.len(), |&s| s) - 1;
        &self.buf[start..end]
    }

    /// Appends a string. Strings get indices in push order.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateKey`] if `s` equals the previous string
    /// - [`CoreError::InvalidInput`] if `s` contains NUL
    pub fn push(&mut self, s: &[u8]) -> CoreResult<()> {
        if s.contains(&0) {
            return Err(CoreError::invalid_input(format!(
                "string contains NUL: {}",
                String::from_utf8_lossy(s)
            )));
        }
        if let Some(last) = self.len().checked_sub(1) {
            if self.get(last) == s {
                return Err(CoreError::duplicate_key(s));
            }
        }
        self.starts.push(self.buf.len());
        self.buf.extend_from_slice(s);
        self.buf.push(0);
        self.max_len = self.max_len.max(s.len());
        Ok(())
    }

    /// Builds the hash and writes the dictionary to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if no strings were pushed, the hash cannot be built,
    /// or the write fails.
    pub fn finish<W: Write>(self, sink: W) -> CoreResult<DictionaryStats> {
        if self.is_empty() {
            return Err(CoreError::invalid_input("no strings to index"));
        }
        let count = self.len();
        let keys: Vec<&[u8]> = (0..count).map(|i| self.get(i)).collect();
        let hash = H::build(&keys)?;
        if hash.len() != count {
            return Err(CoreError::corrupted(format!(
                "perfect hash has {} slots for {count} keys",
                hash.len()
            )));
        }

        let mut reverse = vec![-1i64; count];
        for (i, key) in keys.iter().enumerate() {
            let slot = hash.search(key) as usize;
            if reverse[slot] >= 0 {
                return Err(CoreError::HashConstruction {
                    keys: count,
                    attempts: 1,
                });
            }
            reverse[slot] = i as i64;
        }

        let mut out = PositionedWriter::new(sink);

        let strings_off = out.position();
        out.write_all(&self.buf)?;
        out.pad()?;

        let offsets_off = out.position();
        for &start in &self.starts {
            out.write_all(&(strings_off + start as u64).to_le_bytes())?;
        }
        out.pad()?;

        let reverse_off = out.position();
        for &index in &reverse {
            out.write_all(&index.to_le_bytes())?;
        }
        out.pad()?;

        let hash_off = out.position();
        hash.write_to(&mut out)?;
        out.pad()?;

        let trailer: [u64; TRAILER_SIZE / 8] = [
            self.max_len as u64,
            hash_off,
            reverse_off,
            offsets_off,
            strings_off,
            count as u64,
        ];
        for value in trailer {
            out.write_all(&value.to_le_bytes())?;
        }
        out.flush()?;

        let stats = DictionaryStats {
            count: count as u64,
            max_string_length: self.max_len as u64,
            file_size: out.position(),
        };
        debug!(?stats, "wrote dictionary");
        Ok(stats)
    }

    /// Pushes every string from `strings`.
    ///
    /// # Errors
    ///
    /// See [`DictionaryBuilder::push`].
    pub fn extend<I, S>(&mut self, strings: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        for s in strings {
            self.push(s.as_ref())?;
        }
        Ok(())
    }

    /// Writes the dictionary file at `path`.
    ///
    /// The file is written under a temporary name, synced, and renamed into
    /// place, so a failed build never leaves a partial dictionary at `path`.
    ///
    /// # Errors
    ///
    /// See [`DictionaryBuilder::finish`]; also fails if the file cannot be
    /// created or renamed.
    pub fn write_file(self, path: &Path) -> CoreResult<DictionaryStats> {
        let temp_path = temp_path(path);
        let result = (|| -> CoreResult<DictionaryStats> {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            let stats = self.finish(&mut writer)?;
            let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, path)?;
            Ok(stats)
        })();

        match result {
            Ok(stats) => {
                info!(
                    path = %path.display(),
                    strings = stats.count,
                    bytes = stats.file_size,
                    "built string dictionary"
                );
                Ok(stats)
            }
            Err(err) => {
                let _ = fs::remove_file(&temp_path);
                Err(err)
            }
        }
    }
}

impl DictionaryBuilder {
    /// Builds a dictionary of `strings` and writes it to `sink`.
    ///
    /// # Errors
    ///
    /// See [`DictionaryBuilder::push`] and [`DictionaryBuilder::finish`].
    pub fn build<I, S, W>(strings: I, sink: W) -> CoreResult<DictionaryStats>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
        W: Write,
    {
        let mut builder = Self::new();
        builder.extend(strings)?;
        builder.finish(sink)
    }

    /// Builds a dictionary of `strings` into the file at `path`.
    ///
    /// # Errors
    ///
    /// See [`DictionaryBuilder::push`] and [`DictionaryBuilder::write_file`].
    pub fn build_file<I, S>(path: &Path, strings: I) -> CoreResult<DictionaryStats>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut builder = Self::new();
        builder.extend(strings)?;
        builder.write_file(path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writer that tracks its position and pads sections to the alignment.
struct PositionedWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> PositionedWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn pad(&mut self) -> io::Result<()> {
        let padding = (align_up(self.position) - self.position) as usize;
        self.write_all(&[0u8; 8][..padding])
    }
}

impl<W: Write> Write for PositionedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_u64(bytes: &[u8], at: usize) -> u64 {
        u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
    }

    #[test]
    fn sections_are_aligned_and_trailer_is_last() {
        let mut bytes = Vec::new();
        let stats = DictionaryBuilder::build(["a", "bcd", "efghijk"], &mut bytes).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max_string_length, 7);
        assert_eq!(stats.file_size, bytes.len() as u64);

        let t = bytes.len() - TRAILER_SIZE;
        let trailer: Vec<u64> = (0..6).map(|i| read_u64(&bytes, t + i * 8)).collect();
        assert_eq!(trailer[0], 7);
        assert_eq!(trailer[4], 0);
        assert_eq!(trailer[5], 3);
        for offset in &trailer[1..5] {
            assert_eq!(offset % 8, 0);
        }
        assert_eq!(&bytes[..8], b"a\0bcd\0ef");
        assert_eq!(read_u64(&bytes, trailer[3] as usize + 8), 2);
        assert_eq!(&bytes[trailer[1] as usize..trailer[1] as usize + 4], b"CHD1");
    }

    #[test]
    fn adjacent_duplicates_rejected() {
        let mut builder = DictionaryBuilder::new();
        builder.push(b"x").unwrap();
        let err = builder.push(b"x").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { ref key } if key == "x"));
        assert_eq!(err.to_string(), "strings not unique: x");
    }

    #[test]
    fn distant_duplicates_rejected_by_hash() {
        let err = DictionaryBuilder::build(["x", "y", "x"], Vec::new()).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
    }

    #[test]
    fn empty_and_nul_inputs_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(
            DictionaryBuilder::build(none, Vec::new()),
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            DictionaryBuilder::new().push(b"a\0b"),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn build_file_renames_into_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strings.idx");
        let stats = DictionaryBuilder::build_file(&path, ["one", "two"]).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), stats.file_size);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_build_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strings.idx");
        assert!(DictionaryBuilder::build_file(&path, ["a", "a"]).is_err());
        assert!(!path.exists());
        assert!(!temp_path(&path).exists());
    }
}
