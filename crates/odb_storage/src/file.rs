//! Locked input files.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path argument that selects standard input instead of a file.
pub const STDIN_NAME: &str = "-";

/// How an input is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read-only access under a shared lock.
    Read,
    /// Read-write access under an exclusive lock.
    ///
    /// Falls back to read-only (and a shared lock) when the file exists but
    /// cannot be opened for writing.
    ReadWrite,
}

/// The advisory lock currently held on a [`FileHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock; any number of readers.
    Shared,
    /// Exclusive lock; a single writer.
    Exclusive,
}

#[derive(Debug)]
enum Source {
    File(File),
    Stdin(io::Stdin),
}

/// An ODB input: a regular file, a pipe, or standard input.
///
/// Regular files are locked for the lifetime of the handle: shared for
/// [`Access::Read`], exclusive for [`Access::ReadWrite`]. The lock is released
/// when the handle is dropped.
///
/// # Example
///
/// ```no_run
/// use odb_storage::{Access, FileHandle, LockMode};
/// use std::path::Path;
///
/// let mut handle = FileHandle::open(Path::new("data.odb"), Access::ReadWrite).unwrap();
/// // ... permute records ...
/// handle.downgrade().unwrap();
/// assert_eq!(handle.lock_mode(), Some(LockMode::Shared));
/// ```
#[derive(Debug)]
pub struct FileHandle {
    name: String,
    path: PathBuf,
    source: Source,
    writable: bool,
    lock: Option<LockMode>,
}

impl FileHandle {
    /// Opens `path` (or standard input for `"-"`) and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or locked.
    pub fn open(path: &Path, access: Access) -> StorageResult<Self> {
        if path.as_os_str() == STDIN_NAME {
            return Ok(Self::stdin());
        }

        let (file, writable) = match access {
            Access::Read => (open_file(path, false)?, false),
            Access::ReadWrite => match open_file(path, true) {
                Ok(file) => (file, true),
                Err(StorageError::File { source, .. })
                    if source.kind() == io::ErrorKind::PermissionDenied =>
                {
                    debug!(path = %path.display(), "not writable, opening read-only");
                    (open_file(path, false)?, false)
                }
                Err(err) => return Err(err),
            },
        };

        let mut handle = Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            source: Source::File(file),
            writable,
            lock: None,
        };
        let mode = if writable {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        };
        handle.lock(mode)?;
        Ok(handle)
    }

    /// Returns a handle reading standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self {
            name: STDIN_NAME.to_string(),
            path: PathBuf::from(STDIN_NAME),
            source: Source::Stdin(io::stdin()),
            writable: false,
            lock: None,
        }
    }

    /// Returns the display name of the input (`"-"` for standard input).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path the handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the handle was opened with write access.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Returns the lock currently held, if any.
    #[must_use]
    pub fn lock_mode(&self) -> Option<LockMode> {
        self.lock
    }

    /// Returns the underlying file, or `None` for standard input.
    #[must_use]
    pub fn file(&self) -> Option<&File> {
        match &self.source {
            Source::File(file) => Some(file),
            Source::Stdin(_) => None,
        }
    }

    /// Returns true if the input supports random access.
    ///
    /// Pipes and standard input are not seekable.
    #[must_use]
    pub fn is_seekable(&self) -> bool {
        match &self.source {
            Source::File(file) => {
                let mut file: &File = file;
                file.stream_position().is_ok()
            }
            Source::Stdin(_) => false,
        }
    }

    /// Returns the current size of the underlying file in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotSeekable`] for standard input.
    pub fn len(&self) -> StorageResult<u64> {
        match &self.source {
            Source::File(file) => file
                .metadata()
                .map(|m| m.len())
                .map_err(|e| StorageError::file("reading metadata of", &self.path, e)),
            Source::Stdin(_) => Err(StorageError::not_seekable(&self.name)),
        }
    }

    /// Takes an exclusive lock, upgrading a shared one.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn lock_exclusive(&mut self) -> StorageResult<()> {
        self.lock(LockMode::Exclusive)
    }

    /// Downgrades the lock to shared once mutation has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be converted.
    pub fn downgrade(&mut self) -> StorageResult<()> {
        self.lock(LockMode::Shared)
    }

    fn lock(&mut self, mode: LockMode) -> StorageResult<()> {
        let Source::File(file) = &self.source else {
            return Ok(());
        };
        let result = match mode {
            LockMode::Shared => FileExt::lock_shared(file),
            LockMode::Exclusive => FileExt::lock_exclusive(file),
        };
        match result {
            Ok(()) => {
                self.lock = Some(mode);
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::Unsupported => {
                warn!(path = %self.path.display(), "advisory locking not supported, continuing unlocked");
                self.lock = None;
                Ok(())
            }
            Err(err) => Err(StorageError::file("locking", &self.path, err)),
        }
    }

    /// Copies the rest of a non-seekable input into an anonymous temporary
    /// file and switches the handle over to it.
    ///
    /// `prefix` is written first (typically the header that has already been
    /// consumed from the stream). The new handle is writable, seekable and
    /// positioned right after the prefix. Returns the number of bytes copied
    /// from the original input.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written.
    pub fn spool(&mut self, prefix: &[u8]) -> StorageResult<u64> {
        let mut spool = tempfile::tempfile()?;
        spool.write_all(prefix)?;
        let copied = io::copy(self, &mut spool)?;
        spool.flush()?;
        spool.seek(SeekFrom::Start(prefix.len() as u64))?;

        debug!(name = %self.name, copied, "spooled stream into temporary file");
        self.source = Source::File(spool);
        self.writable = true;
        self.lock = None;
        Ok(copied)
    }

    /// Positions the handle at `offset` bytes from the start.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotSeekable`] for streams.
    pub fn seek_to(&mut self, offset: u64) -> StorageResult<()> {
        match &mut self.source {
            Source::File(file) => {
                file.seek(SeekFrom::Start(offset))
                    .map_err(|e| StorageError::file("seeking in", &self.path, e))?;
                Ok(())
            }
            Source::Stdin(_) => Err(StorageError::not_seekable(&self.name)),
        }
    }
}

fn open_file(path: &Path, write: bool) -> StorageResult<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .open(path)
        .map_err(|e| StorageError::file("opening", path, e))
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::File(file) => file.read(buf),
            Source::Stdin(stdin) => stdin.read(buf),
        }
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.source {
            Source::File(file) => file.seek(pos),
            Source::Stdin(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not seekable",
            )),
        }
    }
}
