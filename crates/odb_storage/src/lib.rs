//! # ODB Storage
//!
//! File access primitives for ODB.
//!
//! This crate is the lowest layer of the ODB workspace. It knows nothing
//! about headers, records, or dictionaries; it only provides:
//!
//! - [`FileHandle`] - an input file (or standard input) held under a
//!   whole-file advisory lock, with seekability detection and spooling of
//!   non-seekable streams into an anonymous temporary file
//! - [`MappedRegion`] / [`MappedRegionMut`] - read-only and read-write
//!   shared memory maps over a file
//!
//! ## Locking discipline
//!
//! Readers take a shared lock, the sort window takes an exclusive lock and
//! downgrades it to shared once the file has been permuted. Locks are
//! advisory and cover the whole file; there is no finer-grained locking.
//!
//! ## Example
//!
//! ```no_run
//! use odb_storage::{Access, FileHandle, LockMode};
//! use std::path::Path;
//!
//! let handle = FileHandle::open(Path::new("data.odb"), Access::Read).unwrap();
//! assert_eq!(handle.lock_mode(), Some(LockMode::Shared));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod mmap;

pub use error::{StorageError, StorageResult};
pub use file::{Access, FileHandle, LockMode, STDIN_NAME};
pub use mmap::{MappedRegion, MappedRegionMut};
