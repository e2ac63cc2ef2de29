//! Memory-mapped file regions.
//!
//! Both map types cover the whole file as it is at mapping time. The
//! read-write map is shared, so writes land in the page cache immediately and
//! are visible to every other mapper of the file.

#![allow(unsafe_code)]

use crate::error::{StorageError, StorageResult};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::File;
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// A read-only map of an entire file.
#[derive(Debug)]
pub struct MappedRegion {
    map: Mmap,
}

impl MappedRegion {
    /// Maps `file` read-only. `path` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping fails.
    pub fn map(file: &File, path: &Path) -> StorageResult<Self> {
        // SAFETY: the file is opened by us and held under at least a shared
        // advisory lock; cooperating processes do not truncate it while mapped.
        let map = unsafe { MmapOptions::new().map(file) }
            .map_err(|e| StorageError::file("mapping", path, e))?;
        Ok(Self { map })
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// A shared read-write map of an entire file.
#[derive(Debug)]
pub struct MappedRegionMut {
    map: MmapMut,
}

impl MappedRegionMut {
    /// Maps `file` read-write and shared. `path` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was not opened for writing or the
    /// mapping fails.
    pub fn map(file: &File, path: &Path) -> StorageResult<Self> {
        // SAFETY: the caller holds an exclusive advisory lock on the file for
        // as long as the map is alive, so no cooperating process resizes it.
        let map = unsafe { MmapOptions::new().map_mut(file) }
            .map_err(|e| StorageError::file("mapping", path, e))?;
        Ok(Self { map })
    }

    /// Flushes outstanding modifications to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        self.map.flush()?;
        Ok(())
    }
}

impl Deref for MappedRegionMut {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

impl DerefMut for MappedRegionMut {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}
