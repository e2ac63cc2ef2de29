//! In-place sorting of ODB files.

use super::heap::{heap_sort, RecordSlice};
use super::key::{KeyOrder, RecordComparator, SlotOrdering};
use crate::error::{CoreError, CoreResult};
use crate::input::{open_all, Input};
use crate::merge::merge;
use odb_format::{has_preamble, FormatError, Header, RecordLayout};
use odb_storage::{Access, MappedRegionMut};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Sorts the records of an encoded region in place.
///
/// `records` must start at the first record (after the header). Returns the
/// number of records sorted.
///
/// # Errors
///
/// Returns an unexpected EOF error if `records` ends inside a record.
pub fn sort_in_place(
    records: &mut [u8],
    layout: RecordLayout,
    comparator: &RecordComparator,
) -> CoreResult<u64> {
    let size = layout.record_size();
    if records.len() % size != 0 {
        return Err(CoreError::unexpected_eof(format!(
            "after {} whole records",
            records.len() / size
        )));
    }
    let count = (records.len() / size) as u64;
    heap_sort(&mut RecordSlice::new(records, size, comparator));
    Ok(count)
}

/// Sorts files in place by one comparator.
#[derive(Debug, Clone)]
pub struct Sorter {
    comparator: RecordComparator,
}

impl Sorter {
    /// Creates a sorter for files with `header`.
    #[must_use]
    pub fn new(order: &KeyOrder, header: &Header, ordering: SlotOrdering) -> Self {
        Self {
            comparator: RecordComparator::new(order, header, ordering),
        }
    }

    /// Returns the comparator.
    #[must_use]
    pub fn comparator(&self) -> &RecordComparator {
        &self.comparator
    }

    /// Sorts the records of `input` in place.
    ///
    /// Takes an exclusive lock for the duration of the sort. Streams are first
    /// copied into a temporary file. Afterwards the lock is downgraded to
    /// shared and the input is positioned at its first record, ready to be
    /// read back in sorted order. Returns the number of records sorted.
    ///
    /// # Errors
    ///
    /// - I/O errors if the file cannot be locked, spooled or mapped for writing
    /// - [`FormatError::InvalidPreamble`] if the mapped file is not an ODB file
    /// - an unexpected EOF error naming the input if it ends inside a record
    pub fn sort_file(&self, input: &mut Input) -> CoreResult<u64> {
        let header_bytes = input.header().to_bytes();
        let layout = input.header().layout();
        let handle = input.handle_mut();

        if !handle.is_seekable() {
            let copied = handle.spool(&header_bytes)?;
            debug!(input = handle.name(), bytes = copied, "spooled input for sorting");
        }
        handle.lock_exclusive()?;

        let size = handle.len()?;
        let count = layout
            .record_count(size)
            .map_err(|_| CoreError::unexpected_eof(handle.name()))?;

        let file = handle
            .file()
            .ok_or_else(|| CoreError::invalid_input(format!("{} is not a file", handle.name())))?;
        let mut region = MappedRegionMut::map(file, handle.path())?;
        if !has_preamble(&region) {
            return Err(FormatError::InvalidPreamble.into());
        }
        let sorted = sort_in_place(&mut region[layout.header_size()..], layout, &self.comparator)?;
        debug_assert_eq!(sorted, count);
        region.flush()?;
        drop(region);

        handle.downgrade()?;
        handle.seek_to(layout.header_size() as u64)?;
        debug!(input = handle.name(), records = count, "sorted in place");
        Ok(count)
    }
}

/// Sorts every input in place, then merges them into `sink`.
///
/// `fields` is a key spec for [`KeyOrder::parse`]; `None` sorts by every
/// field ascending. With no sink (quiet mode) only the in-place sort runs.
/// Returns the number of records written to the sink, or sorted when quiet.
///
/// # Errors
///
/// Returns an error if the inputs are incompatible or any sort, read or
/// write fails.
pub fn sort_and_merge<P: AsRef<Path>>(
    paths: &[P],
    fields: Option<&str>,
    ordering: SlotOrdering,
    sink: Option<&mut dyn Write>,
) -> CoreResult<u64> {
    let (header, mut inputs) = open_all(paths, Access::ReadWrite)?;
    let order = match fields {
        Some(spec) => KeyOrder::parse(spec, &header)?,
        None => KeyOrder::all_ascending(header.field_count()),
    };
    let sorter = Sorter::new(&order, &header, ordering);

    let mut sorted = 0;
    for input in &mut inputs {
        sorted += sorter.sort_file(input)?;
    }
    info!(inputs = inputs.len(), records = sorted, "sorted inputs");

    let Some(sink) = sink else {
        return Ok(sorted);
    };
    let sources = inputs.into_iter().map(Input::into_records).collect();
    merge(sources, &header, sorter.comparator().clone(), sink)
}
