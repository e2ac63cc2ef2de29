//! Fixed-width record layout.
//!
//! A record is `field_count` consecutive 8-byte little-endian slots. Records
//! follow the header directly with no length prefix, so record boundaries are
//! derived from the field count alone.

use crate::error::{FormatError, FormatResult};
use crate::header::{FIELD_COUNT_SIZE, FIELD_SPEC_SIZE, PREAMBLE_SIZE};

/// Size of one slot in bytes.
pub const SLOT_SIZE: usize = 8;

/// Sizes derived from a header's field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    field_count: usize,
}

impl RecordLayout {
    /// Creates a layout for `field_count` fields.
    #[must_use]
    pub const fn new(field_count: usize) -> Self {
        Self { field_count }
    }

    /// Returns the number of slots per record.
    #[must_use]
    pub const fn field_count(&self) -> usize {
        self.field_count
    }

    /// Returns the size of the header in bytes.
    #[must_use]
    pub const fn header_size(&self) -> usize {
        PREAMBLE_SIZE + FIELD_COUNT_SIZE + FIELD_SPEC_SIZE * self.field_count
    }

    /// Returns the size of one record in bytes.
    #[must_use]
    pub const fn record_size(&self) -> usize {
        SLOT_SIZE * self.field_count
    }

    /// Returns the number of records in a file of `file_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnexpectedEof`] if the file is shorter than the
    /// header or ends inside a record.
    pub fn record_count(&self, file_size: u64) -> FormatResult<u64> {
        let header = self.header_size() as u64;
        let record = self.record_size() as u64;
        let body = file_size
            .checked_sub(header)
            .ok_or_else(|| FormatError::unexpected_eof("in header"))?;
        if body % record != 0 {
            return Err(FormatError::unexpected_eof(format!(
                "after {} whole records ({} trailing bytes)",
                body / record,
                body % record
            )));
        }
        Ok(body / record)
    }

    /// Reads slot `field` of the encoded record `record`.
    ///
    /// # Panics
    ///
    /// Panics if `record` is shorter than the slot.
    #[must_use]
    pub fn slot(&self, record: &[u8], field: usize) -> i64 {
        read_slot(record, field)
    }

    /// Decodes an encoded record into `out`.
    pub fn decode_into(&self, record: &[u8], out: &mut [i64]) {
        for (i, slot) in out.iter_mut().enumerate().take(self.field_count) {
            *slot = read_slot(record, i);
        }
    }

    /// Appends the encoding of `slots` to `out`.
    pub fn encode_into(&self, slots: &[i64], out: &mut Vec<u8>) {
        for slot in slots.iter().take(self.field_count) {
            out.extend_from_slice(&slot.to_le_bytes());
        }
    }
}

/// Reads the `index`-th slot of an encoded record.
///
/// # Panics
///
/// Panics if `bytes` is shorter than the slot.
#[must_use]
pub fn read_slot(bytes: &[u8], index: usize) -> i64 {
    let start = index * SLOT_SIZE;
    let mut buf = [0u8; SLOT_SIZE];
    buf.copy_from_slice(&bytes[start..start + SLOT_SIZE]);
    i64::from_le_bytes(buf)
}
