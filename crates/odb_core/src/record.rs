//! Record streams and typed record encoding.
//!
//! [`RecordReader`] and [`RecordWriter`] move whole fixed-width records
//! between byte streams. [`RecordEncoder`] and [`RecordDecoder`] translate
//! between slots and typed values, resolving string fields through a
//! [`Dictionary`].

use crate::dictionary::Dictionary;
use crate::error::{CoreError, CoreResult};
use odb_format::{read_slot, FieldType, Header, RecordLayout, Value};
use std::io::{self, Read, Write};

/// Reads whole records from a byte stream positioned after the header.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    layout: RecordLayout,
    name: String,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader. `name` identifies the input in error messages.
    pub fn new(inner: R, layout: RecordLayout, name: impl Into<String>) -> Self {
        Self {
            inner,
            layout,
            name: name.into(),
        }
    }

    /// Returns the record layout.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Returns the input name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the next record into `buf` (exactly `record_size` bytes).
    ///
    /// Returns `Ok(false)` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns an unexpected EOF error if the stream ends inside a record.
    pub fn read_into(&mut self, buf: &mut [u8]) -> CoreResult<bool> {
        debug_assert_eq!(buf.len(), self.layout.record_size());
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(false),
            n if n == buf.len() => Ok(true),
            _ => Err(CoreError::unexpected_eof(&self.name)),
        }
    }

    /// Reads the next record as slots.
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns an unexpected EOF error if the stream ends inside a record.
    pub fn read_slots(&mut self) -> CoreResult<Option<Vec<i64>>> {
        let mut buf = vec![0u8; self.layout.record_size()];
        if !self.read_into(&mut buf)? {
            return Ok(None);
        }
        let mut slots = vec![0i64; self.layout.field_count()];
        self.layout.decode_into(&buf, &mut slots);
        Ok(Some(slots))
    }

    /// Reads and discards up to `n` records, returning how many were skipped.
    ///
    /// # Errors
    ///
    /// Returns an unexpected EOF error if the stream ends inside a record.
    pub fn skip(&mut self, n: u64) -> CoreResult<u64> {
        let mut buf = vec![0u8; self.layout.record_size()];
        for skipped in 0..n {
            if !self.read_into(&mut buf)? {
                return Ok(skipped);
            }
        }
        Ok(n)
    }
}

/// Writes a header followed by whole records.
#[derive(Debug)]
pub struct RecordWriter<W> {
    inner: W,
    layout: RecordLayout,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Writes `header` to `inner` and returns a writer for its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn create(mut inner: W, header: &Header) -> CoreResult<Self> {
        header.write(&mut inner)?;
        Ok(Self {
            inner,
            layout: header.layout(),
            written: 0,
        })
    }

    /// Returns the record layout.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Writes one encoded record.
    ///
    /// # Errors
    ///
    /// Returns an error if `record` has the wrong size or the write fails.
    pub fn write_record(&mut self, record: &[u8]) -> CoreResult<()> {
        if record.len() != self.layout.record_size() {
            return Err(CoreError::invalid_input(format!(
                "record of {} bytes does not match record size {}",
                record.len(),
                self.layout.record_size()
            )));
        }
        self.inner.write_all(record)?;
        self.written += 1;
        Ok(())
    }

    /// Writes one record given as slots.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot count is wrong or the write fails.
    pub fn write_slots(&mut self, slots: &[i64]) -> CoreResult<()> {
        let mut buf = Vec::with_capacity(self.layout.record_size());
        self.layout.encode_into(slots, &mut buf);
        self.write_record(&buf)
    }

    /// Flushes the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn into_inner(mut self) -> CoreResult<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

/// Turns typed values into slots for one header.
#[derive(Debug, Clone, Copy)]
pub struct RecordEncoder<'a> {
    header: &'a Header,
    dictionary: Option<&'a Dictionary>,
}

impl<'a> RecordEncoder<'a> {
    /// Creates an encoder. A dictionary is required if the header has string
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns an error if string fields are present but no dictionary is given.
    pub fn new(header: &'a Header, dictionary: Option<&'a Dictionary>) -> CoreResult<Self> {
        if dictionary.is_none() && header.string_field_count() > 0 {
            return Err(CoreError::invalid_input(
                "schema has string fields but no dictionary is loaded",
            ));
        }
        Ok(Self { header, dictionary })
    }

    /// Resolves the text of a string field to its dictionary index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownString`] if the text is not in the dictionary.
    pub fn string_value(&self, text: &[u8]) -> CoreResult<Value> {
        let dictionary = self
            .dictionary
            .ok_or_else(|| CoreError::invalid_input("no dictionary loaded"))?;
        Ok(Value::StringIndex(dictionary.string_to_index(text)?))
    }

    /// Encodes one record's values, checking count and types.
    ///
    /// # Errors
    ///
    /// Returns an error if the value count differs from the field count or a
    /// value has the wrong type.
    pub fn encode(&self, values: &[Value]) -> CoreResult<Vec<i64>> {
        if values.len() != self.header.field_count() {
            return Err(CoreError::invalid_input(format!(
                "expected {} values, got {}",
                self.header.field_count(),
                values.len()
            )));
        }
        values
            .iter()
            .zip(self.header.fields())
            .map(|(value, field)| Ok(value.encode_for(field)?))
            .collect()
    }
}

/// A decoded field with strings resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Integer field.
    Integer(i64),
    /// Float field.
    Float(f64),
    /// String field, without the terminating NUL.
    Text(&'a [u8]),
    /// Timestamp field, seconds since the epoch.
    Timestamp(f64),
    /// Date field, seconds since the epoch.
    Date(f64),
}

/// Turns encoded records into typed values for one header.
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder<'a> {
    header: &'a Header,
    dictionary: Option<&'a Dictionary>,
}

impl<'a> RecordDecoder<'a> {
    /// Creates a decoder. A dictionary is required if the header has string
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns an error if string fields are present but no dictionary is given.
    pub fn new(header: &'a Header, dictionary: Option<&'a Dictionary>) -> CoreResult<Self> {
        if dictionary.is_none() && header.string_field_count() > 0 {
            return Err(CoreError::invalid_input(
                "schema has string fields but no dictionary is loaded",
            ));
        }
        Ok(Self { header, dictionary })
    }

    /// Decodes one encoded record.
    ///
    /// # Errors
    ///
    /// Returns an error if a string index is not in the dictionary.
    pub fn decode(&self, record: &[u8]) -> CoreResult<Vec<FieldValue<'a>>> {
        self.header
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let slot = read_slot(record, i);
                Ok(match Value::from_slot(field.field_type(), slot) {
                    Value::Integer(v) => FieldValue::Integer(v),
                    Value::Float(v) => FieldValue::Float(v),
                    Value::Timestamp(v) => FieldValue::Timestamp(v),
                    Value::Date(v) => FieldValue::Date(v),
                    Value::StringIndex(index) => {
                        let dictionary = self
                            .dictionary
                            .ok_or_else(|| CoreError::invalid_input("no dictionary loaded"))?;
                        FieldValue::Text(dictionary.index_to_string(index)?)
                    }
                })
            })
            .collect()
    }

    /// Returns the type of field `index`.
    #[must_use]
    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.header.field(index).map(|f| f.field_type())
    }
}
