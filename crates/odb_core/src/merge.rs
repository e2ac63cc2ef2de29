//! Streaming k-way merge of sorted record streams.
//!
//! One record is buffered per source. Each step emits the smallest buffered
//! record (ties go to the lowest source index) and refills that source's
//! buffer on the following step, so memory stays at `k` records no matter how
//! long the inputs are.

use crate::error::{CoreError, CoreResult};
use crate::record::{RecordReader, RecordWriter};
use crate::sort::RecordComparator;
use odb_format::Header;
use std::io::{Read, Write};
use tracing::debug;

/// Merges sorted record streams into one sorted stream.
#[derive(Debug)]
pub struct Merger<R> {
    sources: Vec<RecordReader<R>>,
    heads: Vec<Vec<u8>>,
    live: Vec<bool>,
    comparator: RecordComparator,
    /// Source whose head was emitted last and must be refilled.
    pending: Option<usize>,
    emitted: u64,
}

impl<R: Read> Merger<R> {
    /// Creates a merger and reads the first record of every source.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources have different record sizes or a first
    /// read fails.
    pub fn new(sources: Vec<RecordReader<R>>, comparator: RecordComparator) -> CoreResult<Self> {
        let record_size = sources
            .first()
            .map_or(0, |s| s.layout().record_size());
        if let Some(odd) = sources
            .iter()
            .find(|s| s.layout().record_size() != record_size)
        {
            return Err(CoreError::invalid_input(format!(
                "record size of {} does not match the first input",
                odd.name()
            )));
        }

        let count = sources.len();
        let mut merger = Self {
            sources,
            heads: vec![vec![0u8; record_size]; count],
            live: vec![false; count],
            comparator,
            pending: None,
            emitted: 0,
        };
        for i in 0..count {
            merger.advance(i)?;
        }
        Ok(merger)
    }

    fn advance(&mut self, i: usize) -> CoreResult<()> {
        self.live[i] = self.sources[i].read_into(&mut self.heads[i])?;
        if !self.live[i] {
            debug!(input = self.sources[i].name(), "merge input exhausted");
        }
        Ok(())
    }

    /// Returns the next record in merged order, or `None` when every source
    /// is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an unexpected EOF error naming the source if a stream ends
    /// inside a record.
    pub fn next_record(&mut self) -> CoreResult<Option<&[u8]>> {
        if let Some(i) = self.pending.take() {
            self.advance(i)?;
        }
        let mut min: Option<usize> = None;
        for i in (0..self.heads.len()).filter(|&i| self.live[i]) {
            min = match min {
                Some(m) if !self.comparator.less(&self.heads[i], &self.heads[m]) => Some(m),
                _ => Some(i),
            };
        }
        let Some(i) = min else {
            return Ok(None);
        };
        self.pending = Some(i);
        self.emitted += 1;
        Ok(Some(&self.heads[i]))
    }

    /// Writes every remaining record to `writer`, returning how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or write fails.
    pub fn write_all<W: Write>(&mut self, writer: &mut RecordWriter<W>) -> CoreResult<u64> {
        let mut written = 0;
        while let Some(record) = self.next_record()? {
            writer.write_record(record)?;
            written += 1;
        }
        Ok(written)
    }

    /// Returns the number of records emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

/// Writes `header` and the merge of `sources` to `sink`.
///
/// Returns the number of records written.
///
/// # Errors
///
/// Returns an error if any read or write fails.
pub fn merge<R: Read, W: Write>(
    sources: Vec<RecordReader<R>>,
    header: &Header,
    comparator: RecordComparator,
    sink: W,
) -> CoreResult<u64> {
    let inputs = sources.len();
    let mut merger = Merger::new(sources, comparator)?;
    let mut writer = RecordWriter::create(sink, header)?;
    let written = merger.write_all(&mut writer)?;
    writer.flush()?;
    debug!(inputs, records = written, "merged inputs");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::KeyOrder;
    use odb_format::RecordLayout;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn stream(rows: &[Vec<i64>], field_count: usize) -> RecordReader<Cursor<Vec<u8>>> {
        let layout = RecordLayout::new(field_count);
        let mut bytes = Vec::new();
        for row in rows {
            layout.encode_into(row, &mut bytes);
        }
        RecordReader::new(Cursor::new(bytes), layout, "mem")
    }

    fn drain(merger: &mut Merger<Cursor<Vec<u8>>>, field_count: usize) -> Vec<Vec<i64>> {
        let layout = RecordLayout::new(field_count);
        let mut out = Vec::new();
        while let Some(record) = merger.next_record().unwrap() {
            let mut slots = vec![0; field_count];
            layout.decode_into(record, &mut slots);
            out.push(slots);
        }
        out
    }

    #[test]
    fn merges_in_order() {
        let a = stream(&[vec![1], vec![4], vec![7]], 1);
        let b = stream(&[vec![2], vec![5]], 1);
        let c = stream(&[vec![3], vec![6], vec![8], vec![9]], 1);
        let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
        let mut merger = Merger::new(vec![a, b, c], cmp).unwrap();

        let out = drain(&mut merger, 1);
        assert_eq!(out, (1..=9).map(|v| vec![v]).collect::<Vec<_>>());
        assert_eq!(merger.emitted(), 9);
    }

    #[test]
    fn ties_go_to_lowest_source() {
        // Key is field 1; field 2 tags the source.
        let a = stream(&[vec![1, 0], vec![2, 0]], 2);
        let b = stream(&[vec![1, 1], vec![2, 1]], 2);
        let cmp = RecordComparator::raw(&KeyOrder::new(&[1], 2).unwrap());
        let mut merger = Merger::new(vec![a, b], cmp).unwrap();

        let out = drain(&mut merger, 2);
        assert_eq!(out, vec![vec![1, 0], vec![1, 1], vec![2, 0], vec![2, 1]]);
    }

    #[test]
    fn empty_sources() {
        let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
        let mut merger = Merger::new(vec![stream(&[], 1), stream(&[], 1)], cmp).unwrap();
        assert!(merger.next_record().unwrap().is_none());
    }

    #[test]
    fn partial_record_names_source() {
        let layout = RecordLayout::new(1);
        let good = stream(&[vec![1]], 1);
        let bad = RecordReader::new(Cursor::new(vec![0u8; 12]), layout, "broken.odb");
        let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
        let mut merger = Merger::new(vec![good, bad], cmp).unwrap();

        merger.next_record().unwrap();
        let err = merger.next_record().unwrap_err();
        assert!(err.is_unexpected_eof());
        assert!(err.to_string().contains("broken.odb"));
    }

    #[test]
    fn mismatched_record_sizes_rejected() {
        let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
        assert!(Merger::new(vec![stream(&[], 1), stream(&[], 2)], cmp).is_err());
    }

    #[test]
    fn merge_writes_header_then_records() {
        let header = Header::parse_schema("v:int").unwrap();
        let a = stream(&[vec![2]], 1);
        let b = stream(&[vec![1]], 1);
        let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
        let mut out = Vec::new();
        assert_eq!(merge(vec![a, b], &header, cmp, &mut out).unwrap(), 2);

        assert_eq!(&out[..header.size()], header.to_bytes().as_slice());
        let body = &out[header.size()..];
        assert_eq!(body, [1i64.to_le_bytes(), 2i64.to_le_bytes()].concat());
    }

    proptest! {
        #[test]
        fn merge_of_sorted_runs_is_sorted(
            mut runs in prop::collection::vec(prop::collection::vec(-50i64..50, 0..40), 1..6),
        ) {
            for run in &mut runs {
                run.sort();
            }
            let sources = runs
                .iter()
                .map(|run| stream(&run.iter().map(|&v| vec![v]).collect::<Vec<_>>(), 1))
                .collect();
            let cmp = RecordComparator::raw(&KeyOrder::all_ascending(1));
            let mut merger = Merger::new(sources, cmp).unwrap();
            let out: Vec<i64> = drain(&mut merger, 1).into_iter().map(|r| r[0]).collect();

            let mut expected: Vec<i64> = runs.concat();
            expected.sort();
            prop_assert_eq!(out, expected);
        }
    }
}
