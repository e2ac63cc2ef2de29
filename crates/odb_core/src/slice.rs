//! Field projection and record range slicing.

use crate::error::{CoreError, CoreResult};
use crate::input::Input;
use crate::record::RecordWriter;
use odb_format::{FieldSpec, FieldType, Header, SLOT_SIZE};
use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use std::str::FromStr;
use tracing::debug;

/// A `start:step:stop` selection of record positions.
///
/// Positions are one-based and `stop` is inclusive. Negative `start` and
/// `stop` count from the end (`-1` is the last record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// First position.
    pub start: i64,
    /// Distance between selected positions.
    pub step: i64,
    /// Last position.
    pub stop: i64,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            start: 1,
            step: 1,
            stop: -1,
        }
    }
}

impl Range {
    /// Creates a range, rejecting zero in any position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if any component is zero.
    pub fn new(start: i64, step: i64, stop: i64) -> CoreResult<Self> {
        for (name, value) in [("start", start), ("step", step), ("stop", stop)] {
            if value == 0 {
                return Err(CoreError::invalid_input(format!(
                    "invalid range: {name} zero"
                )));
            }
        }
        Ok(Self { start, step, stop })
    }

    /// Resolves the range against an input.
    ///
    /// `record_count` is `Some` for seekable inputs. Streams only support
    /// positive steps and the offsets `-1` (which as a start selects nothing
    /// and as a stop means "until the end").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the range needs random access
    /// and the input is a stream.
    pub fn resolve(&self, record_count: Option<u64>) -> CoreResult<Option<Resolved>> {
        let Some(count) = record_count else {
            if (self.start < 0 && self.start != -1) || (self.stop < 0 && self.stop != -1) {
                return Err(CoreError::invalid_input(
                    "negative range offsets cannot be used with streamed inputs",
                ));
            }
            if self.step < 0 {
                return Err(CoreError::invalid_input(
                    "negative range strides cannot be used with streamed inputs",
                ));
            }
            if self.start == -1 {
                return Ok(None);
            }
            return Ok(Some(Resolved {
                start: self.start,
                step: self.step,
                stop: if self.stop == -1 { i64::MAX } else { self.stop },
                count: None,
            }));
        };

        let end = count as i64 + 1;
        let mut start = self.start;
        let mut stop = self.stop;
        if start < 0 {
            start = (start + end).max(1);
        }
        if stop < 0 {
            stop += end;
        }
        Ok(Some(Resolved {
            start,
            step: self.step,
            stop,
            count: Some(count),
        }))
    }
}

/// Parses `a`, `a:`, `:b`, `a:b`, `a:s:` or `a:s:b`.
impl FromStr for Range {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let invalid = || CoreError::invalid_input(format!("invalid range: {s}"));
        let number = |part: &str| part.parse::<i64>().map_err(|_| invalid());
        let parts: Vec<&str> = s.split(':').collect();
        let (start, step, stop) = match *parts.as_slice() {
            [a] => {
                let a = number(a)?;
                (a, 1, a)
            }
            [a, b] => {
                let a = if a.is_empty() { 1 } else { number(a)? };
                let b = if b.is_empty() { -1 } else { number(b)? };
                (a, 1, b)
            }
            [a, step, b] if !a.is_empty() && !step.is_empty() => {
                let b = if b.is_empty() { -1 } else { number(b)? };
                (number(a)?, number(step)?, b)
            }
            _ => return Err(invalid()),
        };
        Self::new(start, step, stop)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.step, self.stop)
    }
}

/// A range resolved against one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    start: i64,
    step: i64,
    stop: i64,
    count: Option<u64>,
}

impl Resolved {
    /// Returns the positions selected, at most `limit` of them.
    ///
    /// For streams the sequence is open-ended and reading stops at the end of
    /// the input.
    pub fn positions(&self, limit: u64) -> impl Iterator<Item = i64> + '_ {
        let upper = self.count.map_or(i64::MAX, |c| c as i64);
        (0..limit)
            .map(move |j| self.start.saturating_add((j as i64).saturating_mul(self.step)))
            .take_while(move |&x| {
                let within_stop = if self.step < 0 {
                    x >= self.stop
                } else {
                    x <= self.stop
                };
                within_stop && (1..=upper).contains(&x)
            })
    }
}

/// One entry of a cut list: `from[=to][:type]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutSpec {
    /// Source field name.
    pub from: String,
    /// Output field name.
    pub to: String,
    /// Output type; `None` keeps the source type.
    pub field_type: Option<FieldType>,
}

impl FromStr for CutSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let invalid = || CoreError::invalid_input(format!("invalid field cut: {s}"));
        let (names, field_type) = match s.split_once(':') {
            Some((names, ty)) => (names, Some(ty.parse::<FieldType>().map_err(|_| invalid())?)),
            None => (s, None),
        };
        let (from, to) = match names.split_once('=') {
            Some((from, to)) => (from, to),
            None => (names, names),
        };
        if from.is_empty() || to.is_empty() || to.contains('=') {
            return Err(invalid());
        }
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            field_type,
        })
    }
}

/// A list of output fields, each taken from a source field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    sources: Vec<usize>,
    header: Header,
}

impl Projection {
    /// Selects every field unchanged.
    #[must_use]
    pub fn identity(header: &Header) -> Self {
        Self {
            sources: (0..header.field_count()).collect(),
            header: header.clone(),
        }
    }

    /// Builds a projection from comma-separated cut specs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming the field list if it is malformed
    /// or its source field does not exist.
    pub fn parse(specs: &str, header: &Header) -> CoreResult<Self> {
        let cuts = specs
            .split(',')
            .map(str::parse)
            .collect::<CoreResult<Vec<CutSpec>>>()?;
        Self::new(&cuts, header)
    }

    /// Builds a projection from cut specs.
    ///
    /// # Errors
    ///
    /// See [`Projection::parse`].
    pub fn new(cuts: &[CutSpec], header: &Header) -> CoreResult<Self> {
        let mut sources = Vec::with_capacity(cuts.len());
        let mut fields = Vec::with_capacity(cuts.len());
        for cut in cuts {
            let invalid = || CoreError::invalid_input(format!("invalid field cut: {}", cut.from));
            let from = header.position(&cut.from).ok_or_else(invalid)?;
            let source = &header.fields()[from];
            let ty = cut.field_type.unwrap_or(source.field_type());
            sources.push(from);
            fields.push(FieldSpec::new(&cut.to, ty)?);
        }
        Ok(Self {
            sources,
            header: Header::new(fields)?,
        })
    }

    /// Returns the output header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Appends the projection of `record` to `out`.
    pub fn apply(&self, record: &[u8], out: &mut Vec<u8>) {
        for &from in &self.sources {
            out.extend_from_slice(&record[from * SLOT_SIZE..(from + 1) * SLOT_SIZE]);
        }
    }
}

/// Writes the projected header and the selected records of every input.
///
/// Each input contributes at most `limit` records. Returns the number of
/// records written.
///
/// A range starting at the last record (`-1`) selects nothing from a streamed
/// input, whose length is unknown; that input is skipped and the remaining
/// inputs are still processed.
///
/// # Errors
///
/// Returns an error if a range cannot be applied to an input or a read or
/// write fails.
pub fn cat<W: Write>(
    inputs: Vec<Input>,
    projection: &Projection,
    range: Range,
    limit: u64,
    sink: W,
) -> CoreResult<u64> {
    let mut writer = RecordWriter::create(sink, projection.header())?;
    let mut out = Vec::with_capacity(writer.layout().record_size());

    for mut input in inputs {
        let layout = input.header().layout();
        let mut record = vec![0u8; layout.record_size()];
        let Some(resolved) = range.resolve(input.record_count()?)? else {
            debug!(input = input.name(), "range selects nothing from stream");
            continue;
        };
        let seekable = input.handle().is_seekable();
        let mut records = input.records();
        let mut next = 1i64;

        for x in resolved.positions(limit) {
            if seekable {
                let offset = layout.header_size() as u64 + (x as u64 - 1) * layout.record_size() as u64;
                records.get_mut().seek(SeekFrom::Start(offset))?;
            } else if records.skip((x - next) as u64)? < (x - next) as u64 {
                break;
            }
            if !records.read_into(&mut record)? {
                break;
            }
            next = x + 1;
            out.clear();
            projection.apply(&record, &mut out);
            writer.write_record(&out)?;
        }
    }

    writer.flush()?;
    Ok(writer.records_written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_format::RecordLayout;

    fn header() -> Header {
        Header::parse_schema("id:int,name:string,price:float").unwrap()
    }

    #[test]
    fn range_grammar() {
        let r = |s: &str| s.parse::<Range>().unwrap();
        assert_eq!(r("5"), Range { start: 5, step: 1, stop: 5 });
        assert_eq!(r("5:"), Range { start: 5, step: 1, stop: -1 });
        assert_eq!(r(":7"), Range { start: 1, step: 1, stop: 7 });
        assert_eq!(r("2:7"), Range { start: 2, step: 1, stop: 7 });
        assert_eq!(r("2:3:"), Range { start: 2, step: 3, stop: -1 });
        assert_eq!(r("-1:-2:1"), Range { start: -1, step: -2, stop: 1 });
        assert_eq!(Range::default(), r("1:1:-1"));
    }

    #[test]
    fn range_rejects_bad_input() {
        for bad in ["", "x", "1:2:3:4", "0", "1:0:", ":0", "1::3", "::", "1;2"] {
            assert!(bad.parse::<Range>().is_err(), "accepted {bad:?}");
        }
        let err = "0:".parse::<Range>().unwrap_err();
        assert_eq!(err.to_string(), "invalid range: start zero");
    }

    #[test]
    fn resolve_seekable_counts_from_end() {
        let resolved = "-3:".parse::<Range>().unwrap().resolve(Some(10)).unwrap().unwrap();
        assert_eq!(resolved.positions(u64::MAX).collect::<Vec<_>>(), vec![8, 9, 10]);

        let reversed = "-1:-1:1".parse::<Range>().unwrap().resolve(Some(3)).unwrap().unwrap();
        assert_eq!(reversed.positions(u64::MAX).collect::<Vec<_>>(), vec![3, 2, 1]);

        let clamped = "-20:2:".parse::<Range>().unwrap().resolve(Some(5)).unwrap().unwrap();
        assert_eq!(clamped.positions(2).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn resolve_streamed_restrictions() {
        let range = |s: &str| s.parse::<Range>().unwrap();
        assert!(range("-2:").resolve(None).is_err());
        assert!(range("1:1:-2").resolve(None).is_err());
        assert!(range("3:-1:1").resolve(None).is_err());
        assert_eq!(range("-1").resolve(None).unwrap(), None);

        let resolved = range("2:2:").resolve(None).unwrap().unwrap();
        assert_eq!(resolved.positions(3).collect::<Vec<_>>(), vec![2, 4, 6]);
    }

    #[test]
    fn cut_spec_grammar() {
        let c: CutSpec = "price=cost:int".parse().unwrap();
        assert_eq!(c.from, "price");
        assert_eq!(c.to, "cost");
        assert_eq!(c.field_type, Some(FieldType::Integer));

        let c: CutSpec = "name".parse().unwrap();
        assert_eq!((c.from.as_str(), c.to.as_str(), c.field_type), ("name", "name", None));

        let c: CutSpec = "at:timestamp".parse().unwrap();
        assert_eq!(c.to, "at");
        assert_eq!(c.field_type, Some(FieldType::Timestamp));

        assert!("a=b=c".parse::<CutSpec>().is_err());
        assert!("a:blob".parse::<CutSpec>().is_err());
        assert!("=b".parse::<CutSpec>().is_err());
    }

    #[test]
    fn projection_selects_renames_and_retypes() {
        let p = Projection::parse("price=cost:int,id", &header()).unwrap();
        assert_eq!(p.header(), &Header::parse_schema("cost:int,id:int").unwrap());

        let mut record = Vec::new();
        RecordLayout::new(3).encode_into(&[7, 8, 9], &mut record);
        let mut out = Vec::new();
        p.apply(&record, &mut out);
        assert_eq!(out, [9i64.to_le_bytes(), 7i64.to_le_bytes()].concat());
        assert_eq!(p.header().layout().record_size(), 16);
    }

    #[test]
    fn projection_names_unknown_field() {
        let err = Projection::parse("id,bogus", &header()).unwrap_err();
        assert_eq!(err.to_string(), "invalid field cut: bogus");
    }

    #[test]
    fn identity_projection_keeps_header() {
        let h = header();
        assert_eq!(Projection::identity(&h).header(), &h);
    }
}
