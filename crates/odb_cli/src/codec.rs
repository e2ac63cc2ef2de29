//! Text codecs.
//!
//! Encoding reads delimited lines; decoding writes delimited rows, an aligned
//! table, or a PostgreSQL `copy` script.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use odb_core::{Config, FieldValue, RecordEncoder};
use odb_format::{FieldType, Header, Value};
use std::fmt::Write as _;
use std::io::{self, Write};
use thiserror::Error;

/// Width of a numeric or time column in table output.
const COLUMN_WIDTH: usize = 20;

/// Errors produced while converting between text and values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A field is not a valid integer.
    #[error("invalid integer: {line}")]
    InvalidInteger {
        /// The offending line.
        line: String,
    },

    /// A field is not a valid float.
    #[error("invalid float: {line}")]
    InvalidFloat {
        /// The offending line.
        line: String,
    },

    /// A field does not match the timestamp or date format.
    #[error("invalid timestamp: {line}")]
    InvalidTime {
        /// The offending line.
        line: String,
    },

    /// A line has fewer fields than the schema.
    #[error("{what} expected: {line}")]
    MissingDelimiter {
        /// "tab" or "delimiter".
        what: &'static str,
        /// The offending line.
        line: String,
    },

    /// A time value cannot be rendered with the configured format.
    #[error("cannot format time {seconds} with {format:?}")]
    TimeFormat {
        /// Seconds since the epoch.
        seconds: f64,
        /// The format string.
        format: String,
    },
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

/// Splits `line` into exactly `count` fields. The last field takes the rest of
/// the line, delimiters included.
pub fn split_fields(line: &[u8], count: usize, delim: u8) -> Result<Vec<&[u8]>, CodecError> {
    let fields: Vec<&[u8]> = line.splitn(count, |&b| b == delim).collect();
    if fields.len() < count {
        return Err(CodecError::MissingDelimiter {
            what: if delim == b'\t' { "tab" } else { "delimiter" },
            line: lossy(line),
        });
    }
    Ok(fields)
}

/// Removes a trailing `\n` or `\r\n`.
pub fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parses one text field of `field_type`.
///
/// `line` is only used for error messages. A string field parses as a raw
/// dictionary index; text is resolved by the caller.
pub fn parse_scalar(
    text: &[u8],
    field_type: FieldType,
    config: &Config,
    line: &[u8],
) -> Result<Value, CodecError> {
    let text = std::str::from_utf8(text).map(str::trim_start);
    match field_type {
        FieldType::Integer => text
            .ok()
            .and_then(|t| t.parse().ok())
            .map(Value::Integer)
            .ok_or_else(|| CodecError::InvalidInteger { line: lossy(line) }),
        FieldType::Float => text
            .ok()
            .and_then(|t| t.parse().ok())
            .map(Value::Float)
            .ok_or_else(|| CodecError::InvalidFloat { line: lossy(line) }),
        // A raw dictionary index.
        FieldType::String => text
            .ok()
            .and_then(|t| t.parse().ok())
            .map(Value::StringIndex)
            .ok_or_else(|| CodecError::InvalidInteger { line: lossy(line) }),
        FieldType::Timestamp | FieldType::Date => {
            let format = time_format(field_type, config);
            let seconds = match (text, format) {
                (Ok(t), Some(f)) => parse_time(t, f),
                (Ok(t), None) => t.parse().ok(),
                (Err(_), _) => None,
            }
            .ok_or_else(|| CodecError::InvalidTime { line: lossy(line) })?;
            Ok(if field_type == FieldType::Timestamp {
                Value::Timestamp(seconds)
            } else {
                Value::Date(seconds)
            })
        }
    }
}

fn time_format(field_type: FieldType, config: &Config) -> Option<&str> {
    match field_type {
        FieldType::Timestamp => config.timestamp_format.as_deref(),
        FieldType::Date => config.date_format.as_deref(),
        _ => None,
    }
}

/// Parses `text` as UTC, returning seconds since the epoch.
///
/// Formats without a time of day parse as midnight.
pub fn parse_time(text: &str, format: &str) -> Option<f64> {
    let datetime = NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;
    Some(datetime.and_utc().timestamp() as f64)
}

/// Formats `seconds` since the epoch (rounded) as UTC text.
pub fn format_time(seconds: f64, format: &str) -> Result<String, CodecError> {
    let error = || CodecError::TimeFormat {
        seconds,
        format: format.to_string(),
    };
    let datetime = DateTime::from_timestamp(seconds.round() as i64, 0).ok_or_else(error)?;
    let mut out = String::new();
    write!(out, "{}", datetime.format(format)).map_err(|_| error())?;
    Ok(out)
}

/// Turns delimited text lines into slot vectors.
pub struct LineEncoder<'a> {
    /// Header used for parsing, with time types degraded where unformatted.
    header: &'a Header,
    encoder: RecordEncoder<'a>,
    config: &'a Config,
    delim: u8,
}

impl<'a> LineEncoder<'a> {
    pub fn new(
        header: &'a Header,
        encoder: RecordEncoder<'a>,
        config: &'a Config,
        delim: u8,
    ) -> Self {
        Self {
            header,
            encoder,
            config,
            delim,
        }
    }

    /// Parses one line (without its newline) into slots.
    pub fn encode_line(&self, line: &[u8]) -> Result<Vec<i64>, Box<dyn std::error::Error>> {
        let fields = split_fields(line, self.header.field_count(), self.delim)?;
        let values = fields
            .iter()
            .zip(self.header.fields())
            .map(|(text, spec)| match spec.field_type() {
                FieldType::String => Ok(self.encoder.string_value(text)?),
                ty => Ok(parse_scalar(text, ty, self.config, line)?),
            })
            .collect::<Result<Vec<_>, Box<dyn std::error::Error>>>()?;
        Ok(self.encoder.encode(&values)?)
    }
}

/// How floats are printed, after C's `%f`, `%e` and `%g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatStyle {
    /// Fixed notation.
    #[default]
    Fixed,
    /// Exponent notation.
    Exponent,
    /// Shortest of the two, trailing zeros removed.
    General,
    /// Shortest text that parses back to the same value.
    Exact,
}

const PRECISION: usize = 6;

impl FloatStyle {
    pub fn format(self, v: f64) -> String {
        if v.is_nan() {
            return "nan".to_string();
        }
        if v.is_infinite() {
            return if v > 0.0 { "inf" } else { "-inf" }.to_string();
        }
        match self {
            FloatStyle::Fixed => format!("{v:.PRECISION$}"),
            FloatStyle::Exponent => exponent(v, PRECISION),
            FloatStyle::General => general(v),
            FloatStyle::Exact => v.to_string(),
        }
    }
}

/// `%.{precision}e`: mantissa, sign, at least two exponent digits.
fn exponent(v: f64, precision: usize) -> String {
    let s = format!("{v:.precision$e}");
    let Some((mantissa, exp)) = s.split_once('e') else {
        return s;
    };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

fn general(v: f64) -> String {
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    // The exponent as %e would print it, after rounding.
    let rounded = format!("{v:.prec$e}", prec = PRECISION - 1);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exp < -4 || exp >= PRECISION as i32 {
        let s = exponent(v, PRECISION - 1);
        match s.split_once('e') {
            Some((mantissa, e)) => format!("{}e{e}", strip_zeros(mantissa)),
            None => s,
        }
    } else {
        let decimals = (PRECISION as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Output layout for decoded rows.
#[derive(Debug, Clone)]
pub enum RowStyle {
    /// Fields joined by a delimiter.
    Delimited {
        /// Field separator.
        delim: String,
    },
    /// Fixed-width columns with a heading.
    Table {
        /// Width of string columns: the longest dictionary string.
        string_width: usize,
    },
}

/// Writes decoded records as text.
pub struct RowWriter<'a> {
    style: RowStyle,
    floats: FloatStyle,
    config: &'a Config,
    /// Next line number, if numbering.
    line_number: Option<i64>,
    line: String,
}

impl<'a> RowWriter<'a> {
    pub fn new(
        style: RowStyle,
        floats: FloatStyle,
        config: &'a Config,
        line_number: Option<i64>,
    ) -> Self {
        Self {
            style,
            floats,
            config,
            line_number,
            line: String::new(),
        }
    }

    /// Writes the column heading and rule of table output.
    pub fn write_heading(&self, header: &Header, out: &mut dyn Write) -> io::Result<()> {
        let RowStyle::Table { string_width } = self.style else {
            return Ok(());
        };
        let mut line = String::new();
        if self.line_number.is_some() {
            line.push_str(&" ".repeat(12));
        }
        let last = header.field_count().saturating_sub(1);
        for (i, field) in header.fields().iter().enumerate() {
            let name = field.name();
            let len = name.len();
            match field.field_type() {
                FieldType::Float => {
                    line.push_str(&" ".repeat((COLUMN_WIDTH + 1).saturating_sub(len + 7)));
                    line.push_str(&name);
                    if i < last {
                        line.push_str(&" ".repeat(7));
                    }
                }
                FieldType::String => {
                    line.push(' ');
                    line.push_str(&name);
                    if i < last {
                        line.push_str(&" ".repeat(string_width.saturating_sub(len)));
                    }
                }
                _ => {
                    line.push_str(&" ".repeat((COLUMN_WIDTH + 1).saturating_sub(len)));
                    line.push_str(&name);
                }
            }
        }
        let strings = header.string_field_count();
        let mut dashes =
            (COLUMN_WIDTH + 1) * (header.field_count() - strings) + (string_width + 1) * strings + 1;
        if self.line_number.is_some() {
            dashes += 12;
        }
        writeln!(out, "{line}")?;
        writeln!(out, "{}", "-".repeat(dashes))
    }

    /// Writes one decoded record followed by a newline.
    pub fn write_row(
        &mut self,
        values: &[FieldValue<'_>],
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.line.clear();
        let table = matches!(self.style, RowStyle::Table { .. });
        match (&self.style, self.line_number.as_mut()) {
            (RowStyle::Delimited { delim }, Some(n)) => {
                write!(self.line, "{n}{delim}")?;
                *n += 1;
            }
            (RowStyle::Table { .. }, Some(n)) => {
                write!(self.line, "{n:>8}:    ")?;
                *n += 1;
            }
            (RowStyle::Table { .. }, None) => self.line.push(' '),
            (RowStyle::Delimited { .. }, None) => {}
        }

        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                match &self.style {
                    RowStyle::Delimited { delim } => self.line.push_str(delim),
                    RowStyle::Table { .. } => self.line.push(' '),
                }
            }
            let text = match *value {
                FieldValue::Integer(v) => v.to_string(),
                FieldValue::Float(v) => self.floats.format(v),
                FieldValue::Text(t) => String::from_utf8_lossy(t).into_owned(),
                FieldValue::Timestamp(v) => self.time(v, FieldType::Timestamp)?,
                FieldValue::Date(v) => self.time(v, FieldType::Date)?,
            };
            match (&self.style, value) {
                (RowStyle::Table { string_width }, FieldValue::Text(_)) => {
                    let width = *string_width;
                    write!(self.line, "{text:<width$}")?;
                }
                _ if table => write!(self.line, "{text:>COLUMN_WIDTH$}")?,
                _ => self.line.push_str(&text),
            }
        }
        self.line.push('\n');
        out.write_all(self.line.as_bytes())?;
        Ok(())
    }

    fn time(&self, seconds: f64, field_type: FieldType) -> Result<String, CodecError> {
        match time_format(field_type, self.config) {
            Some(format) => format_time(seconds, format),
            None => Ok(self.floats.format(seconds)),
        }
    }
}

/// Writes the `create table` and `copy` preamble of PostgreSQL output.
pub fn write_psql_preamble(table: &str, header: &Header, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "create table \"{table}\" (")?;
    let last = header.field_count().saturating_sub(1);
    for (i, field) in header.fields().iter().enumerate() {
        let comma = if i < last { "," } else { "" };
        writeln!(
            out,
            "  \"{}\" {}{comma}",
            field.name(),
            field.field_type().postgres_name()
        )?;
    }
    writeln!(out, ");")?;
    writeln!(out, "copy \"{table}\" from stdin;")
}

/// Ends the `copy` data of PostgreSQL output.
pub fn write_psql_trailer(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\\.")
}
