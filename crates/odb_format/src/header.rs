//! File preamble, field specs, and the header codec.

use crate::error::{FormatError, FormatResult};
use crate::layout::RecordLayout;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Magic tag at the start of every ODB file.
pub const MAGIC: [u8; 3] = *b"odb";

/// Constant whose little-endian bytes follow the magic tag.
///
/// Readers compare the bytes verbatim, so a file written with a different
/// byte order or format revision is rejected.
pub const BYTE_ORDER_MARK: u64 = 0x0123_4567_89ab_cdef;

/// Size of the preamble in bytes.
pub const PREAMBLE_SIZE: usize = MAGIC.len() + 8;

/// Size of the field count in bytes.
pub const FIELD_COUNT_SIZE: usize = 8;

/// Size of a field name buffer in bytes.
pub const NAME_SIZE: usize = 255;

/// Size of one encoded field spec (type tag plus name buffer).
pub const FIELD_SPEC_SIZE: usize = 1 + NAME_SIZE;

/// Upper bound on the field count accepted from a file header.
const MAX_FIELD_COUNT: i64 = 1 << 20;

/// The exact preamble bytes.
#[must_use]
pub const fn preamble() -> [u8; PREAMBLE_SIZE] {
    let bom = BYTE_ORDER_MARK.to_le_bytes();
    let mut out = [0u8; PREAMBLE_SIZE];
    let mut i = 0;
    while i < PREAMBLE_SIZE {
        out[i] = if i < MAGIC.len() {
            MAGIC[i]
        } else {
            bom[i - MAGIC.len()]
        };
        i += 1;
    }
    out
}

/// Returns true if `bytes` starts with the ODB preamble.
#[must_use]
pub fn has_preamble(bytes: &[u8]) -> bool {
    bytes.len() >= PREAMBLE_SIZE && bytes[..PREAMBLE_SIZE] == preamble()
}

/// Type of a field.
///
/// Every type is stored in one 8-byte slot. Timestamps and dates are seconds
/// since the epoch stored as a double, so at the storage layer they are
/// indistinguishable from floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum FieldType {
    /// Signed 64-bit integer.
    #[serde(rename = "int")]
    Integer = 0,
    /// 64-bit IEEE double.
    #[serde(rename = "float")]
    Float = 1,
    /// Index into the string dictionary.
    #[serde(rename = "string")]
    String = 2,
    /// Seconds since the epoch, as a double.
    #[serde(rename = "timestamp")]
    Timestamp = 3,
    /// Seconds since the epoch at midnight UTC, as a double.
    #[serde(rename = "date")]
    Date = 4,
}

impl FieldType {
    /// All field types in tag order.
    pub const ALL: [FieldType; 5] = [
        FieldType::Integer,
        FieldType::Float,
        FieldType::String,
        FieldType::Timestamp,
        FieldType::Date,
    ];

    /// Returns the on-disk tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Returns the type for an on-disk tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Returns the name used in schemas (`int`, `float`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Integer => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
        }
    }

    /// Returns the PostgreSQL column type.
    #[must_use]
    pub const fn postgres_name(self) -> &'static str {
        match self {
            FieldType::Integer => "bigint",
            FieldType::Float => "double precision",
            FieldType::String => "text",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
        }
    }

    /// Returns true for timestamp and date.
    #[must_use]
    pub const fn is_time_like(self) -> bool {
        matches!(self, FieldType::Timestamp | FieldType::Date)
    }

    /// Returns true if slots of this type hold an IEEE double.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(
            self,
            FieldType::Float | FieldType::Timestamp | FieldType::Date
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = FormatError;

    fn from_str(s: &str) -> FormatResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| FormatError::invalid_field_spec(format!("invalid type: {s}")))
    }
}

/// Name and type of one field.
///
/// The name is kept as the raw NUL-padded buffer so that compatibility checks
/// compare exactly what is on disk.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    name: [u8; NAME_SIZE],
    field_type: FieldType,
}

impl FieldSpec {
    /// Creates a field spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the name contains NUL or does not leave room for
    /// a terminating NUL in the name buffer.
    pub fn new(name: &str, field_type: FieldType) -> FormatResult<Self> {
        let bytes = name.as_bytes();
        if bytes.len() >= NAME_SIZE {
            return Err(FormatError::invalid_field_spec(format!(
                "field name too long: {name}"
            )));
        }
        if bytes.contains(&0) {
            return Err(FormatError::invalid_field_spec(format!(
                "field name contains NUL: {name:?}"
            )));
        }
        let mut buf = [0u8; NAME_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name: buf,
            field_type,
        })
    }

    /// Returns the name bytes up to the first NUL.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &self.name[..end]
    }

    /// Returns the name, replacing invalid UTF-8.
    #[must_use]
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// Returns the field type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns a copy with a different type.
    #[must_use]
    pub fn with_type(&self, field_type: FieldType) -> Self {
        Self {
            name: self.name,
            field_type,
        }
    }

    /// Returns a copy with a different name.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid field name.
    pub fn with_name(&self, name: &str) -> FormatResult<Self> {
        Self::new(name, self.field_type)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.field_type.tag());
        out.extend_from_slice(&self.name);
    }

    fn decode(bytes: &[u8; FIELD_SPEC_SIZE]) -> FormatResult<Self> {
        let field_type = FieldType::from_tag(bytes[0]).ok_or_else(|| {
            FormatError::invalid_header(format!("unknown field type tag {}", bytes[0]))
        })?;
        let mut name = [0u8; NAME_SIZE];
        name.copy_from_slice(&bytes[1..]);
        Ok(Self { name, field_type })
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name())
            .field("field_type", &self.field_type)
            .finish()
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name(), self.field_type)
    }
}

/// Parses `name:type`.
impl FromStr for FieldSpec {
    type Err = FormatError;

    fn from_str(s: &str) -> FormatResult<Self> {
        let (name, ty) = s
            .split_once(':')
            .ok_or_else(|| FormatError::invalid_field_spec(s.to_string()))?;
        FieldSpec::new(name, ty.parse()?)
    }
}

/// The schema at the start of every ODB file.
///
/// Invariant: at least one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    fields: Vec<FieldSpec>,
}

impl Header {
    /// Creates a header.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty.
    pub fn new(fields: Vec<FieldSpec>) -> FormatResult<Self> {
        if fields.is_empty() {
            return Err(FormatError::invalid_header("no fields"));
        }
        Ok(Self { fields })
    }

    /// Parses a comma-separated schema such as `id:int,name:string`.
    ///
    /// # Errors
    ///
    /// Returns an error if any field spec is invalid.
    pub fn parse_schema(schema: &str) -> FormatResult<Self> {
        let fields = schema
            .split(',')
            .map(str::parse)
            .collect::<FormatResult<Vec<FieldSpec>>>()?;
        Self::new(fields)
    }

    /// Concatenates the fields of several headers, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `headers` is empty.
    pub fn concat<'a>(headers: impl IntoIterator<Item = &'a Header>) -> FormatResult<Self> {
        let fields = headers
            .into_iter()
            .flat_map(|h| h.fields.iter().cloned())
            .collect();
        Self::new(fields)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the field specs.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns the field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    /// Returns the zero-based position of the first field named `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name_bytes() == name.as_bytes())
    }

    /// Returns the number of string fields.
    #[must_use]
    pub fn string_field_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::String)
            .count()
    }

    /// Returns the record layout for this header.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.fields.len())
    }

    /// Returns the encoded size of this header in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout().header_size()
    }

    /// Returns a copy in which timestamp and/or date fields become floats.
    ///
    /// Used when no time format is configured for a run; the stored bits are
    /// the same either way.
    #[must_use]
    pub fn degrade_time_types(&self, timestamps: bool, dates: bool) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|f| match f.field_type {
                FieldType::Timestamp if timestamps => f.with_type(FieldType::Float),
                FieldType::Date if dates => f.with_type(FieldType::Float),
                _ => f.clone(),
            })
            .collect();
        Self { fields }
    }

    /// Returns true if both headers have byte-identical field specs.
    #[must_use]
    pub fn is_compatible(&self, other: &Header) -> bool {
        self.fields == other.fields
    }

    /// Checks compatibility, naming `name` as the offending input on failure.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::SchemaMismatch`] if the headers differ.
    pub fn check_compatible(&self, other: &Header, name: &str) -> FormatResult<()> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(FormatError::schema_mismatch(name))
        }
    }

    /// Encodes the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(&preamble());
        out.extend_from_slice(&(self.fields.len() as i64).to_le_bytes());
        for field in &self.fields {
            field.encode(&mut out);
        }
        out
    }

    /// Writes the preamble, field count, and field specs.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write<W: Write + ?Sized>(&self, sink: &mut W) -> FormatResult<()> {
        sink.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Reads a header, leaving `source` positioned at the first record.
    ///
    /// # Errors
    ///
    /// - [`FormatError::InvalidPreamble`] if the preamble does not match
    /// - [`FormatError::UnexpectedEof`] if the header is truncated
    /// - [`FormatError::InvalidHeader`] for a bad field count or type tag
    pub fn read<R: Read + ?Sized>(source: &mut R) -> FormatResult<Self> {
        let mut pre = [0u8; PREAMBLE_SIZE];
        source
            .read_exact(&mut pre)
            .map_err(|e| FormatError::from_read(e, "reading header"))?;
        if pre != preamble() {
            return Err(FormatError::InvalidPreamble);
        }

        let mut count = [0u8; FIELD_COUNT_SIZE];
        source
            .read_exact(&mut count)
            .map_err(|e| FormatError::from_read(e, "reading header"))?;
        let count = i64::from_le_bytes(count);
        if !(1..=MAX_FIELD_COUNT).contains(&count) {
            return Err(FormatError::invalid_header(format!(
                "field count {count} out of range"
            )));
        }

        let mut fields = Vec::with_capacity(count as usize);
        let mut buf = [0u8; FIELD_SPEC_SIZE];
        for _ in 0..count {
            source
                .read_exact(&mut buf)
                .map_err(|e| FormatError::from_read(e, "reading header"))?;
            fields.push(FieldSpec::decode(&buf)?);
        }
        Ok(Self { fields })
    }
}

/// Returns true if `a` and `b` have byte-identical field specs.
#[must_use]
pub fn compatible(a: &Header, b: &Header) -> bool {
    a.is_compatible(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(schema: &str) -> Header {
        Header::parse_schema(schema).unwrap()
    }

    #[test]
    fn preamble_layout() {
        let p = preamble();
        assert_eq!(&p[..3], b"odb");
        assert_eq!(&p[3..], &BYTE_ORDER_MARK.to_le_bytes());
        assert_eq!(PREAMBLE_SIZE, 11);
    }

    #[test]
    fn header_round_trip() {
        let h = header("id:int,price:float,name:string,at:timestamp,on:date");
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), 11 + 8 + 5 * 256);
        assert_eq!(bytes.len(), h.size());

        let mut cursor = Cursor::new(&bytes);
        let read = Header::read(&mut cursor).unwrap();
        assert_eq!(read, h);
        assert_eq!(cursor.position() as usize, bytes.len());
    }

    #[test]
    fn field_spec_encoding_is_tag_then_padded_name() {
        let h = header("abc:string");
        let bytes = h.to_bytes();
        let spec = &bytes[19..];
        assert_eq!(spec[0], 2);
        assert_eq!(&spec[1..4], b"abc");
        assert!(spec[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn bad_preamble_rejected() {
        let mut bytes = header("a:int").to_bytes();
        bytes[10] ^= 0xff;
        let err = Header::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::InvalidPreamble));
    }

    #[test]
    fn byte_swapped_constant_rejected() {
        let mut bytes = header("a:int").to_bytes();
        bytes[3..11].copy_from_slice(&BYTE_ORDER_MARK.to_be_bytes());
        let err = Header::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::InvalidPreamble));
    }

    #[test]
    fn truncated_header_is_eof() {
        let bytes = header("a:int,b:int").to_bytes();
        let err = Header::read(&mut Cursor::new(&bytes[..bytes.len() - 1])).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));

        let err = Header::read(&mut Cursor::new(&[] as &[u8])).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }

    #[test]
    fn zero_field_count_rejected() {
        let mut bytes = preamble().to_vec();
        bytes.extend_from_slice(&0i64.to_le_bytes());
        let err = Header::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::InvalidHeader { .. }));
    }

    #[test]
    fn unknown_type_tag_rejected() {
        let mut bytes = header("a:int").to_bytes();
        bytes[19] = 9;
        let err = Header::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::InvalidHeader { .. }));
    }

    #[test]
    fn compatibility_is_exact() {
        let a = header("a:int,b:float");
        assert!(compatible(&a, &header("a:int,b:float")));
        assert!(!compatible(&a, &header("a:int,b:int")));
        assert!(!compatible(&a, &header("a:int,c:float")));
        assert!(!compatible(&a, &header("b:float,a:int")));
        assert!(!compatible(&a, &header("a:int")));
        assert!(compatible(&header("a:int"), &header("a:int")));
    }

    #[test]
    fn compatibility_sees_bytes_after_name_terminator() {
        let a = header("a:int");
        let mut bytes = a.to_bytes();
        bytes[19 + 1 + 10] = b'x';
        let b = Header::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(b.fields()[0].name(), "a");
        assert!(!a.is_compatible(&b));
        assert!(matches!(
            a.check_compatible(&b, "other.odb"),
            Err(FormatError::SchemaMismatch { name }) if name == "other.odb"
        ));
    }

    #[test]
    fn field_name_limits() {
        let longest = "n".repeat(NAME_SIZE - 1);
        assert!(FieldSpec::new(&longest, FieldType::Integer).is_ok());
        let too_long = "n".repeat(NAME_SIZE);
        assert!(FieldSpec::new(&too_long, FieldType::Integer).is_err());
        assert!(FieldSpec::new("a\0b", FieldType::Integer).is_err());
    }

    #[test]
    fn parse_schema_errors() {
        assert!(Header::parse_schema("a").is_err());
        assert!(Header::parse_schema("a:blob").is_err());
        assert!(Header::new(Vec::new()).is_err());
    }

    #[test]
    fn position_and_string_count() {
        let h = header("id:int,name:string,city:string");
        assert_eq!(h.position("name"), Some(1));
        assert_eq!(h.position("missing"), None);
        assert_eq!(h.string_field_count(), 2);
    }

    #[test]
    fn degrade_time_types() {
        let h = header("at:timestamp,on:date");
        let d = h.degrade_time_types(true, false);
        assert_eq!(d.fields()[0].field_type(), FieldType::Float);
        assert_eq!(d.fields()[1].field_type(), FieldType::Date);
        assert_eq!(d.fields()[0].name(), "at");
    }

    #[test]
    fn concat_headers() {
        let joined = Header::concat([&header("a:int"), &header("b:string,c:float")]).unwrap();
        assert_eq!(joined, header("a:int,b:string,c:float"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn field_strategy() -> impl Strategy<Value = FieldSpec> {
            (
                prop::string::string_regex("[a-z_][a-z0-9_]{0,40}").expect("Invalid regex"),
                0u8..5,
            )
                .prop_map(|(name, tag)| {
                    FieldSpec::new(&name, FieldType::from_tag(tag).unwrap()).unwrap()
                })
        }

        proptest! {
            #[test]
            fn header_survives_write_then_read(fields in prop::collection::vec(field_strategy(), 1..12)) {
                let header = Header::new(fields).unwrap();
                let bytes = header.to_bytes();
                let read = Header::read(&mut bytes.as_slice()).unwrap();
                prop_assert!(read.is_compatible(&header));
                prop_assert_eq!(read.to_bytes(), bytes);
            }
        }
    }
}
