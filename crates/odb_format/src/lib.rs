//! # ODB Format
//!
//! Binary layout of ODB files.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ PREAMBLE (11 bytes)                                  │
//! │   magic "odb" | 0x0123456789abcdef (u64 LE)          │
//! ├──────────────────────────────────────────────────────┤
//! │ FIELD COUNT (i64 LE)                                 │
//! ├──────────────────────────────────────────────────────┤
//! │ FIELD SPECS (256 bytes each)                         │
//! │   type tag (u8) | name (255 bytes, NUL-padded)       │
//! ├──────────────────────────────────────────────────────┤
//! │ RECORDS (field_count × 8 bytes each, no prefix)      │
//! │   int: i64 | float/timestamp/date: f64 bits          │
//! │   string: dictionary index                           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```
//! use odb_format::Header;
//!
//! let header = Header::parse_schema("id:int,name:string").unwrap();
//! let bytes = header.to_bytes();
//! let decoded = Header::read(&mut bytes.as_slice()).unwrap();
//! assert!(header.is_compatible(&decoded));
//! assert_eq!(header.layout().record_size(), 16);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod header;
mod layout;
mod value;

pub use error::{FormatError, FormatResult};
pub use header::{
    compatible, has_preamble, preamble, FieldSpec, FieldType, Header, BYTE_ORDER_MARK,
    FIELD_SPEC_SIZE, MAGIC, NAME_SIZE, PREAMBLE_SIZE,
};
pub use layout::{read_slot, RecordLayout, SLOT_SIZE};
pub use value::Value;
