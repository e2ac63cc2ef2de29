//! # ODB Core
//!
//! Storage engine for ODB record files.
//!
//! This crate provides:
//! - String dictionary backed by a minimal perfect hash
//! - In-place, memory-mapped multi-key sort
//! - Streaming k-way merge of sorted files
//! - Record streams, field projection, range slicing and paste
//!
//! ```text
//! text ──► RecordEncoder ──► RecordWriter ──► file.odb
//!              │                                 │
//!          Dictionary ◄── DictionaryBuilder   sort_file (in place)
//!              │                                 │
//! text ◄── RecordDecoder ◄── Merger ◄─── RecordReader × k
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod dictionary;
mod error;
mod input;
pub mod merge;
mod paste;
mod record;
pub mod slice;
pub mod sort;

pub use config::{Config, DEFAULT_DATE_FORMAT, DEFAULT_STRINGS_PATH, DEFAULT_TIMESTAMP_FORMAT};
pub use dictionary::{ChdHash, Dictionary, DictionaryBuilder, DictionaryStats, PerfectHash};
pub use error::{CoreError, CoreResult};
pub use input::{open_all, Input};
pub use merge::{merge, Merger};
pub use paste::paste;
pub use record::{FieldValue, RecordDecoder, RecordEncoder, RecordReader, RecordWriter};
pub use slice::{cat, CutSpec, Projection, Range};
pub use sort::{
    heap_sort, sort_and_merge, sort_in_place, KeyOrder, Permutable, RecordComparator,
    RecordSlice, SlotOrdering, SortKey, Sorter, VecRecords,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
