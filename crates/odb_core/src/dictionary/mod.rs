//! String dictionary.
//!
//! String fields are stored as indices into a dictionary file built once from
//! a sorted list of unique strings. Lookups go through a minimal perfect hash,
//! so both directions are constant time.
//!
//! ## File layout
//!
//! Every section starts on an 8-byte boundary. All integers are `i64`
//! little-endian; offsets are absolute.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ STRINGS      NUL-terminated, input order   │
//! ├────────────────────────────────────────────┤
//! │ OFFSETS      offset of string i            │
//! ├────────────────────────────────────────────┤
//! │ REVERSE MAP  hash slot -> string index     │
//! ├────────────────────────────────────────────┤
//! │ HASH         serialized perfect hash       │
//! ├────────────────────────────────────────────┤
//! │ TRAILER      max_len | hash | reverse |    │
//! │              offsets | strings | count     │
//! └────────────────────────────────────────────┘
//! ```

mod builder;
pub mod mph;
mod reader;

pub use builder::{DictionaryBuilder, DictionaryStats};
pub use mph::{ChdHash, PerfectHash};
pub use reader::Dictionary;

/// Size of the trailer in bytes.
pub const TRAILER_SIZE: usize = 6 * 8;

/// Section alignment in bytes.
const ALIGNMENT: u64 = 8;

fn align_up(offset: u64) -> u64 {
    offset.div_ceil(ALIGNMENT) * ALIGNMENT
}
