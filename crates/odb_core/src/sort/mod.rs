//! Multi-key sorting.
//!
//! Records are compared slot by slot according to a [`KeyOrder`] and sorted
//! in place with a heapsort, either in a mapped file ([`Sorter::sort_file`])
//! or in any byte region ([`sort_in_place`]).

mod engine;
mod heap;
mod key;

pub use engine::{sort_and_merge, sort_in_place, Sorter};
pub use heap::{heap_sort, Permutable, RecordSlice, VecRecords};
pub use key::{KeyOrder, RecordComparator, SlotOrdering, SortKey};
