//! Sort keys and record comparison.

use crate::error::{CoreError, CoreResult};
use odb_format::{read_slot, Header};
use std::cmp::Ordering;

/// How slots are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotOrdering {
    /// Every slot compares as a signed 64-bit integer, floats included.
    ///
    /// Matches files sorted by earlier releases. Negative floats still sort
    /// before positive ones, but in reverse order among themselves.
    #[default]
    RawBits,
    /// Float, timestamp and date slots compare by IEEE-754 total order;
    /// integer and string slots compare as signed integers.
    Typed,
}

/// One key of a sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Zero-based field index.
    pub field: usize,
    /// True for descending order.
    pub descending: bool,
}

impl SortKey {
    /// Returns the signed one-based position (`-3` is field 3 descending).
    #[must_use]
    pub fn position(&self) -> i64 {
        let p = self.field as i64 + 1;
        if self.descending {
            -p
        } else {
            p
        }
    }
}

/// Ordered list of sort keys, evaluated left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrder {
    keys: Vec<SortKey>,
}

impl KeyOrder {
    /// Builds an order from signed one-based positions.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `positions` is empty or holds
    /// zero or a position beyond `field_count`.
    pub fn new(positions: &[i64], field_count: usize) -> CoreResult<Self> {
        if positions.is_empty() {
            return Err(CoreError::invalid_input("no sort keys"));
        }
        let keys = positions
            .iter()
            .map(|&p| {
                let field = p.unsigned_abs();
                if p == 0 || field > field_count as u64 {
                    return Err(CoreError::invalid_input(format!("invalid field: {p}")));
                }
                Ok(SortKey {
                    field: field as usize - 1,
                    descending: p < 0,
                })
            })
            .collect::<CoreResult<_>>()?;
        Ok(Self { keys })
    }

    /// Sorts by every field, ascending, in field order.
    #[must_use]
    pub fn all_ascending(field_count: usize) -> Self {
        Self {
            keys: (0..field_count)
                .map(|field| SortKey {
                    field,
                    descending: false,
                })
                .collect(),
        }
    }

    /// Parses field names separated by commas, each with an optional `+`
    /// (ascending) or `-` (descending) prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming the first unknown field.
    pub fn parse(spec: &str, header: &Header) -> CoreResult<Self> {
        let keys = spec
            .split(',')
            .map(|part| {
                let (name, descending) = match part.as_bytes().first() {
                    Some(b'-') => (&part[1..], true),
                    Some(b'+') => (&part[1..], false),
                    _ => (part, false),
                };
                let field = header
                    .position(name)
                    .ok_or_else(|| CoreError::invalid_input(format!("invalid field: {name}")))?;
                Ok(SortKey { field, descending })
            })
            .collect::<CoreResult<_>>()?;
        Ok(Self { keys })
    }

    /// Returns the keys.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Returns the signed one-based positions.
    #[must_use]
    pub fn positions(&self) -> Vec<i64> {
        self.keys.iter().map(SortKey::position).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedKey {
    field: usize,
    descending: bool,
    floating: bool,
}

/// Compares encoded records by a [`KeyOrder`].
///
/// The first key whose slots differ decides; records equal on every key
/// compare equal.
#[derive(Debug, Clone)]
pub struct RecordComparator {
    keys: Vec<ResolvedKey>,
}

impl RecordComparator {
    /// Creates a comparator for records of `header`.
    #[must_use]
    pub fn new(order: &KeyOrder, header: &Header, ordering: SlotOrdering) -> Self {
        let keys = order
            .keys()
            .iter()
            .map(|key| ResolvedKey {
                field: key.field,
                descending: key.descending,
                floating: ordering == SlotOrdering::Typed
                    && header
                        .field(key.field)
                        .is_some_and(|f| f.field_type().is_floating()),
            })
            .collect();
        Self { keys }
    }

    /// Creates a raw-bits comparator without a header.
    #[must_use]
    pub fn raw(order: &KeyOrder) -> Self {
        let keys = order
            .keys()
            .iter()
            .map(|key| ResolvedKey {
                field: key.field,
                descending: key.descending,
                floating: false,
            })
            .collect();
        Self { keys }
    }

    /// Compares two encoded records.
    #[must_use]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.compare_by(|field| (read_slot(a, field), read_slot(b, field)))
    }

    /// Compares two records given as slots.
    #[must_use]
    pub fn compare_slots(&self, a: &[i64], b: &[i64]) -> Ordering {
        self.compare_by(|field| (a[field], b[field]))
    }

    /// Returns true if `a` sorts strictly before `b`.
    #[must_use]
    pub fn less(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    fn compare_by(&self, slots: impl Fn(usize) -> (i64, i64)) -> Ordering {
        for key in &self.keys {
            let (x, y) = slots(key.field);
            if x == y {
                continue;
            }
            let ord = if key.floating {
                f64::from_bits(x as u64).total_cmp(&f64::from_bits(y as u64))
            } else {
                x.cmp(&y)
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
