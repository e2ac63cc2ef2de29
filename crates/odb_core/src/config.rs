//! Per-run configuration.

use crate::sort::SlotOrdering;
use odb_format::Header;
use std::path::PathBuf;

/// Default dictionary path.
pub const DEFAULT_STRINGS_PATH: &str = "strings.idx";

/// Default timestamp format (`strftime` syntax).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%F %T";

/// Default date format (`strftime` syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%F";

/// Configuration shared by the operations of one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the string dictionary.
    pub strings_path: PathBuf,

    /// Text format for timestamp fields; `None` treats them as floats.
    pub timestamp_format: Option<String>,

    /// Text format for date fields; `None` treats them as floats.
    pub date_format: Option<String>,

    /// How sort keys compare slots.
    pub slot_ordering: SlotOrdering,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strings_path: PathBuf::from(DEFAULT_STRINGS_PATH),
            timestamp_format: Some(DEFAULT_TIMESTAMP_FORMAT.to_string()),
            date_format: Some(DEFAULT_DATE_FORMAT.to_string()),
            slot_ordering: SlotOrdering::RawBits,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dictionary path.
    #[must_use]
    pub fn strings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.strings_path = path.into();
        self
    }

    /// Sets the timestamp format.
    #[must_use]
    pub fn timestamp_format(mut self, format: Option<String>) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Sets the date format.
    #[must_use]
    pub fn date_format(mut self, format: Option<String>) -> Self {
        self.date_format = format;
        self
    }

    /// Sets the slot ordering used by sort and merge.
    #[must_use]
    pub const fn slot_ordering(mut self, ordering: SlotOrdering) -> Self {
        self.slot_ordering = ordering;
        self
    }

    /// Returns `header` with time-like fields degraded to floats where no
    /// format is configured.
    #[must_use]
    pub fn effective_header(&self, header: &Header) -> Header {
        header.degrade_time_types(self.timestamp_format.is_none(), self.date_format.is_none())
    }
}
