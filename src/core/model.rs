// rundex - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// These types are the shared vocabulary across both subsystems.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::util::constants::LEVEL_ORDER;

// =============================================================================
// File Record (output of listing and search)
// =============================================================================

/// A single file known to a finder, relative to the finder's root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Path relative to the bound directory, with "/" separators.
    pub relative_path: String,

    /// Whether the entry is a directory.
    pub is_directory: bool,

    /// Description from the first matching pattern rule, if any.
    pub matched_description: Option<String>,
}

// =============================================================================
// Selector
// =============================================================================

/// The four search dialects accepted by find/load operations.
///
/// Exactly one field should be set. When a caller supplies more than one,
/// only the first in priority order (path > substring > fuzzy > regex) is
/// honoured and the rest are ignored with a warning.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    /// Literal path, tried as given and then relative to the bound root.
    pub path: Option<String>,

    /// Substring matched anywhere in a relative path.
    pub substring: Option<String>,

    /// Fuzzy "/"-segmented path; each segment matches loosely.
    pub fuzzy: Option<String>,

    /// Raw regex applied to the full relative path.
    pub regex: Option<String>,
}

impl Selector {
    pub fn path(p: impl Into<String>) -> Self {
        Self {
            path: Some(p.into()),
            ..Self::default()
        }
    }

    pub fn substring(s: impl Into<String>) -> Self {
        Self {
            substring: Some(s.into()),
            ..Self::default()
        }
    }

    pub fn fuzzy(s: impl Into<String>) -> Self {
        Self {
            fuzzy: Some(s.into()),
            ..Self::default()
        }
    }

    pub fn regex(s: impl Into<String>) -> Self {
        Self {
            regex: Some(s.into()),
            ..Self::default()
        }
    }

    /// Number of dialects the caller filled in.
    pub fn dialect_count(&self) -> usize {
        [
            self.path.is_some(),
            self.substring.is_some(),
            self.fuzzy.is_some(),
            self.regex.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// Compact description for error messages and warnings.
    pub fn describe(&self) -> String {
        if let Some(p) = &self.path {
            format!("path:{p}")
        } else if let Some(s) = &self.substring {
            format!("substring:{s}")
        } else if let Some(fz) = &self.fuzzy {
            format!("fuzzy:{fz}")
        } else if let Some(r) = &self.regex {
            format!("regex:{r}")
        } else {
            "empty".to_string()
        }
    }
}

// =============================================================================
// Product values (decoded loads)
// =============================================================================

/// Decoded content of a product file, as returned by `load`.
///
/// Shared via `Arc` out of the finder cache, so repeated loads of the same
/// resolved path hand back the identical allocation.
#[derive(Debug)]
pub enum ProductValue {
    /// Parsed JSON document (configuration files).
    Json(serde_json::Value),

    /// UTF-8 text content (wavelength tables, plain-text data, logs).
    Text(String),

    /// Opaque binary content (LUT archives, MAT-files).
    Bytes(Vec<u8>),

    /// Raster product: parsed sidecar header plus a handle to the raw data.
    Raster(RasterHandle),
}

/// An extensionless raster product and its parsed sidecar header.
///
/// The data file itself is not loaded into memory; the header carries the
/// dimensions needed to interpret it and the handle records where the
/// bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterHandle {
    /// Path to the raw data file.
    pub data_path: PathBuf,

    /// Path to the sidecar header file.
    pub header_path: PathBuf,

    /// Header fields as written, keyed by lower-cased field name.
    pub header: BTreeMap<String, String>,

    /// Size of the raw data file in bytes.
    pub data_len: u64,
}

// =============================================================================
// LUT grid points
// =============================================================================

/// One dimension/value pair parsed from a LUT point-cloud entry name.
///
/// Point directories encode their sample coordinates as repeated
/// `name-value_` pairs, e.g. `AOT550-0.05_H2OSTR-1.5`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LutPoint {
    pub dimension: String,
    pub value: f64,
}

// =============================================================================
// Log records
// =============================================================================

/// A single parsed log record.
///
/// Mutable only by appending continuation text to `message`; every other
/// field is fixed at parse time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Parsed timestamp. `None` when the raw token did not match a known
    /// clock format; the raw text is still kept below.
    pub timestamp: Option<NaiveDateTime>,

    /// Timestamp token exactly as it appeared on the line.
    pub raw_timestamp: String,

    /// Severity level token (DEBUG, INFO, ...), as written.
    pub level: String,

    /// Message text, including any folded continuation lines.
    pub message: String,

    /// Emitting source file, when the line carried a source token.
    pub source_file: Option<String>,

    /// Emitting function within the source file, when present.
    pub source_func: Option<String>,

    /// Physical line number where this record began.
    pub line_number: u64,
}

/// What one parsed physical line did to the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// A new record was appended at this index.
    Record(usize),

    /// The record at this index absorbed a continuation line.
    Continuation(usize),
}

/// One formatted output line from `LevelClassifier::build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltLine {
    /// Rendered timestamp, or empty when timestamps are disabled or the
    /// record had none.
    pub timestamp: String,

    /// Level name left-padded to the common column width.
    pub level: String,

    /// Message text.
    pub message: String,
}

/// Sort key giving the canonical severity ordering: known levels in
/// `LEVEL_ORDER` position, unknown levels alphabetically after them.
pub fn level_sort_key(level: &str) -> (usize, String) {
    match LEVEL_ORDER.iter().position(|l| *l == level) {
        Some(idx) => (idx, String::new()),
        None => (LEVEL_ORDER.len(), level.to_string()),
    }
}

// =============================================================================
// Catalog tree
// =============================================================================

/// What kind of node a tree entry represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TreeKind {
    /// Directory claimed by a typed finder.
    Typed { type_id: String },

    /// Directory holding a nested catalog.
    Nested,

    /// Directory visible but unclassified; listed, never loaded.
    Unknown,

    /// Plain file entry.
    File,
}

/// One entry in a `get_tree` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    /// Entry name relative to its parent.
    pub name: String,

    /// Kind of node.
    pub kind: TreeKind,

    /// Directory or pattern description, when requested and known.
    pub description: Option<String>,

    /// Child entries, in listing order.
    pub children: Vec<TreeEntry>,
}

impl TreeEntry {
    /// Total number of entries in this subtree, excluding self.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}
