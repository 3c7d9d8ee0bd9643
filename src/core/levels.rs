// rundex - core/levels.rs
//
// Severity-level classification and filtered rendering. The classifier
// accumulates record indices per level; `build` renders the filtered view
// against the caller's record list, so continuation text appended after
// ingestion is never lost.

use std::collections::BTreeMap;

use crate::core::model::{level_sort_key, BuiltLine, LogRecord};
use crate::util::constants::DEFAULT_LEVEL_PAD_EXTRA;

/// Per-level accumulation with an enable toggle.
#[derive(Debug, Clone)]
struct LevelBucket {
    enabled: bool,
    indices: Vec<usize>,
}

/// Count summary for one level, in canonical severity order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStat {
    pub level: String,
    pub enabled: bool,
    pub count: usize,
}

/// Accumulates parsed records per severity level and renders the enabled
/// subset as aligned output lines.
///
/// Buckets hold indices into the caller's record list rather than record
/// clones; the classifier never outlives one parse of one file.
#[derive(Debug, Clone)]
pub struct LevelClassifier {
    buckets: BTreeMap<String, LevelBucket>,
    timestamps_enabled: bool,
    pad_extra: usize,
}

impl Default for LevelClassifier {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            timestamps_enabled: true,
            pad_extra: DEFAULT_LEVEL_PAD_EXTRA,
        }
    }
}

impl LevelClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buckets one record by its level token. Unseen levels register
    /// themselves enabled.
    pub fn ingest(&mut self, index: usize, record: &LogRecord) {
        self.buckets
            .entry(record.level.clone())
            .or_insert_with(|| LevelBucket {
                enabled: true,
                indices: Vec::new(),
            })
            .indices
            .push(index);
    }

    /// Enables or disables one level. Toggling a level that has produced
    /// no records yet still registers the preference.
    pub fn toggle(&mut self, level: &str, enabled: bool) {
        self.buckets
            .entry(level.to_string())
            .or_insert_with(|| LevelBucket {
                enabled,
                indices: Vec::new(),
            })
            .enabled = enabled;
    }

    pub fn is_enabled(&self, level: &str) -> bool {
        self.buckets.get(level).map_or(true, |b| b.enabled)
    }

    /// Whether rendered lines carry the record timestamp.
    pub fn set_timestamps(&mut self, enabled: bool) {
        self.timestamps_enabled = enabled;
    }

    pub fn timestamps_enabled(&self) -> bool {
        self.timestamps_enabled
    }

    /// Extra padding beyond the longest enabled level name.
    pub fn set_pad_extra(&mut self, extra: usize) {
        self.pad_extra = extra;
    }

    /// Per-level counts in canonical severity order. Levels with no
    /// records are omitted.
    pub fn stats(&self) -> Vec<LevelStat> {
        let mut stats: Vec<LevelStat> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| !bucket.indices.is_empty())
            .map(|(level, bucket)| LevelStat {
                level: level.clone(),
                enabled: bucket.enabled,
                count: bucket.indices.len(),
            })
            .collect();
        stats.sort_by_key(|s| level_sort_key(&s.level));
        stats
    }

    /// Renders the enabled records as (timestamp, padded level, message)
    /// triples, in record order.
    ///
    /// The level column is padded to the longest enabled level name that
    /// contributed at least one record, plus the configured extra; a level
    /// with zero records never widens the column. Timestamps render the
    /// raw token as it appeared in the log, or empty when disabled.
    pub fn build(&self, records: &[LogRecord]) -> Vec<BuiltLine> {
        let width = self
            .buckets
            .iter()
            .filter(|(_, bucket)| bucket.enabled && !bucket.indices.is_empty())
            .map(|(level, _)| level.len())
            .max()
            .map(|longest| longest + self.pad_extra)
            .unwrap_or(0);

        let mut indices: Vec<usize> = self
            .buckets
            .values()
            .filter(|bucket| bucket.enabled)
            .flat_map(|bucket| bucket.indices.iter().copied())
            .collect();
        indices.sort_unstable();

        indices
            .into_iter()
            .filter_map(|index| records.get(index))
            .map(|record| BuiltLine {
                timestamp: if self.timestamps_enabled {
                    record.raw_timestamp.clone()
                } else {
                    String::new()
                },
                level: format!("{:>width$}", record.level),
                message: record.message.clone(),
            })
            .collect()
    }

    /// Drops every accumulated bucket entry. Enable toggles and the
    /// timestamp flag survive; only the record bookkeeping goes.
    pub fn reset(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.indices.clear();
        }
    }
}
