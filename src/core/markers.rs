// rundex - core/markers.rs
//
// Phase-marker classification. A MarkerClassifier owns an ordered registry
// of (label, regex, enabled) entries; each record's message is tested
// against the registry in registration order and the first matching marker
// claims the record. One record belongs to at most one marker.
//
// Disabled markers still claim matching records; the toggle gates
// reporting only, so membership never shifts when a marker is flipped.

use regex::Regex;

use crate::core::model::LogRecord;
use crate::util::error::ParseError;

#[derive(Debug, Clone)]
struct Marker {
    label: String,
    regex: Regex,
    enabled: bool,
    indices: Vec<usize>,
    captured_sum: Option<u64>,
}

/// Count summary for one marker, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStat {
    pub label: String,
    pub enabled: bool,
    pub count: usize,

    /// Record index of the first claimed record, when any.
    pub first_index: Option<usize>,

    /// Running sum of the marker's first numeric capture group across all
    /// claimed records. None until a claim yields a numeric capture; the
    /// inversion batch-start marker accumulates its batch sizes here.
    pub captured_sum: Option<u64>,
}

/// Ordered first-match classifier binding pipeline phase boundaries to
/// log records.
#[derive(Debug, Clone, Default)]
pub struct MarkerClassifier {
    markers: Vec<Marker>,
}

/// Phase-boundary phrases emitted by the retrieval pipeline, in the order
/// they should claim records.
const DEFAULT_MARKERS: &[(&str, &str)] = &[
    ("Presolve start", r"Running ISOFIT initial guess"),
    ("Full solution start", r"Running ISOFIT with full LUT"),
    ("Inversion batch start", r"Beginning (\d+) inversions"),
    ("Inversion batch end", r"Inversions completed"),
    ("Analytic line start", r"Analytical line inference"),
    ("Analytic line end", r"Analytical line inversions complete"),
    ("LUT build", r"Building LUT"),
    ("LUT load", r"Loading LUT"),
    ("LUT simulate", r"Running simulations"),
    ("LUT flush", r"Flushing point"),
];

impl MarkerClassifier {
    /// An empty registry; markers are added with `register`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in phase-boundary registry, every marker enabled.
    pub fn with_defaults() -> Result<Self, ParseError> {
        let mut classifier = Self::new();
        for (label, pattern) in DEFAULT_MARKERS {
            classifier.register(label, pattern, true)?;
        }
        Ok(classifier)
    }

    /// Appends one marker to the registry. Registration order is match
    /// order and is never changed afterwards.
    pub fn register(
        &mut self,
        label: &str,
        pattern: &str,
        enabled: bool,
    ) -> Result<(), ParseError> {
        let regex = Regex::new(pattern).map_err(|source| ParseError::InvalidMarker {
            label: label.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
        self.markers.push(Marker {
            label: label.to_string(),
            regex,
            enabled,
            indices: Vec::new(),
            captured_sum: None,
        });
        Ok(())
    }

    /// Tests `record` against the registry in order; the first matching
    /// marker claims the record and the scan stops. Returns the claiming
    /// label.
    pub fn ingest(&mut self, index: usize, record: &LogRecord) -> Option<&str> {
        for marker in &mut self.markers {
            if let Some(captures) = marker.regex.captures(&record.message) {
                marker.indices.push(index);
                if let Some(value) = captures.get(1).and_then(|g| g.as_str().parse::<u64>().ok())
                {
                    marker.captured_sum = Some(marker.captured_sum.unwrap_or(0) + value);
                }
                return Some(marker.label.as_str());
            }
        }
        None
    }

    /// Enables or disables a marker by label. Returns false when no such
    /// marker is registered.
    pub fn toggle(&mut self, label: &str, enabled: bool) -> bool {
        match self.markers.iter_mut().find(|m| m.label == label) {
            Some(marker) => {
                marker.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Record indices claimed by the named marker, in claim order.
    pub fn records_for(&self, label: &str) -> Option<&[usize]> {
        self.markers
            .iter()
            .find(|m| m.label == label)
            .map(|m| m.indices.as_slice())
    }

    /// The marker that claimed a record index, if any.
    pub fn marker_of(&self, index: usize) -> Option<&str> {
        self.markers
            .iter()
            .find(|m| m.indices.contains(&index))
            .map(|m| m.label.as_str())
    }

    /// Per-marker counts in registration order. Disabled markers are
    /// included with their stored counts so a re-enable needs no re-parse.
    pub fn stats(&self) -> Vec<MarkerStat> {
        self.markers
            .iter()
            .map(|m| MarkerStat {
                label: m.label.clone(),
                enabled: m.enabled,
                count: m.indices.len(),
                first_index: m.indices.first().copied(),
                captured_sum: m.captured_sum,
            })
            .collect()
    }

    /// Number of registered markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Drops every claimed record index. Registration order and enable
    /// toggles survive.
    pub fn reset(&mut self) {
        for marker in &mut self.markers {
            marker.indices.clear();
            marker.captured_sum = None;
        }
    }
}
