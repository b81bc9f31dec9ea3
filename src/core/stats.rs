use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Aggregate quality statistics, always derivable from the record index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityMetrics {
    pub total: usize,
    pub band_counts: BandCounts,
    pub average_score: f64,
    pub histogram: BTreeMap<String, usize>,  // "0.0" ..= "1.0" -> count
    pub top_rated: Vec<RatedEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub high: usize,    // >= 0.8
    pub medium: usize,  // >= 0.5
    pub low: usize,     // < 0.5
}

impl BandCounts {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedEntry {
    pub id: String,
    pub score: f64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Phase of the current (or last) persistence cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistState {
    #[default]
    Idle,
    Serializing,
    WritingTemp,
    Renaming,
    Failed,
}

/// Summary of a durable write that did not complete. The snapshot itself
/// stays in memory, see `Store::fallback_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPersist {
    pub failed_at: DateTime<Utc>,
    pub error: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceStatus {
    pub enabled: bool,
    pub state: PersistState,
    pub last_saved: Option<DateTime<Utc>>,
    pub successful_persists: u64,
    pub failed_persists: u64,
    pub backups_written: u64,
    pub last_failure: Option<FailedPersist>,
}

impl PersistenceStatus {
    /// True when the newest in-memory state has failed to reach disk.
    pub fn is_degraded(&self) -> bool {
        self.last_failure.is_some()
    }
}

/// Everything `Store::metrics` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetrics {
    pub total: usize,
    pub band_counts: BandCounts,
    pub average_score: f64,
    pub histogram: BTreeMap<String, usize>,
    pub top_rated: Vec<RatedEntry>,
    pub last_saved: Option<DateTime<Utc>>,
    pub persistence: PersistenceStatus,
}

impl StoreMetrics {
    pub fn new(quality: QualityMetrics, persistence: PersistenceStatus) -> Self {
        StoreMetrics {
            total: quality.total,
            band_counts: quality.band_counts,
            average_score: quality.average_score,
            histogram: quality.histogram,
            top_rated: quality.top_rated,
            last_saved: persistence.last_saved,
            persistence,
        }
    }
}
