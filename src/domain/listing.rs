//! Listing snapshots and the snapshot differ.
//!
//! A `Snapshot` is a full, immutable capture of the listing source keyed
//! by symbol. `SnapshotDiffer` keeps a baseline and turns each new
//! capture into the set of symbols that appeared since.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::errors::AnomalyError;

/// Default anomaly threshold: more new listings than this in one tick is fatal.
pub const DEFAULT_ANOMALY_THRESHOLD: usize = 10;

/// Default size above which a capture replaces the baseline.
pub const DEFAULT_BASELINE_REPLACE_ABOVE: usize = 300;

/// One listed asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Ticker symbol, unique within a snapshot.
    pub symbol: String,
    /// Display name.
    pub name: Option<String>,
    /// Chain identifier as published (e.g. "56").
    pub chain_id: Option<String>,
    /// Token contract address as published.
    pub contract_address: Option<String>,
    /// Remaining fields, untouched.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ListingRecord {
    /// Record with only a symbol set.
    pub fn bare(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            chain_id: None,
            contract_address: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Immutable point-in-time capture of the listing source.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: HashMap<String, ListingRecord>,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot; a later record with a repeated symbol wins.
    pub fn new(records: impl IntoIterator<Item = ListingRecord>, captured_at: DateTime<Utc>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.symbol.clone(), r))
            .collect();
        Self {
            records,
            captured_at,
        }
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the capture is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the capture was taken.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Look up a symbol.
    pub fn get(&self, symbol: &str) -> Option<&ListingRecord> {
        self.records.get(symbol)
    }

    /// Whether `symbol` is present.
    pub fn contains(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    /// All symbols.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

/// `keys(current) − keys(previous)`.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> BTreeSet<String> {
    current
        .symbols()
        .filter(|s| !previous.contains(s))
        .map(str::to_owned)
        .collect()
}

/// What to do when a diff exceeds the anomaly threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Stop the process.
    #[default]
    Abort,
    /// Drop that tick's alerts and keep watching.
    Suppress,
}

/// Baseline-holding differ.
///
/// The baseline is only replaced when a capture holds more than
/// `replace_above` entries; otherwise every tick diffs against the oldest
/// retained baseline. Symbols already reported against the current
/// baseline are not reported again until the baseline is replaced.
#[derive(Debug)]
pub struct SnapshotDiffer {
    baseline: Option<Snapshot>,
    reported: HashSet<String>,
    anomaly_threshold: usize,
    replace_above: usize,
}

impl SnapshotDiffer {
    /// Create a differ with no baseline.
    pub fn new(anomaly_threshold: usize, replace_above: usize) -> Self {
        Self {
            baseline: None,
            reported: HashSet::new(),
            anomaly_threshold,
            replace_above,
        }
    }

    /// Current baseline, if established.
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    /// Feed a fresh capture; returns the records to alert on, sorted by symbol.
    ///
    /// The first capture only establishes the baseline. More unreported
    /// symbols than the anomaly threshold returns `AnomalyError` with no
    /// records. The flooded symbols still count as seen and the baseline
    /// rule still runs, so a monitor that keeps going raises a burst once.
    pub fn observe(&mut self, current: Snapshot) -> Result<Vec<ListingRecord>, AnomalyError> {
        let Some(baseline) = &self.baseline else {
            self.baseline = Some(current);
            return Ok(Vec::new());
        };

        let added: Vec<String> = diff(baseline, &current)
            .into_iter()
            .filter(|s| !self.reported.contains(s))
            .collect();
        self.reported.extend(added.iter().cloned());

        if added.len() > self.anomaly_threshold {
            self.advance(current);
            return Err(AnomalyError {
                count: added.len(),
                threshold: self.anomaly_threshold,
                symbols: added,
            });
        }

        let fresh: Vec<ListingRecord> = added
            .iter()
            .filter_map(|s| current.get(s).cloned())
            .collect();
        self.advance(current);

        Ok(fresh)
    }

    /// Replace the baseline once a capture grows past `replace_above`.
    fn advance(&mut self, current: Snapshot) {
        if current.len() > self.replace_above {
            self.baseline = Some(current);
            self.reported.clear();
        }
    }
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new(DEFAULT_ANOMALY_THRESHOLD, DEFAULT_BASELINE_REPLACE_ABOVE)
    }
}
