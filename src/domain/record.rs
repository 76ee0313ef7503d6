//! Record normalization: raw train entries to canonical records.
//!
//! The shared snapshot timestamp is parsed once per batch, interpreted
//! as local time in Europe/Budapest and converted to epoch seconds.
//! Coordinates are scaled to micro-degrees (degrees × 1e6) with
//! half-to-even rounding, matching the downstream precision contract.

use chrono::NaiveDateTime;
use chrono_tz::Europe::Budapest;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use super::payload::Snapshot;
use crate::error::TrackerError;

/// Timestamp format used by the upstream feed.
const CREATION_TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Timezone the feed's timestamps are expressed in.
const FEED_TIMEZONE: Tz = Budapest;

/// One upstream train object. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTrainEntry {
    /// Delay in minutes.
    #[serde(rename = "@Delay")]
    pub delay: Option<f64>,
    /// Latitude in floating degrees.
    #[serde(rename = "@Lat")]
    pub lat: Option<f64>,
    /// Longitude in floating degrees.
    #[serde(rename = "@Lon")]
    pub lon: Option<f64>,
    /// Line designation (e.g. `"1"`).
    #[serde(rename = "@Line")]
    pub line: Option<String>,
    /// Origin–destination relation.
    #[serde(rename = "@Relation")]
    pub relation: Option<String>,
    /// Route path ("menetvonal").
    #[serde(rename = "@Menetvonal")]
    pub menetvonal: Option<String>,
    /// External ELVIRA identifier.
    #[serde(rename = "@ElviraID")]
    pub elvira_id: Option<String>,
    /// Train number.
    #[serde(rename = "@TrainNumber")]
    pub train_number: Option<String>,
}

/// Why a single train entry was skipped during normalization.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The entry did not match the expected field types.
    #[error("malformed train entry: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A coordinate does not scale to a representable micro-degree value.
    #[error("coordinate out of range: {0}")]
    CoordinateRange(f64),
}

/// Canonical record for one train observation, ready to persist.
///
/// Constructed per raw entry and consumed immediately by the writer;
/// not retained across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Snapshot timestamp as epoch seconds, shared across the batch.
    pub created_at: i64,
    /// Delay in minutes, if reported.
    pub delay: Option<f64>,
    /// Latitude in micro-degrees, if reported.
    pub lat_micro: Option<i64>,
    /// Longitude in micro-degrees, if reported.
    pub lon_micro: Option<i64>,
    /// Line designation.
    pub line: Option<String>,
    /// Origin–destination relation.
    pub relation: Option<String>,
    /// Route path.
    pub menetvonal: Option<String>,
    /// External ELVIRA identifier.
    pub elvira_id: Option<String>,
    /// Train number.
    pub train_number: Option<String>,
}

impl NormalizedRecord {
    fn from_entry(created_at: i64, entry: RawTrainEntry) -> Result<Self, RecordError> {
        Ok(Self {
            created_at,
            delay: entry.delay,
            lat_micro: entry.lat.map(micro_degrees).transpose()?,
            lon_micro: entry.lon.map(micro_degrees).transpose()?,
            line: entry.line,
            relation: entry.relation,
            menetvonal: entry.menetvonal,
            elvira_id: entry.elvira_id,
            train_number: entry.train_number,
        })
    }

    fn from_value(created_at: i64, value: &Value) -> Result<Self, RecordError> {
        let entry: RawTrainEntry = serde_json::from_value(value.clone())?;
        Self::from_entry(created_at, entry)
    }
}

/// Result of normalizing one snapshot: canonical records in input order
/// plus the entries that were skipped, with their reasons.
#[derive(Debug)]
pub struct NormalizeOutcome {
    /// Successfully normalized records, mirroring input order.
    pub records: Vec<NormalizedRecord>,
    /// Skipped entries as `(input index, reason)` pairs.
    pub skipped: Vec<(usize, RecordError)>,
}

/// Normalizes every train entry of a snapshot.
///
/// A malformed entry is collected into [`NormalizeOutcome::skipped`] and
/// does not abort the batch. An empty train list yields an empty outcome
/// and the cycle becomes a no-op.
///
/// # Errors
///
/// Returns [`TrackerError::Timestamp`] when the shared creation time
/// cannot be parsed or does not exist in the feed timezone; the whole
/// snapshot is discarded in that case.
pub fn normalize(snapshot: &Snapshot) -> Result<NormalizeOutcome, TrackerError> {
    let created_at = snapshot_epoch(&snapshot.creation_time)?;

    let mut records = Vec::with_capacity(snapshot.trains.len());
    let mut skipped = Vec::new();
    for (index, value) in snapshot.trains.iter().enumerate() {
        match NormalizedRecord::from_value(created_at, value) {
            Ok(record) => records.push(record),
            Err(error) => skipped.push((index, error)),
        }
    }

    Ok(NormalizeOutcome { records, skipped })
}

/// Converts the feed's `YYYY.MM.DD HH:MM:SS` local timestamp to epoch
/// seconds. An ambiguous local time (DST fold) resolves to the earlier
/// instant.
fn snapshot_epoch(creation_time: &str) -> Result<i64, TrackerError> {
    let naive = NaiveDateTime::parse_from_str(creation_time, CREATION_TIME_FORMAT)
        .map_err(|e| TrackerError::Timestamp(format!("{creation_time:?}: {e}")))?;
    let local = naive.and_local_timezone(FEED_TIMEZONE).earliest().ok_or_else(|| {
        TrackerError::Timestamp(format!("{creation_time:?} does not exist in {FEED_TIMEZONE}"))
    })?;
    Ok(local.timestamp())
}

/// Scales a coordinate to micro-degrees with half-to-even rounding.
fn micro_degrees(degrees: f64) -> Result<i64, RecordError> {
    let micro = (degrees * 1e6).round_ties_even();
    if !micro.is_finite() || micro < i64::MIN as f64 || micro > i64::MAX as f64 {
        return Err(RecordError::CoordinateRange(degrees));
    }
    Ok(micro as i64)
}
