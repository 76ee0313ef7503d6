//! Raw upstream payload shape and snapshot extraction.
//!
//! The feed responds with `{"d": {"result": {"@CreationTime": ...,
//! "Trains": {"Train": [...]}}}}`. Any level may be absent, which the
//! extractor treats as "no data this cycle" rather than a failure.

use serde_json::Value;

/// Unparsed payload from one upstream exchange. No invariants are
/// enforced until [`extract`] runs.
pub type RawSnapshot = Value;

/// One extracted, validated point-in-time state of all tracked trains.
///
/// Train entries stay as raw JSON values so a single malformed entry
/// cannot poison the batch; each is parsed individually during
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Shared snapshot timestamp, format `YYYY.MM.DD HH:MM:SS`,
    /// local time in Europe/Budapest. Never empty.
    pub creation_time: String,
    /// Train entries in upstream order.
    pub trains: Vec<Value>,
}

/// Extracts the snapshot timestamp and train list from a raw payload.
///
/// Navigates `d → result → @CreationTime` and `d → result → Trains →
/// Train`, tolerating absent intermediate levels as empty. Returns
/// `None` (logged, not erred) when the result container or the creation
/// time is missing, a routine "no data" outcome.
#[must_use]
pub fn extract(raw: &RawSnapshot) -> Option<Snapshot> {
    let result = raw.get("d").and_then(|d| d.get("result"));
    let Some(result) = result.filter(|r| r.as_object().is_some_and(|o| !o.is_empty())) else {
        tracing::warn!("no result found in the data");
        return None;
    };

    let creation_time = result
        .get("@CreationTime")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let Some(creation_time) = creation_time else {
        tracing::warn!("no creation time found in the data");
        return None;
    };

    let trains = result
        .get("Trains")
        .and_then(|t| t.get("Train"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(Snapshot {
        creation_time: creation_time.to_string(),
        trains,
    })
}
