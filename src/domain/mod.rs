//! Domain layer: raw payload shape, snapshot extraction, and record
//! normalization.
//!
//! This module owns everything between the wire payload and the rows
//! the persistence layer writes: the tolerant extractor, the canonical
//! record type, and the coordinate/timestamp encoding rules.

pub mod payload;
pub mod record;

pub use payload::{RawSnapshot, Snapshot, extract};
pub use record::{NormalizeOutcome, NormalizedRecord, RawTrainEntry, RecordError, normalize};
