// ⛔ Error Taxonomy - configuration errors are fatal, data gaps are counts
//
// Two classes of failure:
// 1. Contract violations at the collaborator boundary (unknown era tag,
//    missing input column, unparseable field) → propagate as ReconcileError
// 2. Data-quality gaps (unmatched voids/reversals, unrated transactions)
//    → never errors, surfaced as counts in the audit summary

use crate::records::Era;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The era tag supplied by the caller is not one of the recognized
    /// reporting-format eras. Configuration error, not bad data.
    #[error("unrecognized era tag: {0:?} (expected EARLY or LATE)")]
    UnknownEra(String),

    /// A required column is absent from an input batch header.
    #[error("missing required column {column:?} in {era} era input")]
    MissingColumn { era: Era, column: String },

    /// A field that the ingestion contract guarantees to be typed could
    /// not be parsed.
    #[error("bad value {value:?} for field {field:?} at record {record}")]
    BadField {
        field: &'static str,
        value: String,
        record: u64,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
