// Transaction Report Reconciliation - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod records;
pub mod harmonize;     // Schema Harmonizer - two eras, one canonical shape
pub mod corrections;   // Correction Matcher - cancel/correct voiding
pub mod reversals;     // Reversal Matcher - temporal disambiguation + carry
pub mod interdealer;   // Duplicate Side Collapser
pub mod ratings;       // Severity ranks + as-of rating join
pub mod filters;       // Trade-level plausibility screens
pub mod loader;        // CSV ingestion and output
pub mod pipeline;      // Reverse-chronological batch orchestration

// Re-export commonly used types
pub use error::{ReconcileError, ReconcileResult};
pub use records::{
    Era, Side, TradeStatus, TransactionRecord, EconomicKey, CorrectionKey,
    ReversalRecord, ReversalCarry, RatingAssignment, ReconciledTransaction,
};
pub use harmonize::{
    SchemaHarmonizer, HarmonizedBatch, RawRow, EarlyRawRow, LateRawRow,
    FieldMapping, field_map, validate_headers,
};
pub use corrections::{CorrectionMatcher, CorrectionOutcome};
pub use reversals::{
    ReversalMatcher, LateReversalOutcome, EarlyReversalOutcome, extract_reversals,
};
pub use interdealer::{DuplicateSideCollapser, CollapseOutcome};
pub use ratings::{
    AsOfJoiner, JoinCounts, RatingRecord, RatingSource,
    resolve_conflicts, severity_rank,
};
pub use filters::{TradeLevelFilter, FilterOutcome, FilterCounts};
pub use loader::{
    PeriodBatch, RatingLoadCounts,
    load_transaction_batch, load_ratings, write_reconciled_csv,
};
pub use pipeline::{
    ReconcilePipeline, PipelineConfig, ReconcileOutput, ReconcileSummary,
    PeriodCounts,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
