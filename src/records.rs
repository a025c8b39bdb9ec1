// 📊 Canonical Data Model - era-tagged trade reports, reversals, carry
//
// Records are created once per input batch and never mutated afterwards.
// Every matching stage consumes its input and returns the retained records
// plus removal counts - filtering, never in-place edits.

use crate::error::{ReconcileError, ReconcileResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// ERA
// ============================================================================

/// One of the two mutually exclusive reporting-format eras, separated by a
/// fixed cutover date. The era determines which source fields are populated
/// and which business key the correction matcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    /// Reports filed before the cutover (original reporting standard)
    Early,
    /// Reports filed after the cutover (revised reporting standard)
    Late,
}

impl Era {
    /// Parse a caller-supplied era tag. An unrecognized tag is a fatal
    /// configuration error, not a data error.
    pub fn parse(tag: &str) -> ReconcileResult<Era> {
        // PRE/POST are the tags used by the upstream feed
        match tag.to_ascii_uppercase().as_str() {
            "EARLY" | "PRE" => Ok(Era::Early),
            "LATE" | "POST" => Ok(Era::Late),
            _ => Err(ReconcileError::UnknownEra(tag.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Era::Early => "EARLY",
            Era::Late => "LATE",
        }
    }
}

impl std::fmt::Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// STATUS & SIDE
// ============================================================================

/// Canonical report status. The harmonizer folds the era-specific status and
/// as-of codes into this one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    /// A plain trade report
    Normal,
    /// "The report identified by my back-reference is void" (cancellation)
    Cancel,
    /// Same voiding semantics as Cancel, filed as a correction
    Correct,
    /// Retroactive void of an economically identical earlier report,
    /// matched by business key + chronology rather than control number
    Reversal,
}

impl TradeStatus {
    /// Cancel/correct messages void their target by control number and are
    /// themselves always dropped.
    pub fn is_void_message(&self) -> bool {
        matches!(self, TradeStatus::Cancel | TradeStatus::Correct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(code: &str) -> Option<Side> {
        match code {
            "B" => Some(Side::Buy),
            "S" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Side::Buy => "B",
            Side::Sell => "S",
        }
    }
}

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// A harmonized trade report. Field names follow the canonical schema that
/// both eras are renamed into; `era` records which schema the report
/// originated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Batch-assigned sequence number reflecting original input order.
    /// Used for deterministic tie-breaks, never for matching.
    pub seq: u64,

    pub era: Era,
    pub status: TradeStatus,

    /// Security identifier (entity key)
    pub cusip: String,

    pub execution_date: NaiveDate,
    /// Execution date + time as one sortable timestamp
    pub execution_time: NaiveDateTime,
    pub report_date: NaiveDate,
    /// Report date + time as one sortable timestamp
    pub report_time: NaiveDateTime,

    pub side: Side,
    pub reporting_party: String,
    pub contra_party: String,

    pub quantity: f64,
    pub price: f64,

    /// This report's own control number
    pub control_number: Option<u64>,
    /// Back-reference to the voided report (cancel/correct/reversal messages)
    pub prev_control_number: Option<u64>,
}

impl TransactionRecord {
    /// The fields whose equality defines "same economic event".
    pub fn economic_key(&self) -> EconomicKey {
        EconomicKey {
            cusip: self.cusip.clone(),
            execution_time: self.execution_time,
            price_bits: self.price.to_bits(),
            quantity_bits: self.quantity.to_bits(),
            side: self.side,
            contra_party: self.contra_party.clone(),
        }
    }

    /// Business key for correction matching: economic terms plus this
    /// report's own control number.
    pub fn correction_key(&self) -> CorrectionKey {
        CorrectionKey {
            economic: self.economic_key(),
            control_number: self.control_number,
        }
    }

    /// The control number a void message uses to reference its target.
    /// Early-era messages carry an explicit previous-control field; late-era
    /// messages repeat the original report's own control number.
    pub fn void_reference(&self) -> Option<u64> {
        match self.era {
            Era::Early => self.prev_control_number,
            Era::Late => self.control_number,
        }
    }

    /// Inter-dealer means the counterparty is itself a dealer, not the
    /// customer marker. Records lacking a counterparty classification are
    /// treated as non-inter-dealer and pass through the collapser.
    pub fn is_inter_dealer(&self, customer_marker: &str) -> bool {
        !self.contra_party.is_empty() && self.contra_party != customer_marker
    }
}

/// Exact-match business key over economic terms. Prices and quantities are
/// compared bitwise: the ingestion contract guarantees typed values, and
/// exact equality (not tolerance) defines a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EconomicKey {
    pub cusip: String,
    pub execution_time: NaiveDateTime,
    pub price_bits: u64,
    pub quantity_bits: u64,
    pub side: Side,
    pub contra_party: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrectionKey {
    pub economic: EconomicKey,
    pub control_number: Option<u64>,
}

// ============================================================================
// REVERSAL RECORD & CARRY
// ============================================================================

/// A reversal message: "some earlier report matching these economic terms,
/// reported before this message, is void."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalRecord {
    /// Synthetic identifier assigned in input order by the matcher;
    /// allocation of contested candidates follows ascending rev_id.
    pub rev_id: u64,

    pub era: Era,
    pub cusip: String,
    pub execution_date: NaiveDate,
    pub execution_time: NaiveDateTime,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub contra_party: String,
    pub report_date: NaiveDate,
    pub report_time: NaiveDateTime,

    /// The reversal message's own control number (part of the dedupe key)
    pub control_number: Option<u64>,
    /// Late-era reversals reference their target by control number
    pub prev_control_number: Option<u64>,
}

impl ReversalRecord {
    pub fn from_transaction(tx: &TransactionRecord) -> ReversalRecord {
        ReversalRecord {
            rev_id: 0,
            era: tx.era,
            cusip: tx.cusip.clone(),
            execution_date: tx.execution_date,
            execution_time: tx.execution_time,
            price: tx.price,
            quantity: tx.quantity,
            side: tx.side,
            contra_party: tx.contra_party.clone(),
            report_date: tx.report_date,
            report_time: tx.report_time,
            control_number: tx.control_number,
            prev_control_number: tx.prev_control_number,
        }
    }

    pub fn economic_key(&self) -> EconomicKey {
        EconomicKey {
            cusip: self.cusip.clone(),
            execution_time: self.execution_time,
            price_bits: self.price.to_bits(),
            quantity_bits: self.quantity.to_bits(),
            side: self.side,
            contra_party: self.contra_party.clone(),
        }
    }

    /// Full identity key used to collapse duplicate reversal messages
    /// before matching (duplicate voiding would over-delete).
    pub fn dedupe_key(&self) -> ReversalDedupeKey {
        ReversalDedupeKey {
            economic: self.economic_key(),
            execution_date: self.execution_date,
            report_time: self.report_time,
            control_number: self.control_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReversalDedupeKey {
    pub economic: EconomicKey,
    pub execution_date: NaiveDate,
    pub report_time: NaiveDateTime,
    pub control_number: Option<u64>,
}

/// Reversals that could not be matched within their own era because the
/// voided transaction predates the era's data horizon. Produced at the end
/// of a later-era matching pass and moved - never aliased - into the
/// adjacent earlier-era pass. The inner vector is private so the only way
/// to consume a carry is to take ownership of it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReversalCarry {
    reversals: Vec<ReversalRecord>,
}

impl ReversalCarry {
    pub fn empty() -> ReversalCarry {
        ReversalCarry { reversals: Vec::new() }
    }

    pub fn new(reversals: Vec<ReversalRecord>) -> ReversalCarry {
        ReversalCarry { reversals }
    }

    pub fn len(&self) -> usize {
        self.reversals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reversals.is_empty()
    }

    /// Combine two carries, consuming both.
    pub fn merge(mut self, other: ReversalCarry) -> ReversalCarry {
        self.reversals.extend(other.reversals);
        self
    }

    pub fn into_inner(self) -> Vec<ReversalRecord> {
        self.reversals
    }
}

// ============================================================================
// RECONCILED OUTPUT
// ============================================================================

/// The as-of attribute attached by the point-in-time join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingAssignment {
    pub label: String,
    /// Severity rank, 1 = safest; total order over rating labels
    pub rank: u8,
    pub effective_date: NaiveDate,
}

/// A transaction that survived all matching/collapsing stages, augmented
/// with the latest rating known as of its execution date (None when no
/// rating exists within the lookback horizon - a valid outcome, not an
/// error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTransaction {
    pub record: TransactionRecord,
    pub rating: Option<RatingAssignment>,
}

// ============================================================================
// TESTS
// ============================================================================
