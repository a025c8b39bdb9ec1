// 🧹 Correction Matcher - remove originals voided by cancel/correct messages
//
// Cancellations and corrections reference their target unambiguously via
// control number, so matching is exact key equality - no ambiguity
// resolution, no nearest-in-time logic. Void messages are always dropped,
// matched or not: an unmatched void simply references a report outside the
// current batch window, which is expected and not a data integrity fault.

use crate::records::{CorrectionKey, TransactionRecord};
use std::collections::HashMap;

/// Result of one correction-matching pass over a single-era, single-cycle
/// batch. Conservation holds: `retained.len() + voided + void_messages`
/// equals the input size.
#[derive(Debug)]
pub struct CorrectionOutcome {
    /// Candidates that survived (reversals included - they are consumed by
    /// the reversal matcher, not here)
    pub retained: Vec<TransactionRecord>,
    /// Candidates removed because a void message matched them
    pub voided: usize,
    /// Cancel/correct messages dropped (always all of them)
    pub void_messages: usize,
    /// Void messages that found no target in this batch
    pub unmatched_voids: usize,
}

pub struct CorrectionMatcher;

impl CorrectionMatcher {
    pub fn new() -> Self {
        CorrectionMatcher
    }

    /// Partition a harmonized batch into void messages and candidates, then
    /// drop every candidate whose business key matches a void message's key.
    ///
    /// Business key: economic terms + era-specific control number, where a
    /// void message contributes the control number of the report it voids.
    /// A void message without a back-reference can match nothing.
    pub fn apply(&self, batch: Vec<TransactionRecord>) -> CorrectionOutcome {
        let mut voids: Vec<TransactionRecord> = Vec::new();
        let mut candidates: Vec<TransactionRecord> = Vec::with_capacity(batch.len());
        for record in batch {
            if record.status.is_void_message() {
                voids.push(record);
            } else {
                candidates.push(record);
            }
        }

        // Value tracks whether the key hit at least one candidate
        let mut void_keys: HashMap<CorrectionKey, bool> = HashMap::with_capacity(voids.len());
        let mut blind_voids = 0usize;
        for void in &voids {
            match void.void_reference() {
                Some(reference) => {
                    let key = CorrectionKey {
                        economic: void.economic_key(),
                        control_number: Some(reference),
                    };
                    void_keys.entry(key).or_insert(false);
                }
                None => blind_voids += 1,
            }
        }

        let mut voided = 0usize;
        let mut retained = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match void_keys.get_mut(&candidate.correction_key()) {
                Some(hit) => {
                    *hit = true;
                    voided += 1;
                }
                None => retained.push(candidate),
            }
        }

        let unmatched_voids =
            void_keys.values().filter(|hit| !**hit).count() + blind_voids;

        log::debug!(
            "correction matching: {} candidates retained, {} voided, {} void messages ({} unmatched)",
            retained.len(),
            voided,
            voids.len(),
            unmatched_voids
        );

        CorrectionOutcome {
            retained,
            voided,
            void_messages: voids.len(),
            unmatched_voids,
        }
    }
}

impl Default for CorrectionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
