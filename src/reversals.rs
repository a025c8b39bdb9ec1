// ⏪ Reversal Matcher - remove reports retroactively voided by reversals
//
// The delicate stage. A reversal does not (in the early era) reference a
// control number: it must be matched to the economically identical prior
// report, and when several qualify the match is disambiguated by time.
// Reversals can also straddle the schema cutover - a late-era reversal may
// void an early-era report - which is what the carry handoff exists for.
//
// Rules, in order:
//   1. Exact business-key equality on {cusip, execution time, price,
//      quantity, side, contra party} - no fuzziness.
//   2. Ordering: the candidate's reporting timestamp must be strictly
//      earlier than the reversal's. Later reports are never valid targets.
//   3. Tie-break: smallest time distance between the two reporting
//      timestamps wins; remaining ties go to the lowest sequence number.
//   4. At-most-one: each reversal consumes at most one candidate, each
//      candidate is consumed by at most one reversal. Contested candidates
//      are allocated in ascending reversal-id order.

use crate::records::{
    EconomicKey, ReversalCarry, ReversalRecord, TradeStatus, TransactionRecord,
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Split reversal messages out of a correction-matched candidate set.
pub fn extract_reversals(
    candidates: Vec<TransactionRecord>,
) -> (Vec<TransactionRecord>, Vec<ReversalRecord>) {
    let mut retained = Vec::with_capacity(candidates.len());
    let mut reversals = Vec::new();
    for record in candidates {
        if record.status == TradeStatus::Reversal {
            reversals.push(ReversalRecord::from_transaction(&record));
        } else {
            retained.push(record);
        }
    }
    (retained, reversals)
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug)]
pub struct LateReversalOutcome {
    pub retained: Vec<TransactionRecord>,
    /// Candidates removed by a matching reversal
    pub voided: usize,
    /// Unmatched reversals executing before the cutover: the voided report
    /// lives in earlier-era data not processed in this pass
    pub carry: ReversalCarry,
    /// Unmatched reversals executing after the cutover (counted, dropped)
    pub unmatched: usize,
}

#[derive(Debug)]
pub struct EarlyReversalOutcome {
    pub retained: Vec<TransactionRecord>,
    pub voided: usize,
    /// Carry entries still unmatched, passed through to the next-earlier
    /// batch in the handoff chain
    pub carry: ReversalCarry,
    /// This batch's own reversals that found no target (counted, dropped)
    pub unmatched_own: usize,
    /// Duplicate reversal messages collapsed before matching
    pub duplicates_collapsed: usize,
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct ReversalMatcher {
    /// Schema cutover date: reversals executing before it may reference
    /// reports in the other era
    pub cutover: NaiveDate,
}

impl ReversalMatcher {
    pub fn new(cutover: NaiveDate) -> Self {
        ReversalMatcher { cutover }
    }

    /// Late-era matching. Late-era reversal messages carry the voided
    /// report's control number, so this is exact-key matching like the
    /// correction stage: economic terms + (candidate control number =
    /// reversal previous-control-number).
    pub fn match_late(
        &self,
        candidates: Vec<TransactionRecord>,
        reversals: Vec<ReversalRecord>,
    ) -> LateReversalOutcome {
        // A reversal without a back-reference can match nothing
        let mut keys: HashMap<(EconomicKey, u64), bool> = HashMap::new();
        for reversal in &reversals {
            if let Some(prev) = reversal.prev_control_number {
                keys.entry((reversal.economic_key(), prev)).or_insert(false);
            }
        }

        let mut voided = 0usize;
        let mut retained = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let hit = candidate.control_number.and_then(|control| {
                keys.get_mut(&(candidate.economic_key(), control))
            });
            match hit {
                Some(matched) => {
                    *matched = true;
                    voided += 1;
                }
                None => retained.push(candidate),
            }
        }

        let mut carried = Vec::new();
        let mut unmatched = 0usize;
        for reversal in reversals {
            let matched = reversal
                .prev_control_number
                .and_then(|prev| keys.get(&(reversal.economic_key(), prev)))
                .copied()
                .unwrap_or(false);
            if matched {
                continue;
            }
            if reversal.execution_date < self.cutover {
                carried.push(reversal);
            } else {
                unmatched += 1;
            }
        }

        log::debug!(
            "late reversal matching: {} voided, {} carried, {} unmatched",
            voided,
            carried.len(),
            unmatched
        );

        LateReversalOutcome {
            retained,
            voided,
            carry: ReversalCarry::new(carried),
            unmatched,
        }
    }

    /// Early-era matching with chronological disambiguation. Consumes the
    /// carry from the adjacent later pass, merges it with this batch's own
    /// reversals, collapses duplicates, and allocates candidates under the
    /// ordering/tie-break/at-most-one rules.
    pub fn match_early(
        &self,
        candidates: Vec<TransactionRecord>,
        own_reversals: Vec<ReversalRecord>,
        carry: ReversalCarry,
    ) -> EarlyReversalOutcome {
        // Merge own reversals first, then the carry, and collapse exact
        // duplicates - double voiding would over-delete
        let mut seen: HashSet<_> = HashSet::new();
        let mut merged: Vec<(ReversalRecord, bool)> = Vec::new();
        let mut duplicates_collapsed = 0usize;
        let own_count = own_reversals.len();
        for (index, mut reversal) in own_reversals
            .into_iter()
            .chain(carry.into_inner())
            .enumerate()
        {
            let from_carry = index >= own_count;
            if seen.insert(reversal.dedupe_key()) {
                reversal.rev_id = merged.len() as u64 + 1;
                merged.push((reversal, from_carry));
            } else {
                duplicates_collapsed += 1;
            }
        }

        // Index candidates by economic key; per-key lists hold positions in
        // ascending sequence order for deterministic tie-breaks
        let mut by_key: HashMap<EconomicKey, Vec<usize>> = HashMap::new();
        for (position, candidate) in candidates.iter().enumerate() {
            by_key.entry(candidate.economic_key()).or_default().push(position);
        }
        for positions in by_key.values_mut() {
            positions.sort_by_key(|&p| candidates[p].seq);
        }

        let mut consumed = vec![false; candidates.len()];
        let mut voided = 0usize;
        let mut unmatched_own = 0usize;
        let mut carried = Vec::new();

        for (reversal, from_carry) in merged {
            let mut best: Option<(chrono::Duration, u64, usize)> = None;
            if let Some(positions) = by_key.get(&reversal.economic_key()) {
                for &position in positions {
                    if consumed[position] {
                        continue;
                    }
                    let candidate = &candidates[position];
                    // Ordering constraint: target must be reported strictly
                    // before the reversal
                    if candidate.report_time >= reversal.report_time {
                        continue;
                    }
                    let distance = reversal.report_time - candidate.report_time;
                    let entry = (distance, candidate.seq, position);
                    match best {
                        Some((d, s, _)) if (distance, candidate.seq) >= (d, s) => {}
                        _ => best = Some(entry),
                    }
                }
            }

            match best {
                Some((_, _, position)) => {
                    consumed[position] = true;
                    voided += 1;
                }
                None if from_carry => carried.push(reversal),
                None => unmatched_own += 1,
            }
        }

        let retained: Vec<TransactionRecord> = candidates
            .into_iter()
            .zip(consumed)
            .filter_map(|(candidate, gone)| (!gone).then_some(candidate))
            .collect();

        log::debug!(
            "early reversal matching: {} voided, {} carried through, {} own unmatched, {} duplicates collapsed",
            voided,
            carried.len(),
            unmatched_own,
            duplicates_collapsed
        );

        EarlyReversalOutcome {
            retained,
            voided,
            carry: ReversalCarry::new(carried),
            unmatched_own,
            duplicates_collapsed,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
