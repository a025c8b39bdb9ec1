// 📊 Rating Attachment - point-in-time credit rating join
//
// Ratings arrive as sparse effective-dated events per bond; a transaction
// gets the most recent rating known as of its execution date (same-day
// updates are visible, assumed public before trading). Where two agencies
// publish conflicting ratings on the same date, the worse one wins: a
// conservative resolution, applied before the join so the join itself is
// one-to-at-most-one. A transaction with no rating in the lookback window
// keeps a null rating; that is an outcome, not a fault.

use crate::records::{RatingAssignment, ReconciledTransaction, TransactionRecord};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity rank per raw rating label. Higher is worse; the scale runs
/// from 1 (prime) to 24 (default), with 25 reserved for not-rated.
/// Letter-only and notched variants from the three agencies share ranks.
pub fn severity_rank(label: &str) -> Option<u8> {
    let rank = match label {
        "AAA" | "Aaa" => 1,
        "Aa1" | "AA+" => 2,
        "Aa2" | "AA-" | "Aa" => 3,
        "Aa3" | "AA" => 4,
        "A+" | "A1" => 5,
        "A" | "A2" => 6,
        "A-" | "A3" => 7,
        "BBB+" | "Baa1" => 8,
        "BBB" | "Baa2" | "Baa" => 9,
        "BBB-" | "Baa3" => 10,
        "BB+" | "Ba1" => 11,
        "BB" | "Ba2" | "Ba" => 12,
        "BB-" | "Ba3" => 13,
        "B+" | "B1" => 14,
        "B" | "B2" => 15,
        "B-" | "B3" => 16,
        "CCC+" | "Caa1" | "Caa" => 17,
        "CCC" | "Caa2" => 18,
        "CCC-" | "Caa3" => 19,
        "CC" | "Ca" => 20,
        "C" => 21,
        "DDD" => 22,
        "DD" => 23,
        "D" => 24,
        "NR" => 25,
        _ => return None,
    };
    Some(rank)
}

/// Recognized rating agencies. Everything else (e.g. Duff & Phelps) is
/// excluded before the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingSource {
    Fitch,
    Moodys,
    StandardPoors,
}

impl RatingSource {
    pub fn parse(tag: &str) -> Option<RatingSource> {
        match tag {
            "FR" => Some(RatingSource::Fitch),
            "MR" => Some(RatingSource::Moodys),
            "SPR" => Some(RatingSource::StandardPoors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub cusip: String,
    pub effective_date: NaiveDate,
    pub label: String,
    pub rank: u8,
    pub source: RatingSource,
}

/// Collapse same-bond same-date conflicts to the worst (highest-rank)
/// rating. Returns the resolved set and the number of records removed.
pub fn resolve_conflicts(ratings: Vec<RatingRecord>) -> (Vec<RatingRecord>, usize) {
    let input_len = ratings.len();
    let mut worst: HashMap<(String, NaiveDate), RatingRecord> = HashMap::new();
    for rating in ratings {
        let key = (rating.cusip.clone(), rating.effective_date);
        match worst.get(&key) {
            Some(kept) if kept.rank >= rating.rank => {}
            _ => {
                worst.insert(key, rating);
            }
        }
    }
    let mut resolved: Vec<RatingRecord> = worst.into_values().collect();
    resolved.sort_by(|a, b| {
        (&a.cusip, a.effective_date).cmp(&(&b.cusip, b.effective_date))
    });
    let collapsed = input_len - resolved.len();
    (resolved, collapsed)
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct JoinCounts {
    pub matched: usize,
    pub unmatched: usize,
}

// ============================================================================
// AS-OF JOINER
// ============================================================================

pub struct AsOfJoiner {
    /// Maximum age of a rating still considered current, in days
    pub lookback_days: i64,
}

impl Default for AsOfJoiner {
    fn default() -> Self {
        AsOfJoiner { lookback_days: 366 }
    }
}

impl AsOfJoiner {
    pub fn new(lookback_days: i64) -> Self {
        AsOfJoiner { lookback_days }
    }

    /// Backward as-of join: each transaction receives the rating with the
    /// greatest effective date not exceeding its execution date, same bond,
    /// within the lookback horizon. Input ratings must already be
    /// conflict-resolved; dates per bond are sorted here.
    pub fn join(
        &self,
        transactions: Vec<TransactionRecord>,
        ratings: &[RatingRecord],
    ) -> (Vec<ReconciledTransaction>, JoinCounts) {
        let mut by_cusip: HashMap<&str, Vec<&RatingRecord>> = HashMap::new();
        for rating in ratings {
            by_cusip.entry(rating.cusip.as_str()).or_default().push(rating);
        }
        for timeline in by_cusip.values_mut() {
            timeline.sort_by_key(|r| r.effective_date);
        }

        let mut counts = JoinCounts::default();
        let reconciled = transactions
            .into_iter()
            .map(|record| {
                let rating = self.lookup(&by_cusip, &record);
                match rating {
                    Some(_) => counts.matched += 1,
                    None => counts.unmatched += 1,
                }
                ReconciledTransaction { record, rating }
            })
            .collect();

        log::debug!(
            "rating join: {} matched, {} without rating",
            counts.matched,
            counts.unmatched
        );

        (reconciled, counts)
    }

    fn lookup(
        &self,
        by_cusip: &HashMap<&str, Vec<&RatingRecord>>,
        record: &TransactionRecord,
    ) -> Option<RatingAssignment> {
        let timeline = by_cusip.get(record.cusip.as_str())?;
        let horizon = record.execution_date - Duration::days(self.lookback_days);
        // Position of the first rating dated after the transaction; the
        // entry just before it is the latest visible one
        let after = timeline.partition_point(|r| r.effective_date <= record.execution_date);
        let candidate = timeline[..after].last()?;
        if candidate.effective_date < horizon {
            return None;
        }
        Some(RatingAssignment {
            label: candidate.label.clone(),
            rank: candidate.rank,
            effective_date: candidate.effective_date,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
