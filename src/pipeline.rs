// 🔄 Reconcile Pipeline - reverse-chronological batch orchestration
//
// Void information flows backward in time: a reversal filed after the
// schema cutover may void a report filed years earlier. Batches are
// therefore processed newest-first, with the unmatched-reversal carry
// handed from each pass to the next-earlier one by value. Within a batch
// the stage order is fixed: harmonize, correction matching, reversal
// matching. Duplicate-side collapsing and the rating join run once over
// the concatenated survivors, since neither crosses period boundaries.

use crate::corrections::CorrectionMatcher;
use crate::error::ReconcileResult;
use crate::harmonize::SchemaHarmonizer;
use crate::interdealer::DuplicateSideCollapser;
use crate::loader::PeriodBatch;
use crate::ratings::{resolve_conflicts, AsOfJoiner, JoinCounts, RatingRecord};
use crate::records::{Era, ReconciledTransaction, ReversalCarry, TransactionRecord};
use crate::reversals::{extract_reversals, ReversalMatcher};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Date separating the two reporting-format eras
    pub cutover: NaiveDate,
    /// Counterparty value marking a customer trade
    pub customer_marker: String,
    /// Maximum age of a rating still attached by the as-of join
    pub rating_lookback_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            cutover: NaiveDate::from_ymd_opt(2012, 2, 6).unwrap_or(NaiveDate::MIN),
            customer_marker: "C".to_string(),
            rating_lookback_days: 366,
        }
    }
}

// ============================================================================
// AUDIT SUMMARY
// ============================================================================

/// Per-period stage counts. These are a required output of every run,
/// not optional logging.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodCounts {
    pub period: i32,
    pub era: Era,
    pub input_rows: usize,
    pub harmonized: usize,
    pub missing_entity_key: usize,
    pub unrecognized_status: usize,
    pub corrections_voided: usize,
    pub correction_messages: usize,
    pub unmatched_voids: usize,
    pub reversals_voided: usize,
    pub reversals_unmatched: usize,
    pub reversals_carried_out: usize,
    pub reversal_duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub periods: Vec<PeriodCounts>,
    /// Sell-side duplicates dropped by the collapse stage
    pub duplicate_sides_dropped: usize,
    /// Same-date rating conflicts resolved before the join
    pub rating_conflicts_collapsed: usize,
    pub rating_join: JoinCounts,
    /// Carry entries left over after the earliest batch (counted, dropped)
    pub residual_carry: usize,
    pub output_rows: usize,
}

#[derive(Debug)]
pub struct ReconcileOutput {
    pub transactions: Vec<ReconciledTransaction>,
    pub summary: ReconcileSummary,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct ReconcilePipeline {
    pub config: PipelineConfig,
}

impl ReconcilePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        ReconcilePipeline { config }
    }

    /// Run the full reconciliation over a set of period batches and a
    /// rating event set. Batches may arrive in any order; they are
    /// processed newest-first to honor the carry handoff direction.
    pub fn run(
        &self,
        mut batches: Vec<PeriodBatch>,
        ratings: Vec<RatingRecord>,
    ) -> ReconcileResult<ReconcileOutput> {
        // Late era strictly before early, then newest period first. Era
        // ordering dominates because the cutover falls inside a calendar
        // period and the late-era part of it must be seen first.
        batches.sort_by_key(|b| {
            let era_rank = match b.era {
                Era::Late => 0,
                Era::Early => 1,
            };
            (era_rank, std::cmp::Reverse(b.period))
        });

        let harmonizer = SchemaHarmonizer::new();
        let correction_matcher = CorrectionMatcher::new();
        let reversal_matcher = ReversalMatcher::new(self.config.cutover);

        let mut periods = Vec::with_capacity(batches.len());
        let mut survivors: Vec<TransactionRecord> = Vec::new();
        let mut carry = ReversalCarry::empty();
        let mut seq_start = 0u64;

        for batch in batches {
            let period = batch.period;
            let era = batch.era;
            let input_rows = batch.rows.len();

            let harmonized = harmonizer.harmonize(batch.rows, seq_start)?;
            seq_start += harmonized.records.len() as u64;

            let mut counts = PeriodCounts {
                period,
                era,
                input_rows,
                harmonized: harmonized.records.len(),
                missing_entity_key: harmonized.missing_entity_key,
                unrecognized_status: harmonized.unrecognized_status,
                corrections_voided: 0,
                correction_messages: 0,
                unmatched_voids: 0,
                reversals_voided: 0,
                reversals_unmatched: 0,
                reversals_carried_out: 0,
                reversal_duplicates: 0,
            };

            let retained_before = survivors.len();
            let corrected = correction_matcher.apply(harmonized.records);
            counts.corrections_voided = corrected.voided;
            counts.correction_messages = corrected.void_messages;
            counts.unmatched_voids = corrected.unmatched_voids;

            let (candidates, reversals) = extract_reversals(corrected.retained);
            match era {
                Era::Late => {
                    let outcome = reversal_matcher.match_late(candidates, reversals);
                    counts.reversals_voided = outcome.voided;
                    counts.reversals_unmatched = outcome.unmatched;
                    counts.reversals_carried_out = outcome.carry.len();
                    carry = carry.merge(outcome.carry);
                    survivors.extend(outcome.retained);
                }
                Era::Early => {
                    let incoming = std::mem::replace(&mut carry, ReversalCarry::empty());
                    let outcome = reversal_matcher.match_early(candidates, reversals, incoming);
                    counts.reversals_voided = outcome.voided;
                    counts.reversals_unmatched = outcome.unmatched_own;
                    counts.reversals_carried_out = outcome.carry.len();
                    counts.reversal_duplicates = outcome.duplicates_collapsed;
                    carry = outcome.carry;
                    survivors.extend(outcome.retained);
                }
            }

            log::info!(
                "period {period} ({era}): {} in, {} retained, {} correction-voided, {} reversal-voided, {} carried",
                counts.input_rows,
                survivors.len() - retained_before,
                counts.corrections_voided,
                counts.reversals_voided,
                counts.reversals_carried_out
            );
            periods.push(counts);
        }

        let residual_carry = carry.len();
        if residual_carry > 0 {
            log::warn!("{residual_carry} carried reversals never found a target");
        }

        let collapser = DuplicateSideCollapser::new(&self.config.customer_marker);
        let collapsed = collapser.collapse(survivors);

        let (resolved_ratings, rating_conflicts_collapsed) = resolve_conflicts(ratings);
        let joiner = AsOfJoiner::new(self.config.rating_lookback_days);
        let (mut transactions, rating_join) = joiner.join(collapsed.retained, &resolved_ratings);

        // Final presentation order: entity key, then execution timeline,
        // sequence number as the deterministic last resort
        transactions.sort_by(|a, b| {
            (
                &a.record.cusip,
                a.record.execution_date,
                a.record.execution_time,
                a.record.seq,
            )
                .cmp(&(
                    &b.record.cusip,
                    b.record.execution_date,
                    b.record.execution_time,
                    b.record.seq,
                ))
        });

        let summary = ReconcileSummary {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            periods,
            duplicate_sides_dropped: collapsed.dropped,
            rating_conflicts_collapsed,
            rating_join,
            residual_carry,
            output_rows: transactions.len(),
        };

        log::info!(
            "run {}: {} reconciled transactions, {} duplicate sides dropped",
            summary.run_id,
            summary.output_rows,
            summary.duplicate_sides_dropped
        );

        Ok(ReconcileOutput { transactions, summary })
    }
}

// ============================================================================
// TESTS
// ============================================================================
