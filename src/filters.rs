// 🧹 Trade-Level Filter - plausibility screens on the reconciled output
//
// Applied after reconciliation, never inside it: the matching stages must
// see every report, including the implausible ones, or void messages lose
// their targets. Screens follow the conventions of the bond-transaction
// literature: prices must be positive and below 220, volumes positive,
// and the execution date inside the sample window.

use crate::records::ReconciledTransaction;
use chrono::NaiveDate;

/// Upper price bound per Asquith et al. (2016).
const MAX_PRICE: f64 = 220.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilterCounts {
    pub bad_price: usize,
    pub bad_quantity: usize,
    pub out_of_window: usize,
    pub unrated: usize,
}

impl FilterCounts {
    pub fn total(&self) -> usize {
        self.bad_price + self.bad_quantity + self.out_of_window + self.unrated
    }
}

#[derive(Debug)]
pub struct FilterOutcome {
    pub retained: Vec<ReconciledTransaction>,
    pub counts: FilterCounts,
}

pub struct TradeLevelFilter {
    /// Earliest admissible execution date
    pub sample_start: NaiveDate,
    /// Drop transactions that received no rating in the as-of join
    pub require_rating: bool,
}

impl Default for TradeLevelFilter {
    fn default() -> Self {
        TradeLevelFilter {
            // Official start of the reporting system
            sample_start: NaiveDate::from_ymd_opt(2002, 7, 1)
                .unwrap_or(NaiveDate::MIN),
            require_rating: false,
        }
    }
}

impl TradeLevelFilter {
    pub fn apply(&self, transactions: Vec<ReconciledTransaction>) -> FilterOutcome {
        let mut counts = FilterCounts::default();
        let retained = transactions
            .into_iter()
            .filter(|tx| {
                let record = &tx.record;
                if !(record.price > 0.0 && record.price < MAX_PRICE) {
                    counts.bad_price += 1;
                    return false;
                }
                if !(record.quantity > 0.0) {
                    counts.bad_quantity += 1;
                    return false;
                }
                if record.execution_date < self.sample_start {
                    counts.out_of_window += 1;
                    return false;
                }
                if self.require_rating && tx.rating.is_none() {
                    counts.unrated += 1;
                    return false;
                }
                true
            })
            .collect();

        log::debug!(
            "trade-level filter: {} price, {} quantity, {} window, {} unrated",
            counts.bad_price,
            counts.bad_quantity,
            counts.out_of_window,
            counts.unrated
        );

        FilterOutcome { retained, counts }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Era, RatingAssignment, Side, TradeStatus, TransactionRecord};

    fn make_reconciled(price: f64, quantity: f64, date: NaiveDate) -> ReconciledTransaction {
        ReconciledTransaction {
            record: TransactionRecord {
                seq: 1,
                era: Era::Late,
                status: TradeStatus::Normal,
                cusip: "X1".to_string(),
                execution_date: date,
                execution_time: date.and_hms_opt(10, 30, 0).unwrap(),
                report_date: date,
                report_time: date.and_hms_opt(10, 31, 0).unwrap(),
                side: Side::Buy,
                reporting_party: "DLRA".to_string(),
                contra_party: "C".to_string(),
                quantity,
                price,
                control_number: Some(1),
                prev_control_number: None,
            },
            rating: None,
        }
    }

    fn in_sample() -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 6, 1).unwrap()
    }

    #[test]
    fn test_price_bounds() {
        let filter = TradeLevelFilter::default();
        let outcome = filter.apply(vec![
            make_reconciled(101.25, 10.0, in_sample()),
            make_reconciled(0.0, 10.0, in_sample()),
            make_reconciled(-5.0, 10.0, in_sample()),
            make_reconciled(220.0, 10.0, in_sample()),
            make_reconciled(219.99, 10.0, in_sample()),
        ]);

        assert_eq!(outcome.retained.len(), 2);
        assert_eq!(outcome.counts.bad_price, 3);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let filter = TradeLevelFilter::default();
        let outcome = filter.apply(vec![
            make_reconciled(101.25, 0.0, in_sample()),
            make_reconciled(101.25, -10.0, in_sample()),
        ]);

        assert!(outcome.retained.is_empty());
        assert_eq!(outcome.counts.bad_quantity, 2);
    }

    #[test]
    fn test_sample_window() {
        let filter = TradeLevelFilter::default();
        let before = NaiveDate::from_ymd_opt(2002, 6, 30).unwrap();
        let first_day = NaiveDate::from_ymd_opt(2002, 7, 1).unwrap();
        let outcome = filter.apply(vec![
            make_reconciled(101.25, 10.0, before),
            make_reconciled(101.25, 10.0, first_day),
        ]);

        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.counts.out_of_window, 1);
    }

    #[test]
    fn test_unrated_kept_unless_required() {
        let date = in_sample();
        let rated = {
            let mut tx = make_reconciled(101.25, 10.0, date);
            tx.rating = Some(RatingAssignment {
                label: "BBB".to_string(),
                rank: 9,
                effective_date: date,
            });
            tx
        };

        let lenient = TradeLevelFilter::default();
        let outcome = lenient.apply(vec![rated.clone(), make_reconciled(101.25, 10.0, date)]);
        assert_eq!(outcome.retained.len(), 2);

        let strict = TradeLevelFilter {
            require_rating: true,
            ..TradeLevelFilter::default()
        };
        let outcome = strict.apply(vec![rated, make_reconciled(101.25, 10.0, date)]);
        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.counts.unrated, 1);
    }

    #[test]
    fn test_counts_add_up() {
        let filter = TradeLevelFilter::default();
        let input = vec![
            make_reconciled(101.25, 10.0, in_sample()),
            make_reconciled(-1.0, 10.0, in_sample()),
            make_reconciled(101.25, 0.0, in_sample()),
        ];
        let input_len = input.len();

        let outcome = filter.apply(input);
        assert_eq!(outcome.retained.len() + outcome.counts.total(), input_len);
    }
}
