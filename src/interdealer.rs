// 🤝 Duplicate Side Collapser - one report per bilateral trade
//
// A trade between two dealers is reported twice, once by each party, with
// the party fields mirrored and the side flipped. Both reports describe the
// same economic event, so exactly one must survive. Convention: keep the
// buy-side report, drop the sell-side report. The choice is arbitrary but
// deliberate, and downstream consumers depend on it being stable.

use crate::records::{Side, TransactionRecord};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Join key for pairing the two sides of one inter-dealer trade. The buy
/// side probes with its party fields swapped, so a hit means the two
/// reports name each other as counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
    cusip: String,
    execution_date: NaiveDate,
    quantity_bits: u64,
    price_bits: u64,
    reporting_party: String,
    contra_party: String,
}

impl PairKey {
    fn of(record: &TransactionRecord) -> PairKey {
        PairKey {
            cusip: record.cusip.clone(),
            execution_date: record.execution_date,
            quantity_bits: record.quantity.to_bits(),
            price_bits: record.price.to_bits(),
            reporting_party: record.reporting_party.clone(),
            contra_party: record.contra_party.clone(),
        }
    }

    fn mirrored(record: &TransactionRecord) -> PairKey {
        PairKey {
            cusip: record.cusip.clone(),
            execution_date: record.execution_date,
            quantity_bits: record.quantity.to_bits(),
            price_bits: record.price.to_bits(),
            reporting_party: record.contra_party.clone(),
            contra_party: record.reporting_party.clone(),
        }
    }
}

#[derive(Debug)]
pub struct CollapseOutcome {
    pub retained: Vec<TransactionRecord>,
    /// Sell-side reports dropped as the duplicate half of a matched pair
    pub dropped: usize,
    /// Customer-facing records, passed through without inspection
    pub pass_through: usize,
}

pub struct DuplicateSideCollapser {
    /// Counterparty value marking a customer trade (single-sided by nature)
    pub customer_marker: String,
}

impl Default for DuplicateSideCollapser {
    fn default() -> Self {
        DuplicateSideCollapser {
            customer_marker: "C".to_string(),
        }
    }
}

impl DuplicateSideCollapser {
    pub fn new(customer_marker: &str) -> Self {
        DuplicateSideCollapser {
            customer_marker: customer_marker.to_string(),
        }
    }

    pub fn collapse(&self, records: Vec<TransactionRecord>) -> CollapseOutcome {
        // Stable collapse identifiers: position after sorting the
        // inter-dealer subset by {entity key, execution date, time}
        let mut inter_dealer: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_inter_dealer(&self.customer_marker))
            .map(|(position, _)| position)
            .collect();
        let pass_through = records.len() - inter_dealer.len();
        inter_dealer.sort_by(|&a, &b| {
            let ra = &records[a];
            let rb = &records[b];
            (&ra.cusip, ra.execution_date, ra.execution_time)
                .cmp(&(&rb.cusip, rb.execution_date, rb.execution_time))
        });

        // Sell-side index keyed on the pair fields as reported
        let mut sells: HashMap<PairKey, Vec<usize>> = HashMap::new();
        for &position in &inter_dealer {
            if records[position].side == Side::Sell {
                sells.entry(PairKey::of(&records[position])).or_default().push(position);
            }
        }

        // Buy side probes with parties mirrored; every sell it pairs with
        // is the other half of the same trade and gets dropped
        let mut dropped: HashSet<usize> = HashSet::new();
        for &position in &inter_dealer {
            let record = &records[position];
            if record.side != Side::Buy {
                continue;
            }
            if let Some(matches) = sells.get(&PairKey::mirrored(record)) {
                dropped.extend(matches.iter().copied());
            }
        }

        log::debug!(
            "duplicate side collapse: {} inter-dealer, {} sell-side dropped, {} passed through",
            inter_dealer.len(),
            dropped.len(),
            pass_through
        );

        let dropped_count = dropped.len();
        let retained = records
            .into_iter()
            .enumerate()
            .filter_map(|(position, record)| (!dropped.contains(&position)).then_some(record))
            .collect();

        CollapseOutcome {
            retained,
            dropped: dropped_count,
            pass_through,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Era, TradeStatus};
    use chrono::NaiveDate;

    fn make_record(seq: u64, side: Side, reporting: &str, contra: &str) -> TransactionRecord {
        let date = NaiveDate::from_ymd_opt(2013, 6, 1).unwrap();
        TransactionRecord {
            seq,
            era: Era::Late,
            status: TradeStatus::Normal,
            cusip: "X1".to_string(),
            execution_date: date,
            execution_time: date.and_hms_opt(10, 30, 0).unwrap(),
            report_date: date,
            report_time: date.and_hms_opt(10, 31, 0).unwrap(),
            side,
            reporting_party: reporting.to_string(),
            contra_party: contra.to_string(),
            quantity: 10.0,
            price: 100.0,
            control_number: Some(seq),
            prev_control_number: None,
        }
    }

    #[test]
    fn test_mirrored_pair_keeps_buy_side() {
        let collapser = DuplicateSideCollapser::default();
        let buy = make_record(1, Side::Buy, "DLRA", "DLRB");
        let sell = make_record(2, Side::Sell, "DLRB", "DLRA");

        let outcome = collapser.collapse(vec![buy, sell]);

        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.retained[0].side, Side::Buy);
        assert_eq!(outcome.retained[0].reporting_party, "DLRA");
    }

    #[test]
    fn test_customer_trades_pass_through() {
        let collapser = DuplicateSideCollapser::default();
        let buy = make_record(1, Side::Buy, "DLRA", "C");
        let sell = make_record(2, Side::Sell, "C", "DLRA");

        let outcome = collapser.collapse(vec![buy, sell]);

        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.retained.len(), 2);
        assert_eq!(outcome.pass_through, 2);
    }

    #[test]
    fn test_unmirrored_sides_are_not_a_pair() {
        // Same parties but not mirrored: both reported by DLRA
        let collapser = DuplicateSideCollapser::default();
        let buy = make_record(1, Side::Buy, "DLRA", "DLRB");
        let sell = make_record(2, Side::Sell, "DLRA", "DLRB");

        let outcome = collapser.collapse(vec![buy, sell]);

        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.retained.len(), 2);
    }

    #[test]
    fn test_differing_terms_are_not_a_pair() {
        let collapser = DuplicateSideCollapser::default();
        let buy = make_record(1, Side::Buy, "DLRA", "DLRB");
        let mut sell = make_record(2, Side::Sell, "DLRB", "DLRA");
        sell.price = 100.5;

        let outcome = collapser.collapse(vec![buy, sell]);

        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.retained.len(), 2);
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let collapser = DuplicateSideCollapser::default();
        let records = vec![
            make_record(1, Side::Buy, "DLRA", "DLRB"),
            make_record(2, Side::Sell, "DLRB", "DLRA"),
            make_record(3, Side::Buy, "DLRA", "C"),
        ];

        let first = collapser.collapse(records);
        assert_eq!(first.dropped, 1);

        let second = collapser.collapse(first.retained);
        assert_eq!(second.dropped, 0);
        assert_eq!(second.retained.len(), 2);
    }

    #[test]
    fn test_conservation() {
        let collapser = DuplicateSideCollapser::default();
        let records = vec![
            make_record(1, Side::Buy, "DLRA", "DLRB"),
            make_record(2, Side::Sell, "DLRB", "DLRA"),
            make_record(3, Side::Sell, "DLRC", "DLRD"),
        ];
        let input_len = records.len();

        let outcome = collapser.collapse(records);
        assert_eq!(outcome.retained.len() + outcome.dropped, input_len);
    }
}
