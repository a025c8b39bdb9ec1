// 📥 Batch Loading - CSV ingestion of period batches and rating events
//
// One transaction file per reporting period, tagged with its schema era;
// one rating file covering the whole sample. Header validation happens
// here, before any row is deserialized, so a malformed file fails fast
// instead of producing a half-read batch.

use crate::error::ReconcileResult;
use crate::harmonize::{validate_headers, EarlyRawRow, LateRawRow, RawRow};
use crate::ratings::{severity_rank, RatingRecord, RatingSource};
use crate::records::{Era, ReconciledTransaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One reporting period's raw transaction rows, era-tagged.
#[derive(Debug)]
pub struct PeriodBatch {
    /// Period label, e.g. the reporting year
    pub period: i32,
    pub era: Era,
    pub rows: Vec<RawRow>,
}

/// Read one period's transaction file. The era tag decides which schema
/// the file is validated and deserialized against.
pub fn load_transaction_batch(
    path: &Path,
    era_tag: &str,
    period: i32,
) -> ReconcileResult<PeriodBatch> {
    let era = Era::parse(era_tag)?;
    let mut reader = csv::Reader::from_path(path)?;
    validate_headers(era, reader.headers()?)?;

    let mut rows = Vec::new();
    match era {
        Era::Early => {
            for result in reader.deserialize::<EarlyRawRow>() {
                rows.push(RawRow::Early(result?));
            }
        }
        Era::Late => {
            for result in reader.deserialize::<LateRawRow>() {
                rows.push(RawRow::Late(result?));
            }
        }
    }

    log::info!(
        "loaded {} rows for period {} ({}) from {}",
        rows.len(),
        period,
        era,
        path.display()
    );

    Ok(PeriodBatch { period, era, rows })
}

#[derive(Debug, Deserialize)]
struct RawRatingRow {
    complete_cusip: Option<String>,
    rating_date: String,
    rating: Option<String>,
    rating_type: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RatingLoadCounts {
    pub loaded: usize,
    /// Rows from an unrecognized rating agency
    pub unknown_source: usize,
    /// Rows whose label has no severity rank, or with no label at all
    pub unknown_label: usize,
    pub missing_key: usize,
}

/// Read the rating event file. Rows from unrecognized agencies or with
/// unmapped labels are excluded here, before conflict resolution, and
/// surfaced as counts.
pub fn load_ratings(path: &Path) -> ReconcileResult<(Vec<RatingRecord>, RatingLoadCounts)> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut ratings = Vec::new();
    let mut counts = RatingLoadCounts::default();

    for (index, result) in reader.deserialize::<RawRatingRow>().enumerate() {
        let raw = result?;
        let source = match RatingSource::parse(&raw.rating_type) {
            Some(s) => s,
            None => {
                counts.unknown_source += 1;
                continue;
            }
        };
        let cusip = match raw.complete_cusip.filter(|c| !c.is_empty()) {
            Some(c) => c,
            None => {
                counts.missing_key += 1;
                continue;
            }
        };
        let label = raw.rating.unwrap_or_default();
        let rank = match severity_rank(&label) {
            Some(r) => r,
            None => {
                counts.unknown_label += 1;
                continue;
            }
        };
        let effective_date = parse_rating_date(&raw.rating_date, index as u64)?;

        counts.loaded += 1;
        ratings.push(RatingRecord {
            cusip,
            effective_date,
            label,
            rank,
            source,
        });
    }

    log::info!(
        "loaded {} rating events ({} unknown source, {} unknown label, {} missing key)",
        counts.loaded,
        counts.unknown_source,
        counts.unknown_label,
        counts.missing_key
    );

    Ok((ratings, counts))
}

fn parse_rating_date(value: &str, record: u64) -> ReconcileResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .map_err(|_| crate::error::ReconcileError::BadField {
            field: "rating_date",
            value: value.to_string(),
            record,
        })
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Flat row shape for the reconciled output file.
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    cusip: &'a str,
    era: &'static str,
    execution_date: String,
    execution_time: String,
    report_date: String,
    report_time: String,
    side: &'static str,
    reporting_party: &'a str,
    contra_party: &'a str,
    quantity: f64,
    price: f64,
    rating: Option<&'a str>,
    rating_rank: Option<u8>,
    rating_date: Option<String>,
}

pub fn write_reconciled_csv(
    path: &Path,
    transactions: &[ReconciledTransaction],
) -> ReconcileResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for tx in transactions {
        let record = &tx.record;
        writer.serialize(OutputRow {
            cusip: &record.cusip,
            era: record.era.tag(),
            execution_date: record.execution_date.to_string(),
            execution_time: record.execution_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            report_date: record.report_date.to_string(),
            report_time: record.report_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            side: record.side.code(),
            reporting_party: &record.reporting_party,
            contra_party: &record.contra_party,
            quantity: record.quantity,
            price: record.price,
            rating: tx.rating.as_ref().map(|r| r.label.as_str()),
            rating_rank: tx.rating.as_ref().map(|r| r.rank),
            rating_date: tx.rating.as_ref().map(|r| r.effective_date.to_string()),
        })?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_late_era_batch() {
        let path = write_temp(
            "reconcile_test_late_batch.csv",
            "SYSTM_CNTRL_NB,TRD_ST_CD,CUSIP_ID,ENTRD_VOL_QT,RPTD_PR,TRD_EXCTN_DT,TRD_EXCTN_TM,TRD_RPT_DT,TRD_RPT_TM,RPT_SIDE_CD,RPTG_PARTY_ID,CNTRA_PARTY_ID\n\
             9001,T,037833AB1,50000,101.25,2013-06-01,10:30:00,2013-06-01,10:31:05,B,DLR1,DLR2\n",
        );

        let batch = load_transaction_batch(&path, "LATE", 2013).unwrap();
        assert_eq!(batch.period, 2013);
        assert_eq!(batch.era, Era::Late);
        assert_eq!(batch.rows.len(), 1);
    }

    #[test]
    fn test_unknown_era_tag_is_fatal() {
        let path = write_temp("reconcile_test_bad_era.csv", "CUSIP_ID\nX1\n");
        assert!(load_transaction_batch(&path, "MIDDLE", 2013).is_err());
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        // Late-era file without SYSTM_CNTRL_NB
        let path = write_temp(
            "reconcile_test_missing_col.csv",
            "TRD_ST_CD,CUSIP_ID,ENTRD_VOL_QT,RPTD_PR,TRD_EXCTN_DT,TRD_EXCTN_TM,TRD_RPT_DT,TRD_RPT_TM,RPT_SIDE_CD,RPTG_PARTY_ID,CNTRA_PARTY_ID\n\
             T,037833AB1,50000,101.25,2013-06-01,10:30:00,2013-06-01,10:31:05,B,DLR1,DLR2\n",
        );
        assert!(load_transaction_batch(&path, "LATE", 2013).is_err());
    }

    #[test]
    fn test_load_ratings_filters_sources_and_labels() {
        let path = write_temp(
            "reconcile_test_ratings.csv",
            "complete_cusip,rating_date,rating,rating_type\n\
             037833AB1,2013-01-15,BBB,MR\n\
             037833AB1,2013-01-15,BBB,DPR\n\
             037833AB1,2013-01-15,B++,SPR\n\
             ,2013-01-15,BBB,FR\n",
        );

        let (ratings, counts) = load_ratings(&path).unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(counts.loaded, 1);
        assert_eq!(counts.unknown_source, 1);
        assert_eq!(counts.unknown_label, 1);
        assert_eq!(counts.missing_key, 1);
        assert_eq!(ratings[0].rank, 9);
    }
}
