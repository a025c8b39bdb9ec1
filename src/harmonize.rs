// 🔀 Schema Harmonizer - two report-format eras, one canonical field set
//
// The upstream feed changed its reporting standard at a fixed cutover date,
// so raw batches arrive in one of two schemas. Downstream matching needs
// uniform keys, so each era's rows are renamed into the canonical shape via
// an explicit per-era mapping table. Pure and total over recognized eras;
// the only error conditions are caller contract violations.

use crate::error::{ReconcileError, ReconcileResult};
use crate::records::{Era, Side, TradeStatus, TransactionRecord};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

// ============================================================================
// FIELD MAPPING TABLES
// ============================================================================

/// One source-column → canonical-field mapping entry.
pub struct FieldMapping {
    pub source: &'static str,
    pub canonical: &'static str,
    pub required: bool,
}

const fn map(source: &'static str, canonical: &'static str, required: bool) -> FieldMapping {
    FieldMapping { source, canonical, required }
}

/// Early-era (pre-cutover) schema.
pub const EARLY_FIELD_MAP: &[FieldMapping] = &[
    map("REC_CT_NB", "control_number", true),
    map("PREV_REC_CT_NB", "prev_control_number", false),
    map("TRC_ST", "status", true),
    map("ASOF_CD", "asof_code", false),
    map("CUSIP_ID", "cusip", true),
    map("ENTRD_VOL_QT", "quantity", true),
    map("RPTD_PR", "price", true),
    map("TRD_EXCTN_DT", "execution_date", true),
    map("EXCTN_TM", "execution_time", true),
    map("TRD_RPT_DT", "report_date", true),
    map("TRD_RPT_TM", "report_time", true),
    map("RPT_SIDE_CD", "side", true),
    map("RPTG_MKT_MP_ID", "reporting_party", true),
    map("RPTG_SIDE_GVP_MP_ID", "reporting_party_gvp", false),
    map("CNTRA_MP_ID", "contra_party", true),
    map("CNTRA_GVP_ID", "contra_party_gvp", false),
];

/// Late-era (post-cutover) schema.
pub const LATE_FIELD_MAP: &[FieldMapping] = &[
    map("SYSTM_CNTRL_NB", "control_number", true),
    map("PREV_TRD_CNTRL_NB", "prev_control_number", false),
    map("TRD_ST_CD", "status", true),
    map("CUSIP_ID", "cusip", true),
    map("ENTRD_VOL_QT", "quantity", true),
    map("RPTD_PR", "price", true),
    map("TRD_EXCTN_DT", "execution_date", true),
    map("TRD_EXCTN_TM", "execution_time", true),
    map("TRD_RPT_DT", "report_date", true),
    map("TRD_RPT_TM", "report_time", true),
    map("RPT_SIDE_CD", "side", true),
    map("RPTG_PARTY_ID", "reporting_party", true),
    map("RPTG_PARTY_GVP_ID", "reporting_party_gvp", false),
    map("CNTRA_PARTY_ID", "contra_party", true),
    map("CNTRA_PARTY_GVP_ID", "contra_party_gvp", false),
];

pub fn field_map(era: Era) -> &'static [FieldMapping] {
    match era {
        Era::Early => EARLY_FIELD_MAP,
        Era::Late => LATE_FIELD_MAP,
    }
}

/// Check an input batch header against the era's required columns.
/// A missing required column is fatal - it indicates a collaborator
/// contract violation, not bad data.
pub fn validate_headers(era: Era, headers: &csv::StringRecord) -> ReconcileResult<()> {
    for mapping in field_map(era) {
        if mapping.required && !headers.iter().any(|h| h == mapping.source) {
            return Err(ReconcileError::MissingColumn {
                era,
                column: mapping.source.to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// RAW ROWS (era-tagged union)
// ============================================================================

/// A raw early-era row, field names as in the source schema.
#[derive(Debug, Clone, Deserialize)]
pub struct EarlyRawRow {
    #[serde(rename = "REC_CT_NB")]
    pub rec_ct_nb: Option<f64>,
    #[serde(rename = "PREV_REC_CT_NB", default)]
    pub prev_rec_ct_nb: Option<f64>,
    #[serde(rename = "TRC_ST")]
    pub trc_st: String,
    #[serde(rename = "ASOF_CD", default)]
    pub asof_cd: Option<String>,
    #[serde(rename = "CUSIP_ID")]
    pub cusip_id: Option<String>,
    #[serde(rename = "ENTRD_VOL_QT")]
    pub entrd_vol_qt: f64,
    #[serde(rename = "RPTD_PR")]
    pub rptd_pr: f64,
    #[serde(rename = "TRD_EXCTN_DT")]
    pub trd_exctn_dt: String,
    #[serde(rename = "EXCTN_TM")]
    pub exctn_tm: String,
    #[serde(rename = "TRD_RPT_DT")]
    pub trd_rpt_dt: String,
    #[serde(rename = "TRD_RPT_TM")]
    pub trd_rpt_tm: String,
    #[serde(rename = "RPT_SIDE_CD")]
    pub rpt_side_cd: String,
    #[serde(rename = "RPTG_MKT_MP_ID")]
    pub rptg_mkt_mp_id: Option<String>,
    #[serde(rename = "RPTG_SIDE_GVP_MP_ID", default)]
    pub rptg_side_gvp_mp_id: Option<String>,
    #[serde(rename = "CNTRA_MP_ID")]
    pub cntra_mp_id: Option<String>,
    #[serde(rename = "CNTRA_GVP_ID", default)]
    pub cntra_gvp_id: Option<String>,
}

/// A raw late-era row, field names as in the source schema.
#[derive(Debug, Clone, Deserialize)]
pub struct LateRawRow {
    #[serde(rename = "SYSTM_CNTRL_NB")]
    pub systm_cntrl_nb: Option<f64>,
    #[serde(rename = "PREV_TRD_CNTRL_NB", default)]
    pub prev_trd_cntrl_nb: Option<f64>,
    #[serde(rename = "TRD_ST_CD")]
    pub trd_st_cd: String,
    #[serde(rename = "CUSIP_ID")]
    pub cusip_id: Option<String>,
    #[serde(rename = "ENTRD_VOL_QT")]
    pub entrd_vol_qt: f64,
    #[serde(rename = "RPTD_PR")]
    pub rptd_pr: f64,
    #[serde(rename = "TRD_EXCTN_DT")]
    pub trd_exctn_dt: String,
    #[serde(rename = "TRD_EXCTN_TM")]
    pub trd_exctn_tm: String,
    #[serde(rename = "TRD_RPT_DT")]
    pub trd_rpt_dt: String,
    #[serde(rename = "TRD_RPT_TM")]
    pub trd_rpt_tm: String,
    #[serde(rename = "RPT_SIDE_CD")]
    pub rpt_side_cd: String,
    #[serde(rename = "RPTG_PARTY_ID")]
    pub rptg_party_id: Option<String>,
    #[serde(rename = "RPTG_PARTY_GVP_ID", default)]
    pub rptg_party_gvp_id: Option<String>,
    #[serde(rename = "CNTRA_PARTY_ID")]
    pub cntra_party_id: Option<String>,
    #[serde(rename = "CNTRA_PARTY_GVP_ID", default)]
    pub cntra_party_gvp_id: Option<String>,
}

/// Era-tagged raw row. Every record belongs to exactly one era; the tag
/// determines which fields are populated.
#[derive(Debug, Clone)]
pub enum RawRow {
    Early(EarlyRawRow),
    Late(LateRawRow),
}

impl RawRow {
    pub fn era(&self) -> Era {
        match self {
            RawRow::Early(_) => Era::Early,
            RawRow::Late(_) => Era::Late,
        }
    }
}

// ============================================================================
// HARMONIZER
// ============================================================================

/// Result of harmonizing one batch. Rows without an entity key or with an
/// unrecognized early-era status code are discarded at this boundary and
/// surfaced as counts.
#[derive(Debug)]
pub struct HarmonizedBatch {
    pub records: Vec<TransactionRecord>,
    pub missing_entity_key: usize,
    pub unrecognized_status: usize,
}

pub struct SchemaHarmonizer;

impl SchemaHarmonizer {
    pub fn new() -> Self {
        SchemaHarmonizer
    }

    /// Rename era-specific rows into the canonical field set, assigning
    /// sequence numbers from `seq_start` in input order.
    pub fn harmonize(
        &self,
        rows: Vec<RawRow>,
        seq_start: u64,
    ) -> ReconcileResult<HarmonizedBatch> {
        let mut batch = HarmonizedBatch {
            records: Vec::with_capacity(rows.len()),
            missing_entity_key: 0,
            unrecognized_status: 0,
        };
        let mut seq = seq_start;

        for row in rows {
            let record = match row {
                RawRow::Early(raw) => self.harmonize_early(raw, seq, &mut batch)?,
                RawRow::Late(raw) => self.harmonize_late(raw, seq, &mut batch)?,
            };
            if let Some(record) = record {
                batch.records.push(record);
                seq += 1;
            }
        }

        Ok(batch)
    }

    fn harmonize_early(
        &self,
        raw: EarlyRawRow,
        seq: u64,
        batch: &mut HarmonizedBatch,
    ) -> ReconcileResult<Option<TransactionRecord>> {
        let cusip = match non_empty(raw.cusip_id) {
            Some(c) => c,
            None => {
                batch.missing_entity_key += 1;
                return Ok(None);
            }
        };
        let status = match early_status(&raw.trc_st, raw.asof_cd.as_deref()) {
            Some(s) => s,
            None => {
                batch.unrecognized_status += 1;
                return Ok(None);
            }
        };

        let execution_date = parse_date("TRD_EXCTN_DT", &raw.trd_exctn_dt, seq)?;
        let execution_time =
            execution_date.and_time(parse_time("EXCTN_TM", &raw.exctn_tm, seq)?);
        let report_date = parse_date("TRD_RPT_DT", &raw.trd_rpt_dt, seq)?;
        let report_time = report_date.and_time(parse_time("TRD_RPT_TM", &raw.trd_rpt_tm, seq)?);
        let side = parse_side("RPT_SIDE_CD", &raw.rpt_side_cd, seq)?;

        Ok(Some(TransactionRecord {
            seq,
            era: Era::Early,
            status,
            cusip,
            execution_date,
            execution_time,
            report_date,
            report_time,
            side,
            // When the give-up identifier is populated it names the party
            // actually executing the trade and replaces the plain field
            reporting_party: substitute_gvp(raw.rptg_mkt_mp_id, raw.rptg_side_gvp_mp_id),
            contra_party: substitute_gvp(raw.cntra_mp_id, raw.cntra_gvp_id),
            quantity: raw.entrd_vol_qt,
            price: raw.rptd_pr,
            control_number: raw.rec_ct_nb.map(|n| n as u64),
            prev_control_number: raw.prev_rec_ct_nb.map(|n| n as u64),
        }))
    }

    fn harmonize_late(
        &self,
        raw: LateRawRow,
        seq: u64,
        batch: &mut HarmonizedBatch,
    ) -> ReconcileResult<Option<TransactionRecord>> {
        let cusip = match non_empty(raw.cusip_id) {
            Some(c) => c,
            None => {
                batch.missing_entity_key += 1;
                return Ok(None);
            }
        };

        let execution_date = parse_date("TRD_EXCTN_DT", &raw.trd_exctn_dt, seq)?;
        let execution_time =
            execution_date.and_time(parse_time("TRD_EXCTN_TM", &raw.trd_exctn_tm, seq)?);
        let report_date = parse_date("TRD_RPT_DT", &raw.trd_rpt_dt, seq)?;
        let report_time = report_date.and_time(parse_time("TRD_RPT_TM", &raw.trd_rpt_tm, seq)?);
        let side = parse_side("RPT_SIDE_CD", &raw.rpt_side_cd, seq)?;

        Ok(Some(TransactionRecord {
            seq,
            era: Era::Late,
            status: late_status(&raw.trd_st_cd),
            cusip,
            execution_date,
            execution_time,
            report_date,
            report_time,
            side,
            reporting_party: substitute_gvp(raw.rptg_party_id, raw.rptg_party_gvp_id),
            contra_party: substitute_gvp(raw.cntra_party_id, raw.cntra_party_gvp_id),
            quantity: raw.entrd_vol_qt,
            price: raw.rptd_pr,
            control_number: raw.systm_cntrl_nb.map(|n| n as u64),
            prev_control_number: raw.prev_trd_cntrl_nb.map(|n| n as u64),
        }))
    }
}

impl Default for SchemaHarmonizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CODE & FIELD CANONICALIZATION
// ============================================================================

/// Early-era status codes: C = cancellation, W = correction, T/N = trade
/// reports; a trade report with as-of code R is a reversal. Anything else
/// is not a recognized candidate or void message and is discarded.
fn early_status(trc_st: &str, asof_cd: Option<&str>) -> Option<TradeStatus> {
    match trc_st {
        "C" => Some(TradeStatus::Cancel),
        "W" => Some(TradeStatus::Correct),
        "T" | "N" => {
            if asof_cd == Some("R") {
                Some(TradeStatus::Reversal)
            } else {
                Some(TradeStatus::Normal)
            }
        }
        _ => None,
    }
}

/// Late-era status codes: X = cancellation, C = correction, Y = reversal;
/// everything else is a plain trade report.
fn late_status(trd_st_cd: &str) -> TradeStatus {
    match trd_st_cd {
        "X" => TradeStatus::Cancel,
        "C" => TradeStatus::Correct,
        "Y" => TradeStatus::Reversal,
        _ => TradeStatus::Normal,
    }
}

fn substitute_gvp(plain: Option<String>, gvp: Option<String>) -> String {
    non_empty(gvp).or_else(|| non_empty(plain)).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_side(field: &'static str, value: &str, record: u64) -> ReconcileResult<Side> {
    Side::parse(value).ok_or_else(|| ReconcileError::BadField {
        field,
        value: value.to_string(),
        record,
    })
}

/// Parse a calendar date (supports YYYY-MM-DD and MM/DD/YYYY)
fn parse_date(field: &'static str, value: &str, record: u64) -> ReconcileResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .map_err(|_| ReconcileError::BadField {
            field,
            value: value.to_string(),
            record,
        })
}

/// Parse a time of day (supports HH:MM:SS and the raw feed's HHMMSS)
fn parse_time(field: &'static str, value: &str, record: u64) -> ReconcileResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H%M%S"))
        .map_err(|_| ReconcileError::BadField {
            field,
            value: value.to_string(),
            record,
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn early_row(trc_st: &str, asof: Option<&str>) -> EarlyRawRow {
        EarlyRawRow {
            rec_ct_nb: Some(7.0),
            prev_rec_ct_nb: None,
            trc_st: trc_st.to_string(),
            asof_cd: asof.map(|s| s.to_string()),
            cusip_id: Some("037833AB1".to_string()),
            entrd_vol_qt: 50_000.0,
            rptd_pr: 101.25,
            trd_exctn_dt: "2010-06-01".to_string(),
            exctn_tm: "10:30:00".to_string(),
            trd_rpt_dt: "2010-06-01".to_string(),
            trd_rpt_tm: "10:31:05".to_string(),
            rpt_side_cd: "B".to_string(),
            rptg_mkt_mp_id: Some("DLR1".to_string()),
            rptg_side_gvp_mp_id: None,
            cntra_mp_id: Some("DLR2".to_string()),
            cntra_gvp_id: None,
        }
    }

    fn late_row(trd_st_cd: &str) -> LateRawRow {
        LateRawRow {
            systm_cntrl_nb: Some(9001.0),
            prev_trd_cntrl_nb: None,
            trd_st_cd: trd_st_cd.to_string(),
            cusip_id: Some("037833AB1".to_string()),
            entrd_vol_qt: 50_000.0,
            rptd_pr: 101.25,
            trd_exctn_dt: "2013-06-01".to_string(),
            trd_exctn_tm: "10:30:00".to_string(),
            trd_rpt_dt: "2013-06-01".to_string(),
            trd_rpt_tm: "103105".to_string(),
            rpt_side_cd: "S".to_string(),
            rptg_party_id: Some("DLR1".to_string()),
            rptg_party_gvp_id: None,
            cntra_party_id: Some("C".to_string()),
            cntra_party_gvp_id: None,
        }
    }

    #[test]
    fn test_early_status_canonicalization() {
        assert_eq!(early_status("C", None), Some(TradeStatus::Cancel));
        assert_eq!(early_status("W", None), Some(TradeStatus::Correct));
        assert_eq!(early_status("T", None), Some(TradeStatus::Normal));
        assert_eq!(early_status("T", Some("R")), Some(TradeStatus::Reversal));
        assert_eq!(early_status("N", Some("R")), Some(TradeStatus::Reversal));
        assert_eq!(early_status("Z", None), None);
    }

    #[test]
    fn test_late_status_canonicalization() {
        assert_eq!(late_status("X"), TradeStatus::Cancel);
        assert_eq!(late_status("C"), TradeStatus::Correct);
        assert_eq!(late_status("Y"), TradeStatus::Reversal);
        assert_eq!(late_status("T"), TradeStatus::Normal);
    }

    #[test]
    fn test_harmonize_renames_into_canonical_shape() {
        let harmonizer = SchemaHarmonizer::new();
        let batch = harmonizer
            .harmonize(
                vec![
                    RawRow::Early(early_row("T", None)),
                    RawRow::Late(late_row("T")),
                ],
                0,
            )
            .unwrap();

        assert_eq!(batch.records.len(), 2);
        let early = &batch.records[0];
        let late = &batch.records[1];

        // Same canonical fields regardless of source schema
        assert_eq!(early.cusip, late.cusip);
        assert_eq!(early.era, Era::Early);
        assert_eq!(late.era, Era::Late);
        assert_eq!(early.control_number, Some(7));
        assert_eq!(late.control_number, Some(9001));
        // HHMMSS and HH:MM:SS both normalize to the same timestamp shape
        assert_eq!(
            late.report_time.format("%H:%M:%S").to_string(),
            "10:31:05"
        );
        assert_eq!(early.seq, 0);
        assert_eq!(late.seq, 1);
    }

    #[test]
    fn test_gvp_identifier_substitution() {
        let harmonizer = SchemaHarmonizer::new();
        let mut row = early_row("T", None);
        row.rptg_side_gvp_mp_id = Some("GVP9".to_string());
        let batch = harmonizer.harmonize(vec![RawRow::Early(row)], 0).unwrap();
        assert_eq!(batch.records[0].reporting_party, "GVP9");
        assert_eq!(batch.records[0].contra_party, "DLR2");
    }

    #[test]
    fn test_missing_entity_key_is_dropped_and_counted() {
        let harmonizer = SchemaHarmonizer::new();
        let mut row = early_row("T", None);
        row.cusip_id = None;
        let batch = harmonizer.harmonize(vec![RawRow::Early(row)], 0).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.missing_entity_key, 1);
    }

    #[test]
    fn test_unrecognized_early_status_is_dropped_and_counted() {
        let harmonizer = SchemaHarmonizer::new();
        let batch = harmonizer
            .harmonize(vec![RawRow::Early(early_row("Z", None))], 0)
            .unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.unrecognized_status, 1);
    }

    #[test]
    fn test_bad_date_is_a_contract_violation() {
        let harmonizer = SchemaHarmonizer::new();
        let mut row = early_row("T", None);
        row.trd_exctn_dt = "June 1st".to_string();
        let err = harmonizer
            .harmonize(vec![RawRow::Early(row)], 0)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReconcileError::BadField { field: "TRD_EXCTN_DT", .. }
        ));
    }

    #[test]
    fn test_validate_headers_reports_missing_column() {
        let headers = csv::StringRecord::from(vec!["CUSIP_ID", "TRC_ST"]);
        let err = validate_headers(Era::Early, &headers).unwrap_err();
        match err {
            crate::error::ReconcileError::MissingColumn { era, .. } => {
                assert_eq!(era, Era::Early)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
