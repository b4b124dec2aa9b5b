use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single glucose reading from a CGM export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseRecord {
    /// Device-local time of the reading. `None` when the cell could not be parsed.
    pub timestamp: Option<NaiveDateTime>,
    /// Scan reading if present, else the historic reading.
    pub glucose_mmol_l: Option<f64>,
    pub note: Option<String>,
    /// Sensor session, assigned by the segmenter.
    pub session_id: Option<u32>,
    /// Original cell text, aligned with [`Dataset::columns`].
    #[serde(skip)]
    pub fields: Vec<String>,
}

impl GlucoseRecord {
    /// Calendar date of the reading.
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date())
    }
}

/// A cell that could not be interpreted. The field is treated as missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based data row, counted from the header.
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// Parser output: records in timestamp order plus the ingestion columns.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Original (non-derived) columns in file order.
    pub columns: Vec<String>,
    pub records: Vec<GlucoseRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// A dataset whose records carry session ids.
#[derive(Debug, Clone, Default)]
pub struct SegmentedDataset {
    pub columns: Vec<String>,
    pub records: Vec<GlucoseRecord>,
    pub warnings: Vec<ParseWarning>,
    /// Distinct session ids, ascending.
    pub session_ids: Vec<u32>,
}

/// Extent of one sensor session, for pickers and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSpan {
    pub id: u32,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub readings: usize,
}

/// Average, max and min glucose. `None` means there was no data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSummary {
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    /// Number of records that had a glucose value.
    pub readings: usize,
}

/// Clinical normal range drawn on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBands {
    pub lower: f64,
    pub upper: f64,
}

/// Where a reading falls relative to the reference bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseBand {
    Low,
    InRange,
    High,
}

/// A point on the glucose-over-time chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: NaiveDateTime,
    pub glucose_mmol_l: f64,
}

/// Data behind the glucose-over-time chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
    pub bands: ReferenceBands,
}

/// A session id that was requested but does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidSelection {
    pub requested: u32,
    /// Session used instead, `None` if the dataset has no sessions.
    pub used: Option<u32>,
}

/// Result of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub session: Option<u32>,
    pub selection_fallback: Option<InvalidSelection>,
    pub records: Vec<GlucoseRecord>,
    pub summary: GlucoseSummary,
}
