use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::error::IngestionError;
use crate::types::{Dataset, GlucoseRecord, ParseWarning};

pub const TIMESTAMP_COLUMN: &str = "Device Timestamp";
pub const SCAN_GLUCOSE_COLUMN: &str = "Scan Glucose mmol/L";
pub const HISTORIC_GLUCOSE_COLUMN: &str = "Historic Glucose mmol/L";
pub const NOTES_COLUMN: &str = "Notes";

/// Derived columns written by the exporter and dropped on re-ingestion.
pub const GLUCOSE_COLUMN: &str = "Glucose (mmol/L)";
pub const SESSION_COLUMN: &str = "Sensor Period";

const REQUIRED_COLUMNS: [&str; 3] = [
    TIMESTAMP_COLUMN,
    SCAN_GLUCOSE_COLUMN,
    HISTORIC_GLUCOSE_COLUMN,
];

/// LibreView exports put a metadata line above the header.
const HEADER_SEARCH_DEPTH: usize = 3;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Read a CGM export from disk. The file is read fully and closed before parsing.
pub fn load(path: &Path) -> Result<Dataset, IngestionError> {
    let bytes = std::fs::read(path).map_err(|source| IngestionError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes(&bytes)
}

pub fn parse_bytes(input: &[u8]) -> Result<Dataset, IngestionError> {
    parse_reader(input)
}

/// Parse CSV rows into records sorted by timestamp.
///
/// Unparseable timestamp or glucose cells become missing values and are
/// reported in [`Dataset::warnings`]; no row is dropped for that reason.
/// Rows with a missing timestamp are kept and sorted after all timed rows.
pub fn parse_reader<R: Read>(reader: R) -> Result<Dataset, IngestionError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let rows: Vec<StringRecord> = csv_reader
        .records()
        .filter(|row| !matches!(row, Ok(r) if is_blank(r)))
        .collect::<Result<_, _>>()?;

    if rows.is_empty() {
        return Err(IngestionError::Empty);
    }

    let (header_index, layout) = locate_header(&rows)?;

    let mut warnings = Vec::new();
    let mut records: Vec<GlucoseRecord> = rows[header_index + 1..]
        .iter()
        .enumerate()
        .map(|(i, row)| layout.record(row, i + 1, &mut warnings))
        .collect();

    records.sort_by(|a, b| compare_timestamps(a, b));

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Some cells could not be parsed and were treated as missing");
    }
    tracing::debug!(rows = records.len(), "Parsed CGM export");

    Ok(Dataset {
        columns: layout.kept_names(),
        records,
        warnings,
    })
}

/// Parse a device timestamp, accepting the formats CGM exports use in practice.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Missing timestamps sort after every timed record.
fn compare_timestamps(a: &GlucoseRecord, b: &GlucoseRecord) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(|f| f.trim().is_empty())
}

fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_string()
}

fn locate_header(rows: &[StringRecord]) -> Result<(usize, ColumnLayout), IngestionError> {
    for (i, row) in rows.iter().take(HEADER_SEARCH_DEPTH).enumerate() {
        if let Some(layout) = ColumnLayout::from_header(row) {
            return Ok((i, layout));
        }
    }

    // Report against the most header-like row, not the preamble.
    let missing = rows
        .iter()
        .take(HEADER_SEARCH_DEPTH)
        .map(missing_columns)
        .min_by_key(|missing| missing.len())
        .unwrap_or_default();
    Err(IngestionError::MissingColumns(missing))
}

fn missing_columns(row: &StringRecord) -> Vec<String> {
    let names: Vec<String> = row.iter().map(normalize_header).collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|c| !names.iter().any(|n| n == *c))
        .map(|c| c.to_string())
        .collect()
}

/// Column positions resolved from the header row.
struct ColumnLayout {
    names: Vec<String>,
    timestamp: usize,
    scan: usize,
    historic: usize,
    notes: Option<usize>,
    /// Indices of non-derived columns, in file order.
    kept: Vec<usize>,
}

impl ColumnLayout {
    fn from_header(row: &StringRecord) -> Option<Self> {
        let names: Vec<String> = row.iter().map(normalize_header).collect();
        let position = |name: &str| names.iter().position(|n| n == name);

        let timestamp = position(TIMESTAMP_COLUMN)?;
        let scan = position(SCAN_GLUCOSE_COLUMN)?;
        let historic = position(HISTORIC_GLUCOSE_COLUMN)?;
        let notes = position(NOTES_COLUMN);

        let kept = names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() != GLUCOSE_COLUMN && n.as_str() != SESSION_COLUMN)
            .map(|(i, _)| i)
            .collect();

        Some(Self {
            names,
            timestamp,
            scan,
            historic,
            notes,
            kept,
        })
    }

    fn kept_names(&self) -> Vec<String> {
        self.kept.iter().map(|&i| self.names[i].clone()).collect()
    }

    fn record(&self, row: &StringRecord, row_number: usize, warnings: &mut Vec<ParseWarning>) -> GlucoseRecord {
        let cell = |i: usize| row.get(i).unwrap_or("");

        let raw_timestamp = cell(self.timestamp);
        let timestamp = parse_timestamp(raw_timestamp);
        if timestamp.is_none() && !raw_timestamp.trim().is_empty() {
            warnings.push(ParseWarning {
                row: row_number,
                column: TIMESTAMP_COLUMN.to_string(),
                value: raw_timestamp.to_string(),
            });
        }

        let scan = parse_glucose(cell(self.scan), SCAN_GLUCOSE_COLUMN, row_number, warnings);
        let historic = parse_glucose(
            cell(self.historic),
            HISTORIC_GLUCOSE_COLUMN,
            row_number,
            warnings,
        );

        let note = self
            .notes
            .map(cell)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        GlucoseRecord {
            timestamp,
            glucose_mmol_l: scan.or(historic),
            note,
            session_id: None,
            fields: self.kept.iter().map(|&i| cell(i).to_string()).collect(),
        }
    }
}

fn parse_glucose(
    raw: &str,
    column: &str,
    row_number: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            warnings.push(ParseWarning {
                row: row_number,
                column: column.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}
