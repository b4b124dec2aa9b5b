use std::io::Write;

use crate::parser::{GLUCOSE_COLUMN, SESSION_COLUMN, TIMESTAMP_COLUMN};
use crate::types::GlucoseRecord;

/// `%.f` prints sub-second digits only when present.
const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Header of an export built from the given ingestion columns.
pub fn export_header(columns: &[String]) -> Vec<String> {
    let mut header = vec![
        TIMESTAMP_COLUMN.to_string(),
        GLUCOSE_COLUMN.to_string(),
        SESSION_COLUMN.to_string(),
    ];
    header.extend(columns.iter().filter(|c| *c != TIMESTAMP_COLUMN).cloned());
    header
}

/// Write records as CSV in the order given.
///
/// `columns` are the dataset's ingestion columns; each record's `fields`
/// must be aligned with them. A timestamp that failed to parse is written
/// back as its original text so re-ingestion sees the same cell.
pub fn write_csv<W: Write>(
    columns: &[String],
    records: &[GlucoseRecord],
    writer: W,
) -> Result<(), csv::Error> {
    let timestamp_index = columns.iter().position(|c| c == TIMESTAMP_COLUMN);
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(export_header(columns))?;

    for record in records {
        let timestamp = match record.timestamp {
            Some(ts) => ts.format(EXPORT_TIMESTAMP_FORMAT).to_string(),
            None => timestamp_index
                .and_then(|i| record.fields.get(i))
                .cloned()
                .unwrap_or_default(),
        };

        let mut row = vec![
            timestamp,
            record
                .glucose_mmol_l
                .map(|g| g.to_string())
                .unwrap_or_default(),
            record
                .session_id
                .map(|s| s.to_string())
                .unwrap_or_default(),
        ];
        row.extend(
            columns
                .iter()
                .enumerate()
                .filter(|(_, c)| *c != TIMESTAMP_COLUMN)
                .map(|(i, _)| record.fields.get(i).cloned().unwrap_or_default()),
        );

        writer.write_record(&row)?;
    }

    writer.flush()?;
    tracing::debug!(rows = records.len(), "Wrote CSV export");
    Ok(())
}

/// Export records into an owned UTF-8 buffer.
pub fn to_csv_bytes(columns: &[String], records: &[GlucoseRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut buf = Vec::new();
    write_csv(columns, records, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{HISTORIC_GLUCOSE_COLUMN, NOTES_COLUMN, SCAN_GLUCOSE_COLUMN};
    use chrono::NaiveDate;

    fn columns() -> Vec<String> {
        vec![
            TIMESTAMP_COLUMN.to_string(),
            SCAN_GLUCOSE_COLUMN.to_string(),
            HISTORIC_GLUCOSE_COLUMN.to_string(),
            NOTES_COLUMN.to_string(),
        ]
    }

    #[test]
    fn test_header_puts_derived_columns_first() {
        assert_eq!(
            export_header(&columns()),
            vec![
                "Device Timestamp",
                "Glucose (mmol/L)",
                "Sensor Period",
                "Scan Glucose mmol/L",
                "Historic Glucose mmol/L",
                "Notes",
            ]
        );
    }

    #[test]
    fn test_rows_keep_order_and_original_cells() {
        let records = vec![
            GlucoseRecord {
                timestamp: NaiveDate::from_ymd_opt(2024, 3, 2).and_then(|d| d.and_hms_opt(9, 0, 0)),
                glucose_mmol_l: Some(6.0),
                note: Some("run, then lunch".to_string()),
                session_id: Some(1),
                fields: vec![
                    "02-03-2024 09:00".to_string(),
                    "".to_string(),
                    "6".to_string(),
                    "run, then lunch".to_string(),
                ],
            },
            GlucoseRecord {
                timestamp: None,
                glucose_mmol_l: None,
                note: None,
                session_id: Some(1),
                fields: vec![
                    "garbled".to_string(),
                    "".to_string(),
                    "".to_string(),
                    "".to_string(),
                ],
            },
        ];

        let bytes = to_csv_bytes(&columns(), &records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "2024-03-02 09:00:00,6,1,,6,\"run, then lunch\""
        );
        assert_eq!(lines[2], "garbled,,1,,,");
    }
}
