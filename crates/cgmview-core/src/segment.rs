//! Sensor session detection.
//!
//! A CGM logs a reading every few minutes while a sensor is worn. A gap
//! longer than [`DEFAULT_SESSION_GAP_HOURS`] between consecutive readings
//! marks the start of a new sensor session.

use chrono::{Duration, NaiveDateTime};

use crate::types::{Dataset, GlucoseRecord, SegmentedDataset, SessionSpan};

pub const DEFAULT_SESSION_GAP_HOURS: i64 = 8;

pub fn default_session_gap() -> Duration {
    Duration::hours(DEFAULT_SESSION_GAP_HOURS)
}

/// Records annotated with session ids, plus the distinct ids in ascending order.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub records: Vec<GlucoseRecord>,
    pub session_ids: Vec<u32>,
}

/// Assign session ids in one pass over records already sorted by timestamp.
///
/// The counter starts at 0 and increments whenever the gap to the previous
/// record is strictly greater than `gap`. A pair where either timestamp is
/// missing never opens a session.
pub fn segment(mut records: Vec<GlucoseRecord>, gap: Duration) -> Segmentation {
    let mut session: u32 = 0;
    let mut previous: Option<NaiveDateTime> = None;

    for (i, record) in records.iter_mut().enumerate() {
        if i > 0 {
            if let (Some(prev), Some(current)) = (previous, record.timestamp) {
                if current - prev > gap {
                    session += 1;
                }
            }
        }
        previous = record.timestamp;
        record.session_id = Some(session);
    }

    let session_ids = if records.is_empty() {
        Vec::new()
    } else {
        (0..=session).collect()
    };

    tracing::debug!(sessions = session_ids.len(), "Segmented readings into sensor sessions");

    Segmentation {
        records,
        session_ids,
    }
}

impl Dataset {
    /// Run the segmenter over this dataset.
    pub fn segment(self, gap: Duration) -> SegmentedDataset {
        let Segmentation {
            records,
            session_ids,
        } = segment(self.records, gap);

        SegmentedDataset {
            columns: self.columns,
            records,
            warnings: self.warnings,
            session_ids,
        }
    }
}

impl SegmentedDataset {
    pub fn has_session(&self, id: u32) -> bool {
        self.session_ids.binary_search(&id).is_ok()
    }

    /// First and last timestamp plus reading count for every session.
    pub fn spans(&self) -> Vec<SessionSpan> {
        let mut spans: Vec<SessionSpan> = self
            .session_ids
            .iter()
            .map(|&id| SessionSpan {
                id,
                start: None,
                end: None,
                readings: 0,
            })
            .collect();

        for record in &self.records {
            let Some(span) = record
                .session_id
                .and_then(|id| spans.get_mut(id as usize))
            else {
                continue;
            };
            span.readings += 1;
            if let Some(ts) = record.timestamp {
                span.start = Some(span.start.map_or(ts, |s| s.min(ts)));
                span.end = Some(span.end.map_or(ts, |e| e.max(ts)));
            }
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record_at(ts: Option<NaiveDateTime>) -> GlucoseRecord {
        GlucoseRecord {
            timestamp: ts,
            glucose_mmol_l: Some(5.0),
            note: None,
            session_id: None,
            fields: Vec::new(),
        }
    }

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn ids(seg: &Segmentation) -> Vec<u32> {
        seg.records.iter().map(|r| r.session_id.unwrap()).collect()
    }

    #[test]
    fn test_empty_input_has_no_sessions() {
        let seg = segment(Vec::new(), default_session_gap());
        assert!(seg.records.is_empty());
        assert!(seg.session_ids.is_empty());
    }

    #[test]
    fn test_single_record_is_session_zero() {
        let seg = segment(vec![record_at(Some(base()))], default_session_gap());
        assert_eq!(ids(&seg), vec![0]);
        assert_eq!(seg.session_ids, vec![0]);
    }

    #[test]
    fn test_regular_cadence_is_one_session() {
        let records = (0..100)
            .map(|i| record_at(Some(base() + Duration::minutes(15 * i))))
            .collect();
        let seg = segment(records, default_session_gap());
        assert!(ids(&seg).iter().all(|&id| id == 0));
        assert_eq!(seg.session_ids, vec![0]);
    }

    #[test]
    fn test_gap_of_exactly_threshold_does_not_split() {
        let records = vec![
            record_at(Some(base())),
            record_at(Some(base() + Duration::hours(8))),
        ];
        let seg = segment(records, default_session_gap());
        assert_eq!(ids(&seg), vec![0, 0]);
    }

    #[test]
    fn test_gap_over_threshold_splits() {
        let records = vec![
            record_at(Some(base())),
            record_at(Some(base() + Duration::minutes(5))),
            record_at(Some(base() + Duration::hours(8) + Duration::minutes(6))),
            record_at(Some(base() + Duration::hours(30))),
        ];
        let seg = segment(records, default_session_gap());
        assert_eq!(ids(&seg), vec![0, 0, 1, 2]);
        assert_eq!(seg.session_ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_untimed_trailing_records_inherit_last_session() {
        let records = vec![
            record_at(Some(base())),
            record_at(Some(base() + Duration::hours(9))),
            record_at(None),
            record_at(None),
        ];
        let seg = segment(records, default_session_gap());
        assert_eq!(ids(&seg), vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_custom_gap() {
        let records = vec![
            record_at(Some(base())),
            record_at(Some(base() + Duration::hours(2))),
        ];
        let seg = segment(records, Duration::hours(1));
        assert_eq!(ids(&seg), vec![0, 1]);
    }

    #[test]
    fn test_spans() {
        let dataset = Dataset {
            columns: Vec::new(),
            records: vec![
                record_at(Some(base())),
                record_at(Some(base() + Duration::hours(1))),
                record_at(Some(base() + Duration::hours(12))),
                record_at(None),
            ],
            warnings: Vec::new(),
        }
        .segment(default_session_gap());

        let spans = dataset.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].readings, 2);
        assert_eq!(spans[0].start, Some(base()));
        assert_eq!(spans[0].end, Some(base() + Duration::hours(1)));
        assert_eq!(spans[1].readings, 2);
        assert_eq!(spans[1].start, Some(base() + Duration::hours(12)));
        assert_eq!(spans[1].end, Some(base() + Duration::hours(12)));
        assert!(dataset.has_session(1));
        assert!(!dataset.has_session(2));
    }
}
