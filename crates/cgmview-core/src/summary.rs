use crate::types::{ChartPoint, ChartSeries, GlucoseBand, GlucoseRecord, GlucoseSummary, ReferenceBands};

/// Upper bound of the normal glucose range.
pub const UPPER_NORMAL_MMOL_L: f64 = 7.8;
/// Lower bound of the normal glucose range.
pub const LOWER_NORMAL_MMOL_L: f64 = 3.9;

/// Average, max and min over records that have a glucose value.
pub fn summarize(records: &[GlucoseRecord]) -> GlucoseSummary {
    let values: Vec<f64> = records.iter().filter_map(|r| r.glucose_mmol_l).collect();

    if values.is_empty() {
        return GlucoseSummary {
            average: None,
            max: None,
            min: None,
            readings: 0,
        };
    }

    let sum: f64 = values.iter().sum();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);

    GlucoseSummary {
        average: Some(sum / values.len() as f64),
        max: Some(max),
        min: Some(min),
        readings: values.len(),
    }
}

/// Render a statistic for display; undefined values read as "no data".
pub fn format_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2} mmol/L", v),
        None => "no data".to_string(),
    }
}

impl ReferenceBands {
    pub const fn clinical() -> Self {
        Self {
            lower: LOWER_NORMAL_MMOL_L,
            upper: UPPER_NORMAL_MMOL_L,
        }
    }

    pub fn classify(&self, value: f64) -> GlucoseBand {
        if value < self.lower {
            GlucoseBand::Low
        } else if value > self.upper {
            GlucoseBand::High
        } else {
            GlucoseBand::InRange
        }
    }
}

impl Default for ReferenceBands {
    fn default() -> Self {
        Self::clinical()
    }
}

impl GlucoseBand {
    pub fn classify(value: f64) -> Self {
        ReferenceBands::clinical().classify(value)
    }
}

impl ChartSeries {
    /// Points for every record that has both a timestamp and a glucose value.
    pub fn from_records(records: &[GlucoseRecord]) -> Self {
        let points = records
            .iter()
            .filter_map(|r| {
                Some(ChartPoint {
                    timestamp: r.timestamp?,
                    glucose_mmol_l: r.glucose_mmol_l?,
                })
            })
            .collect();

        Self {
            points,
            bands: ReferenceBands::clinical(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(glucose: Option<f64>) -> GlucoseRecord {
        GlucoseRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(8, 0, 0)),
            glucose_mmol_l: glucose,
            note: None,
            session_id: Some(0),
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_summary_skips_missing_values() {
        let records = vec![record(Some(4.0)), record(None), record(Some(8.0))];
        let summary = summarize(&records);
        assert_eq!(summary.average, Some(6.0));
        assert_eq!(summary.max, Some(8.0));
        assert_eq!(summary.min, Some(4.0));
        assert_eq!(summary.readings, 2);
    }

    #[test]
    fn test_summary_undefined_without_values() {
        for records in [Vec::new(), vec![record(None), record(None)]] {
            let summary = summarize(&records);
            assert_eq!(summary.average, None);
            assert_eq!(summary.max, None);
            assert_eq!(summary.min, None);
            assert_eq!(summary.readings, 0);
        }
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(Some(6.1666)), "6.17 mmol/L");
        assert_eq!(format_stat(None), "no data");
    }

    #[test]
    fn test_band_classification() {
        assert_eq!(GlucoseBand::classify(3.8), GlucoseBand::Low);
        assert_eq!(GlucoseBand::classify(3.9), GlucoseBand::InRange);
        assert_eq!(GlucoseBand::classify(7.8), GlucoseBand::InRange);
        assert_eq!(GlucoseBand::classify(7.9), GlucoseBand::High);
    }

    #[test]
    fn test_chart_series_skips_incomplete_records() {
        let mut untimed = record(Some(5.0));
        untimed.timestamp = None;
        let records = vec![record(Some(5.0)), record(None), untimed];

        let series = ChartSeries::from_records(&records);
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.bands.lower, 3.9);
        assert_eq!(series.bands.upper, 7.8);
    }
}
