use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::types::GlucoseRecord;

/// Inclusive date bounds. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, FilterError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(FilterError::InvertedDateRange { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Inclusive glucose bounds in mmol/L.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseRange {
    pub min: f64,
    pub max: f64,
}

impl GlucoseRange {
    /// Default bounds of the glucose control.
    pub const FULL: GlucoseRange = GlucoseRange {
        min: 0.0,
        max: 20.0,
    };

    pub fn new(min: f64, max: f64) -> Result<Self, FilterError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(FilterError::InvalidGlucoseRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for GlucoseRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// One filter condition on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Date(DateRange),
    Glucose(GlucoseRange),
    /// Lower-cased keyword, matched as a substring of the lower-cased note.
    Keyword(String),
}

impl Predicate {
    pub fn matches(&self, record: &GlucoseRecord) -> bool {
        match self {
            Predicate::Date(range) => record.date().is_some_and(|d| range.contains(d)),
            Predicate::Glucose(range) => record.glucose_mmol_l.is_some_and(|g| range.contains(g)),
            Predicate::Keyword(keyword) => record
                .note
                .as_deref()
                .is_some_and(|note| note.to_lowercase().contains(keyword.as_str())),
        }
    }
}

/// Filter controls. Every absent field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub date_range: Option<DateRange>,
    pub glucose_range: Option<GlucoseRange>,
    /// Empty keyword disables the predicate.
    pub note_keyword: Option<String>,
}

impl FilterSpec {
    /// The active predicates. Their conjunction is the filter.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(range) = self.date_range {
            predicates.push(Predicate::Date(range));
        }
        if let Some(range) = self.glucose_range {
            predicates.push(Predicate::Glucose(range));
        }
        if let Some(keyword) = self.note_keyword.as_deref().filter(|k| !k.is_empty()) {
            predicates.push(Predicate::Keyword(keyword.to_lowercase()));
        }
        predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    /// Records matching every active predicate, in their original order.
    pub fn apply(&self, records: &[GlucoseRecord]) -> Vec<GlucoseRecord> {
        let predicates = self.predicates();
        records
            .iter()
            .filter(|r| predicates.iter().all(|p| p.matches(r)))
            .cloned()
            .collect()
    }
}

/// Records belonging to one sensor session.
pub fn select_session(records: &[GlucoseRecord], session_id: u32) -> Vec<GlucoseRecord> {
    records
        .iter()
        .filter(|r| r.session_id == Some(session_id))
        .cloned()
        .collect()
}

/// Records that carry a note.
pub fn notes(records: &[GlucoseRecord]) -> Vec<GlucoseRecord> {
    records.iter().filter(|r| r.note.is_some()).cloned().collect()
}

/// Parse a `YYYY-MM-DD` control value.
pub fn parse_date(s: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| FilterError::InvalidDate(s.to_string()))
}

/// Raw control values as they arrive from the CLI or a query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterControls {
    pub session: Option<u32>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub keyword: Option<String>,
}

impl FilterControls {
    /// Validate the controls into a filter spec.
    ///
    /// A lone `min` is open-ended above; a lone `max` starts at
    /// [`GlucoseRange::FULL`]'s lower bound.
    pub fn to_spec(&self) -> Result<FilterSpec, FilterError> {
        let from = self
            .from
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_date)
            .transpose()?;
        let to = self
            .to
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_date)
            .transpose()?;

        let date_range = if from.is_some() || to.is_some() {
            Some(DateRange::new(from, to)?)
        } else {
            None
        };

        let glucose_range = if self.min.is_some() || self.max.is_some() {
            Some(GlucoseRange::new(
                self.min.unwrap_or(GlucoseRange::FULL.min),
                self.max.unwrap_or(f64::INFINITY),
            )?)
        } else {
            None
        };

        Ok(FilterSpec {
            date_range,
            glucose_range,
            note_keyword: self.keyword.clone().filter(|k| !k.is_empty()),
        })
    }
}
