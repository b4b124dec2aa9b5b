//! # cgmview-core
//!
//! The data pipeline behind the CGM viewer: parse an export, split it into
//! sensor sessions, filter, summarize and export.
//!
//! ```text
//! parser ─▶ segment ─▶ select session ─▶ filter ─▶ { summary, chart, export }
//! ```
//!
//! [`Pipeline`] is the entry point the presentation layer re-invokes with the
//! current [`ViewRequest`] on every interaction.

pub mod error;
pub mod export;
pub mod filter;
pub mod gate;
pub mod parser;
pub mod pipeline;
pub mod segment;
pub mod summary;
pub mod types;

pub use error::{FilterError, GateError, IngestionError};
pub use export::{to_csv_bytes, write_csv};
pub use filter::{notes, select_session, DateRange, FilterControls, FilterSpec, GlucoseRange, Predicate};
pub use gate::AccessGate;
pub use parser::{load, parse_bytes, parse_reader, parse_timestamp};
pub use pipeline::{resolve_session, Pipeline, ViewRequest};
pub use segment::{default_session_gap, segment, Segmentation, DEFAULT_SESSION_GAP_HOURS};
pub use summary::{format_stat, summarize, LOWER_NORMAL_MMOL_L, UPPER_NORMAL_MMOL_L};
pub use types::{
    ChartPoint, ChartSeries, Dataset, GlucoseBand, GlucoseRecord, GlucoseSummary,
    InvalidSelection, ParseWarning, ReferenceBands, SegmentedDataset, SessionSpan, View,
};
