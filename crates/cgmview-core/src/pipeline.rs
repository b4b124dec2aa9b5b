use std::path::Path;

use chrono::Duration;

use crate::error::IngestionError;
use crate::filter::{select_session, FilterSpec};
use crate::parser;
use crate::segment::default_session_gap;
use crate::summary::summarize;
use crate::types::{InvalidSelection, SegmentedDataset, View};

/// What the presentation layer asks for on each interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewRequest {
    /// Session to show; `None` selects the first session.
    pub session: Option<u32>,
    pub filter: FilterSpec,
}

/// Ingest → segment, then session → filter → summary on request.
#[derive(Debug, Clone)]
pub struct Pipeline {
    session_gap: Duration,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            session_gap: default_session_gap(),
        }
    }

    pub fn with_session_gap(mut self, gap: Duration) -> Self {
        self.session_gap = gap;
        self
    }

    pub fn session_gap(&self) -> Duration {
        self.session_gap
    }

    /// Parse and segment an in-memory CSV.
    pub fn ingest(&self, input: &[u8]) -> Result<SegmentedDataset, IngestionError> {
        Ok(parser::parse_bytes(input)?.segment(self.session_gap))
    }

    /// Read, parse and segment a CSV file.
    pub fn load(&self, path: &Path) -> Result<SegmentedDataset, IngestionError> {
        Ok(parser::load(path)?.segment(self.session_gap))
    }

    /// Run one view pass. Never fails: an unknown session falls back to the
    /// first one and an empty result has an undefined summary.
    pub fn run(&self, dataset: &SegmentedDataset, request: &ViewRequest) -> View {
        let (session, selection_fallback) = resolve_session(&dataset.session_ids, request.session);

        if let Some(fallback) = selection_fallback {
            tracing::warn!(
                requested = fallback.requested,
                used = ?fallback.used,
                "Requested session does not exist, using first session"
            );
        }

        let records = match session {
            Some(id) => request.filter.apply(&select_session(&dataset.records, id)),
            None => Vec::new(),
        };
        let summary = summarize(&records);

        tracing::debug!(session = ?session, matched = records.len(), "Applied view filters");

        View {
            session,
            selection_fallback,
            records,
            summary,
        }
    }
}

/// Pick the session to show, reporting an invalid request.
pub fn resolve_session(
    session_ids: &[u32],
    requested: Option<u32>,
) -> (Option<u32>, Option<InvalidSelection>) {
    let first = session_ids.first().copied();
    match requested {
        Some(id) if session_ids.contains(&id) => (Some(id), None),
        Some(id) => (
            first,
            Some(InvalidSelection {
                requested: id,
                used: first,
            }),
        ),
        None => (first, None),
    }
}
