use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use cgmview_core::{
    notes, to_csv_bytes, ChartSeries, FilterControls, GlucoseRecord, GlucoseSummary,
    InvalidSelection, ReferenceBands, SegmentedDataset, SessionSpan, View, ViewRequest,
};
use cgmview_logging::LogEvent;

use super::{no_dataset, AppState};

const EXPORT_FILE_NAME: &str = "cgm_filtered.csv";

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub session: Option<u32>,
    pub selection_fallback: Option<InvalidSelection>,
    pub summary: GlucoseSummary,
    pub bands: ReferenceBands,
}

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub session: Option<u32>,
    pub notes: Vec<GlucoseRecord>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSpan>>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    Ok(Json(dataset.spans()))
}

pub async fn get_readings(
    State(state): State<AppState>,
    Query(controls): Query<FilterControls>,
) -> Result<Json<View>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    Ok(Json(run_view(&state, dataset, &controls)?))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(controls): Query<FilterControls>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    let view = run_view(&state, dataset, &controls)?;

    Ok(Json(SummaryResponse {
        session: view.session,
        selection_fallback: view.selection_fallback,
        summary: view.summary,
        bands: ReferenceBands::clinical(),
    }))
}

pub async fn get_chart(
    State(state): State<AppState>,
    Query(controls): Query<FilterControls>,
) -> Result<Json<ChartSeries>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    let view = run_view(&state, dataset, &controls)?;
    Ok(Json(ChartSeries::from_records(&view.records)))
}

pub async fn get_notes(
    State(state): State<AppState>,
    Query(controls): Query<FilterControls>,
) -> Result<Json<NotesResponse>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    let view = run_view(&state, dataset, &controls)?;

    Ok(Json(NotesResponse {
        session: view.session,
        notes: notes(&view.records),
    }))
}

/// Download the filtered readings as CSV.
pub async fn export_csv(
    State(state): State<AppState>,
    Query(controls): Query<FilterControls>,
) -> Result<Response, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    let view = run_view(&state, dataset, &controls)?;

    let body = to_csv_bytes(&dataset.columns, &view.records)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state.logger.log(&LogEvent::ExportWritten {
        destination: EXPORT_FILE_NAME.to_string(),
        rows: view.records.len(),
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}

fn run_view(
    state: &AppState,
    dataset: &SegmentedDataset,
    controls: &FilterControls,
) -> Result<View, (StatusCode, String)> {
    let filter = controls
        .to_spec()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let view = state.pipeline.run(
        dataset,
        &ViewRequest {
            session: controls.session,
            filter,
        },
    );

    if let Some(fallback) = view.selection_fallback {
        state.logger.log(&LogEvent::SelectionFallback {
            requested: fallback.requested,
            used: fallback.used,
        });
    }
    state.logger.log(&LogEvent::FilterApplied {
        session: view.session,
        matched: view.records.len(),
        total: dataset.records.len(),
    });

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{state, CSV};

    fn controls() -> FilterControls {
        FilterControls::default()
    }

    #[tokio::test]
    async fn test_views_without_dataset_are_not_found() {
        let app = state(None, &[]);
        let err = get_summary(State(app.clone()), Query(controls()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = list_sessions(State(app)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let Json(spans) = list_sessions(State(state(Some(CSV), &[]))).await.unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].readings, 3);
        assert_eq!(spans[1].readings, 1);
    }

    #[tokio::test]
    async fn test_summary_defaults_to_first_session() {
        let Json(response) = get_summary(State(state(Some(CSV), &[])), Query(controls()))
            .await
            .unwrap();

        assert_eq!(response.session, Some(0));
        assert!(response.selection_fallback.is_none());
        assert_eq!(response.summary.average, Some(7.0));
        assert_eq!(response.summary.max, Some(9.0));
        assert_eq!(response.summary.min, Some(5.0));
        assert_eq!(response.bands, ReferenceBands::clinical());
    }

    #[tokio::test]
    async fn test_unknown_session_falls_back() {
        let query = FilterControls {
            session: Some(5),
            ..controls()
        };
        let Json(view) = get_readings(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap();

        assert_eq!(view.session, Some(0));
        assert_eq!(
            view.selection_fallback,
            Some(InvalidSelection {
                requested: 5,
                used: Some(0)
            })
        );
        assert_eq!(view.records.len(), 3);
    }

    #[tokio::test]
    async fn test_keyword_filter_within_session() {
        let query = FilterControls {
            session: Some(1),
            keyword: Some("LUNCH".to_string()),
            ..controls()
        };
        let Json(view) = get_readings(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap();

        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].note.as_deref(), Some("Lunch walk"));
    }

    #[tokio::test]
    async fn test_invalid_filter_is_bad_request() {
        let query = FilterControls {
            min: Some(9.0),
            max: Some(3.0),
            ..controls()
        };
        let err = get_summary(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let query = FilterControls {
            from: Some("14/03/2024".to_string()),
            ..controls()
        };
        let err = get_chart(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_result_has_undefined_summary() {
        let query = FilterControls {
            min: Some(15.0),
            ..controls()
        };
        let Json(response) = get_summary(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap();

        assert_eq!(response.summary.average, None);
        assert_eq!(response.summary.readings, 0);
    }

    #[tokio::test]
    async fn test_chart_and_notes() {
        let app = state(Some(CSV), &[]);

        let Json(series) = get_chart(State(app.clone()), Query(controls()))
            .await
            .unwrap();
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.bands.upper, 7.8);

        let Json(response) = get_notes(State(app), Query(controls())).await.unwrap();
        assert_eq!(response.notes.len(), 1);
        assert_eq!(response.notes[0].note.as_deref(), Some("lunch"));
    }

    #[tokio::test]
    async fn test_export_is_csv_attachment() {
        let query = FilterControls {
            session: Some(0),
            min: Some(6.0),
            ..controls()
        };
        let response = export_csv(State(state(Some(CSV), &[])), Query(query))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cgm_filtered.csv\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Device Timestamp,Glucose (mmol/L),Sensor Period"));
        assert!(lines[1].starts_with("2024-03-14 08:15:00,7,0"));
        assert!(lines[2].starts_with("2024-03-14 14:00:00,9,0"));
    }
}
