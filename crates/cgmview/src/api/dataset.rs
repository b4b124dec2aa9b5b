use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

use cgmview_core::{ParseWarning, SegmentedDataset};
use cgmview_logging::LogEvent;

use super::{no_dataset, AppState};

/// Shape of the loaded export.
#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: Vec<String>,
    pub sessions: Vec<u32>,
    pub warnings: Vec<ParseWarning>,
}

impl From<&SegmentedDataset> for DatasetInfo {
    fn from(dataset: &SegmentedDataset) -> Self {
        Self {
            rows: dataset.records.len(),
            columns: dataset.columns.clone(),
            sessions: dataset.session_ids.clone(),
            warnings: dataset.warnings.clone(),
        }
    }
}

pub async fn get_dataset(
    State(state): State<AppState>,
) -> Result<Json<DatasetInfo>, (StatusCode, String)> {
    let guard = state.dataset.read().await;
    let dataset = guard.as_ref().ok_or_else(no_dataset)?;
    Ok(Json(DatasetInfo::from(dataset)))
}

/// Replace the loaded export with the CSV in the request body.
pub async fn put_dataset(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DatasetInfo>, (StatusCode, String)> {
    let dataset = state
        .pipeline
        .ingest(&body)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    state.logger.log(&LogEvent::DatasetLoaded {
        source: "upload".to_string(),
        rows: dataset.records.len(),
        columns: dataset.columns.len(),
        warnings: dataset.warnings.len(),
    });
    state.logger.log(&LogEvent::SessionsDetected {
        count: dataset.session_ids.len(),
    });

    let info = DatasetInfo::from(&dataset);
    *state.dataset.write().await = Some(dataset);

    Ok(Json(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{state, CSV};

    #[tokio::test]
    async fn test_get_without_dataset_is_not_found() {
        let err = get_dataset(State(state(None, &[]))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_replaces_dataset() {
        let app = state(None, &[]);

        let Json(info) = put_dataset(State(app.clone()), Bytes::from_static(CSV.as_bytes()))
            .await
            .unwrap();
        assert_eq!(info.rows, 4);
        assert_eq!(info.sessions, vec![0, 1]);
        assert!(info.warnings.is_empty());

        let Json(info) = get_dataset(State(app)).await.unwrap();
        assert_eq!(info.rows, 4);
        assert_eq!(
            info.columns,
            vec![
                "Device Timestamp",
                "Historic Glucose mmol/L",
                "Scan Glucose mmol/L",
                "Notes"
            ]
        );
    }

    #[tokio::test]
    async fn test_put_rejects_unusable_csv() {
        let app = state(Some(CSV), &[]);

        let err = put_dataset(State(app.clone()), Bytes::from_static(b"a,b\n1,2\n"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);

        // The previous dataset survives a failed upload.
        let Json(info) = get_dataset(State(app)).await.unwrap();
        assert_eq!(info.rows, 4);
    }
}
