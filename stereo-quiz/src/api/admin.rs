//! Administrative results view and CSV exports
//!
//! These routes have no authentication; every access is logged at warn
//! level so it shows up in production logs.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use stereo_common::db::{fetch_annotations, fetch_familiarity};
use stereo_common::report::{aggregate, annotations_csv, familiarity_csv, report_csv};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::pages;
use crate::AppState;

pub const ANNOTATIONS_EXPORT_FILE: &str = "raw_annotations.csv";
pub const FAMILIARITY_EXPORT_FILE: &str = "familiarity_ratings.csv";

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_view))
        .route("/admin/export/annotations", get(export_annotations))
        .route("/admin/export/familiarity", get(export_familiarity))
        .route("/admin/export/report", get(export_report))
}

/// Report file name stamped with the local time of the download
pub fn report_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("processed_stereotypes_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn csv_download(file_name: &str, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /admin
async fn admin_view(State(state): State<AppState>) -> ApiResult<Html<String>> {
    warn!("Unauthenticated access to the admin results view");

    let annotations = fetch_annotations(&state.db).await?;
    let familiarity = fetch_familiarity(&state.db).await?;

    Ok(Html(pages::admin_page(
        &annotations,
        &familiarity,
        state.definitions.load_error(),
    )))
}

/// GET /admin/export/annotations
async fn export_annotations(State(state): State<AppState>) -> ApiResult<Response> {
    warn!("Unauthenticated export of raw annotations");
    let rows = fetch_annotations(&state.db).await?;
    let body = annotations_csv(&rows).map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(rows = rows.len(), "Exported raw annotations");
    Ok(csv_download(ANNOTATIONS_EXPORT_FILE, body))
}

/// GET /admin/export/familiarity
async fn export_familiarity(State(state): State<AppState>) -> ApiResult<Response> {
    warn!("Unauthenticated export of familiarity ratings");
    let rows = fetch_familiarity(&state.db).await?;
    let body = familiarity_csv(&rows).map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(rows = rows.len(), "Exported familiarity ratings");
    Ok(csv_download(FAMILIARITY_EXPORT_FILE, body))
}

/// GET /admin/export/report
///
/// Needs the definitions to fan supersets out to their subsets, so it is
/// unavailable when they failed to load.
async fn export_report(State(state): State<AppState>) -> ApiResult<Response> {
    warn!("Unauthenticated export of the processed report");

    if let Some(reason) = state.definitions.load_error() {
        return Err(ApiError::DefinitionsUnavailable(reason.to_string()));
    }

    let annotations = fetch_annotations(&state.db).await?;
    let familiarity = fetch_familiarity(&state.db).await?;
    let rows = aggregate(&annotations, &familiarity, &state.definitions);
    let body = report_csv(&rows).map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        annotations = annotations.len(),
        report_rows = rows.len(),
        "Exported processed report"
    );
    Ok(csv_download(&report_file_name(chrono::Local::now()), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_file_name() {
        let now = chrono::Local
            .with_ymd_and_hms(2025, 3, 7, 9, 5, 1)
            .single()
            .unwrap();
        assert_eq!(report_file_name(now), "processed_stereotypes_20250307_090501.csv");
    }
}
