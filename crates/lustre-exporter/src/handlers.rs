//! HTTP request handlers: metrics, landing page, health and status.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Serialize;
use tracing::{debug, error};

use lustre_core::collector::{RoundReport, ScrapeCoordinator};
use lustre_core::config::DetailLevel;

use crate::state::AppState;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

// ============================================================
// Metrics
// ============================================================

pub(crate) async fn handle_metrics(State(state): AppState) -> Response {
    // Collection reads the filesystem and may wait on a running round.
    let rendered = tokio::task::spawn_blocking(move || {
        let report = state.coordinator.collect();
        debug!(
            round = report.id,
            records = report.records.len(),
            "serving round"
        );
        state.exposition.render(&report)
    })
    .await;

    match rendered {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
        Err(e) => {
            error!(error = %e, "collection task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "collection failed").into_response()
        }
    }
}

// ============================================================
// Landing page
// ============================================================

pub(crate) async fn handle_landing(State(state): AppState) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Lustre Exporter</title></head>\n<body>\n\
         <h1>Lustre Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         <p><a href=\"/api/v1/status\">Status</a></p>\n\
         </body>\n</html>\n",
        path = state.telemetry_path
    ))
}

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Status
// ============================================================

#[derive(Debug, Serialize)]
pub(crate) struct SourceStatus {
    name: String,
    result: &'static str,
    duration_secs: f64,
    records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoundStatus {
    id: u64,
    created_at: String,
    finished_at: String,
    duration_secs: f64,
    records: usize,
    sources: Vec<SourceStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    sources: Vec<String>,
    collectors: Vec<(&'static str, DetailLevel)>,
    rounds_started: u64,
    rounds_running: usize,
    peak_running: usize,
    last_round: Option<RoundStatus>,
}

fn round_status(report: &RoundReport) -> RoundStatus {
    RoundStatus {
        id: report.id,
        created_at: report.created_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
        duration_secs: report.duration.as_secs_f64(),
        records: report.records.len(),
        sources: report
            .outcomes
            .iter()
            .map(|o| SourceStatus {
                name: o.source.clone(),
                result: o.outcome.as_str(),
                duration_secs: o.duration.as_secs_f64(),
                records: o.records,
                error: o.error.clone(),
            })
            .collect(),
    }
}

pub(crate) fn status_response(
    coordinator: &ScrapeCoordinator,
    collectors: Vec<(&'static str, DetailLevel)>,
) -> StatusResponse {
    StatusResponse {
        sources: coordinator.source_names(),
        collectors,
        rounds_started: coordinator.rounds_started(),
        rounds_running: coordinator.running(),
        peak_running: coordinator.peak_running(),
        last_round: coordinator.last_report().as_deref().map(round_status),
    }
}

pub(crate) async fn handle_status(State(state): AppState) -> Json<StatusResponse> {
    let collectors = state
        .collectors
        .levels()
        .map(|(component, level)| (component.as_str(), level))
        .collect();
    Json(status_response(&state.coordinator, collectors))
}
