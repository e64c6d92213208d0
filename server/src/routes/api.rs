use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::services::refresher::RefreshOutcome;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const VIEW_CACHE_CONTROL: &str = "no-cache";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let current = state.store.current().await;
    let observability = state.store.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "rows": current.view.rows.len(),
        "server_error": current.view.server_error,
        "cycle": current.view.cycle,
        "updated_at": current.view.updated_at,
        "scheduler_running": state.scheduler.is_running(),
        "refresh_interval_secs": state.refresh_interval.as_secs(),
        "observability": {
            "refresh_cycles_total": observability.refresh_cycles_total,
            "leaderboard_failures_total": observability.leaderboard_failures_total,
            "enrichment_failures_total": observability.enrichment_failures_total,
            "stale_cycles_discarded_total": observability.stale_cycles_discarded_total,
            "view_requests_total": observability.view_requests_total,
        }
    }))
}

/// Serve the pre-serialized view state; 304 when the client already has it.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.store.observability.record_view_request();
    let (etag, json) = {
        let published = state.store.published.read().await;
        (published.etag.clone(), published.json.clone())
    };

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response(VIEW_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), VIEW_CACHE_CONTROL, Some(etag.as_str()))
}

/// Run one refresh cycle on demand and return the resulting view.
pub async fn refresh_leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.refresher.refresh().await;
    let current = state.store.current().await;

    let mut response = json_bytes_response(
        (*current.json).clone(),
        VIEW_CACHE_CONTROL,
        Some(current.etag.as_str()),
    );
    *response.status_mut() = refresh_status(outcome);
    response
}

fn refresh_status(outcome: RefreshOutcome) -> StatusCode {
    match outcome {
        RefreshOutcome::Published { .. } => StatusCode::OK,
        RefreshOutcome::LeaderboardUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RefreshOutcome::Stale { .. } => StatusCode::ACCEPTED,
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (row_count, server_error) = {
        let published = state.store.published.read().await;
        (published.view.rows.len(), published.view.server_error)
    };
    let body = render_prometheus_metrics(
        row_count,
        server_error,
        state.scheduler.is_running(),
        state.store.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    row_count: usize,
    server_error: bool,
    scheduler_running: bool,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "# HELP leaderboard_rows Rows in the currently published leaderboard."
    );
    let _ = writeln!(body, "# TYPE leaderboard_rows gauge");
    let _ = writeln!(body, "leaderboard_rows {row_count}");

    let _ = writeln!(
        body,
        "# HELP leaderboard_server_error Whether the scoring service is failing (1 or 0)."
    );
    let _ = writeln!(body, "# TYPE leaderboard_server_error gauge");
    let _ = writeln!(body, "leaderboard_server_error {}", u8::from(server_error));

    let _ = writeln!(
        body,
        "# HELP leaderboard_scheduler_running Whether the refresh scheduler is active (1 or 0)."
    );
    let _ = writeln!(body, "# TYPE leaderboard_scheduler_running gauge");
    let _ = writeln!(
        body,
        "leaderboard_scheduler_running {}",
        u8::from(scheduler_running)
    );

    let counters = [
        (
            "leaderboard_refresh_cycles_total",
            "Total refresh cycles started.",
            observability.refresh_cycles_total,
        ),
        (
            "leaderboard_fetch_failures_total",
            "Total failed leaderboard fetches from the scoring service.",
            observability.leaderboard_failures_total,
        ),
        (
            "leaderboard_enrichment_failures_total",
            "Total failed alias lookups; rows were published without aliases.",
            observability.enrichment_failures_total,
        ),
        (
            "leaderboard_stale_cycles_total",
            "Total refresh results discarded because a newer cycle was issued.",
            observability.stale_cycles_discarded_total,
        ),
        (
            "leaderboard_view_requests_total",
            "Total /api/leaderboard requests.",
            observability.view_requests_total,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }

    body
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
