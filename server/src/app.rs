use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::page::leaderboard_page))
        .route("/api/leaderboard", get(routes::api::get_leaderboard))
        .route(
            "/api/leaderboard/refresh",
            post(routes::api::refresh_leaderboard),
        )
        .route("/api/events", get(routes::sse::view_events))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::build_app;
    use crate::state::AppState;

    fn idle_state() -> AppState {
        AppState::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn serves_empty_view_before_first_refresh() {
        let response = build_app(idle_state())
            .oneshot(
                Request::builder()
                    .uri("/api/leaderboard")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::ETAG));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&header::HeaderValue::from_static("application/json"))
        );
    }

    #[tokio::test]
    async fn root_serves_html_page() {
        let response = build_app(idle_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn refresh_endpoint_rejects_get() {
        let response = build_app(idle_state())
            .oneshot(
                Request::builder()
                    .uri("/api/leaderboard/refresh")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = build_app(idle_state())
            .oneshot(
                Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
