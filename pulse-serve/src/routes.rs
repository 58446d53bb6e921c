//! HTTP routes for the read API (spec §4.5): `GET snapshot` and
//! `GET section/<name>`. Grounded in `ferrex-server/src/routes/mod.rs`'s
//! thin `Router::new().route(...)` composition and `movie_handlers.rs`'s
//! `(StatusCode, Json<...>)` response convention.

use crate::sections::{self, Section};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/section/{name}", get(get_section))
        .route("/ws", get(crate::ws::handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn get_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    match sections::read_snapshot(state.store.as_ref(), &state.channels).await {
        Ok(snapshot) => (StatusCode::OK, Json(serde_json::to_value(snapshot).unwrap())).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn get_section(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let Some(section) = Section::parse(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown section '{name}'")})),
        )
            .into_response();
    };
    match sections::read_section(state.store.as_ref(), &state.channels, section).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

fn store_error(e: pulse_core::PulseError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::warn!("store error serving request: {e}");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "store unavailable"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::config::{ChannelNames, PulseConfig};
    use pulse_core::store::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), &PulseConfig::default())
    }

    #[tokio::test]
    async fn snapshot_returns_empty_shapes_when_store_is_empty() {
        let app = router(test_state());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/snapshot").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["trending_keywords"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_section_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/section/bogus")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn known_section_reads_through_to_the_store() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        store.set(&channels.word_cloud_key(), r#"[{"text":"bitcoin","value":3}]"#).await.unwrap();
        let state = AppState::new(Arc::new(store), &PulseConfig::default());
        let app = router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/section/word_cloud")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value[0]["text"], "bitcoin");
    }
}
