// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers for items.
//!
//! | Route | Outcome |
//! |-------|---------|
//! | `GET /{item_id}` | 200 `{"value": ...}`, 404 empty, 500 `{"error": ...}` |
//! | `POST /` | 201 created, 200 already existed, 400/500 `{"error": ...}` |
//!
//! Storage error text is returned in 500 bodies.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::DEFAULT_BODY_LIMIT;
use crate::error::{Error, Result};
use crate::persistence::{Persistence, PersistenceError};

/// Shared state for item handlers.
#[derive(Clone)]
pub struct AppState {
    persistence: Arc<dyn Persistence>,
}

impl AppState {
    /// Create handler state over a ready persistence backend.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }
}

/// Body of `POST /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Key to store under.
    pub item_id: String,
    /// Value to store.
    pub value: String,
}

/// Body of a successful `GET /{item_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueResponse {
    /// Stored value.
    pub value: String,
}

/// Body of 400 and 500 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Cause of the failure.
    pub error: String,
}

/// Request-level errors. These never escape the handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or invalid client input.
    #[error("{0}")]
    RequestValidation(String),

    /// No item stored under the key.
    #[error("item not found: {0}")]
    NotFound(String),

    /// Any other storage failure.
    #[error("{0}")]
    StorageOperation(#[from] PersistenceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            Self::RequestValidation(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            Self::StorageOperation(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// HTTP layer settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum accepted request body size in bytes.
    pub body_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Build the item router over a ready persistence backend.
pub fn build_router(persistence: Arc<dyn Persistence>, config: &RouterConfig) -> Result<Router> {
    if config.body_limit == 0 {
        return Err(Error::Router("body limit must be greater than zero".to_string()));
    }

    let router = Router::new()
        .route("/", post(set_item))
        .route("/{item_id}", get(get_item))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(persistence));

    Ok(router)
}

/// `GET /{item_id}`
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> std::result::Result<Json<ValueResponse>, ApiError> {
    match state.persistence.get_item(&item_id).await {
        Ok(Some(value)) => Ok(Json(ValueResponse { value })),
        Ok(None) => Err(ApiError::NotFound(item_id)),
        Err(e) => {
            error!(
                item_id = %item_id,
                error = %e,
                timed_out = e.is_timeout(),
                "Failed to read item"
            );
            Err(e.into())
        }
    }
}

/// `POST /`
pub async fn set_item(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Item>, JsonRejection>,
) -> std::result::Result<StatusCode, ApiError> {
    let Json(item) =
        payload.map_err(|rejection| ApiError::RequestValidation(rejection.body_text()))?;

    if item.item_id.is_empty() {
        return Err(ApiError::RequestValidation(
            "item_id must not be empty".to_string(),
        ));
    }

    let rows = state
        .persistence
        .insert_item(&item.item_id, &item.value)
        .await
        .map_err(|e| {
            error!(
                item_id = %item.item_id,
                error = %e,
                timed_out = e.is_timeout(),
                "Failed to insert item"
            );
            ApiError::from(e)
        })?;

    if rows == 0 {
        info!(item_id = %item.item_id, "Item already exists, do nothing");
        Ok(StatusCode::OK)
    } else {
        info!(item_id = %item.item_id, "Created item");
        Ok(StatusCode::CREATED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router_over(store: Arc<MemoryPersistence>) -> Router {
        build_router(store, &RouterConfig::default()).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_zero_body_limit_is_router_error() {
        let result = build_router(
            Arc::new(MemoryPersistence::new()),
            &RouterConfig { body_limit: 0 },
        );
        assert!(matches!(result, Err(Error::Router(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_404_with_empty_body() {
        let app = router_over(Arc::new(MemoryPersistence::new()));

        let response = app.oneshot(get("/missing")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_post_then_get_round_trip() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        let response = app
            .clone()
            .oneshot(post_json(r#"{"item_id":"111","value":"222"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_bytes(response).await.is_empty());

        let response = app.oneshot(get("/111")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_bytes(response).await;
        assert_eq!(body, br#"{"value":"222"}"#);
    }

    #[tokio::test]
    async fn test_duplicate_post_is_200_and_keeps_first_value() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        let first = app
            .clone()
            .oneshot(post_json(r#"{"item_id":"111","value":"222"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let repeat = app
            .clone()
            .oneshot(post_json(r#"{"item_id":"111","value":"222"}"#))
            .await
            .unwrap();
        assert_eq!(repeat.status(), StatusCode::OK);

        let different = app
            .clone()
            .oneshot(post_json(r#"{"item_id":"111","value":"999"}"#))
            .await
            .unwrap();
        assert_eq!(different.status(), StatusCode::OK);

        let response = app.oneshot(get("/111")).await.unwrap();
        let value: ValueResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value.value, "222");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_and_storage_unchanged() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        for body in [
            r#"{"item_id":"111","value":"#,
            r#"not json"#,
            r#"{"item_id":"111"}"#,
            r#"{"item_id":111,"value":"222"}"#,
        ] {
            let response = app.clone().oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);

            let error: ErrorResponse =
                serde_json::from_slice(&body_bytes(response).await).unwrap();
            assert!(!error.error.is_empty());
        }

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_400() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"item_id":"111","value":"222"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_item_id_is_400() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        let response = app
            .oneshot(post_json(r#"{"item_id":"","value":"222"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let store = Arc::new(MemoryPersistence::new());
        let app = build_router(store.clone(), &RouterConfig { body_limit: 16 }).unwrap();

        let response = app
            .oneshot(post_json(r#"{"item_id":"111","value":"a much longer value"}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_500_with_cause() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());
        store.close().await;

        let response = app.clone().oneshot(get("/111")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(error.error, "connection pool is closed");

        let response = app
            .oneshot(post_json(r#"{"item_id":"111","value":"222"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_keys_are_independent() {
        let store = Arc::new(MemoryPersistence::new());
        let app = router_over(store.clone());

        for i in 0..10 {
            let body = format!(r#"{{"item_id":"key-{i}","value":"value-{i}"}}"#);
            let response = app.clone().oneshot(post_json(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        for i in 0..10 {
            let response = app
                .clone()
                .oneshot(get(&format!("/key-{i}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let value: ValueResponse =
                serde_json::from_slice(&body_bytes(response).await).unwrap();
            assert_eq!(value.value, format!("value-{i}"));

            let response = app
                .clone()
                .oneshot(get(&format!("/other-{i}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
