//! HTTP surface: scan submission, notification feed, live event stream.

use crate::db::{self, Pool};
use crate::engine::{Engine, ScanError};
use crate::model::ScanAction;
use crate::notify::NotificationHub;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub pool: Pool,
    pub hub: Arc<NotificationHub>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/scan", post(submit_scan))
        .route(
            "/api/notifications",
            get(list_notifications)
                .put(update_notifications)
                .delete(clear_notifications),
        )
        .route("/api/notifications/events", get(notification_events))
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// The guardian identity arrives pre-authenticated from the session layer;
/// this service only checks the role and ownership of the listed children.
#[derive(Debug, Deserialize)]
pub struct ScanSubmission {
    pub code: String,
    pub guardian_id: i64,
}

async fn submit_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanSubmission>,
) -> impl IntoResponse {
    match state
        .engine
        .process_scan(req.guardian_id, &req.code, Utc::now())
        .await
    {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err @ ScanError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ ScanError::Authorization) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, "scan processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub kind: Option<String>,
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let kind = match query.kind.as_deref() {
        None => None,
        Some(raw) => match ScanAction::parse_action(raw) {
            Some(kind) => Some(kind),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("unknown notification kind {}", raw) })),
                )
                    .into_response()
            }
        },
    };

    match db::list_notifications(&state.pool, kind).await {
        Ok(feed) => (StatusCode::OK, Json(feed)).into_response(),
        Err(err) => {
            error!(?err, "failed to load notifications");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load notifications" })),
            )
                .into_response()
        }
    }
}

/// Body for read-state updates: `{"id": "..."}` marks one notification,
/// `{"mark_all": true}` marks the whole feed regardless of any filter.
#[derive(Debug, Deserialize)]
pub struct ReadUpdate {
    pub id: Option<String>,
    #[serde(default)]
    pub mark_all: bool,
}

async fn update_notifications(
    State(state): State<AppState>,
    Json(req): Json<ReadUpdate>,
) -> impl IntoResponse {
    if req.mark_all {
        return match db::mark_all_notifications_read(&state.pool).await {
            Ok(updated) => (StatusCode::OK, Json(json!({ "updated": updated }))).into_response(),
            Err(err) => {
                error!(?err, "failed to mark all notifications read");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to update notifications" })),
                )
                    .into_response()
            }
        };
    }

    let Some(id) = req.id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "expected id or mark_all" })),
        )
            .into_response();
    };

    match db::mark_notification_read(&state.pool, &id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "updated": 1 }))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "notification not found" })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, "failed to mark notification read");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update notification" })),
            )
                .into_response()
        }
    }
}

async fn clear_notifications(State(state): State<AppState>) -> impl IntoResponse {
    match db::clear_notifications(&state.pool).await {
        Ok(cleared) => (StatusCode::OK, Json(json!({ "cleared": cleared }))).into_response(),
        Err(err) => {
            error!(?err, "failed to clear notifications");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to clear notifications" })),
            )
                .into_response()
        }
    }
}

/// SSE stream for dashboard clients. Emits the full current feed on connect
/// and again on every committed transition. Disconnected subscribers miss
/// events by design; the pull endpoint is the resync path.
async fn notification_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("sse subscriber connected");
    let mut rx = state.hub.subscribe();
    let pool = state.pool.clone();

    let stream = async_stream::stream! {
        // Initial snapshot so a fresh client starts in sync.
        match db::list_notifications(&pool, None).await {
            Ok(feed) => {
                if let Ok(json) = serde_json::to_string(&feed) {
                    yield Ok(Event::default().data(json));
                }
            }
            Err(err) => warn!(?err, "failed to load initial feed for sse subscriber"),
        }

        loop {
            match rx.recv().await {
                Ok(feed) => match serde_json::to_string(&feed) {
                    Ok(json) => yield Ok(Event::default().data(json)),
                    Err(err) => warn!(?err, "failed to serialize notification feed"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "sse subscriber lagged; continuing with next update");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
