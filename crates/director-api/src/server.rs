use std::fmt;
use std::net::SocketAddr;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, DirectorConfig, ErrorCode, Project, TickRecord, SCHEMA_VERSION_V1,
};
use director_core::{ConditionReport, TickError};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::{DirectorApi, DirectorApiError, PersistedProjectSummary};

const MAX_PAGE_SIZE: usize = 5000;
const DEFAULT_SQLITE_PATH: &str = "director_projects.sqlite";

include!("server/error.rs");
include!("server/state.rs");
include!("server/routes/control.rs");
include!("server/routes/query.rs");

pub async fn serve(addr: SocketAddr) -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = AppState::new();
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("director api listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/projects", post(load_project).get(list_projects))
        .route("/api/v1/projects/{project_id}/threads", post(create_thread))
        .route(
            "/api/v1/projects/{project_id}/threads/{thread_id}/tick",
            post(tick_thread),
        )
        .route(
            "/api/v1/projects/{project_id}/threads/{thread_id}/history",
            get(get_history),
        )
        .route(
            "/api/v1/projects/{project_id}/threads/{thread_id}/state",
            get(get_thread_state),
        )
        .route("/api/v1/projects/{project_id}/replay", post(replay_project))
        .route(
            "/api/v1/projects/{project_id}/storylets/{storylet_id}/explain",
            get(explain_storylet),
        )
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("content-type"),
    );
}

#[cfg(test)]
mod tests;
