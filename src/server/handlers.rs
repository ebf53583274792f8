use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::SharedState;
use crate::errors::{ApiError, PageError};
use crate::pages::{PageView, load_page};
use crate::router::{self, Dispatch, NavigationContext, PageId, Resolution, ResolvedRoute};

// ── Error handling ────────────────────────────────────────────────────

pub enum HttpError {
    NotFound(String),
    BadRequest(String),
    /// The Changes API failed underneath us.
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<PageError> for HttpError {
    fn from(err: PageError) -> Self {
        match &err {
            PageError::MissingParam(_) => HttpError::BadRequest(err.to_string()),
            PageError::Api(ApiError::Status { status: 404, .. }) => HttpError::NotFound(err.to_string()),
            PageError::Api(ApiError::InvalidEndpoint { .. }) => HttpError::Internal(err.to_string()),
            PageError::Api(_) => HttpError::BadGateway(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/resolve", get(resolve_handler))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct ResolveParams {
    pub path: Option<String>,
}

/// Pure resolution; deferred redirects are reported, not followed.
async fn resolve_handler(Query(params): Query<ResolveParams>) -> Result<Json<Resolution>, HttpError> {
    let path = params
        .path
        .ok_or_else(|| HttpError::BadRequest("Missing 'path' query parameter".to_string()))?;
    Ok(Json(router::resolve(&path)))
}

#[derive(Serialize)]
pub struct PageResponse {
    pub route: ResolvedRoute,
    pub view: PageView,
}

/// Everything that is not an API endpoint is a dashboard location.
pub async fn page_handler(State(state): State<SharedState>, uri: Uri) -> Response {
    let location = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let navigated: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&navigated);
    let ctx = NavigationContext::from_location(
        &location,
        Arc::new(move |target: &str| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(target.to_string());
        }),
    );

    let route = match router::dispatch(&ctx, state.api.as_ref()).await {
        Dispatch::Redirected { target } => {
            let target = navigated
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .unwrap_or(target);
            return Redirect::temporary(&target).into_response();
        }
        Dispatch::Page(route) => route,
    };

    if route.is_not_found {
        return (StatusCode::NOT_FOUND, Json(route)).into_response();
    }
    if route.page == PageId::RedirectFailed {
        return (StatusCode::BAD_GATEWAY, Json(route)).into_response();
    }

    match load_page(&route, ctx.query(), state.api.as_ref(), &state.settings).await {
        Ok(view) => Json(PageResponse { route, view }).into_response(),
        Err(err) => {
            tracing::warn!(%location, error = %err, "page load failed");
            HttpError::from(err).into_response()
        }
    }
}
