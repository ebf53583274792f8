//! Typed error hierarchy for the dashboard.
//!
//! One error type per subsystem that can fail:
//! - `ApiError`: transport, status and decode failures from the Changes API
//! - `RouteError`: paths the router cannot map onto a page
//! - `RedirectError`: `find_*` lookups that could not produce a permalink
//! - `FeedError`: one project's commit feed failed during a poll round
//! - `PageError`: page loaders that could not assemble their view

use thiserror::Error;

use crate::router::redirect::RedirectKind;

/// Errors from a single Changes API request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// The endpoint the failed request was addressed to.
    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::InvalidEndpoint { endpoint, .. }
            | ApiError::Request { endpoint, .. }
            | ApiError::Status { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// A path that does not resolve to a page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("No page matches '{path}'")]
    NotFound { path: String },

    #[error("'{key}' needs {required} path parameter(s), got {given}")]
    BadUrl {
        key: String,
        required: usize,
        given: usize,
    },
}

/// A deferred redirect whose lookup could not produce a destination.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("Lookup for {kind} '{id}' failed: {source}")]
    LookupFailed {
        kind: RedirectKind,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("{kind} lookup response is missing '{field}'")]
    MissingField {
        kind: RedirectKind,
        field: &'static str,
    },
}

/// A project feed that could not be fetched. Rounds treat it as settled.
#[derive(Debug, Error)]
#[error("Feed for project '{slug}' failed: {source}")]
pub struct FeedError {
    pub slug: String,
    #[source]
    pub source: ApiError,
}

/// Errors from the page loaders.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Missing route parameter '{0}'")]
    MissingParam(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}
