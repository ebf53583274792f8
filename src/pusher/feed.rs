use futures_util::future::join_all;
use serde::Serialize;

use crate::api::models::Commit;
use crate::api::{CallStatus, ChangesApi};
use crate::errors::FeedError;

use super::query::PusherQuery;

/// One project's commit list as of a single poll.
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    pub slug: String,
    pub endpoint: String,
    pub status: CallStatus,
    pub commits: Vec<Commit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Feed {
    pub fn pending(slug: &str, endpoint: &str) -> Self {
        Self {
            slug: slug.to_string(),
            endpoint: endpoint.to_string(),
            status: CallStatus::Pending,
            commits: Vec::new(),
            error: None,
        }
    }

    fn loaded(mut self, commits: Vec<Commit>) -> Self {
        self.status = CallStatus::Loaded;
        self.commits = commits;
        self
    }

    fn failed(mut self, err: &FeedError) -> Self {
        self.status = CallStatus::Error;
        self.error = Some(err.to_string());
        self
    }
}

/// Fetch one feed. Never fails: errors produce a settled feed with no commits.
pub async fn fetch_feed(api: &dyn ChangesApi, slug: &str, endpoint: &str) -> Feed {
    let feed = Feed::pending(slug, endpoint);
    let result = match api.get(endpoint).await {
        Ok(response) => response.decode::<Vec<Commit>>(endpoint),
        Err(err) => Err(err),
    };

    match result {
        Ok(commits) => {
            tracing::debug!(slug, commits = commits.len(), "feed loaded");
            feed.loaded(commits)
        }
        Err(source) => {
            let err = FeedError {
                slug: slug.to_string(),
                source,
            };
            tracing::warn!(error = %err, "feed failed");
            feed.failed(&err)
        }
    }
}

/// Fetch every feed of the query concurrently and wait for all of them.
pub async fn fetch_round(api: &dyn ChangesApi, query: &PusherQuery) -> Vec<Feed> {
    let endpoints = query.endpoints();
    join_all(
        endpoints
            .iter()
            .map(|(slug, endpoint)| fetch_feed(api, slug, endpoint)),
    )
    .await
}
