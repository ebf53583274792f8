//! Build-centric pages: a single build, every build of a commit, and every
//! build of a Phabricator diff.

use serde::Serialize;
use serde_json::Value;

use crate::api::models::{Build, DiffBuilds, Source};
use crate::api::{ChangesApi, endpoint_with_query, fetch_all_pages, path_segment};
use crate::conditions::{Condition, runnable_condition};
use crate::errors::{ApiError, PageError};
use crate::links;

/// Largest page size `sources_builds` accepts.
const SOURCES_BUILDS_PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRow {
    pub id: String,
    pub name: Option<String>,
    pub project: Option<String>,
    pub condition: Condition,
    pub short_text: &'static str,
    pub color_class: &'static str,
    pub href: String,
    pub time: Option<String>,
}

impl BuildRow {
    pub fn from_build(build: &Build) -> Self {
        let condition = runnable_condition(build);
        Self {
            id: build.id.clone(),
            name: build.name.clone(),
            project: build.project.as_ref().map(|p| p.name.clone()),
            condition,
            short_text: condition.short_text(),
            color_class: condition.color_class(),
            href: links::build_href(build),
            time: build.display_time().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildView {
    pub title: String,
    pub build: Build,
    pub summary: BuildRow,
    pub tests_href: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitView {
    pub title: String,
    pub source: Source,
    pub builds: Vec<BuildRow>,
    pub active_build: Option<String>,
}

/// Shown when the source itself cannot be loaded; links each build directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreachableCommitView {
    pub message: String,
    pub builds: Vec<BuildRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffView {
    pub title: String,
    pub revision_id: String,
    /// Unix seconds; 0 when Phabricator could not be reached.
    pub date_created: i64,
    pub fetched_data_from_phabricator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub builds: Vec<BuildRow>,
    /// Builds of the most recently built diff revision.
    pub latest_builds: Vec<BuildRow>,
    pub active_build: Option<String>,
}

pub async fn load_single_build(api: &dyn ChangesApi, build_id: &str) -> Result<BuildView, PageError> {
    let endpoint = format!("/api/0/builds/{}", path_segment(build_id));
    let build: Build = api.get(&endpoint).await?.decode(&endpoint)?;
    let project = build
        .project
        .as_ref()
        .map(|p| p.name.as_str())
        .unwrap_or("Changes");

    Ok(BuildView {
        title: format!("A {} Build", project),
        summary: BuildRow::from_build(&build),
        tests_href: links::tests_for_build_href(&build.id, 0),
        build,
    })
}

/// Fetch every build of a source, following pagination.
async fn fetch_source_builds(api: &dyn ChangesApi, source_id: &str) -> Result<Vec<Build>, ApiError> {
    let endpoint = endpoint_with_query(
        "/api/0/sources_builds/",
        &[
            ("source_id", Some(source_id)),
            ("per_page", Some(SOURCES_BUILDS_PAGE_SIZE)),
        ],
    );
    fetch_all_pages(api, &endpoint)
        .await?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|source| ApiError::Decode {
                endpoint: endpoint.clone(),
                source,
            })
        })
        .collect()
}

pub enum CommitPage {
    Loaded(CommitView),
    Unreachable(UnreachableCommitView),
}

pub async fn load_commit(
    api: &dyn ChangesApi,
    source_id: &str,
    active_build: Option<String>,
) -> Result<CommitPage, PageError> {
    let source_endpoint = format!("/api/0/sources/{}", path_segment(source_id));
    let (builds, source) = tokio::join!(
        fetch_source_builds(api, source_id),
        api.get(&source_endpoint)
    );
    let builds = builds?;

    let source: Source = match source.and_then(|resp| resp.decode(&source_endpoint)) {
        Ok(source) => source,
        Err(err) => {
            // Usually a commit message the API cannot encode.
            tracing::warn!(source_id, error = %err, "source unavailable; showing build links only");
            let builds = builds
                .iter()
                .map(|build| BuildRow {
                    href: format!("/builds/{}", build.id),
                    ..BuildRow::from_build(build)
                })
                .collect();
            return Ok(CommitPage::Unreachable(UnreachableCommitView {
                message: "We couldn't load this commit. Here are links to the individual builds."
                    .to_string(),
                builds,
            }));
        }
    };

    let sha = source
        .revision
        .as_ref()
        .map(|r| r.sha.chars().take(7).collect::<String>())
        .unwrap_or_else(|| source.id.clone());

    Ok(CommitPage::Loaded(CommitView {
        title: format!("{}: Builds", sha),
        builds: builds.iter().map(BuildRow::from_build).collect(),
        source,
        active_build,
    }))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Builds sharing the diff ID of the most recently created build.
pub fn latest_diff_builds(builds: &[Build]) -> Vec<&Build> {
    let Some(latest) = builds.iter().max_by_key(|b| b.created_at()) else {
        return Vec::new();
    };
    let latest_diff = latest.source.as_ref().and_then(Source::phabricator_diff_id);
    builds
        .iter()
        .filter(|b| b.source.as_ref().and_then(Source::phabricator_diff_id) == latest_diff)
        .collect()
}

pub async fn load_diff(
    api: &dyn ChangesApi,
    diff_id: &str,
    active_build: Option<String>,
) -> Result<DiffView, PageError> {
    let endpoint = format!("/api/0/phabricator_diffs/{}/builds", path_segment(diff_id));
    let diff: DiffBuilds = api.get(&endpoint).await?.decode(&endpoint)?;

    // Phabricator being unreachable leaves these blank.
    let revision_id = diff
        .revision_id
        .as_ref()
        .and_then(value_to_string)
        .unwrap_or_else(|| diff_id.strip_prefix('D').unwrap_or(diff_id).to_string());
    let date_created = diff.date_created.unwrap_or(0);

    let builds: Vec<Build> = diff.changes.into_iter().flat_map(|c| c.builds).collect();
    let latest_builds = latest_diff_builds(&builds)
        .into_iter()
        .map(BuildRow::from_build)
        .collect();

    Ok(DiffView {
        title: format!("{}: Builds", diff_id),
        revision_id,
        date_created,
        fetched_data_from_phabricator: diff.fetched_data_from_phabricator,
        warning: (!diff.fetched_data_from_phabricator)
            .then(|| "Unable to get diff data from Phabricator!".to_string()),
        builds: builds.iter().map(BuildRow::from_build).collect(),
        latest_builds,
        active_build,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResponse;
    use crate::api::fake::FakeApi;
    use serde_json::json;

    const BUILDS_EP: &str = "/api/0/sources_builds/?source_id=s1&per_page=100";

    #[tokio::test]
    async fn test_single_build() {
        let api = FakeApi::new().with_json(
            "/api/0/builds/b1",
            json!({"id": "b1", "project": {"id": "p", "slug": "server", "name": "Server"},
                   "status": {"id": "finished"}, "result": {"id": "failed"}}),
        );
        let view = load_single_build(&api, "b1").await.unwrap();
        assert_eq!(view.title, "A Server Build");
        assert_eq!(view.summary.condition, Condition::Failed);
        assert_eq!(view.tests_href, "/build_tests/b1#TestList");
    }

    #[tokio::test]
    async fn test_single_build_error_propagates() {
        let api = FakeApi::new();
        let err = load_single_build(&api, "b1").await.unwrap_err();
        assert!(matches!(err, PageError::Api(ApiError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_commit_follows_pagination() {
        let api = FakeApi::new()
            .with_response(
                BUILDS_EP,
                ApiResponse::new(json!([{"id": "b1"}])).with_link("next", "/page2"),
            )
            .with_json("/page2", json!([{"id": "b2"}]))
            .with_json(
                "/api/0/sources/s1",
                json!({"id": "s1", "revision": {"sha": "abcdef0123"}}),
            );
        match load_commit(&api, "s1", Some("b2".into())).await.unwrap() {
            CommitPage::Loaded(view) => {
                assert_eq!(view.title, "abcdef0: Builds");
                assert_eq!(view.builds.len(), 2);
                assert_eq!(view.active_build.as_deref(), Some("b2"));
            }
            CommitPage::Unreachable(_) => panic!("Expected loaded commit"),
        }
    }

    #[tokio::test]
    async fn test_commit_source_error_falls_back() {
        let api = FakeApi::new()
            .with_json(
                BUILDS_EP,
                json!([{"id": "b1", "source": {"id": "s1"}, "project": {"id": "p", "slug": "s", "name": "Server"}}]),
            )
            .with_status("/api/0/sources/s1", 500);
        match load_commit(&api, "s1", None).await.unwrap() {
            CommitPage::Unreachable(view) => {
                assert_eq!(view.builds.len(), 1);
                assert_eq!(view.builds[0].href, "/builds/b1");
                assert_eq!(view.builds[0].project.as_deref(), Some("Server"));
            }
            CommitPage::Loaded(_) => panic!("Expected fallback view"),
        }
    }

    #[tokio::test]
    async fn test_commit_builds_error_is_error() {
        let api = FakeApi::new().with_json("/api/0/sources/s1", json!({"id": "s1"}));
        assert!(load_commit(&api, "s1", None).await.is_err());
    }

    #[tokio::test]
    async fn test_diff_with_phabricator_data() {
        let api = FakeApi::new().with_json(
            "/api/0/phabricator_diffs/D12/builds",
            json!({
                "revision_id": 12,
                "dateCreated": 1450000000,
                "fetched_data_from_phabricator": true,
                "changes": [
                    {"builds": [{"id": "old", "dateCreated": "2016-01-01T00:00:00",
                                 "source": {"id": "s", "patch": {}, "data": {"phabricator.diffID": "100"}}}]},
                    {"builds": [
                        {"id": "new1", "dateCreated": "2016-01-02T00:00:00",
                         "source": {"id": "s", "patch": {}, "data": {"phabricator.diffID": "101"}}},
                        {"id": "new2", "dateCreated": "2016-01-01T12:00:00",
                         "source": {"id": "s", "patch": {}, "data": {"phabricator.diffID": "101"}}}
                    ]}
                ]
            }),
        );
        let view = load_diff(&api, "D12", None).await.unwrap();
        assert_eq!(view.revision_id, "12");
        assert_eq!(view.date_created, 1450000000);
        assert!(view.warning.is_none());
        assert_eq!(view.builds.len(), 3);
        let latest: Vec<_> = view.latest_builds.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(latest, vec!["new1", "new2"]);
    }

    #[tokio::test]
    async fn test_diff_without_phabricator_uses_fallbacks() {
        let api = FakeApi::new().with_json(
            "/api/0/phabricator_diffs/D77/builds",
            json!({"changes": []}),
        );
        let view = load_diff(&api, "D77", None).await.unwrap();
        assert_eq!(view.revision_id, "77");
        assert_eq!(view.date_created, 0);
        assert!(!view.fetched_data_from_phabricator);
        assert!(view.warning.is_some());
        assert!(view.latest_builds.is_empty());
    }
}
