//! Path → page resolution.
//!
//! Resolution is pure: [`resolve`] maps a path onto a [`ResolvedRoute`] or a
//! [`DeferredRedirect`]. Only [`dispatch`] performs I/O, by running the
//! deferred lookup and navigating to its result.

pub mod navigation;
pub mod redirect;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::api::ChangesApi;
use crate::errors::{RedirectError, RouteError};
pub use navigation::NavigationContext;
pub use redirect::{DeferredRedirect, RedirectKind};

/// Prefix left over from the previous UI's URLs.
const LEGACY_VERSION_PREFIX: &str = "v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageId {
    Home,
    NotFound,
    RedirectFailed,
    Projects,
    ProjectDetails,
    AuthorDetails,
    AuthorBuilds,
    CommitSource,
    Diff,
    SingleBuild,
    BuildTest,
    BuildTests,
    ProjectTest,
    JobLog,
    Node,
    Snapshot,
    InfraFails,
    TaskTree,
    JobstepSummary,
    Code,
    Pusher,
    DisplayExamples,
}

/// One route table entry: the first path segment, the page it selects, and
/// the names given to the segments after it.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub key: &'static str,
    pub page: PageId,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl RouteSpec {
    const fn new(
        key: &'static str,
        page: PageId,
        required: &'static [&'static str],
        optional: &'static [&'static str],
    ) -> Self {
        Self {
            key,
            page,
            required,
            optional,
        }
    }
}

pub struct RouteTable {
    routes: Vec<RouteSpec>,
}

static STANDARD_ROUTES: LazyLock<RouteTable> = LazyLock::new(|| {
    use PageId::*;
    RouteTable::new(vec![
        RouteSpec::new("projects", Projects, &[], &[]),
        RouteSpec::new("project", ProjectDetails, &["projectSlug"], &[]),
        RouteSpec::new("authors", AuthorDetails, &["author"], &[]),
        RouteSpec::new("author_builds", AuthorBuilds, &[], &["author"]),
        // TODO: give `author` its own page instead of the home page.
        RouteSpec::new("author", Home, &["author"], &[]),
        RouteSpec::new("commit_source", CommitSource, &["sourceUUID"], &["buildID"]),
        RouteSpec::new("diff", Diff, &["diff_id"], &[]),
        RouteSpec::new("single_build", SingleBuild, &["buildID"], &[]),
        RouteSpec::new("builds", SingleBuild, &["buildID"], &[]),
        RouteSpec::new("build_test", BuildTest, &["buildID", "testID"], &[]),
        RouteSpec::new("build_tests", BuildTests, &["buildID"], &[]),
        RouteSpec::new("project_test", ProjectTest, &["projectUUID", "testHash"], &[]),
        RouteSpec::new("job_log", JobLog, &["buildID", "jobID", "logID"], &[]),
        RouteSpec::new("node", Node, &["nodeID"], &[]),
        RouteSpec::new("snapshot", Snapshot, &["snapshotID"], &[]),
        RouteSpec::new("infra_fails", InfraFails, &[], &[]),
        RouteSpec::new("task_tree", TaskTree, &["objectID"], &[]),
        RouteSpec::new("jobstep_summary", JobstepSummary, &[], &[]),
        RouteSpec::new("code", Code, &["sourceID"], &[]),
        RouteSpec::new("pusher", Pusher, &[], &[]),
        RouteSpec::new("display_examples", DisplayExamples, &[], &[]),
    ])
});

impl RouteTable {
    pub fn new(routes: Vec<RouteSpec>) -> Self {
        Self { routes }
    }

    /// The dashboard's route table, built on first use.
    pub fn standard() -> &'static RouteTable {
        &STANDARD_ROUTES
    }

    pub fn get(&self, key: &str) -> Option<&RouteSpec> {
        self.routes.iter().find(|route| route.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter()
    }

    pub fn resolve(&self, path: &str) -> Resolution {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let mut segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.first().map(String::as_str) == Some(LEGACY_VERSION_PREFIX) {
            segments.remove(0);
        }
        let mut segments = rewrite_legacy(segments);

        let Some(first) = segments.first().cloned() else {
            return Resolution::Page(ResolvedRoute::home());
        };

        if let Some(kind) = RedirectKind::from_key(&first) {
            return match segments.get(1) {
                Some(id) => Resolution::Deferred(DeferredRedirect::new(kind, id.clone())),
                None => Resolution::Page(ResolvedRoute::bad_url(kind.key(), 1, 0)),
            };
        }

        if first == "projects" && segments.len() > 1 {
            segments[0] = "project".to_string();
        }

        let Some(route) = self.get(&segments[0]) else {
            return Resolution::Page(ResolvedRoute::not_found(path));
        };

        let rest = &segments[1..];
        if rest.len() < route.required.len() {
            return Resolution::Page(ResolvedRoute::bad_url(
                route.key,
                route.required.len(),
                rest.len(),
            ));
        }

        let names = route.required.iter().chain(route.optional.iter());
        let params = names
            .zip(rest.iter())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        Resolution::Page(ResolvedRoute {
            page: route.page,
            params,
            is_not_found: false,
            bad_url: false,
            message: None,
            error: None,
        })
    }
}

/// Map old bookmarked URL shapes onto their current equivalents.
///
/// - `projects/{slug}/builds/{b}/.../tests/...` → `build_tests/{b}`
/// - `projects/{slug}/builds/{b}/jobs/{j}/logs/{l}` → `job_log/{b}/{j}/{l}`
/// - any other `projects/{slug}/builds/{b}...` → `find_build/{b}`
/// - `sources/{s}/builds/{b}` → `commit_source/{s}/{b}`
pub fn rewrite_legacy(segments: Vec<String>) -> Vec<String> {
    let is = |idx: usize, value: &str| segments.get(idx).map(String::as_str) == Some(value);

    if segments.len() >= 4 && is(0, "projects") && is(2, "builds") {
        let build_id = segments[3].clone();
        if segments[4..].iter().any(|s| s == "tests") {
            return vec!["build_tests".to_string(), build_id];
        }
        if segments.len() == 8 && is(4, "jobs") && is(6, "logs") {
            return vec![
                "job_log".to_string(),
                build_id,
                segments[5].clone(),
                segments[7].clone(),
            ];
        }
        return vec!["find_build".to_string(), build_id];
    }

    if segments.len() >= 4 && is(0, "sources") && is(2, "builds") {
        return vec![
            "commit_source".to_string(),
            segments[1].clone(),
            segments[3].clone(),
        ];
    }

    segments
}

/// Resolve against the standard route table.
pub fn resolve(path: &str) -> Resolution {
    RouteTable::standard().resolve(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRoute {
    pub page: PageId,
    pub params: BTreeMap<String, String>,
    pub is_not_found: bool,
    pub bad_url: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    error: Option<RouteError>,
}

impl ResolvedRoute {
    pub fn home() -> Self {
        Self::page(PageId::Home)
    }

    fn page(page: PageId) -> Self {
        Self {
            page,
            params: BTreeMap::new(),
            is_not_found: false,
            bad_url: false,
            message: None,
            error: None,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self {
            is_not_found: true,
            error: Some(RouteError::NotFound {
                path: path.to_string(),
            }),
            ..Self::page(PageId::NotFound)
        }
    }

    pub fn bad_url(key: &str, required: usize, given: usize) -> Self {
        Self {
            is_not_found: true,
            bad_url: true,
            error: Some(RouteError::BadUrl {
                key: key.to_string(),
                required,
                given,
            }),
            ..Self::page(PageId::NotFound)
        }
    }

    /// Terminal page shown when a `find_*` lookup fails.
    pub fn redirect_failed(err: &RedirectError) -> Self {
        Self {
            message: Some(format!("Redirect failed: {}", err)),
            ..Self::page(PageId::RedirectFailed)
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn error(&self) -> Option<&RouteError> {
        self.error.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Page(ResolvedRoute),
    Deferred(DeferredRedirect),
}

/// Outcome of dispatching a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Page(ResolvedRoute),
    Redirected { target: String },
}

/// Resolve the context's path; for deferred redirects run the lookup and
/// navigate to the permalink. A failed lookup is terminal.
pub async fn dispatch(ctx: &NavigationContext, api: &dyn ChangesApi) -> Dispatch {
    match resolve(ctx.path()) {
        Resolution::Page(route) => {
            if let Some(err) = route.error() {
                tracing::debug!(path = %ctx.path(), error = %err, "route not found");
            }
            Dispatch::Page(route)
        }
        Resolution::Deferred(redirect) => match redirect.lookup(api).await {
            Ok(target) => {
                ctx.navigate(&target);
                Dispatch::Redirected { target }
            }
            Err(err) => {
                tracing::warn!(path = %ctx.path(), error = %err, "redirect lookup failed");
                Dispatch::Page(ResolvedRoute::redirect_failed(&err))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn page(path: &str) -> ResolvedRoute {
        match resolve(path) {
            Resolution::Page(route) => route,
            Resolution::Deferred(d) => panic!("Expected page for {}, got deferred {:?}", path, d),
        }
    }

    fn deferred(path: &str) -> DeferredRedirect {
        match resolve(path) {
            Resolution::Deferred(d) => d,
            Resolution::Page(route) => panic!("Expected deferred for {}, got {:?}", path, route),
        }
    }

    fn params(route: &ResolvedRoute) -> Vec<(&str, &str)> {
        route
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_empty_path_is_home() {
        for path in ["", "/", "//", "/v2/", "/?x=1"] {
            let route = page(path);
            assert_eq!(route.page, PageId::Home, "path {:?}", path);
            assert!(route.params.is_empty());
            assert!(!route.is_not_found);
        }
    }

    #[test]
    fn test_simple_route_assigns_params_positionally() {
        let route = page("/build_test/b1/t1/");
        assert_eq!(route.page, PageId::BuildTest);
        assert_eq!(route.param("buildID"), Some("b1"));
        assert_eq!(route.param("testID"), Some("t1"));
    }

    #[test]
    fn test_every_route_with_too_few_segments_is_bad_url() {
        for spec in RouteTable::standard().iter() {
            let n = spec.required.len();
            for given in 0..n {
                let mut path = format!("/{}", spec.key);
                for i in 0..given {
                    path.push_str(&format!("/seg{}", i));
                }
                let route = page(&path);
                assert!(route.is_not_found, "{} should be not found", path);
                assert!(route.bad_url, "{} should be badUrl", path);
                assert_eq!(
                    route.error(),
                    Some(&RouteError::BadUrl {
                        key: spec.key.to_string(),
                        required: n,
                        given,
                    })
                );
            }
        }
    }

    #[test]
    fn test_every_route_with_enough_segments_resolves() {
        for spec in RouteTable::standard().iter() {
            let mut path = format!("/{}", spec.key);
            for name in spec.required {
                path.push_str(&format!("/{}-value", name));
            }
            let route = page(&path);
            assert_eq!(route.page, spec.page, "path {}", path);
            assert!(!route.is_not_found);
            for name in spec.required {
                assert_eq!(route.param(name), Some(format!("{}-value", name).as_str()));
            }
        }
    }

    #[test]
    fn test_unknown_route_is_plain_not_found() {
        let route = page("/nope/1");
        assert!(route.is_not_found);
        assert!(!route.bad_url);
        assert_eq!(route.page, PageId::NotFound);
        assert!(matches!(route.error(), Some(RouteError::NotFound { .. })));
    }

    #[test]
    fn test_legacy_job_log_shape() {
        for (b, j, l) in [("b1", "j1", "l1"), ("abc", "def", "ghi")] {
            let path = format!("/projects/server/builds/{}/jobs/{}/logs/{}/", b, j, l);
            let route = page(&path);
            assert_eq!(route.page, PageId::JobLog);
            assert_eq!(route.params.len(), 3);
            assert_eq!(route.param("buildID"), Some(b));
            assert_eq!(route.param("jobID"), Some(j));
            assert_eq!(route.param("logID"), Some(l));
        }
    }

    #[test]
    fn test_legacy_job_log_with_version_prefix() {
        let route = page("/v2/projects/server/builds/b1/jobs/j1/logs/l1");
        assert_eq!(route.page, PageId::JobLog);
    }

    #[test]
    fn test_legacy_tests_shape() {
        let route = page("/projects/server/builds/b1/tests/");
        assert_eq!(route.page, PageId::BuildTests);
        assert_eq!(params(&route), vec![("buildID", "b1")]);

        let route = page("/projects/server/builds/b1/tests/t7/");
        assert_eq!(route.page, PageId::BuildTests);
    }

    #[test]
    fn test_legacy_build_becomes_find_build() {
        let redirect = deferred("/projects/server/builds/b1/");
        assert_eq!(redirect, DeferredRedirect::new(RedirectKind::FindBuild, "b1"));

        let redirect = deferred("/projects/server/builds/b1/jobs/j1/");
        assert_eq!(redirect.id, "b1");
    }

    #[test]
    fn test_source_build_permalink_maps_to_commit_page() {
        let route = page("/sources/s1/builds/b1");
        assert_eq!(route.page, PageId::CommitSource);
        assert_eq!(
            params(&route),
            vec![("buildID", "b1"), ("sourceUUID", "s1")]
        );
    }

    #[test]
    fn test_projects_alias() {
        assert_eq!(page("/projects/").page, PageId::Projects);
        let route = page("/projects/server");
        assert_eq!(route.page, PageId::ProjectDetails);
        assert_eq!(route.param("projectSlug"), Some("server"));
    }

    #[test]
    fn test_optional_params() {
        let route = page("/author_builds");
        assert_eq!(route.page, PageId::AuthorBuilds);
        assert!(route.params.is_empty());
        let route = page("/author_builds/dev@example.com");
        assert_eq!(route.param("author"), Some("dev@example.com"));
        let route = page("/commit_source/s1/");
        assert_eq!(route.param("buildID"), None);
    }

    #[test]
    fn test_find_routes_are_deferred() {
        assert_eq!(deferred("/find_jobstep/js1").kind, RedirectKind::FindJobstep);
        assert_eq!(deferred("/find_node/worker-3/").id, "worker-3");
        let route = page("/find_build/");
        assert!(route.bad_url);
    }

    #[test]
    fn test_resolved_route_serializes_camel_case() {
        let value = serde_json::to_value(page("/job_log/b")).unwrap();
        assert_eq!(value["page"], "not_found");
        assert_eq!(value["isNotFound"], true);
        assert_eq!(value["badUrl"], true);
        assert!(value.get("message").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_navigates_after_lookup() {
        let api = FakeApi::new().with_json("/api/0/builds/b1", json!({"id": "b1"}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = NavigationContext::from_location(
            "/find_build/b1",
            Arc::new(move |t: &str| sink.lock().unwrap().push(t.to_string())),
        );
        let result = dispatch(&ctx, &api).await;
        assert_eq!(
            result,
            Dispatch::Redirected {
                target: "/builds/b1".to_string()
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec!["/builds/b1".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_lookup_failure_is_terminal() {
        let api = FakeApi::new().with_status("/api/0/nodes/hostname/h1", 404);
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let ctx = NavigationContext::from_location(
            "/find_node/h1",
            Arc::new(move |t: &str| sink.lock().unwrap().push(t.to_string())),
        );
        match dispatch(&ctx, &api).await {
            Dispatch::Page(route) => {
                assert_eq!(route.page, PageId::RedirectFailed);
                assert!(route.message.unwrap().starts_with("Redirect failed"));
            }
            other => panic!("Expected failure page, got {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_plain_page_makes_no_calls() {
        let api = FakeApi::new();
        let ctx = NavigationContext::detached("/pusher/?project=a");
        let result = dispatch(&ctx, &api).await;
        assert!(matches!(result, Dispatch::Page(ResolvedRoute { page: PageId::Pusher, .. })));
        assert!(api.calls().is_empty());
    }
}
