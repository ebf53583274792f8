//! Page loaders: fetch what a resolved route needs and shape it into a JSON
//! view model. Layout is left to the client.

pub mod builds;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::{ChangesApi, path_segment};
use crate::api::models::{Build, InfraFails};
use crate::errors::PageError;
use crate::pusher::{PusherQuery, PusherView, fetch_round, merge_rows};
use crate::router::navigation::query_values;
use crate::router::{PageId, ResolvedRoute};
use crate::util::email_head;

pub use builds::{BuildRow, BuildView, CommitPage, CommitView, DiffView, UnreachableCommitView};

/// Settings page loaders need from the configuration.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub phabricator_host: String,
    pub default_per_page: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBuildsView {
    pub title: String,
    pub author: String,
    pub builds: Vec<BuildRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraFailRow {
    pub build: BuildRow,
    pub project: Option<String>,
    pub name: String,
    pub started: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfraFailsView {
    pub title: String,
    pub jobs: Vec<InfraFailRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PusherPageView {
    pub title: String,
    pub query: PusherQuery,
    #[serde(flatten)]
    pub grid: PusherView,
}

/// Pages whose data the client fetches itself.
#[derive(Debug, Clone, Serialize)]
pub struct GenericView {
    pub page: PageId,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PageView {
    SingleBuild(BuildView),
    Commit(CommitView),
    CommitUnreachable(UnreachableCommitView),
    Diff(DiffView),
    AuthorBuilds(AuthorBuildsView),
    InfraFails(InfraFailsView),
    Pusher(PusherPageView),
    Generic(GenericView),
}

fn required<'a>(route: &'a ResolvedRoute, name: &'static str) -> Result<&'a str, PageError> {
    route.param(name).ok_or(PageError::MissingParam(name))
}

/// Load the view for `route`. `query` carries the location's query string.
pub async fn load_page(
    route: &ResolvedRoute,
    query: &[(String, String)],
    api: &dyn ChangesApi,
    settings: &PageSettings,
) -> Result<PageView, PageError> {
    let active_build = route
        .param("buildID")
        .map(str::to_string)
        .or_else(|| query_values(query, "buildID").first().map(|b| b.to_string()));

    let view = match route.page {
        PageId::SingleBuild => {
            PageView::SingleBuild(builds::load_single_build(api, required(route, "buildID")?).await?)
        }
        PageId::CommitSource => {
            match builds::load_commit(api, required(route, "sourceUUID")?, active_build).await? {
                CommitPage::Loaded(view) => PageView::Commit(view),
                CommitPage::Unreachable(view) => PageView::CommitUnreachable(view),
            }
        }
        PageId::Diff => PageView::Diff(builds::load_diff(api, required(route, "diff_id")?, active_build).await?),
        PageId::AuthorBuilds => PageView::AuthorBuilds(load_author_builds(api, route.param("author")).await?),
        PageId::InfraFails => PageView::InfraFails(load_infra_fails(api).await?),
        PageId::Pusher => PageView::Pusher(load_pusher(api, query, settings).await),
        page => PageView::Generic(GenericView {
            page,
            params: route.params.clone(),
        }),
    };
    Ok(view)
}

pub async fn load_author_builds(
    api: &dyn ChangesApi,
    author: Option<&str>,
) -> Result<AuthorBuildsView, PageError> {
    let author = author.filter(|a| !a.is_empty()).unwrap_or("me");
    let endpoint = format!("/api/0/authors/{}/builds/", path_segment(author));
    let builds: Vec<Build> = api.get(&endpoint).await?.decode(&endpoint)?;

    let title = if author == "me" {
        "My Builds".to_string()
    } else {
        format!("{} - Builds", email_head(author))
    };

    Ok(AuthorBuildsView {
        title,
        author: author.to_string(),
        builds: builds.iter().map(BuildRow::from_build).collect(),
    })
}

pub async fn load_infra_fails(api: &dyn ChangesApi) -> Result<InfraFailsView, PageError> {
    let endpoint = "/api/0/admin_dash/infra_fail_jobs/";
    let fails: InfraFails = api.get(endpoint).await?.decode(endpoint)?;

    let jobs = fails
        .recent
        .iter()
        .map(|job| InfraFailRow {
            build: BuildRow::from_build(&job.build),
            project: job.project.as_ref().map(|p| p.name.clone()),
            name: job.name.clone(),
            started: job.date_started.clone(),
        })
        .collect();

    Ok(InfraFailsView {
        title: "Infra fails".to_string(),
        jobs,
    })
}

/// Pusher query from location parameters; `per_page` falls back to the
/// configured page size rather than the built-in one.
pub fn pusher_query(query: &[(String, String)], settings: &PageSettings) -> PusherQuery {
    let pusher_query = PusherQuery::from_params(query);
    if query_values(query, "per_page").is_empty() {
        pusher_query.with_per_page(settings.default_per_page)
    } else {
        pusher_query
    }
}

/// One full round, merged. Live updates go through the aggregator instead.
pub async fn load_pusher(
    api: &dyn ChangesApi,
    query: &[(String, String)],
    settings: &PageSettings,
) -> PusherPageView {
    let pusher_query = pusher_query(query, settings);
    let feeds = fetch_round(api, &pusher_query).await;
    let grid = merge_rows(&pusher_query.slugs, &feeds, &settings.phabricator_host);
    PusherPageView {
        title: "Dashboard".to_string(),
        query: pusher_query,
        grid,
    }
}
