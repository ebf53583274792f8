//! Joins per-project feeds into one row per commit.
//!
//! The first tracked project's feed is the source of truth for which commits
//! appear and in what order; the other projects only contribute cells.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::models::{Build, Commit};
use crate::conditions::{Condition, clock_duration, runnable_condition};
use crate::links;
use crate::util::{DEFAULT_TRUNCATE, email_head, first_line, truncate};

use super::feed::Feed;

const PROJECT_HEADER_WIDTH: usize = 20;
const COMMIT_LABEL_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationDisplay {
    Static { text: String },
    /// Still running; clients tick the elapsed time from `since`.
    Live { since: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBuildSummary {
    pub build_id: String,
    pub href: String,
    pub condition: Condition,
    pub color_class: &'static str,
    pub duration: DurationDisplay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedRow {
    pub key: String,
    /// Abbreviated sha shown in the row.
    pub commit_label: String,
    /// One entry per tracked project, in slug order.
    pub cells: Vec<Option<LatestBuildSummary>>,
    pub title: String,
    pub author: Option<AuthorLink>,
    pub commit_link: String,
    pub committed_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectHeader {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PusherView {
    pub headers: Vec<ProjectHeader>,
    pub rows: Vec<MergedRow>,
}

/// Most recently created build. Later entries win ties.
pub fn latest_build(builds: &[Build]) -> Option<&Build> {
    builds.iter().max_by_key(|b| b.created_at())
}

pub fn summarize(build: &Build) -> LatestBuildSummary {
    let condition = runnable_condition(build);
    let duration = if condition.is_waiting() {
        let since = build
            .date_started
            .as_deref()
            .and_then(crate::api::models::parse_timestamp)
            .or_else(|| build.created_at());
        DurationDisplay::Live { since }
    } else {
        let text = build
            .duration
            .map(|ms| clock_duration(ms as f64 / 1000.0))
            .unwrap_or_default();
        DurationDisplay::Static { text }
    };

    LatestBuildSummary {
        build_id: build.id.clone(),
        href: links::build_href(build),
        condition,
        color_class: condition.color_class(),
        duration,
    }
}

/// Build the grid for `slugs` from one consistent set of feeds.
pub fn merge_rows(slugs: &[String], feeds: &[Feed], phabricator_host: &str) -> PusherView {
    let by_slug: HashMap<&str, HashMap<&str, &Commit>> = feeds
        .iter()
        .map(|feed| {
            let commits = feed
                .commits
                .iter()
                .map(|commit| (commit.sha.as_str(), commit))
                .collect();
            (feed.slug.as_str(), commits)
        })
        .collect();

    let mut project_names: HashMap<String, String> = HashMap::new();

    let authoritative = slugs
        .first()
        .and_then(|slug| feeds.iter().find(|feed| &feed.slug == slug))
        .map(|feed| feed.commits.as_slice())
        .unwrap_or_default();

    let rows = authoritative
        .iter()
        .map(|base| {
            let cells = slugs
                .iter()
                .map(|slug| {
                    let commit = by_slug.get(slug.as_str())?.get(base.sha.as_str())?;
                    let build = latest_build(&commit.builds)?;
                    if let Some(project) = &build.project {
                        project_names.insert(project.slug.clone(), project.name.clone());
                    }
                    Some(summarize(build))
                })
                .collect();

            MergedRow {
                key: base.sha.clone(),
                commit_label: base.sha.chars().take(COMMIT_LABEL_LEN).collect(),
                cells,
                title: truncate(first_line(&base.message), DEFAULT_TRUNCATE),
                author: base.author.as_ref().map(|author| AuthorLink {
                    label: email_head(&author.email).to_string(),
                    href: links::author_href(author),
                }),
                commit_link: links::phab_commit_href(
                    &base.sha,
                    base.external.as_ref(),
                    phabricator_host,
                ),
                committed_time: base.date_committed.clone(),
            }
        })
        .collect();

    let headers = slugs
        .iter()
        .map(|slug| {
            let name = project_names
                .get(slug)
                .filter(|name| !name.is_empty())
                .map(String::as_str)
                .unwrap_or(slug.as_str());
            ProjectHeader {
                slug: slug.clone(),
                name: truncate(name, PROJECT_HEADER_WIDTH),
            }
        })
        .collect();

    PusherView { headers, rows }
}
