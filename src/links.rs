//! Href builders for the dashboard's own pages and for external code review.
//!
//! These return paths (or absolute URLs for external links); markup is left
//! to whatever renders the view models.

use url::Url;

use crate::api::endpoint_with_query;
use crate::api::models::{Author, Build, External, JobStep};

/// Permalink for a single build. Three cases: a plain commit build, a build of
/// a Phabricator diff, or a build of an arbitrary patch (e.g. `arc test`).
pub fn build_href(build: &Build) -> String {
    let Some(source) = build.source.as_ref() else {
        tracing::warn!(build_id = %build.id, "build has no source; linking to bare build page");
        return format!("/builds/{}", build.id);
    };

    if !source.is_patch() {
        format!("/sources/{}/builds/{}", source.id, build.id)
    } else if let Some(revision_id) = source.phabricator_revision_id() {
        endpoint_with_query(
            &format!("/diff/D{}", revision_id),
            &[("buildID", Some(build.id.as_str()))],
        )
    } else {
        format!("/builds/{}", build.id)
    }
}

/// Link for a set of builds that all target the same commit or diff.
pub fn builds_href(builds: &[Build]) -> String {
    let Some(build) = builds.first() else {
        tracing::warn!("tried to link an empty list of builds");
        return String::new();
    };
    // Happens for diffs committed within the last few seconds.
    let Some(source) = build.source.as_ref() else {
        return String::new();
    };

    if !source.is_patch() {
        format!("/commit_source/{}/", source.id)
    } else if let Some(revision_id) = source.phabricator_revision_id() {
        format!("/diff/D{}", revision_id)
    } else {
        format!("/builds/{}", build.id)
    }
}

/// External link for a commit: the API-supplied link when there is one,
/// otherwise a Phabricator search for the sha (which redirects on a unique hit).
pub fn phab_commit_href(sha: &str, external: Option<&External>, phabricator_host: &str) -> String {
    if let Some(link) = external.and_then(|e| e.link.as_deref()).filter(|l| !l.is_empty()) {
        return link.to_string();
    }

    match Url::parse(phabricator_host) {
        Ok(mut url) => {
            url.set_path("/search/");
            url.query_pairs_mut().append_pair("query", sha);
            url.to_string()
        }
        Err(_) => format!(
            "{}/search/?query={}",
            phabricator_host.trim_end_matches('/'),
            sha
        ),
    }
}

pub fn author_href(author: &Author) -> String {
    format!("/authors/{}", author.id)
}

pub fn project_href(slug: &str, tab: Option<&str>) -> String {
    match tab {
        Some(tab) => format!("/projects/{}#{}", slug, tab),
        None => format!("/projects/{}", slug),
    }
}

pub fn project_admin_href(slug: &str) -> String {
    format!("/admin/projects/{}", slug)
}

pub fn test_history_href(project_id: &str, test_hash: &str) -> String {
    format!("/project_test/{}/{}", project_id, test_hash)
}

pub fn build_test_href(build_id: &str, test_id: &str) -> String {
    format!("/build_test/{}/{}", build_id, test_id)
}

pub fn tests_for_build_href(build_id: &str, test_failures: usize) -> String {
    let anchor = if test_failures == 0 { "#TestList" } else { "" };
    format!("/build_tests/{}{}", build_id, anchor)
}

pub fn snapshot_href(snapshot_id: &str) -> String {
    format!("/snapshot/{}/", snapshot_id)
}

/// Log page for a jobstep: the chunked log source with the highest priority
/// (later entries win ties).
pub fn jobstep_chunked_log_href(build_id: &str, jobstep: &JobStep) -> Option<String> {
    let mut best: Option<(i64, String)> = None;
    for source in &jobstep.log_sources {
        for url in source.urls.iter().filter(|u| u.kind == "chunked") {
            if best.as_ref().is_none_or(|(priority, _)| *priority <= url.priority) {
                best = Some((
                    url.priority,
                    format!("/job_log/{}/{}/{}/", build_id, source.job.id, source.id),
                ));
            }
        }
    }
    best.map(|(_, href)| href)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(source: serde_json::Value) -> Build {
        serde_json::from_value(json!({"id": "b1", "source": source})).unwrap()
    }

    #[test]
    fn test_build_href_commit() {
        let b = build(json!({"id": "s1", "patch": null}));
        assert_eq!(build_href(&b), "/sources/s1/builds/b1");
    }

    #[test]
    fn test_build_href_phabricator_diff() {
        let b = build(json!({"id": "s1", "patch": {"id": "p1"}, "data": {"phabricator.revisionID": "42"}}));
        assert_eq!(build_href(&b), "/diff/D42?buildID=b1");
    }

    #[test]
    fn test_build_href_arbitrary_patch() {
        let b = build(json!({"id": "s1", "patch": {"id": "p1"}}));
        assert_eq!(build_href(&b), "/builds/b1");
    }

    #[test]
    fn test_build_href_without_source() {
        let b: Build = serde_json::from_value(json!({"id": "b7"})).unwrap();
        assert_eq!(build_href(&b), "/builds/b7");
    }

    #[test]
    fn test_builds_href_variants() {
        assert_eq!(builds_href(&[]), "");
        assert_eq!(
            builds_href(&[build(json!({"id": "s1"}))]),
            "/commit_source/s1/"
        );
        assert_eq!(
            builds_href(&[build(json!({"id": "s1", "patch": {}, "data": {"phabricator.revisionID": 7}}))]),
            "/diff/D7"
        );
        let no_source: Build = serde_json::from_value(json!({"id": "b"})).unwrap();
        assert_eq!(builds_href(&[no_source]), "");
    }

    #[test]
    fn test_phab_commit_href_prefers_external_link() {
        let external = External {
            link: Some("https://code.example.com/rX123".to_string()),
            label: None,
        };
        assert_eq!(
            phab_commit_href("abc", Some(&external), "https://phab.example.com"),
            "https://code.example.com/rX123"
        );
    }

    #[test]
    fn test_phab_commit_href_falls_back_to_search() {
        assert_eq!(
            phab_commit_href("abc123", None, "https://phab.example.com"),
            "https://phab.example.com/search/?query=abc123"
        );
        assert_eq!(
            phab_commit_href("abc123", None, "phab-host/"),
            "phab-host/search/?query=abc123"
        );
    }

    #[test]
    fn test_simple_hrefs() {
        assert_eq!(project_href("server", None), "/projects/server");
        assert_eq!(project_href("server", Some("BuildPlans")), "/projects/server#BuildPlans");
        assert_eq!(project_admin_href("server"), "/admin/projects/server");
        assert_eq!(test_history_href("p1", "h1"), "/project_test/p1/h1");
        assert_eq!(build_test_href("b1", "t1"), "/build_test/b1/t1");
        assert_eq!(tests_for_build_href("b1", 0), "/build_tests/b1#TestList");
        assert_eq!(tests_for_build_href("b1", 3), "/build_tests/b1");
        assert_eq!(snapshot_href("snap"), "/snapshot/snap/");
        let author = Author {
            id: "u1".to_string(),
            email: "dev@example.com".to_string(),
            name: None,
        };
        assert_eq!(author_href(&author), "/authors/u1");
    }

    #[test]
    fn test_jobstep_chunked_log_href_picks_highest_priority() {
        let step: JobStep = serde_json::from_value(json!({
            "id": "js",
            "logSources": [
                {"id": "l1", "job": {"id": "j1"}, "urls": [{"type": "chunked", "priority": 1}]},
                {"id": "l2", "job": {"id": "j1"}, "urls": [{"type": "raw", "priority": 9}]},
                {"id": "l3", "job": {"id": "j1"}, "urls": [{"type": "chunked", "priority": 5}]}
            ]
        }))
        .unwrap();
        assert_eq!(
            jobstep_chunked_log_href("b1", &step).as_deref(),
            Some("/job_log/b1/j1/l3/")
        );
    }

    #[test]
    fn test_jobstep_chunked_log_href_none_without_chunked() {
        let step: JobStep = serde_json::from_value(json!({"id": "js"})).unwrap();
        assert!(jobstep_chunked_log_href("b1", &step).is_none());
    }
}
