use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The API sends `null` for unset columns; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"id": ..., "name": ...}` pairs the API uses for build status and result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Link to the commit in an external code browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct External {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub sha: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub external: Option<External>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parents: Vec<String>,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

/// What a build ran against: a plain commit, or a patch on top of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub patch: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: serde_json::Map<String, Value>,
    #[serde(default)]
    pub revision: Option<Revision>,
}

impl Source {
    pub fn is_patch(&self) -> bool {
        self.patch.as_ref().is_some_and(|p| !p.is_null())
    }

    /// A `data` entry rendered as a string, whether the API sent it as a
    /// string or a number.
    pub fn data_str(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn phabricator_revision_id(&self) -> Option<String> {
        self.data_str("phabricator.revisionID")
    }

    pub fn phabricator_diff_id(&self) -> Option<String> {
        self.data_str("phabricator.diffID")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_started: Option<String>,
    #[serde(default)]
    pub date_finished: Option<String>,
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Label,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Label,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

impl Build {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created.as_deref().and_then(parse_timestamp)
    }

    /// Most relevant timestamp for "when did this happen" displays.
    pub fn display_time(&self) -> Option<&str> {
        self.date_finished
            .as_deref()
            .or(self.date_started.as_deref())
            .or(self.date_created.as_deref())
    }

    pub fn is_arc_test(&self) -> bool {
        self.tags.iter().any(|t| t == "arc test")
    }
}

/// A commit as returned by `/api/0/projects/{slug}/commits/?all_builds=1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub date_committed: Option<String>,
    #[serde(default)]
    pub external: Option<External>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub builds: Vec<Build>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,
    #[serde(default)]
    pub build: Option<BuildRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSourceUrl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSource {
    pub id: String,
    pub job: JobRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<LogSourceUrl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStep {
    pub id: String,
    #[serde(default)]
    pub job: Option<JobRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub log_sources: Vec<LogSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One revision's worth of builds inside a diff response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffChange {
    #[serde(default, deserialize_with = "null_as_default")]
    pub builds: Vec<Build>,
}

/// Response of `/api/0/phabricator_diffs/{id}/builds`. Everything except the
/// builds may be missing when Phabricator was unreachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffBuilds {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "revision_id")]
    pub revision_id: Option<Value>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date_created: Option<i64>,
    #[serde(default, rename = "fetched_data_from_phabricator", deserialize_with = "null_as_default")]
    pub fetched_data_from_phabricator: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changes: Vec<DiffChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraFailJob {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    pub build: Build,
    #[serde(default)]
    pub date_started: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraFails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub recent: Vec<InfraFailJob>,
}

/// Parse the API's timestamps, which come either as RFC 3339 or as naive
/// ISO-8601 in UTC (`2016-01-05T21:35:13.428218`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_deserialize_with_embedded_builds() {
        let json = r#"{
            "sha": "abc123",
            "message": "Fix the flaky test\n\nLonger body",
            "author": {"id": "u1", "email": "dev@example.com"},
            "dateCommitted": "2016-01-05T21:35:13.428218",
            "builds": [
                {"id": "b1", "dateCreated": "2016-01-05T21:40:00",
                 "status": {"id": "finished"}, "result": {"id": "passed"},
                 "project": {"id": "p1", "slug": "server", "name": "Server"}}
            ]
        }"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.sha, "abc123");
        assert_eq!(commit.builds.len(), 1);
        assert_eq!(commit.builds[0].result.id, "passed");
        assert_eq!(commit.builds[0].project.as_ref().unwrap().slug, "server");
    }

    #[test]
    fn test_build_tolerates_missing_optional_fields() {
        let build: Build = serde_json::from_str(r#"{"id": "b9"}"#).unwrap();
        assert_eq!(build.id, "b9");
        assert!(build.source.is_none());
        assert!(build.created_at().is_none());
        assert_eq!(build.status.id, "");
    }

    #[test]
    fn test_source_patch_and_revision_id() {
        let json = r#"{"id": "s1", "patch": {"id": "p"}, "data": {"phabricator.revisionID": 1234}}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert!(source.is_patch());
        assert_eq!(source.phabricator_revision_id().as_deref(), Some("1234"));

        let plain: Source = serde_json::from_str(r#"{"id": "s2", "patch": null}"#).unwrap();
        assert!(!plain.is_patch());
        assert!(plain.phabricator_revision_id().is_none());
    }

    #[test]
    fn test_parse_timestamp_naive_and_rfc3339() {
        let naive = parse_timestamp("2016-01-05T21:35:13.428218").unwrap();
        let zoned = parse_timestamp("2016-01-05T21:35:13.428218+00:00").unwrap();
        assert_eq!(naive, zoned);
        assert!(parse_timestamp("2016-01-05T21:35:13").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_display_time_prefers_finished() {
        let build: Build = serde_json::from_str(
            r#"{"id": "b", "dateCreated": "c", "dateStarted": "s", "dateFinished": "f"}"#,
        )
        .unwrap();
        assert_eq!(build.display_time(), Some("f"));
    }

    #[test]
    fn test_jobstep_log_sources() {
        let json = r#"{
            "id": "js1",
            "job": {"id": "j1", "build": {"id": "b1"}},
            "logSources": [
                {"id": "l1", "job": {"id": "j1"}, "urls": [{"type": "chunked", "priority": 1}]}
            ]
        }"#;
        let step: JobStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.job.unwrap().build.unwrap().id, "b1");
        assert_eq!(step.log_sources[0].urls[0].kind, "chunked");
    }

    #[test]
    fn test_diff_builds_defaults_when_phabricator_unreachable() {
        let diff: DiffBuilds = serde_json::from_str(r#"{"changes": [{"builds": []}]}"#).unwrap();
        assert!(!diff.fetched_data_from_phabricator);
        assert!(diff.revision_id.is_none());
        assert!(diff.date_created.is_none());
        assert_eq!(diff.changes.len(), 1);
    }

    #[test]
    fn test_null_columns_decode_as_defaults() {
        let json = r#"[
            {"sha": "X", "message": "ok"},
            {"sha": "Y", "message": null, "author": {"id": "u", "email": null},
             "builds": [{"id": "b1", "status": null, "tags": null,
                         "project": {"id": "p", "slug": "server", "name": null}}]}
        ]"#;
        let commits: Vec<Commit> = serde_json::from_str(json).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[1].message, "");
        assert_eq!(commits[1].author.as_ref().unwrap().email, "");
        let build = &commits[1].builds[0];
        assert_eq!(build.project.as_ref().unwrap().name, "");
        assert_eq!(build.status, Label::default());
        assert!(build.tags.is_empty());
    }
}
