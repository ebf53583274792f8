//! `find_*` routes: identifiers that must be looked up through the API before
//! the canonical page is known.

use std::fmt;

use serde::Serialize;

use crate::api::{ChangesApi, path_segment};
use crate::api::models::{Build, JobStep, Node};
use crate::errors::RedirectError;
use crate::links;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectKind {
    FindBuild,
    FindJobstep,
    FindNode,
}

impl RedirectKind {
    pub const ALL: [RedirectKind; 3] = [
        RedirectKind::FindBuild,
        RedirectKind::FindJobstep,
        RedirectKind::FindNode,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            RedirectKind::FindBuild => "find_build",
            RedirectKind::FindJobstep => "find_jobstep",
            RedirectKind::FindNode => "find_node",
        }
    }

    pub fn lookup_endpoint(self, id: &str) -> String {
        let id = path_segment(id);
        match self {
            RedirectKind::FindBuild => format!("/api/0/builds/{}", id),
            RedirectKind::FindJobstep => format!("/api/0/jobsteps/{}", id),
            RedirectKind::FindNode => format!("/api/0/nodes/hostname/{}", id),
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = match self {
            RedirectKind::FindBuild => "build",
            RedirectKind::FindJobstep => "jobstep",
            RedirectKind::FindNode => "node",
        };
        f.write_str(noun)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredRedirect {
    pub kind: RedirectKind,
    pub id: String,
}

impl DeferredRedirect {
    pub fn new(kind: RedirectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        self.kind.lookup_endpoint(&self.id)
    }

    /// Look the identifier up and compose the permalink to navigate to.
    pub async fn lookup(&self, api: &dyn ChangesApi) -> Result<String, RedirectError> {
        let endpoint = self.endpoint();
        let fail = |source| RedirectError::LookupFailed {
            kind: self.kind,
            id: self.id.clone(),
            source,
        };

        let response = api.get(&endpoint).await.map_err(fail)?;

        let target = match self.kind {
            RedirectKind::FindBuild => {
                let build: Build = response.decode(&endpoint).map_err(fail)?;
                links::build_href(&build)
            }
            RedirectKind::FindJobstep => {
                let step: JobStep = response.decode(&endpoint).map_err(fail)?;
                let build_id = step
                    .job
                    .as_ref()
                    .and_then(|job| job.build.as_ref())
                    .map(|build| build.id.clone())
                    .ok_or(RedirectError::MissingField {
                        kind: self.kind,
                        field: "job.build.id",
                    })?;
                links::jobstep_chunked_log_href(&build_id, &step)
                    .unwrap_or_else(|| format!("/builds/{}", build_id))
            }
            RedirectKind::FindNode => {
                let node: Node = response.decode(&endpoint).map_err(fail)?;
                format!("/node/{}", node.id)
            }
        };

        tracing::info!(kind = %self.kind, id = %self.id, %target, "resolved redirect");
        Ok(target)
    }
}
