use serde::Serialize;

use crate::api::{endpoint_with_query, path_segment};
use crate::router::navigation::query_values;

pub const DEFAULT_PER_PAGE: u32 = 50;

/// Which projects the pusher page tracks, and on which branch.
///
/// Two query schemes exist. Modern: `project` repeated plus optional `branch`.
/// Legacy: `main` repeated, each value `slug` or `slug::branch`, where the
/// first branch found wins. Modern applies whenever `project` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PusherQuery {
    pub slugs: Vec<String>,
    pub branch: Option<String>,
    pub per_page: u32,
}

impl PusherQuery {
    pub fn new(slugs: Vec<String>, branch: Option<String>) -> Self {
        let mut query = Self {
            slugs: Vec::new(),
            branch: branch.filter(|b| !b.is_empty()),
            per_page: DEFAULT_PER_PAGE,
        };
        for slug in slugs {
            query.push_slug(&slug);
        }
        query
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn from_params(params: &[(String, String)]) -> Self {
        let projects = query_values(params, "project");
        let mut query = if !projects.is_empty() {
            let branch = query_values(params, "branch")
                .first()
                .map(|b| b.to_string());
            Self::new(projects.iter().map(|p| p.to_string()).collect(), branch)
        } else {
            let mut query = Self::new(Vec::new(), None);
            for main in query_values(params, "main") {
                let (slug, branch) = match main.split_once("::") {
                    Some((slug, branch)) => (slug, Some(branch)),
                    None => (main, None),
                };
                query.push_slug(slug);
                if query.branch.is_none() {
                    query.branch = branch.filter(|b| !b.is_empty()).map(str::to_string);
                }
            }
            query
        };

        if let Some(raw) = query_values(params, "per_page").first() {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => query.per_page = n,
                _ => tracing::warn!(per_page = %raw, "ignoring invalid per_page"),
            }
        }
        query
    }

    fn push_slug(&mut self, slug: &str) {
        let slug = slug.trim();
        if !slug.is_empty() && !self.slugs.iter().any(|s| s == slug) {
            self.slugs.push(slug.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    /// The project whose commit list decides the rows and their order.
    pub fn primary(&self) -> Option<&str> {
        self.slugs.first().map(String::as_str)
    }

    pub fn commits_endpoint(&self, slug: &str) -> String {
        let per_page = self.per_page.to_string();
        endpoint_with_query(
            &format!("/api/0/projects/{}/commits/", path_segment(slug)),
            &[
                ("all_builds", Some("1")),
                ("branch", self.branch.as_deref()),
                ("per_page", Some(per_page.as_str())),
            ],
        )
    }

    /// `(slug, endpoint)` for every tracked project, in slug order.
    pub fn endpoints(&self) -> Vec<(String, String)> {
        self.slugs
            .iter()
            .map(|slug| (slug.clone(), self.commits_endpoint(slug)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::navigation::parse_query;

    #[test]
    fn test_modern_params() {
        let query = PusherQuery::from_params(&parse_query(
            "project=serviceA&project=serviceB&branch=master",
        ));
        assert_eq!(query.slugs, vec!["serviceA", "serviceB"]);
        assert_eq!(query.branch.as_deref(), Some("master"));
        assert_eq!(query.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_legacy_params_first_branch_wins() {
        let query = PusherQuery::from_params(&parse_query("main=serviceA::release&main=serviceB"));
        assert_eq!(query.slugs, vec!["serviceA", "serviceB"]);
        assert_eq!(query.branch.as_deref(), Some("release"));

        let query = PusherQuery::from_params(&parse_query(
            "main=serviceA&main=serviceB::hotfix&main=serviceC::other",
        ));
        assert_eq!(query.branch.as_deref(), Some("hotfix"));
    }

    #[test]
    fn test_modern_takes_precedence_over_legacy() {
        let query = PusherQuery::from_params(&parse_query("main=old::release&project=new"));
        assert_eq!(query.slugs, vec!["new"]);
        assert_eq!(query.branch, None);
    }

    #[test]
    fn test_duplicates_and_empty_slugs_dropped() {
        let query = PusherQuery::from_params(&parse_query("project=a&project=&project=b&project=a"));
        assert_eq!(query.slugs, vec!["a", "b"]);
        assert_eq!(query.primary(), Some("a"));
    }

    #[test]
    fn test_per_page() {
        let query = PusherQuery::from_params(&parse_query("project=a&per_page=10"));
        assert_eq!(query.per_page, 10);
        let query = PusherQuery::from_params(&parse_query("project=a&per_page=lots"));
        assert_eq!(query.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_no_params_is_empty() {
        let query = PusherQuery::from_params(&[]);
        assert!(query.is_empty());
        assert!(query.endpoints().is_empty());
    }

    #[test]
    fn test_commits_endpoint() {
        let query = PusherQuery::new(vec!["server".into()], Some("master".into()));
        assert_eq!(
            query.commits_endpoint("server"),
            "/api/0/projects/server/commits/?all_builds=1&branch=master&per_page=50"
        );
        let query = PusherQuery::new(vec!["server".into()], None).with_per_page(5);
        assert_eq!(
            query.endpoints(),
            vec![(
                "server".to_string(),
                "/api/0/projects/server/commits/?all_builds=1&per_page=5".to_string()
            )]
        );
    }

    #[test]
    fn test_commits_endpoint_escapes_slug() {
        let query = PusherQuery::new(vec!["a/b?x#y".into()], None);
        assert_eq!(
            query.commits_endpoint("a/b?x#y"),
            "/api/0/projects/a%2Fb%3Fx%23y/commits/?all_builds=1&per_page=50"
        );
    }
}
