use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked when a deferred redirect has found its destination.
pub type Navigate = Arc<dyn Fn(&str) + Send + Sync>;

/// Explicit stand-in for the browser location: the current path, its query
/// parameters (repeatable keys keep their order) and a way to move elsewhere.
#[derive(Clone)]
pub struct NavigationContext {
    path: String,
    query: Vec<(String, String)>,
    navigate: Navigate,
}

impl NavigationContext {
    pub fn new(path: impl Into<String>, query: Vec<(String, String)>, navigate: Navigate) -> Self {
        Self {
            path: path.into(),
            query,
            navigate,
        }
    }

    /// Split `/path?a=1&b=2` into path and query.
    pub fn from_location(location: &str, navigate: Navigate) -> Self {
        let (path, query) = match location.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (location, Vec::new()),
        };
        Self::new(path, query, navigate)
    }

    /// A context whose navigation does nothing; for pure resolution.
    pub fn detached(location: &str) -> Self {
        Self::from_location(location, Arc::new(|_: &str| {}))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// All values of a repeatable query parameter, in order.
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        query_values(&self.query, key)
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (k, v) in &self.query {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        map
    }

    pub fn navigate(&self, target: &str) {
        (self.navigate)(target);
    }
}

impl fmt::Debug for NavigationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationContext")
            .field("path", &self.path)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn query_values<'a>(query: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    query
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}
