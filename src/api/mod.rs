//! Changes REST API facade.
//!
//! Every page and the pusher aggregator read through the [`ChangesApi`] trait
//! so tests can swap in canned responses. [`HttpChangesApi`] is the reqwest
//! implementation used by the server and the CLI.

pub mod models;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::errors::ApiError;

/// Parsed body of a successful API call plus its `Link` header relations.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub data: Value,
    pub links: HashMap<String, String>,
}

impl ApiResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            links: HashMap::new(),
        }
    }

    pub fn with_link(mut self, rel: &str, url: &str) -> Self {
        self.links.insert(rel.to_string(), url.to_string());
        self
    }

    /// URL of the next page, if the server advertised one.
    pub fn next_link(&self) -> Option<&str> {
        self.links.get("next").map(String::as_str)
    }

    pub fn decode<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        serde_json::from_value(self.data.clone()).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

/// Loading state of one API call, as pages and feeds track it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    Loaded,
    Error,
}

impl CallStatus {
    pub fn is_settled(self) -> bool {
        !matches!(self, CallStatus::Pending)
    }
}

#[async_trait]
pub trait ChangesApi: Send + Sync {
    /// GET an endpoint (absolute path like `/api/0/builds/1`, or a full URL
    /// taken from a `Link` header) and parse its JSON body.
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed client for a Changes server.
pub struct HttpChangesApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpChangesApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|source| ApiError::InvalidEndpoint {
            endpoint: base_url.to_string(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("changes-dash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Request {
                endpoint: base_url.to_string(),
                source,
            })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(endpoint)
            .map_err(|source| ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

#[async_trait]
impl ChangesApi for HttpChangesApi {
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(endpoint)?;
        tracing::debug!(%url, "GET");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let links = resp
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        let bytes = resp.bytes().await.map_err(|source| ApiError::Request {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let data = serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;

        Ok(ApiResponse { data, links })
    }
}

/// Parse an RFC 8288 `Link` header into `rel -> url`.
///
/// `<https://changes/api/0/x/?page=2>; rel="next", <...?page=1>; rel="prev"`
pub fn parse_link_header(header: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();
    for part in header.split(',') {
        let mut pieces = part.split(';');
        let Some(target) = pieces.next() else {
            continue;
        };
        let target = target.trim();
        let Some(url) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
            continue;
        };
        for param in pieces {
            let param = param.trim();
            if let Some(rel) = param.strip_prefix("rel=") {
                let rel = rel.trim_matches('"');
                for name in rel.split_whitespace() {
                    links.insert(name.to_string(), url.to_string());
                }
            }
        }
    }
    links
}

/// Build `path?k=v&...`, skipping parameters whose value is `None`.
pub fn endpoint_with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

/// Percent-encode one path segment so ids containing `/`, `?` or `#` stay a single segment.
pub fn path_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Fetch a paginated list endpoint, following `next` links until exhausted.
pub async fn fetch_all_pages(api: &dyn ChangesApi, endpoint: &str) -> Result<Vec<Value>, ApiError> {
    let mut items = Vec::new();
    let mut next = Some(endpoint.to_string());

    while let Some(current) = next.take() {
        let response = api.get(&current).await?;
        match response.data {
            Value::Array(page) => items.extend(page),
            Value::Null => {}
            other => items.push(other),
        }
        next = response.links.get("next").cloned();
    }

    Ok(items)
}


#[cfg(test)]
mod tests {
    use super::fake::FakeApi;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_link_header_next_and_prev() {
        let header = r#"<https://changes.example.com/api/0/sources_builds/?page=2>; rel="next", <https://changes.example.com/api/0/sources_builds/?page=0>; rel="prev""#;
        let links = parse_link_header(header);
        assert_eq!(
            links.get("next").map(String::as_str),
            Some("https://changes.example.com/api/0/sources_builds/?page=2")
        );
        assert!(links.contains_key("prev"));
    }

    #[test]
    fn test_parse_link_header_garbage() {
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("not a link").is_empty());
        assert!(parse_link_header("<x>; title=\"a\"").is_empty());
    }

    #[test]
    fn test_path_segment_escapes_separators() {
        assert_eq!(path_segment("server-2_x.y"), "server-2_x.y");
        assert_eq!(path_segment("a/b?c#d"), "a%2Fb%3Fc%23d");
        assert_eq!(path_segment("a b+c"), "a%20b%2Bc");
        assert_eq!(path_segment("100%"), "100%25");
    }

    #[test]
    fn test_endpoint_with_query_skips_none() {
        let ep = endpoint_with_query(
            "/api/0/projects/server/commits/",
            &[("all_builds", Some("1")), ("branch", None), ("per_page", Some("50"))],
        );
        assert_eq!(ep, "/api/0/projects/server/commits/?all_builds=1&per_page=50");
        assert_eq!(endpoint_with_query("/api/0/x/", &[]), "/api/0/x/");
    }

    #[test]
    fn test_call_status_settled() {
        assert!(!CallStatus::Pending.is_settled());
        assert!(CallStatus::Loaded.is_settled());
        assert!(CallStatus::Error.is_settled());
    }

    #[test]
    fn test_http_api_rejects_bad_base_url() {
        let result = HttpChangesApi::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_http_api_joins_endpoint_onto_base() {
        let api = HttpChangesApi::new("http://changes.local:5000/", Duration::from_secs(1)).unwrap();
        let url = api.url_for("/api/0/builds/abc").unwrap();
        assert_eq!(url.as_str(), "http://changes.local:5000/api/0/builds/abc");
        let absolute = api.url_for("https://other.host/api/0/x/?page=2").unwrap();
        assert_eq!(absolute.host_str(), Some("other.host"));
    }

    #[tokio::test]
    async fn test_fetch_all_pages_follows_next_links() {
        let api = FakeApi::new()
            .with_response(
                "/api/0/sources_builds/?source_id=s1&per_page=100",
                ApiResponse::new(json!([{"id": "b1"}, {"id": "b2"}])).with_link("next", "page-2"),
            )
            .with_json("page-2", json!([{"id": "b3"}]));

        let items = fetch_all_pages(&api, "/api/0/sources_builds/?source_id=s1&per_page=100")
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_pages_propagates_error() {
        let api = FakeApi::new()
            .with_response("/first", ApiResponse::new(json!([1])).with_link("next", "/second"))
            .with_status("/second", 500);
        let err = fetch_all_pages(&api, "/first").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }
}
