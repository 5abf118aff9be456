//! Remote data service client
//!
//! A fetch returns either a [`RawResponse`] or a [`TransportError`]; nothing
//! is thrown past this boundary. Every request carries the caching directive
//! for its fragment kind.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::ApiConfig;
use crate::types::{Book, RecordId};
use crate::ResolutionError;

/// Header carrying the cache policy of a durable request
pub const CACHE_POLICY_HEADER: &str = "x-cache-policy";

/// Header carrying the invalidation tags of a tagged request
pub const CACHE_TAGS_HEADER: &str = "x-cache-tags";

/// Failures that prevented a usable response from being obtained
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("remote source is not configured")]
    NotConfigured,

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Which fragment a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// A single book by id
    Detail,
    /// Reviews by parent book id
    ListByParent,
}

/// Caching directive attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheDirective {
    /// Treat the resource as immutable once fetched
    Durable,
    /// Cache under a tag so the entry can be invalidated selectively
    Tagged(String),
}

impl CacheDirective {
    pub fn tag(&self) -> Option<&str> {
        match self {
            CacheDirective::Durable => None,
            CacheDirective::Tagged(tag) => Some(tag),
        }
    }
}

/// Tag under which the reviews of `book_id` are cached
pub fn review_tag(book_id: &RecordId) -> String {
    format!("review-{}", book_id)
}

/// A single fragment request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentRequest {
    pub kind: FragmentKind,
    pub key: RecordId,
}

impl FragmentRequest {
    pub fn detail(id: RecordId) -> Self {
        Self {
            kind: FragmentKind::Detail,
            key: id,
        }
    }

    pub fn list_by_parent(parent_id: RecordId) -> Self {
        Self {
            kind: FragmentKind::ListByParent,
            key: parent_id,
        }
    }

    /// Directive fixed by the fragment kind
    pub fn cache_directive(&self) -> CacheDirective {
        match self.kind {
            FragmentKind::Detail => CacheDirective::Durable,
            FragmentKind::ListByParent => CacheDirective::Tagged(review_tag(&self.key)),
        }
    }

    pub fn path_segments(&self) -> Vec<&str> {
        match self.kind {
            FragmentKind::Detail => vec!["book", self.key.as_str()],
            FragmentKind::ListByParent => vec!["review", "book", self.key.as_str()],
        }
    }

    /// Service path, e.g. `/review/book/5`
    pub fn path(&self) -> String {
        format!("/{}", self.path_segments().join("/"))
    }

    /// Whether a success body has the shape this fragment expects
    ///
    /// A detail body must parse as a book; a list body must be a JSON array.
    /// Individual list elements are checked later by the list resolver.
    pub fn accepts(&self, response: &RawResponse) -> bool {
        match self.kind {
            FragmentKind::Detail => response.json::<Book>().is_ok(),
            FragmentKind::ListByParent => response.json::<Vec<serde_json::Value>>().is_ok(),
        }
    }
}

/// How a response steers resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    NotFound,
    Failure,
}

/// Status and body of a completed remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn classify(&self) -> ResponseClass {
        match self.status {
            200..=299 => ResponseClass::Success,
            404 => ResponseClass::NotFound,
            _ => ResponseClass::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.classify() == ResponseClass::Success
    }

    /// Parse the body as JSON; a body that does not parse is `Malformed`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// Performs fragment requests against the remote data service
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn fetch(&self, request: &FragmentRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed [`RemoteClient`]
///
/// The per-call deadline is enforced by the HTTP client timeout.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    http: Client,
    base_url: Option<Url>,
}

impl HttpRemoteClient {
    pub fn new(base_url: Option<Url>, timeout: Duration) -> crate::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolutionError::Client(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> crate::Result<Self> {
        Self::new(config.api_base_url().cloned(), config.request_timeout())
    }

    fn url_for(&self, request: &FragmentRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone().ok_or(TransportError::NotConfigured)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TransportError::Request("api server url cannot carry a path".to_string())
            })?;
            segments.pop_if_empty();
            segments.extend(request.path_segments());
        }
        Ok(url)
    }
}

fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch(&self, request: &FragmentRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(request)?;

        let builder = self.http.get(url.clone());
        let builder = match request.cache_directive() {
            CacheDirective::Durable => builder.header(CACHE_POLICY_HEADER, "durable"),
            CacheDirective::Tagged(tag) => builder.header(CACHE_TAGS_HEADER, tag),
        };

        let response = builder.send().await.map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        debug!(url = %url, status, bytes = body.len(), "Remote fetch completed");
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_service() -> Url {
        async fn book(Path(id): Path<String>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
            let policy = headers
                .get(CACHE_POLICY_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            match id.as_str() {
                "1" => (StatusCode::OK, Json(json!({ "id": 1, "title": "X", "policy": policy }))),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    (StatusCode::OK, Json(json!({})))
                }
                _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "missing" }))),
            }
        }

        async fn reviews(Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
            let tags = headers
                .get(CACHE_TAGS_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({ "bookId": id, "tags": tags }))
        }

        let app = Router::new()
            .route("/api/book/{id}", get(book))
            .route("/api/review/book/{id}", get(reviews));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}/api/", addr)).unwrap()
    }

    #[test]
    fn test_request_paths_and_directives() {
        let detail = FragmentRequest::detail(RecordId::from("1"));
        assert_eq!(detail.path(), "/book/1");
        assert_eq!(detail.cache_directive(), CacheDirective::Durable);

        let list = FragmentRequest::list_by_parent(RecordId::from("5"));
        assert_eq!(list.path(), "/review/book/5");
        assert_eq!(list.cache_directive().tag(), Some("review-5"));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(RawResponse::new(200, "{}").classify(), ResponseClass::Success);
        assert_eq!(RawResponse::new(204, "").classify(), ResponseClass::Success);
        assert_eq!(RawResponse::new(404, "").classify(), ResponseClass::NotFound);
        assert_eq!(RawResponse::new(500, "").classify(), ResponseClass::Failure);
        assert_eq!(RawResponse::new(301, "").classify(), ResponseClass::Failure);
    }

    #[test]
    fn test_accepts_body_by_fragment_kind() {
        let detail = FragmentRequest::detail(RecordId::from("1"));
        let list = FragmentRequest::list_by_parent(RecordId::from("1"));

        assert!(detail.accepts(&RawResponse::new(200, r#"{"id":1,"title":"X"}"#)));
        assert!(!detail.accepts(&RawResponse::new(200, "<html>captive portal</html>")));
        assert!(!detail.accepts(&RawResponse::new(200, "[]")));

        assert!(list.accepts(&RawResponse::new(200, "[]")));
        assert!(!list.accepts(&RawResponse::new(200, r#"{"reviews":[]}"#)));
    }

    #[test]
    fn test_malformed_body() {
        let response = RawResponse::new(200, "<html>");
        let parsed: Result<Value, _> = response.json();
        assert!(matches!(parsed, Err(TransportError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_not_configured() {
        let client = HttpRemoteClient::new(None, Duration::from_secs(1)).unwrap();
        let result = client.fetch(&FragmentRequest::detail(RecordId::from("1"))).await;
        assert_eq!(result, Err(TransportError::NotConfigured));
    }

    #[tokio::test]
    async fn test_detail_fetch_sends_durable_policy() {
        let base = spawn_service().await;
        let client = HttpRemoteClient::new(Some(base), Duration::from_secs(1)).unwrap();

        let response = client
            .fetch(&FragmentRequest::detail(RecordId::from("1")))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let body: Value = response.json().unwrap();
        assert_eq!(body["title"], "X");
        assert_eq!(body["policy"], "durable");
    }

    #[tokio::test]
    async fn test_detail_fetch_passes_not_found_status() {
        let base = spawn_service().await;
        let client = HttpRemoteClient::new(Some(base), Duration::from_secs(1)).unwrap();

        let response = client
            .fetch(&FragmentRequest::detail(RecordId::from("99")))
            .await
            .unwrap();
        assert_eq!(response.classify(), ResponseClass::NotFound);
    }

    #[tokio::test]
    async fn test_list_fetch_sends_tag() {
        let base = spawn_service().await;
        let client = HttpRemoteClient::new(Some(base), Duration::from_secs(1)).unwrap();

        let response = client
            .fetch(&FragmentRequest::list_by_parent(RecordId::from("5")))
            .await
            .unwrap();
        let body: Value = response.json().unwrap();
        assert_eq!(body["bookId"], "5");
        assert_eq!(body["tags"], "review-5");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let base = spawn_service().await;
        let client = HttpRemoteClient::new(Some(base), Duration::from_millis(100)).unwrap();

        let result = client
            .fetch(&FragmentRequest::detail(RecordId::from("slow")))
            .await;
        assert_eq!(result, Err(TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}/", addr)).unwrap();
        let client = HttpRemoteClient::new(Some(base), Duration::from_secs(1)).unwrap();
        let result = client
            .fetch(&FragmentRequest::detail(RecordId::from("1")))
            .await;
        assert!(result.is_err());
    }
}
