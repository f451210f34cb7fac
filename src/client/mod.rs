pub mod api_helpers;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use rate_limit::{backoff_sleep, is_retryable, RetryPolicy};

/// Items requested per page.
pub const PAGE_SIZE: usize = 250;

/// Longest slice of an upstream error body kept in errors and logs.
const ERROR_BODY_LIMIT: usize = 256;

/// Status and body of one upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A single GET against the CRM API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse>;
}

/// reqwest-backed transport with bearer authentication.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpTransport {
    /// `base_url` is the API root, e.g. `https://example.amocrm.ru/api/v4/`.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crmdash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Result of collecting a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    /// Items accumulated across all pages.
    Items(Vec<Value>),
    /// A response that was neither a list nor an embedded-list envelope.
    Document(Value),
}

impl Collected {
    /// Decode every item as `T`. A non-list document is a decode error.
    pub fn decode_items<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        match self {
            Collected::Items(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(Error::from))
                .collect(),
            Collected::Document(_) => Err(Error::Decode("expected a list of records".into())),
        }
    }

    /// Items as a JSON array; documents are passed through unchanged.
    pub fn into_value(self) -> Value {
        match self {
            Collected::Items(items) => Value::Array(items),
            Collected::Document(doc) => doc,
        }
    }
}

/// Interpretation of one page.
#[derive(Debug, PartialEq)]
enum Page {
    Items(Vec<Value>),
    Document(Value),
}

/// Paginating, retrying client for the CRM API. Stateless across calls.
#[derive(Clone)]
pub struct CrmClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl CrmClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Collect every item of `path` matching `filters`.
    ///
    /// Requests pages of [`PAGE_SIZE`] starting at page 1 and stops at the
    /// first page holding fewer items. A response that is not a list is
    /// returned as-is as [`Collected::Document`].
    pub async fn fetch_all(&self, path: &str, filters: &[(String, String)]) -> Result<Collected> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = filters.to_vec();
            query.push(("limit".to_string(), PAGE_SIZE.to_string()));
            query.push(("page".to_string(), page.to_string()));

            let response = self.get_with_retry(path, &query).await?;
            match interpret_page(path, &response)? {
                Page::Items(batch) => {
                    let count = batch.len();
                    items.extend(batch);
                    log::debug!("{path} page {page}: {count} items ({} total)", items.len());
                    if count < PAGE_SIZE {
                        break;
                    }
                    page += 1;
                }
                Page::Document(doc) => return Ok(Collected::Document(doc)),
            }
        }

        Ok(Collected::Items(items))
    }

    /// Issue one page request, retrying 429/5xx within the retry budget.
    async fn get_with_retry(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse> {
        let attempts = self.retry.attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let response = self.transport.get(path, query).await?;

            if is_retryable(response.status) {
                if attempt >= attempts {
                    log::error!(
                        "CRM still returning {} for {path} after {attempt} attempts",
                        response.status
                    );
                    return Err(Error::UpstreamUnavailable {
                        path: path.to_string(),
                        attempts: attempt,
                        status: response.status,
                    });
                }
                backoff_sleep(&self.retry, path, response.status, attempt - 1).await;
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(Error::UpstreamStatus {
                    path: path.to_string(),
                    status: response.status,
                    body: truncate(&response.body, ERROR_BODY_LIMIT),
                });
            }

            return Ok(response);
        }
    }
}

fn interpret_page(path: &str, response: &RawResponse) -> Result<Page> {
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(Page::Items(Vec::new()));
    }

    let value: Value = serde_json::from_str(&response.body)?;
    match value {
        Value::Array(items) => Ok(Page::Items(items)),
        Value::Object(mut map) => {
            let embedded = map.get_mut("_embedded").and_then(Value::as_object_mut);
            if let Some(embedded) = embedded {
                let resource = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
                let key = if embedded.get(resource).is_some_and(Value::is_array) {
                    Some(resource.to_string())
                } else {
                    embedded
                        .iter()
                        .find(|(_, v)| v.is_array())
                        .map(|(k, _)| k.clone())
                };
                if let Some(Value::Array(items)) = key.and_then(|k| embedded.remove(&k)) {
                    return Ok(Page::Items(items));
                }
            }
            Ok(Page::Document(Value::Object(map)))
        }
        other => Ok(Page::Document(other)),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
