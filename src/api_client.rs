use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// How the backend combines the terms of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Or,
    And,
    Phrase,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Or => "or",
            SearchMode::And => "and",
            SearchMode::Phrase => "phrase",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "or" => Ok(SearchMode::Or),
            "and" => Ok(SearchMode::And),
            "phrase" => Ok(SearchMode::Phrase),
            other => Err(ClientError::Config(format!("unknown search mode '{}'", other))),
        }
    }
}

/// A submitted query. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    mode: SearchMode,
}

impl Query {
    /// Returns `None` for empty or whitespace-only input
    pub fn new(text: &str, mode: SearchMode) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            mode,
        })
    }

    /// The text exactly as the user typed it
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text used for the answer stream and suggestions
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "type")]
    pub mode: SearchMode,
}

/// One search hit. Only the commonly displayed fields are typed; anything
/// else the backend sends is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "snippet")]
    pub content: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SearchResult {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }
}

/// A successful search response, already normalised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: u64,
    pub elapsed_time: Option<f64>,
    pub keywords: Vec<String>,
}

impl SearchResponse {
    /// Normalise a raw response body.
    ///
    /// A truthy `error` field turns the whole response into
    /// [`ClientError::Backend`]. A missing or non-list `results` becomes an
    /// empty list, entries that are not objects are skipped, and a missing
    /// `count` becomes 0.
    pub fn from_json(body: Value) -> ClientResult<Self> {
        if let Some(error) = body.get("error").filter(|e| is_truthy(e)) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(ClientError::Backend(message));
        }

        let results = match body.get("results") {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value::<SearchResult>(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        };

        let count = body
            .get("count")
            .and_then(|c| c.as_u64().or_else(|| c.as_f64().map(|f| f.max(0.0) as u64)))
            .unwrap_or(0);

        let elapsed_time = body.get("elapsed_time").and_then(Value::as_f64);

        let keywords = match body.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            results,
            count,
            elapsed_time,
            keywords,
        })
    }
}

/// JavaScript-style truthiness, which is how the backend's `error` field
/// has always been interpreted
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Deserialize, Default)]
struct SuggestionResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

/// The request/response side of the search service
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &Query) -> ClientResult<SearchResponse>;

    async fn query_suggestions(&self, query: &str) -> ClientResult<Vec<String>>;
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/search", self.base_url)
    }

    pub fn suggestions_url(&self, query: &str) -> String {
        format!(
            "{}/api/query-suggestions?query={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    pub fn ai_stream_url(&self, query: &str) -> String {
        format!(
            "{}/api/ai-stream?query={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl SearchBackend for ApiClient {
    async fn search(&self, query: &Query) -> ClientResult<SearchResponse> {
        let request = SearchRequest {
            query: query.text(),
            mode: query.mode(),
        };
        debug!(target: "api", "POST {} mode={}", self.search_url(), request.mode);

        let response = self
            .client
            .post(self.search_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!(target: "api", "search response status: {}", status);
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        SearchResponse::from_json(body)
    }

    async fn query_suggestions(&self, query: &str) -> ClientResult<Vec<String>> {
        let response = self.client.get(self.suggestions_url(query)).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "api", "suggestions request failed: {}", status);
            return Err(ClientError::Status(status.as_u16()));
        }

        let body: SuggestionResponse = response.json().await?;
        Ok(body.suggestions)
    }
}
