use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::model::ArticleId;

/// Logical contract of the remote news service.
///
/// Every operation either yields its payload or an [`crate::error::ApiError`];
/// callers do not distinguish between failure kinds.
#[async_trait::async_trait]
pub trait NewsApi: Send + Sync {
    /// Full catalog retrieval; filtering and paging happen on the client.
    async fn daily_news(&self, query: &NewsQuery) -> ApiResult<Vec<WireArticle>>;

    /// One combined digest over all `ids`.
    async fn summarize(&self, ids: &[ArticleId]) -> ApiResult<String>;

    /// Raw audio bytes narrating all `ids`.
    async fn audio(&self, ids: &[ArticleId]) -> ApiResult<Vec<u8>>;

    /// Establish a chat session about `ids`, returning the session id.
    async fn open_chat(&self, ids: &[ArticleId]) -> ApiResult<String>;

    /// Send `text` within an established session, returning the reply markup.
    async fn continue_chat(&self, chat_id: &str, text: &str) -> ApiResult<String>;
}

/// Body of the catalog request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsQuery {
    pub query_news: String,
    pub query_edge: String,
}

/// Article as the service sends it. Every field except the id is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireArticle {
    pub id: ArticleId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub urls: Option<serde_json::Value>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<serde_json::Value>,
}

/// Scalar JSON value as display text; arrays, objects and null yield `None`.
pub(crate) fn scalar_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub mod http;
