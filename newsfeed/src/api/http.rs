use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{NewsApi, NewsQuery, WireArticle};
use crate::error::{ApiError, ApiResult};
use crate::model::ArticleId;

/// News service client speaking JSON over HTTP
pub struct HttpNewsApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNewsApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Client with an optional transport timeout and user agent.
    pub fn with_options(
        base_url: impl Into<String>,
        timeout_secs: Option<u64>,
        user_agent: Option<&str>,
    ) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder.build()?;
        Ok(Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build from the shared configuration.
    pub fn from_config(config: &common::Config) -> ApiResult<Self> {
        Self::with_options(
            config.api.base_url.clone(),
            config.api.timeout_seconds,
            config.api.user_agent.as_deref(),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Comma-joined id list as the service expects in query strings.
fn join_ids(ids: &[ArticleId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> ApiResult<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait::async_trait]
impl NewsApi for HttpNewsApi {
    async fn daily_news(&self, query: &NewsQuery) -> ApiResult<Vec<WireArticle>> {
        let url = self.endpoint("get_daily_news");
        debug!("POST {}", url);
        let response = self.client.post(&url).json(query).send().await?;
        let body: DailyNewsResponse = read_json(ensure_success(response).await?).await?;

        let entries = body
            .articles
            .ok_or_else(|| ApiError::Payload("Articles not found in response".to_string()))?;
        Ok(parse_articles(entries))
    }

    async fn summarize(&self, ids: &[ArticleId]) -> ApiResult<String> {
        let url = self.endpoint("summarize");
        debug!("GET {} ({} ids)", url, ids.len());
        let response = self
            .client
            .get(&url)
            .query(&[("urls", join_ids(ids))])
            .send()
            .await?;
        let body: SummaryResponse = read_json(ensure_success(response).await?).await?;

        match body.summary {
            Some(summary) if !summary.is_empty() => Ok(summary),
            _ => Err(ApiError::Payload(
                "Invalid response format from API".to_string(),
            )),
        }
    }

    async fn audio(&self, ids: &[ArticleId]) -> ApiResult<Vec<u8>> {
        let url = self.endpoint("get_audio");
        debug!("POST {} ({} ids)", url, ids.len());
        let response = self
            .client
            .post(&url)
            .json(&AudioRequest { urls: ids })
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn open_chat(&self, ids: &[ArticleId]) -> ApiResult<String> {
        let url = self.endpoint("chat");
        debug!("GET {} ({} ids)", url, ids.len());
        let response = self
            .client
            .get(&url)
            .query(&[("urls", join_ids(ids))])
            .send()
            .await?;
        let body: ChatOpenResponse = read_json(ensure_success(response).await?).await?;

        super::scalar_text(body.chat_id.as_ref())
            .ok_or_else(|| ApiError::Payload("chat_id missing from response".to_string()))
    }

    async fn continue_chat(&self, chat_id: &str, text: &str) -> ApiResult<String> {
        if chat_id.trim().is_empty() {
            return Err(ApiError::NoSession);
        }
        let url = self.endpoint("continue_chat");
        debug!("POST {} (session {})", url, chat_id);
        let response = self
            .client
            .post(&url)
            .json(&ContinueChatRequest { chat_id, text })
            .send()
            .await?;
        let body: ContinueChatResponse = read_json(ensure_success(response).await?).await?;

        body.response
            .ok_or_else(|| ApiError::Payload("response missing from chat reply".to_string()))
    }
}

// Service request/response structures
#[derive(Debug, Deserialize)]
struct DailyNewsResponse {
    #[serde(rename = "Articles")]
    articles: Option<Vec<serde_json::Value>>,
}

/// Entries that do not form an article are skipped so one bad record cannot empty the page.
fn parse_articles(entries: Vec<serde_json::Value>) -> Vec<WireArticle> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<WireArticle>(entry) {
            Ok(article) => Some(article),
            Err(e) => {
                warn!("catalog: skipping article entry {}: {}", index, e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: Option<String>,
}

#[derive(Debug, Serialize)]
struct AudioRequest<'a> {
    urls: &'a [ArticleId],
}

#[derive(Debug, Deserialize)]
struct ChatOpenResponse {
    // Some deployments send a numeric id
    chat_id: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ContinueChatRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContinueChatResponse {
    response: Option<String>,
}
