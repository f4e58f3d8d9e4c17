/*!
common/src/lib.rs

Shared configuration types for the newsfeed front-end.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Accessors resolving optional settings to their defaults
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_EXCERPT_CHARS: usize = 600;
pub const DEFAULT_QUERY_NEWS: &str = "ml";
pub const DEFAULT_QUERY_EDGE: &str = "aiml";
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://www.sandipuniversity.edu.in/computer-science/images/header/BTech-CSE-with-specialisation-Artificial-Intelligence-and-Machine-Learning.jpg";

/// Remote news service section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root of the news service (e.g. "http://127.0.0.1:5000")
    pub base_url: String,
    /// Transport timeout handed to the HTTP client. Absent means no timeout.
    pub timeout_seconds: Option<u64>,
    pub query_news: Option<String>,
    pub query_edge: Option<String>,
    pub user_agent: Option<String>,
}

/// Catalog presentation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: Option<usize>,
    pub excerpt_chars: Option<usize>,
    pub placeholder_image: Option<String>,
}

/// Where a batch audio conversion files its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPolicy {
    /// Filed under the last id of the batch only.
    #[default]
    LastMember,
    /// Filed under the aggregate key, like the summary.
    Aggregate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    pub policy: Option<AudioPolicy>,
    pub download_dir: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub feed: Option<FeedConfig>,
    pub audio: Option<AudioConfig>,
}

impl Config {
    /// Build a configuration pointing at `base_url` with every other setting defaulted.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeout_seconds: None,
                query_news: None,
                query_edge: None,
                user_agent: None,
            },
            feed: None,
            audio: None,
        }
    }

    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the front-end cannot work with.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must use http or https, got {}", parsed.scheme());
        }
        if self.page_size() == 0 {
            anyhow::bail!("feed.page_size must be at least 1");
        }
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.feed
            .as_ref()
            .and_then(|f| f.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn excerpt_chars(&self) -> usize {
        self.feed
            .as_ref()
            .and_then(|f| f.excerpt_chars)
            .unwrap_or(DEFAULT_EXCERPT_CHARS)
    }

    pub fn placeholder_image(&self) -> String {
        self.feed
            .as_ref()
            .and_then(|f| f.placeholder_image.clone())
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_IMAGE.to_string())
    }

    pub fn query_news(&self) -> &str {
        self.api.query_news.as_deref().unwrap_or(DEFAULT_QUERY_NEWS)
    }

    pub fn query_edge(&self) -> &str {
        self.api.query_edge.as_deref().unwrap_or(DEFAULT_QUERY_EDGE)
    }

    pub fn audio_policy(&self) -> AudioPolicy {
        self.audio
            .as_ref()
            .and_then(|a| a.policy)
            .unwrap_or_default()
    }

    pub fn download_dir(&self) -> String {
        self.audio
            .as_ref()
            .and_then(|a| a.download_dir.clone())
            .unwrap_or_else(|| ".".to_string())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
