// Catalog loader: one page of articles matching a search term and category
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{scalar_text, NewsApi, NewsQuery, WireArticle};
use crate::error::ApiResult;
use crate::model::{Article, ArticleId, Category, CategoryFilter};

const ELLIPSIS: &str = ".....";

/// Body shown for articles the service sends without content
pub const CONTENT_PLACEHOLDER: &str = "Lorem ipsum dolor sit amet...";

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// 1-based page number
    pub page: usize,
    pub search: String,
    pub category: CategoryFilter,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search: String::new(),
            category: CategoryFilter::All,
        }
    }
}

/// Presentation settings applied when normalizing service articles.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub page_size: usize,
    pub excerpt_chars: usize,
    pub placeholder_image: String,
    pub query: NewsQuery,
}

impl CatalogSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            page_size: config.page_size(),
            excerpt_chars: config.excerpt_chars(),
            placeholder_image: config.placeholder_image(),
            query: NewsQuery {
                query_news: config.query_news().to_string(),
                query_edge: config.query_edge().to_string(),
            },
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            page_size: common::DEFAULT_PAGE_SIZE,
            excerpt_chars: common::DEFAULT_EXCERPT_CHARS,
            placeholder_image: common::DEFAULT_PLACEHOLDER_IMAGE.to_string(),
            query: NewsQuery {
                query_news: common::DEFAULT_QUERY_NEWS.to_string(),
                query_edge: common::DEFAULT_QUERY_EDGE.to_string(),
            },
        }
    }
}

/// Fetches the catalog and applies filtering and paging on the client.
#[derive(Clone)]
pub struct CatalogLoader {
    api: Arc<dyn NewsApi>,
    settings: CatalogSettings,
}

impl CatalogLoader {
    pub fn new(api: Arc<dyn NewsApi>, settings: CatalogSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Like [`CatalogLoader::fetch_page`] but reports the failure instead of hiding it.
    pub async fn try_fetch_page(&self, query: &CatalogQuery) -> ApiResult<Vec<Article>> {
        let wire = self.api.daily_news(&self.settings.query).await?;
        let all: Vec<Article> = wire
            .into_iter()
            .map(|w| normalize(w, &self.settings))
            .collect();
        let page = paginate(filter_articles(all, query), query.page, self.settings.page_size);
        info!(
            "catalog: page {} holds {} articles (search {:?}, category {})",
            query.page,
            page.len(),
            query.search,
            query.category
        );
        Ok(page)
    }

    /// The matching page, or an empty list on any failure.
    pub async fn fetch_page(&self, query: &CatalogQuery) -> Vec<Article> {
        match self.try_fetch_page(query).await {
            Ok(page) => page,
            Err(e) => {
                error!("Fetch News Error: {}", e);
                Vec::new()
            }
        }
    }
}

/// Turn a service article into the presented form.
pub fn normalize(wire: WireArticle, settings: &CatalogSettings) -> Article {
    let image = wire
        .image
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| settings.placeholder_image.clone());
    let body = wire
        .content
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(CONTENT_PLACEHOLDER);
    let content = excerpt(body, settings.excerpt_chars);

    Article {
        id: wire.id,
        title: wire.title.unwrap_or_default(),
        brief: wire.brief.unwrap_or_default(),
        image,
        content,
        author: wire.author.unwrap_or_default(),
        source_url: scalar_text(wire.urls.as_ref()).unwrap_or_default(),
        category: Category::from_label(wire.label.as_deref()),
        published_at: scalar_text(wire.published_at.as_ref()),
        saved: false,
    }
}

/// First `max_chars` characters, with an ellipsis marker when the text was longer.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Keep articles whose title contains `search` (case-insensitive) and whose category matches.
pub fn filter_articles(articles: Vec<Article>, query: &CatalogQuery) -> Vec<Article> {
    let needle = query.search.to_lowercase();
    articles
        .into_iter()
        .filter(|a| a.title.to_lowercase().contains(&needle) && query.category.matches(&a.category))
        .collect()
}

/// Slice `page` (1-based) of `page_size` out of `articles`.
pub fn paginate(articles: Vec<Article>, page: usize, page_size: usize) -> Vec<Article> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    articles.into_iter().skip(start).take(page_size).collect()
}

/// Whether a page with `shown` entries may have a successor.
pub fn has_next_page(shown: usize, page_size: usize) -> bool {
    shown >= page_size
}

/// Ids of `articles`, in order.
pub fn ids_of(articles: &[Article]) -> Vec<ArticleId> {
    articles.iter().map(|a| a.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: ArticleId, title: &str, category: Category) -> Article {
        Article {
            id,
            title: title.to_string(),
            brief: String::new(),
            image: String::new(),
            content: String::new(),
            author: String::new(),
            source_url: String::new(),
            category,
            published_at: None,
            saved: false,
        }
    }

    #[test]
    fn search_is_case_insensitive() {
        let articles = vec![
            article(1, "ai breakthroughs", Category::Aiml),
            article(2, "Ledger news", Category::BlockChain),
        ];
        let query = CatalogQuery {
            search: "AI".to_string(),
            ..Default::default()
        };
        let found = filter_articles(articles, &query);
        assert_eq!(ids_of(&found), vec![1]);
    }

    #[test]
    fn category_filter_applies_after_search() {
        let articles = vec![
            article(1, "Chain of thought", Category::Aiml),
            article(2, "Chain reorgs", Category::BlockChain),
            article(3, "Untagged chain", Category::Unlabeled),
        ];
        let query = CatalogQuery {
            search: "chain".to_string(),
            category: CategoryFilter::Only(Category::BlockChain),
            ..Default::default()
        };
        assert_eq!(ids_of(&filter_articles(articles, &query)), vec![2]);
    }

    #[test]
    fn pagination_slices_fixed_pages() {
        let articles: Vec<Article> = (1..=25)
            .map(|i| article(i, &format!("item {}", i), Category::Aiml))
            .collect();

        let first = paginate(articles.clone(), 1, 10);
        assert_eq!(ids_of(&first), (1..=10).collect::<Vec<_>>());
        assert!(has_next_page(first.len(), 10));

        let third = paginate(articles.clone(), 3, 10);
        assert_eq!(ids_of(&third), (21..=25).collect::<Vec<_>>());
        assert!(!has_next_page(third.len(), 10));

        assert!(paginate(articles.clone(), 4, 10).is_empty());
        // Page 0 is treated as the first page
        assert_eq!(paginate(articles, 0, 10).len(), 10);
    }

    #[test]
    fn excerpt_only_marks_truncated_text() {
        assert_eq!(excerpt("short", 600), "short");
        assert_eq!(excerpt("abcdef", 3), "abc.....");
        // Counts characters, not bytes
        assert_eq!(excerpt("ééééé", 2), "éé.....");
    }

    #[test]
    fn normalize_fills_defaults() {
        let settings = CatalogSettings {
            excerpt_chars: 4,
            ..Default::default()
        };
        let wire = WireArticle {
            id: 9,
            title: Some("Title".to_string()),
            image: Some("".to_string()),
            content: Some("long body text".to_string()),
            urls: Some(serde_json::json!("https://example.com/a")),
            label: Some("AIML".to_string()),
            published_at: Some(serde_json::json!(1714557600)),
            ..Default::default()
        };
        let article = normalize(wire, &settings);
        assert_eq!(article.image, settings.placeholder_image);
        assert_eq!(article.content, "long.....");
        assert_eq!(article.source_url, "https://example.com/a");
        assert_eq!(article.category, Category::Aiml);
        assert_eq!(article.published_at.as_deref(), Some("1714557600"));
        assert_eq!(article.brief, "");
        assert!(!article.saved);
    }

    #[test]
    fn missing_or_blank_content_gets_placeholder() {
        let settings = CatalogSettings::default();
        let absent = normalize(WireArticle { id: 1, ..Default::default() }, &settings);
        assert_eq!(absent.content, CONTENT_PLACEHOLDER);

        let blank = WireArticle {
            id: 2,
            content: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(blank, &settings).content, CONTENT_PLACEHOLDER);
    }
}
