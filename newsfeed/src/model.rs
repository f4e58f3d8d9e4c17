use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable article identity assigned by the news service.
pub type ArticleId = i64;

/// Key of a derived artifact: one article, or the whole selection as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArticleKey {
    Article(ArticleId),
    Aggregate,
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleKey::Article(id) => write!(f, "{}", id),
            ArticleKey::Aggregate => f.write_str("aggregate"),
        }
    }
}

impl FromStr for ArticleKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("aggregate") {
            Ok(ArticleKey::Aggregate)
        } else {
            s.parse().map(ArticleKey::Article)
        }
    }
}

impl From<ArticleId> for ArticleKey {
    fn from(id: ArticleId) -> Self {
        ArticleKey::Article(id)
    }
}

/// Category label carried by an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Aiml,
    BlockChain,
    /// A label outside the known set, kept verbatim.
    Other(String),
    Unlabeled,
}

impl Category {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") => Category::Unlabeled,
            Some("AIML") => Category::Aiml,
            Some("Block Chain") => Category::BlockChain,
            Some(other) => Category::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Aiml => "AIML",
            Category::BlockChain => "Block Chain",
            Category::Other(label) => label,
            Category::Unlabeled => "",
        }
    }
}

/// Category selector of the catalog: everything, or one category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(Category::from_label(Some(s))))
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(c) => f.write_str(c.label()),
        }
    }
}

/// A news item as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub brief: String,
    /// Image locator, placeholder when the service sent none
    pub image: String,
    /// Excerpt of the body, ellipsis-terminated when it was cut
    pub content: String,
    pub author: String,
    pub source_url: String,
    pub category: Category,
    pub published_at: Option<String>,
    pub saved: bool,
}

impl Article {
    /// Publication time, when the service sent one in RFC 3339 or RFC 2822 form.
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.published_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip_known_values() {
        assert_eq!(Category::from_label(Some("AIML")), Category::Aiml);
        assert_eq!(Category::from_label(Some("Block Chain")), Category::BlockChain);
        assert_eq!(Category::from_label(None), Category::Unlabeled);
        assert_eq!(Category::from_label(Some("  ")), Category::Unlabeled);
        assert_eq!(
            Category::from_label(Some("AR-VR")),
            Category::Other("AR-VR".to_string())
        );
        assert_eq!(Category::BlockChain.label(), "Block Chain");
    }

    #[test]
    fn category_filter_parsing_and_matching() {
        let all: CategoryFilter = "All".parse().unwrap();
        assert!(all.matches(&Category::Unlabeled));

        let aiml: CategoryFilter = "AIML".parse().unwrap();
        assert!(aiml.matches(&Category::Aiml));
        assert!(!aiml.matches(&Category::BlockChain));
        assert_eq!(aiml.to_string(), "AIML");
    }

    #[test]
    fn article_key_parses_ids_and_aggregate() {
        assert_eq!("6".parse::<ArticleKey>().unwrap(), ArticleKey::Article(6));
        assert_eq!("aggregate".parse::<ArticleKey>().unwrap(), ArticleKey::Aggregate);
        assert!("six".parse::<ArticleKey>().is_err());
        assert_eq!(ArticleKey::Article(6).to_string(), "6");
    }

    #[test]
    fn published_parses_rfc3339_and_rfc2822() {
        let mut article = Article {
            id: 1,
            title: String::new(),
            brief: String::new(),
            image: String::new(),
            content: String::new(),
            author: String::new(),
            source_url: String::new(),
            category: Category::Unlabeled,
            published_at: Some("2024-05-01T10:00:00Z".to_string()),
            saved: false,
        };
        assert!(article.published().is_some());

        article.published_at = Some("Wed, 01 May 2024 10:00:00 +0000".to_string());
        assert!(article.published().is_some());

        article.published_at = Some("yesterday".to_string());
        assert!(article.published().is_none());
    }
}
