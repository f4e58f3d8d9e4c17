use crate::model::{Article, ArticleId};

/// Ordered, id-unique set of articles the user marked ("cart").
///
/// Members always carry `saved == true`; callers mirror the flag onto any other
/// copy of the article they hold.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    items: Vec<Article>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `article` saved and append it unless its id is already present.
    /// Returns whether the set grew.
    pub fn add(&mut self, article: &mut Article) -> bool {
        article.saved = true;
        if self.contains(article.id) {
            return false;
        }
        self.items.push(article.clone());
        true
    }

    /// Mark `article` unsaved and drop the member with its id.
    /// Returns whether a member was removed.
    pub fn remove(&mut self, article: &mut Article) -> bool {
        article.saved = false;
        self.remove_id(article.id).is_some()
    }

    /// Drop the member with `id`, returning it with `saved` cleared.
    pub fn remove_id(&mut self, id: ArticleId) -> Option<Article> {
        let pos = self.items.iter().position(|a| a.id == id)?;
        let mut removed = self.items.remove(pos);
        removed.saved = false;
        Some(removed)
    }

    /// Empty the set, returning the former members with `saved` cleared.
    pub fn clear(&mut self) -> Vec<Article> {
        let mut drained: Vec<Article> = self.items.drain(..).collect();
        for article in &mut drained {
            article.saved = false;
        }
        drained
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.items.iter().any(|a| a.id == id)
    }

    pub fn get(&self, id: ArticleId) -> Option<&Article> {
        self.items.iter().find(|a| a.id == id)
    }

    /// Member ids in insertion order.
    pub fn ids(&self) -> Vec<ArticleId> {
        self.items.iter().map(|a| a.id).collect()
    }

    pub fn articles(&self) -> &[Article] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn article(id: ArticleId) -> Article {
        Article {
            id,
            title: format!("article {}", id),
            brief: String::new(),
            image: String::new(),
            content: String::new(),
            author: String::new(),
            source_url: String::new(),
            category: Category::Aiml,
            published_at: None,
            saved: false,
        }
    }

    #[test]
    fn add_is_idempotent_by_id() {
        let mut set = SelectionSet::new();
        let mut a = article(1);
        assert!(set.add(&mut a));
        assert!(a.saved);

        let mut again = article(1);
        assert!(!set.add(&mut again));
        assert!(again.saved);
        assert_eq!(set.len(), 1);
        assert!(set.articles().iter().all(|a| a.saved));
    }

    #[test]
    fn remove_clears_flag_and_membership() {
        let mut set = SelectionSet::new();
        let mut a = article(1);
        let mut b = article(2);
        set.add(&mut a);
        set.add(&mut b);

        assert!(set.remove(&mut a));
        assert!(!a.saved);
        assert!(!set.contains(1));
        assert_eq!(set.ids(), vec![2]);

        // Removing a non-member still clears the flag
        let mut c = article(3);
        c.saved = true;
        assert!(!set.remove(&mut c));
        assert!(!c.saved);
    }

    #[test]
    fn clear_returns_unsaved_members_in_order() {
        let mut set = SelectionSet::new();
        for id in [3, 1, 2] {
            set.add(&mut article(id));
        }
        assert_eq!(set.ids(), vec![3, 1, 2]);

        let drained = set.clear();
        assert!(set.is_empty());
        assert_eq!(drained.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 1, 2]);
        assert!(drained.iter().all(|a| !a.saved));
    }
}
