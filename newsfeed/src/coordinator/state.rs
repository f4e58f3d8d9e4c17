use common::AudioPolicy;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactCache;
use crate::catalog::{has_next_page, CatalogQuery};
use crate::chat::{ChatSession, PendingMessage};
use crate::error::ApiResult;
use crate::model::{Article, ArticleId, ArticleKey, CategoryFilter};
use crate::selection::SelectionSet;

/// Round trip a spawned task was performing, kept so that a task which never
/// reports can still be accounted for.
#[derive(Debug, Clone)]
pub enum TaskKind {
    Catalog,
    Summary { generation: u64 },
    Audio { generation: u64 },
    ChatOpen { epoch: u64 },
    ChatReply(PendingMessage),
}

/// Result of a network task, delivered back to the owner of [`FeedState`].
#[derive(Debug)]
pub enum Completion {
    Catalog {
        query: CatalogQuery,
        outcome: ApiResult<Vec<Article>>,
    },
    Summary {
        generation: u64,
        outcome: ApiResult<String>,
    },
    Audio {
        generation: u64,
        ids: Vec<ArticleId>,
        outcome: ApiResult<Vec<u8>>,
    },
    ChatOpened {
        epoch: u64,
        outcome: ApiResult<String>,
    },
    ChatReply {
        message: PendingMessage,
        /// Session request made on the way, when the message had no session
        opened: Option<ApiResult<String>>,
        outcome: ApiResult<String>,
    },
    /// The task panicked or was cancelled before reporting.
    Aborted(TaskKind),
}

/// What applying a [`Completion`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    CatalogLoaded { count: usize },
    CatalogFailed(String),
    SummaryUpdated,
    AudioReady(ArticleKey),
    AudioFailed,
    ChatReady(String),
    ChatFailed,
    ReplyAppended(ArticleKey),
    ReplyFailed(ArticleKey),
    /// The result belonged to state that has since been cleared or superseded.
    Stale,
    TaskAborted,
}

const ABORTED: &str = "request aborted";

/// All state of one browsing session, owned by a single coordinator.
#[derive(Debug, Clone)]
pub struct FeedState {
    query: CatalogQuery,
    articles: Vec<Article>,
    catalog_in_flight: usize,
    catalog_error: Option<String>,
    selection: SelectionSet,
    artifacts: ArtifactCache,
    chat: ChatSession,
    detail: Option<ArticleId>,
    page_size: usize,
    audio_policy: AudioPolicy,
}

impl FeedState {
    pub fn new(page_size: usize, audio_policy: AudioPolicy) -> Self {
        Self {
            query: CatalogQuery::default(),
            articles: Vec::new(),
            catalog_in_flight: 0,
            catalog_error: None,
            selection: SelectionSet::new(),
            artifacts: ArtifactCache::new(),
            chat: ChatSession::new(),
            detail: None,
            page_size: page_size.max(1),
            audio_policy,
        }
    }

    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn article(&self, id: ArticleId) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn artifacts(&self) -> &ArtifactCache {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut ArtifactCache {
        &mut self.artifacts
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatSession {
        &mut self.chat
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn audio_policy(&self) -> AudioPolicy {
        self.audio_policy
    }

    pub fn catalog_error(&self) -> Option<&str> {
        self.catalog_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.catalog_in_flight > 0
    }

    /// A catalog load or an audio conversion is in flight.
    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.artifacts.is_converting()
    }

    pub fn can_go_previous(&self) -> bool {
        self.query.page > 1 && !self.is_busy()
    }

    pub fn can_go_next(&self) -> bool {
        has_next_page(self.articles.len(), self.page_size) && !self.is_busy()
    }

    // Query changes. Each returns whether a reload is needed.

    pub fn set_page(&mut self, page: usize) -> bool {
        let page = page.max(1);
        if page == self.query.page {
            return false;
        }
        self.query.page = page;
        true
    }

    pub fn set_search(&mut self, search: impl Into<String>) -> bool {
        let search = search.into();
        if search == self.query.search {
            return false;
        }
        self.query.search = search;
        true
    }

    /// Switch category and return to the first page.
    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        if category == self.query.category {
            return false;
        }
        self.query.category = category;
        self.query.page = 1;
        true
    }

    pub(crate) fn begin_catalog_load(&mut self) -> CatalogQuery {
        self.catalog_in_flight += 1;
        self.query.clone()
    }

    // Selection

    /// Mark the visible article `id` saved and add it to the selection.
    pub fn add_to_cart(&mut self, id: ArticleId) -> bool {
        let Some(article) = self.articles.iter_mut().find(|a| a.id == id) else {
            error!("cart: article {} is not on the current page", id);
            return false;
        };
        self.selection.add(article)
    }

    /// Unmark `id` and drop it from the selection.
    pub fn remove_from_cart(&mut self, id: ArticleId) -> bool {
        match self.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => self.selection.remove(article),
            None => self.selection.remove_id(id).is_some(),
        }
    }

    /// Empty the selection and drop every derived artifact and the chat.
    pub fn clear_cart(&mut self) {
        let removed = self.selection.clear();
        for article in &mut self.articles {
            article.saved = false;
        }
        self.artifacts.clear();
        self.chat.reset();
        info!("cart: cleared {} articles", removed.len());
    }

    /// Every visible article is saved exactly when it is selected, and every
    /// selected article carries the saved flag.
    pub fn selection_consistent(&self) -> bool {
        self.articles
            .iter()
            .all(|a| a.saved == self.selection.contains(a.id))
            && self.selection.articles().iter().all(|a| a.saved)
    }

    // Detail view

    pub fn open_article(&mut self, id: ArticleId) -> Option<&Article> {
        if self.article(id).is_none() {
            return None;
        }
        self.detail = Some(id);
        self.article(id)
    }

    pub fn close_article(&mut self) {
        self.detail = None;
    }

    pub fn detail(&self) -> Option<&Article> {
        self.detail.and_then(|id| self.article(id))
    }

    /// Subject of a chat about `ids`: the first id, from the selection or the page.
    pub fn chat_subject(&self, ids: &[ArticleId]) -> Option<Article> {
        let first = *ids.first()?;
        self.selection
            .get(first)
            .or_else(|| self.article(first))
            .cloned()
    }

    /// Fold a finished network task into the state.
    pub fn apply(&mut self, completion: Completion) -> FeedEvent {
        match completion {
            Completion::Catalog { query, outcome } => {
                self.catalog_in_flight = self.catalog_in_flight.saturating_sub(1);
                match outcome {
                    Ok(mut page) => {
                        for article in &mut page {
                            article.saved = self.selection.contains(article.id);
                        }
                        info!("catalog: showing {} articles for page {}", page.len(), query.page);
                        self.articles = page;
                        self.catalog_error = None;
                        if self.detail.is_some() && self.detail().is_none() {
                            self.detail = None;
                        }
                        FeedEvent::CatalogLoaded {
                            count: self.articles.len(),
                        }
                    }
                    Err(e) => {
                        error!("Fetch News Error: {}", e);
                        let message = e.to_string();
                        self.catalog_error = Some(message.clone());
                        FeedEvent::CatalogFailed(message)
                    }
                }
            }
            Completion::Summary { generation, outcome } => {
                if generation != self.artifacts.generation() {
                    debug!("summary: dropping result requested before the cart was cleared");
                    return FeedEvent::Stale;
                }
                self.artifacts.finish_summary(outcome);
                FeedEvent::SummaryUpdated
            }
            Completion::Audio {
                generation,
                ids,
                outcome,
            } => {
                if generation != self.artifacts.generation() {
                    debug!("audio: dropping result requested before the cart was cleared");
                    return FeedEvent::Stale;
                }
                match self.artifacts.finish_audio(&ids, self.audio_policy, outcome) {
                    Some(key) => FeedEvent::AudioReady(key),
                    None => FeedEvent::AudioFailed,
                }
            }
            Completion::ChatOpened { epoch, outcome } => {
                let ok = outcome.as_ref().ok().cloned();
                if !self.chat.session_established(epoch, outcome) {
                    return FeedEvent::Stale;
                }
                match ok {
                    Some(id) => FeedEvent::ChatReady(id),
                    None => FeedEvent::ChatFailed,
                }
            }
            Completion::ChatReply {
                message,
                opened,
                outcome,
            } => {
                if let Some(opened) = opened {
                    self.chat.session_established(message.session_epoch, opened);
                }
                if !self.chat.is_current(message.generation) {
                    debug!("chat: dropping reply for a cleared transcript");
                    return FeedEvent::Stale;
                }
                let key = message.key;
                let ok = outcome.is_ok();
                self.chat.append_reply(key, outcome);
                if ok {
                    FeedEvent::ReplyAppended(key)
                } else {
                    FeedEvent::ReplyFailed(key)
                }
            }
            Completion::Aborted(kind) => {
                warn!("task {:?} ended without a result", kind);
                match kind {
                    TaskKind::Catalog => {
                        self.catalog_in_flight = self.catalog_in_flight.saturating_sub(1);
                        self.catalog_error = Some(ABORTED.to_string());
                    }
                    TaskKind::Summary { generation } => {
                        if generation == self.artifacts.generation() {
                            self.artifacts.finish_summary::<&str>(Err(ABORTED));
                        }
                    }
                    TaskKind::Audio { generation } => {
                        if generation == self.artifacts.generation() {
                            self.artifacts
                                .finish_audio::<&str>(&[], self.audio_policy, Err(ABORTED));
                        }
                    }
                    TaskKind::ChatOpen { epoch } => {
                        self.chat.session_established::<&str>(epoch, Err(ABORTED));
                    }
                    TaskKind::ChatReply(message) => {
                        if message.chat_id.is_none() {
                            self.chat
                                .session_established::<&str>(message.session_epoch, Err(ABORTED));
                        }
                    }
                }
                FeedEvent::TaskAborted
            }
        }
    }
}
