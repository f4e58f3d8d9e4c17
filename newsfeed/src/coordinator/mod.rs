//! Event-driven driver of a browsing session.
//!
//! User actions are synchronous methods on [`FeedCoordinator`]: they update the
//! owned [`FeedState`] right away and, when the service is involved, spawn a task
//! for the round trip. Finished tasks report back through a channel and are
//! folded into the state by [`FeedCoordinator::next_completion`], one at a time,
//! in arrival order. Nothing is cancelled; a late completion overwrites its slot
//! unless the cart or chat was cleared after it was requested.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use common::{AudioPolicy, Config};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::http::HttpNewsApi;
use crate::api::NewsApi;
use crate::catalog::{CatalogLoader, CatalogSettings};
use crate::error::ApiError;
use crate::chat::{PendingMessage, Submission};
use crate::model::{ArticleId, ArticleKey, CategoryFilter};

pub mod state;

pub use state::{Completion, FeedEvent, FeedState, TaskKind};

pub struct FeedCoordinator {
    state: FeedState,
    api: Arc<dyn NewsApi>,
    loader: CatalogLoader,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl FeedCoordinator {
    pub fn new(api: Arc<dyn NewsApi>, settings: CatalogSettings, audio_policy: AudioPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = FeedState::new(settings.page_size, audio_policy);
        let loader = CatalogLoader::new(api.clone(), settings);
        Self {
            state,
            api,
            loader,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Coordinator talking to the HTTP service named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = HttpNewsApi::from_config(config)?;
        Ok(Self::new(
            Arc::new(api),
            CatalogSettings::from_config(config),
            config.audio_policy(),
        ))
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Number of spawned round trips not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Run `task` and deliver its completion. A task that panics or is cancelled
    /// is reported as [`Completion::Aborted`] so that `in_flight` still drains.
    fn spawn<F>(&mut self, kind: TaskKind, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(e) => {
                    error!("task {:?} failed: {}", kind, e);
                    Completion::Aborted(kind)
                }
            };
            if tx.send(completion).is_err() {
                debug!("coordinator dropped before completion arrived");
            }
        });
    }

    /// Wait for the next finished round trip and apply it.
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<FeedEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        let event = self.state.apply(completion);
        let released = self.state.chat_mut().take_released();
        for message in released {
            self.send(message);
        }
        Some(event)
    }

    /// Apply completions until nothing is in flight, returning the events in order.
    pub async fn settle(&mut self) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_completion().await {
            events.push(event);
        }
        events
    }

    // Catalog

    /// Fetch the page described by the current query.
    pub fn load_news(&mut self) {
        let query = self.state.begin_catalog_load();
        let loader = self.loader.clone();
        self.spawn(TaskKind::Catalog, async move {
            let outcome = loader.try_fetch_page(&query).await;
            Completion::Catalog { query, outcome }
        });
    }

    pub fn set_page(&mut self, page: usize) {
        if self.state.set_page(page) {
            self.load_news();
        }
    }

    /// Advance one page. Returns false when the control is disabled.
    pub fn next_page(&mut self) -> bool {
        if !self.state.can_go_next() {
            return false;
        }
        let page = self.state.query().page + 1;
        self.set_page(page);
        true
    }

    /// Go back one page. Returns false when the control is disabled.
    pub fn previous_page(&mut self) -> bool {
        if !self.state.can_go_previous() {
            return false;
        }
        let page = self.state.query().page - 1;
        self.set_page(page);
        true
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        if self.state.set_search(search) {
            self.load_news();
        }
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        if self.state.set_category(category) {
            self.load_news();
        }
    }

    pub fn open_article(&mut self, id: ArticleId) -> bool {
        self.state.open_article(id).is_some()
    }

    pub fn close_article(&mut self) {
        self.state.close_article();
    }

    // Selection

    pub fn add_to_cart(&mut self, id: ArticleId) -> bool {
        self.state.add_to_cart(id)
    }

    pub fn remove_from_cart(&mut self, id: ArticleId) -> bool {
        self.state.remove_from_cart(id)
    }

    pub fn clear_cart(&mut self) {
        self.state.clear_cart();
    }

    // Derived artifacts

    /// Request one combined summary of `ids`. The slot reads as pending at once.
    pub fn summarize(&mut self, ids: Vec<ArticleId>) {
        info!("Summarizing articles: {:?}", ids);
        self.state.artifacts_mut().begin_summary();
        let generation = self.state.artifacts().generation();
        let api = self.api.clone();
        self.spawn(TaskKind::Summary { generation }, async move {
            let outcome = api.summarize(&ids).await;
            Completion::Summary { generation, outcome }
        });
    }

    pub fn summarize_selection(&mut self) {
        let ids = self.state.selection().ids();
        self.summarize(ids);
    }

    /// Request audio for `ids`; the result is filed per the audio policy.
    pub fn convert_to_audio(&mut self, ids: Vec<ArticleId>) {
        info!("Converting articles to audio: {:?}", ids);
        self.state.artifacts_mut().begin_audio();
        let generation = self.state.artifacts().generation();
        let api = self.api.clone();
        self.spawn(TaskKind::Audio { generation }, async move {
            let outcome = api.audio(&ids).await;
            Completion::Audio {
                generation,
                ids,
                outcome,
            }
        });
    }

    pub fn convert_selection_to_audio(&mut self) {
        let ids = self.state.selection().ids();
        self.convert_to_audio(ids);
    }

    pub fn toggle_playback(&mut self, key: ArticleKey) -> Option<ArticleKey> {
        self.state.artifacts_mut().toggle_playback(key)
    }

    pub fn playback_finished(&mut self) {
        self.state.artifacts_mut().playback_finished();
    }

    pub async fn save_audio(&self, key: ArticleKey, dir: &Path) -> Result<PathBuf> {
        self.state.artifacts().save_audio(key, dir).await
    }

    // Chat

    /// Open the chat dialog about `ids` and establish a session in the background.
    pub fn open_chat(&mut self, ids: Vec<ArticleId>) {
        let subject = self.state.chat_subject(&ids);
        if subject.is_none() && !ids.is_empty() {
            warn!("chat: article {} not found for the header", ids[0]);
        }
        self.state.chat_mut().open(&ids, subject);
        let epoch = self.state.chat().session_epoch();
        let api = self.api.clone();
        self.spawn(TaskKind::ChatOpen { epoch }, async move {
            let outcome = api.open_chat(&ids).await;
            Completion::ChatOpened { epoch, outcome }
        });
    }

    pub fn open_chat_for_selection(&mut self) {
        let ids = self.state.selection().ids();
        self.open_chat(ids);
    }

    /// Reopen the dialog for the last subject, resuming its transcript.
    pub fn show_chat(&mut self) -> bool {
        self.state.chat_mut().show()
    }

    pub fn close_chat(&mut self) {
        self.state.chat_mut().close();
    }

    pub fn clear_chat(&mut self) {
        self.state.chat_mut().clear();
    }

    pub fn set_chat_input(&mut self, text: impl Into<String>) {
        self.state.chat_mut().set_input(text);
    }

    /// Send the composer text. The user turn is visible before this returns.
    /// While a session request is pending the message waits for its id.
    pub fn submit_chat(&mut self) -> bool {
        match self.state.chat_mut().submit() {
            Some(Submission::Send(message)) => {
                self.send(message);
                true
            }
            Some(Submission::Queued) => true,
            None => false,
        }
    }

    fn send(&mut self, message: PendingMessage) {
        let api = self.api.clone();
        self.spawn(TaskKind::ChatReply(message.clone()), send_message(api, message));
    }

    /// Set the composer text and send it.
    pub fn say(&mut self, text: impl Into<String>) -> bool {
        self.set_chat_input(text);
        self.submit_chat()
    }
}

async fn send_message(api: Arc<dyn NewsApi>, message: PendingMessage) -> Completion {
    let (opened, outcome) = match message.chat_id.as_deref() {
        Some(chat_id) => (None, api.continue_chat(chat_id, &message.text).await),
        None => {
            info!("chat: no session, establishing one before sending");
            match api.open_chat(&message.subject_ids).await {
                Ok(chat_id) => {
                    let outcome = api.continue_chat(&chat_id, &message.text).await;
                    (Some(Ok(chat_id)), outcome)
                }
                Err(e) => (Some(Err(e)), Err(ApiError::NoSession)),
            }
        }
    };

    Completion::ChatReply {
        message,
        opened,
        outcome,
    }
}
