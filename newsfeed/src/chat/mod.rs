use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::model::{Article, ArticleId, ArticleKey};

pub mod render;

pub use render::{RenderTarget, RichText};

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// User text is kept verbatim; assistant replies go through the rich-text renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnContent {
    Plain(String),
    Rich(RichText),
}

impl TurnContent {
    /// The text as it was typed or received.
    pub fn source(&self) -> &str {
        match self {
            TurnContent::Plain(text) => text,
            TurnContent::Rich(rich) => &rich.source,
        }
    }

    pub fn render(&self, target: RenderTarget) -> String {
        match (self, target) {
            (TurnContent::Plain(text), RenderTarget::Plain) => text.clone(),
            (TurnContent::Plain(text), RenderTarget::Html) => {
                render::RichText {
                    source: text.clone(),
                    blocks: vec![render::Block::Paragraph(vec![render::Inline::Text(text.clone())])],
                }
                .to_html()
            }
            (TurnContent::Rich(rich), target) => rich.render(target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Plain(text.into()),
            at: Utc::now(),
        }
    }

    pub fn assistant(markup: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Rich(RichText::parse(markup)),
            at: Utc::now(),
        }
    }
}

/// A submitted message waiting for its round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Transcript the reply belongs to
    pub key: ArticleKey,
    pub text: String,
    /// Session to continue; `None` when one must be established first
    pub chat_id: Option<String>,
    pub subject_ids: Vec<ArticleId>,
    /// Session request the message was issued under
    pub session_epoch: u64,
    /// Transcript generation; a clear makes older replies stale
    pub generation: u64,
}

/// Progress of the server-side session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// A session request is in flight; messages wait for its id
    Opening,
    Active(String),
}

/// What happened to a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Must be sent now. Without a chat id the sender establishes a session first.
    Send(PendingMessage),
    /// Held until the pending session request resolves.
    Queued,
}

/// Conversation about one or more selected articles.
///
/// Transcripts are kept per subject so that reopening the same article resumes
/// where it left off. At most one session request is in flight at a time;
/// messages typed meanwhile are queued and released once its id arrives.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    key: Option<ArticleKey>,
    subject_ids: Vec<ArticleId>,
    subject: Option<Article>,
    session: SessionState,
    session_epoch: u64,
    generation: u64,
    queued: Vec<PendingMessage>,
    released: Vec<PendingMessage>,
    transcripts: HashMap<ArticleKey, Vec<Turn>>,
    input: String,
    dialog_open: bool,
    revision: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the dialog about `ids`; `subject` is the article shown in the header.
    /// The caller requests a session tagged with [`ChatSession::session_epoch`].
    pub fn open(&mut self, ids: &[ArticleId], subject: Option<Article>) -> ArticleKey {
        let key = ids
            .first()
            .map(|id| ArticleKey::Article(*id))
            .unwrap_or(ArticleKey::Aggregate);
        self.key = Some(key);
        self.subject_ids = ids.to_vec();
        self.subject = subject;
        self.session = SessionState::Opening;
        self.session_epoch = self.session_epoch.wrapping_add(1);
        if !self.queued.is_empty() {
            warn!("chat: dropping {} unsent messages for the previous subject", self.queued.len());
            self.queued.clear();
        }
        self.dialog_open = true;
        self.touch();
        key
    }

    /// Record the outcome of the session request issued under `epoch`.
    /// Results of superseded requests, and ids arriving once a session is active,
    /// are ignored and yield false.
    pub fn session_established<E: fmt::Display>(
        &mut self,
        epoch: u64,
        outcome: std::result::Result<String, E>,
    ) -> bool {
        if epoch != self.session_epoch {
            debug!("chat: ignoring session result of superseded request {}", epoch);
            return false;
        }
        if self.session != SessionState::Opening {
            debug!("chat: session already settled, ignoring late result");
            return false;
        }
        match outcome {
            Ok(chat_id) => {
                info!(
                    "chat: session {} established for {} articles",
                    chat_id,
                    self.subject_ids.len()
                );
                for mut message in self.queued.drain(..) {
                    message.chat_id = Some(chat_id.clone());
                    self.released.push(message);
                }
                self.session = SessionState::Active(chat_id);
            }
            Err(e) => {
                error!("Error initializing chat: {}", e);
                if !self.queued.is_empty() {
                    error!("chat: {} queued messages not sent", self.queued.len());
                    self.queued.clear();
                }
                self.session = SessionState::Idle;
            }
        }
        true
    }

    /// Messages whose session became available, ready to be sent.
    pub fn take_released(&mut self) -> Vec<PendingMessage> {
        std::mem::take(&mut self.released)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Take the composer text and append it as a user turn.
    /// The composer is emptied before any network traffic.
    /// Returns `None` when nothing was submitted.
    pub fn submit(&mut self) -> Option<Submission> {
        let text = std::mem::take(&mut self.input);
        let Some(key) = self.key else {
            warn!("chat: message submitted with no chat open");
            return None;
        };
        if text.trim().is_empty() {
            return None;
        }
        self.transcripts
            .entry(key)
            .or_default()
            .push(Turn::user(text.clone()));
        self.touch();

        let mut message = PendingMessage {
            key,
            text,
            chat_id: None,
            subject_ids: self.subject_ids.clone(),
            session_epoch: self.session_epoch,
            generation: self.generation,
        };
        match &self.session {
            SessionState::Active(chat_id) => {
                message.chat_id = Some(chat_id.clone());
                Some(Submission::Send(message))
            }
            SessionState::Opening => {
                debug!("chat: session pending, queueing message");
                self.queued.push(message);
                Some(Submission::Queued)
            }
            SessionState::Idle => {
                self.session = SessionState::Opening;
                Some(Submission::Send(message))
            }
        }
    }

    /// Whether a reply issued under `generation` still belongs to the transcripts.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Append the assistant reply for `key`; failures leave the transcript as is.
    pub fn append_reply<E: fmt::Display>(
        &mut self,
        key: ArticleKey,
        outcome: std::result::Result<String, E>,
    ) {
        match outcome {
            Ok(markup) => {
                self.transcripts
                    .entry(key)
                    .or_default()
                    .push(Turn::assistant(&markup));
                self.touch();
            }
            Err(e) => error!("Error in chat: {}", e),
        }
    }

    /// Empty the transcripts and composer and forget the session.
    /// The subject stays, so the next message establishes a fresh session.
    pub fn clear(&mut self) {
        self.transcripts.clear();
        self.input.clear();
        self.queued.clear();
        self.released.clear();
        self.session = SessionState::Idle;
        self.session_epoch = self.session_epoch.wrapping_add(1);
        self.generation = self.generation.wrapping_add(1);
        self.touch();
        info!("Chat cleared");
    }

    /// Hide the dialog, keeping everything else.
    pub fn close(&mut self) {
        self.dialog_open = false;
    }

    /// Show the dialog again for the last subject without a new session.
    /// Returns false when no chat was ever opened.
    pub fn show(&mut self) -> bool {
        if self.key.is_none() {
            return false;
        }
        self.dialog_open = true;
        self.touch();
        true
    }

    /// Tear everything down. Results of earlier requests become stale.
    pub fn reset(&mut self) {
        let (revision, epoch, generation) = (self.revision, self.session_epoch, self.generation);
        *self = Self::default();
        self.revision = revision;
        self.session_epoch = epoch.wrapping_add(1);
        self.generation = generation.wrapping_add(1);
        self.touch();
    }

    pub fn is_open(&self) -> bool {
        self.dialog_open
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_epoch(&self) -> u64 {
        self.session_epoch
    }

    pub fn chat_id(&self) -> Option<&str> {
        match &self.session {
            SessionState::Active(chat_id) => Some(chat_id),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&Article> {
        self.subject.as_ref()
    }

    pub fn subject_ids(&self) -> &[ArticleId] {
        &self.subject_ids
    }

    /// Dialog header text.
    pub fn header(&self) -> Option<String> {
        self.subject.as_ref().map(|a| format!("Chat: {}", a.title))
    }

    /// Transcript of the current subject.
    pub fn transcript(&self) -> &[Turn] {
        self.key
            .and_then(|k| self.transcripts.get(&k))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transcript_for(&self, key: ArticleKey) -> &[Turn] {
        self.transcripts.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_transcripts(&self) -> bool {
        self.transcripts.values().any(|t| !t.is_empty())
    }

    /// Bumped on every transcript or dialog change; views scroll when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Index of the turn the view must scroll to.
    pub fn scroll_target(&self) -> Option<usize> {
        self.transcript().len().checked_sub(1)
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
