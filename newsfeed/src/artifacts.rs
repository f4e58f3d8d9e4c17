// Derived artifacts: combined summary, audio handles and the audio status line
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::AudioPolicy;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::{ArticleId, ArticleKey};

pub const SUMMARY_PENDING: &str = "Summarizing...";
pub const AUDIO_PENDING: &str = "Converting to audio...";
pub const AUDIO_FAILED: &str = "Error occurred while converting to audio.";

// Bitrate assumed when estimating how long a clip plays
const ASSUMED_BITRATE_BPS: u64 = 128_000;

/// State of the aggregate summary slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SummarySlot {
    #[default]
    Empty,
    Pending,
    Ready(String),
    Failed(String),
}

impl SummarySlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, SummarySlot::Pending)
    }

    /// Text shown for the slot, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            SummarySlot::Empty => None,
            SummarySlot::Pending => Some(SUMMARY_PENDING),
            SummarySlot::Ready(text) | SummarySlot::Failed(text) => Some(text),
        }
    }
}

impl fmt::Display for SummarySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text().unwrap_or_default())
    }
}

/// Aggregate indicator of audio conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioStatus {
    #[default]
    Idle,
    Converting,
    Failed(String),
}

impl AudioStatus {
    pub fn text(&self) -> Option<&str> {
        match self {
            AudioStatus::Idle => None,
            AudioStatus::Converting => Some(AUDIO_PENDING),
            AudioStatus::Failed(message) => Some(message),
        }
    }
}

/// Playable audio produced by one conversion. Each conversion yields a fresh handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub id: Uuid,
    pub mime: &'static str,
    data: Arc<[u8]>,
}

impl AudioHandle {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime: "audio/mpeg",
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rough playing time of the clip, never under one second.
    pub fn estimated_duration(&self) -> Duration {
        let millis = self.data.len() as u64 * 8 * 1000 / ASSUMED_BITRATE_BPS;
        Duration::from_millis(millis.max(1000))
    }
}

/// File name used when saving the audio artifact of `key`.
pub fn audio_file_name(key: ArticleKey) -> String {
    format!("article_{}_audio.mp3", key)
}

/// Per-selection derived values obtained from the news service.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    summary: SummarySlot,
    audio: HashMap<ArticleKey, AudioHandle>,
    audio_status: AudioStatus,
    playing: Option<ArticleKey>,
    generation: u64,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &SummarySlot {
        &self.summary
    }

    /// Moves on every [`ArtifactCache::clear`]; results requested before a clear are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn begin_summary(&mut self) {
        self.summary = SummarySlot::Pending;
    }

    pub fn finish_summary<E: fmt::Display>(&mut self, outcome: std::result::Result<String, E>) {
        self.summary = match outcome {
            Ok(text) => SummarySlot::Ready(text),
            Err(e) => {
                error!("Error summarizing articles: {}", e);
                SummarySlot::Failed(format!(
                    "Error occurred while summarizing articles: {}",
                    e
                ))
            }
        };
    }

    pub fn audio_status(&self) -> &AudioStatus {
        &self.audio_status
    }

    pub fn is_converting(&self) -> bool {
        self.audio_status == AudioStatus::Converting
    }

    pub fn begin_audio(&mut self) {
        self.audio_status = AudioStatus::Converting;
    }

    /// File the result of converting `ids` according to `policy`.
    /// Returns the key the handle was filed under.
    pub fn finish_audio<E: fmt::Display>(
        &mut self,
        ids: &[ArticleId],
        policy: AudioPolicy,
        outcome: std::result::Result<Vec<u8>, E>,
    ) -> Option<ArticleKey> {
        match outcome {
            Ok(data) => {
                let key = match policy {
                    AudioPolicy::LastMember => match ids.last() {
                        Some(id) => ArticleKey::Article(*id),
                        None => ArticleKey::Aggregate,
                    },
                    AudioPolicy::Aggregate => ArticleKey::Aggregate,
                };
                let handle = AudioHandle::new(data);
                info!("audio: {} bytes filed under {}", handle.len(), key);
                self.audio.insert(key, handle);
                self.audio_status = AudioStatus::Idle;
                Some(key)
            }
            Err(e) => {
                error!("Error converting to audio: {}", e);
                self.audio_status = AudioStatus::Failed(AUDIO_FAILED.to_string());
                None
            }
        }
    }

    pub fn audio(&self, key: ArticleKey) -> Option<&AudioHandle> {
        self.audio.get(&key)
    }

    /// Keys that currently hold an audio handle.
    pub fn audio_keys(&self) -> Vec<ArticleKey> {
        let mut keys: Vec<ArticleKey> = self.audio.keys().copied().collect();
        keys.sort_by_key(|k| match k {
            ArticleKey::Article(id) => (0, *id),
            ArticleKey::Aggregate => (1, 0),
        });
        keys
    }

    pub fn playing(&self) -> Option<ArticleKey> {
        self.playing
    }

    /// Start playing `key`, or stop it if it is the one playing.
    /// Returns the key now playing.
    pub fn toggle_playback(&mut self, key: ArticleKey) -> Option<ArticleKey> {
        if self.playing == Some(key) {
            self.playing = None;
        } else if self.audio.contains_key(&key) {
            self.playing = Some(key);
        } else {
            error!("No audio message found for article ID: {}", key);
        }
        self.playing
    }

    pub fn playback_finished(&mut self) {
        self.playing = None;
    }

    /// Write the audio of `key` into `dir`, returning the written path.
    pub async fn save_audio(&self, key: ArticleKey, dir: &Path) -> Result<PathBuf> {
        let Some(handle) = self.audio.get(&key) else {
            error!("No audio message found for article ID: {}", key);
            anyhow::bail!("no audio available for article {}", key);
        };
        let path = dir.join(audio_file_name(key));
        tokio::fs::write(&path, handle.bytes())
            .await
            .with_context(|| format!("Failed to write audio file: {}", path.display()))?;
        info!("audio: saved {} bytes to {}", handle.len(), path.display());
        Ok(path)
    }

    /// Reset every artifact to its initial empty state.
    pub fn clear(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self::default();
        self.generation = generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_moves_from_pending_to_ready_or_failed() {
        let mut cache = ArtifactCache::new();
        assert_eq!(cache.summary(), &SummarySlot::Empty);

        cache.begin_summary();
        assert!(cache.summary().is_pending());
        assert_eq!(cache.summary().text(), Some(SUMMARY_PENDING));

        cache.finish_summary::<String>(Ok("digest".to_string()));
        assert_eq!(cache.summary(), &SummarySlot::Ready("digest".to_string()));

        cache.begin_summary();
        cache.finish_summary::<&str>(Err("boom"));
        assert_eq!(
            cache.summary().text(),
            Some("Error occurred while summarizing articles: boom")
        );
    }

    #[test]
    fn last_member_policy_files_under_final_id() {
        let mut cache = ArtifactCache::new();
        cache.begin_audio();
        assert!(cache.is_converting());

        let key = cache.finish_audio::<String>(&[4, 5, 6], AudioPolicy::LastMember, Ok(vec![1, 2, 3]));
        assert_eq!(key, Some(ArticleKey::Article(6)));
        assert!(cache.audio(ArticleKey::Article(6)).is_some());
        assert!(cache.audio(ArticleKey::Article(4)).is_none());
        assert!(cache.audio(ArticleKey::Article(5)).is_none());
        assert_eq!(cache.audio_status(), &AudioStatus::Idle);
    }

    #[test]
    fn aggregate_policy_files_under_aggregate_key() {
        let mut cache = ArtifactCache::new();
        let key = cache.finish_audio::<String>(&[4, 5, 6], AudioPolicy::Aggregate, Ok(vec![0]));
        assert_eq!(key, Some(ArticleKey::Aggregate));
        assert_eq!(cache.audio_keys(), vec![ArticleKey::Aggregate]);
    }

    #[test]
    fn each_conversion_creates_a_new_handle() {
        let mut cache = ArtifactCache::new();
        cache.finish_audio::<String>(&[1], AudioPolicy::LastMember, Ok(vec![1]));
        let first = cache.audio(ArticleKey::Article(1)).cloned().unwrap();
        cache.finish_audio::<String>(&[1], AudioPolicy::LastMember, Ok(vec![1]));
        let second = cache.audio(ArticleKey::Article(1)).cloned().unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn failed_conversion_sets_status_message() {
        let mut cache = ArtifactCache::new();
        cache.begin_audio();
        assert_eq!(cache.finish_audio::<&str>(&[1], AudioPolicy::LastMember, Err("down")), None);
        assert_eq!(cache.audio_status().text(), Some(AUDIO_FAILED));
        assert!(cache.audio_keys().is_empty());
    }

    #[test]
    fn playback_toggles_and_switches() {
        let mut cache = ArtifactCache::new();
        cache.finish_audio::<String>(&[1], AudioPolicy::LastMember, Ok(vec![1]));
        cache.finish_audio::<String>(&[2], AudioPolicy::LastMember, Ok(vec![2]));

        let one = ArticleKey::Article(1);
        let two = ArticleKey::Article(2);
        assert_eq!(cache.toggle_playback(one), Some(one));
        assert_eq!(cache.toggle_playback(two), Some(two));
        assert_eq!(cache.toggle_playback(two), None);

        // Keys without audio do not start playback
        assert_eq!(cache.toggle_playback(ArticleKey::Article(9)), None);

        cache.toggle_playback(one);
        cache.playback_finished();
        assert_eq!(cache.playing(), None);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = ArtifactCache::new();
        cache.begin_summary();
        cache.finish_audio::<String>(&[1], AudioPolicy::LastMember, Ok(vec![1]));
        cache.toggle_playback(ArticleKey::Article(1));

        let before = cache.generation();
        cache.clear();
        assert_eq!(cache.summary(), &SummarySlot::Empty);
        assert!(cache.audio_keys().is_empty());
        assert_eq!(cache.playing(), None);
        assert_eq!(cache.audio_status(), &AudioStatus::Idle);
        assert_ne!(cache.generation(), before);
    }

    #[test]
    fn duration_estimate_scales_with_size() {
        // 16 kB at 128 kbit/s is one second
        assert_eq!(AudioHandle::new(vec![0; 16_000]).estimated_duration(), Duration::from_secs(1));
        assert_eq!(AudioHandle::new(vec![0; 160_000]).estimated_duration(), Duration::from_secs(10));
        assert_eq!(AudioHandle::new(vec![0; 3]).estimated_duration(), Duration::from_secs(1));
    }

    #[test]
    fn file_name_uses_key() {
        assert_eq!(audio_file_name(ArticleKey::Article(6)), "article_6_audio.mp3");
        assert_eq!(audio_file_name(ArticleKey::Aggregate), "article_aggregate_audio.mp3");
    }
}
