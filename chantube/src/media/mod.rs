//! External media collaborators.
//!
//! The sync pipeline talks to the outside world through three traits:
//! [`Discovery`] lists remote candidates, [`Acquirer`] downloads one item
//! and [`MediaTagger`] embeds/reads identifying tags. Default
//! implementations shell out to `yt-dlp` and `ffmpeg`/`ffprobe`.

pub mod ffmpeg;
pub mod library;
pub mod ytdlp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;
use crate::domain::{Candidate, LiveRule, MediaType};

pub use ffmpeg::FfmpegTagger;
pub use ytdlp::{YtDlpClient, YtDlpConfig};

/// Parameters for listing a channel's recent items.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub channel_name: String,
    pub source_url: String,
    /// Items uploaded before this instant are not needed.
    pub cutoff: DateTime<Utc>,
    pub search_limit: Option<u32>,
    pub live_rule: LiveRule,
}

/// Parameters for downloading one item.
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub candidate: Candidate,
    pub output_dir: PathBuf,
    /// Output file stem (sanitized title).
    pub file_stem: String,
    pub media_type: MediaType,
    pub format_id: String,
    pub subtitles: Option<SubtitleOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleOptions {
    /// Comma-separated language codes, as yt-dlp expects them.
    pub languages: String,
}

/// A download progress message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquireProgress {
    pub channel: String,
    pub title: String,
    pub percent: f64,
    pub total: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// Tags embedded into a local item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemTags {
    /// Remote content id, stored in `comment`.
    pub id: Option<String>,
    pub title: Option<String>,
    /// Channel name, stored in `artist`.
    pub channel: Option<String>,
    /// Acquisition time, stored in `creation_time`.
    pub acquired_at: Option<DateTime<Utc>>,
}

impl ItemTags {
    pub fn for_candidate(candidate: &Candidate, acquired_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(candidate.id.clone()),
            title: Some(candidate.title.clone()),
            channel: Some(candidate.channel.clone()),
            acquired_at: Some(acquired_at),
        }
    }
}

/// Lists remote candidates for a channel.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<Candidate>>;
}

/// Downloads a single item, returning the final file path.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(
        &self,
        request: &AcquireRequest,
        progress: mpsc::Sender<AcquireProgress>,
    ) -> Result<PathBuf>;
}

/// Embeds and reads identifying tags on local files.
#[async_trait]
pub trait MediaTagger: Send + Sync {
    async fn embed(&self, path: &Path, tags: &ItemTags) -> Result<()>;

    /// `Ok(None)` when the file carries none of our tags.
    async fn read(&self, path: &Path) -> Result<Option<ItemTags>>;
}

/// The collaborators used by a sync pass.
#[derive(Clone)]
pub struct MediaBackend {
    pub discovery: Arc<dyn Discovery>,
    pub acquirer: Arc<dyn Acquirer>,
    pub tagger: Arc<dyn MediaTagger>,
}

impl MediaBackend {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        acquirer: Arc<dyn Acquirer>,
        tagger: Arc<dyn MediaTagger>,
    ) -> Self {
        Self {
            discovery,
            acquirer,
            tagger,
        }
    }

    /// yt-dlp for discovery and acquisition, ffmpeg/ffprobe for tags.
    pub fn external_tools(ytdlp: YtDlpConfig, tagger: FfmpegTagger) -> Self {
        let client = Arc::new(YtDlpClient::new(ytdlp));
        Self::new(client.clone(), client, Arc::new(tagger))
    }
}
