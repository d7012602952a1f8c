//! Per-channel sync pipeline.
//!
//! inventory -> discover -> filter -> acquire -> retention sweep -> recount,
//! with the channel's status moved `Queued -> InProgress -> Complete|Failed`.
//! Any error stops the pipeline for that channel only.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{PassContext, SyncEvent};
use crate::config::StoragePaths;
use crate::domain::{Channel, MediaType, SyncStatus, sort_newest_first};
use crate::error::ChannelError;
use crate::filter::{CandidateFilter, select};
use crate::media::library::{build_inventory, channel_dir, count_items};
use crate::media::{AcquireProgress, AcquireRequest, DiscoveryRequest, ItemTags, MediaBackend, SubtitleOptions};
use crate::registry::ChannelRegistry;
use crate::retention::RetentionSweeper;
use crate::utils::filename::sanitize_title;
use crate::utils::fs::ensure_dir_all;

/// Buffered progress messages per channel before ticks are dropped.
const PROGRESS_BUFFER: usize = 64;

/// What one successful channel run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSummary {
    pub acquired: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub item_count: u64,
}

#[derive(Clone)]
pub struct ChannelPipeline {
    registry: Arc<ChannelRegistry>,
    media: MediaBackend,
    sweeper: RetentionSweeper,
    paths: StoragePaths,
}

impl ChannelPipeline {
    pub fn new(registry: Arc<ChannelRegistry>, media: MediaBackend, paths: StoragePaths) -> Self {
        let sweeper = RetentionSweeper::new(media.tagger.clone());
        Self {
            registry,
            media,
            sweeper,
            paths,
        }
    }

    /// Folder holding a channel's local items.
    pub fn channel_folder(&self, channel: &Channel) -> PathBuf {
        channel_dir(self.paths.root_for(channel.media_type), &channel.name)
    }

    /// Sync one channel and record the result in the registry.
    pub async fn process_channel(
        &self,
        channel_id: u64,
        ctx: &PassContext,
    ) -> Result<ChannelSummary, ChannelError> {
        let channel = self
            .registry
            .get(channel_id)
            .ok_or(ChannelError::Removed(channel_id))?;

        if !channel.last_synced.is_transient() {
            self.registry
                .set_status(channel_id, SyncStatus::Queued)
                .map_err(|_| ChannelError::Removed(channel_id))?;
        }
        self.registry
            .set_status(channel_id, SyncStatus::InProgress)
            .map_err(|_| ChannelError::Removed(channel_id))?;
        info!(channel_id, channel = %channel.name, "Syncing channel");

        let (progress_tx, mut progress_rx) = mpsc::channel::<AcquireProgress>(PROGRESS_BUFFER);
        let events = self.registry.events().clone();
        let forwarder = tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                events.publish(SyncEvent::Progress(progress));
            }
        });

        let result = self.run(&channel, ctx, progress_tx).await;
        let _ = forwarder.await;

        match result {
            Ok(summary) => {
                if let Err(e) = self.registry.mark_complete(channel_id, summary.item_count) {
                    // Removed or replaced while we worked.
                    debug!(channel_id, error = %e, "Channel result discarded");
                    return Err(ChannelError::Removed(channel_id));
                }
                info!(
                    channel_id,
                    channel = %channel.name,
                    acquired = summary.acquired,
                    deleted = summary.deleted,
                    items = summary.item_count,
                    "Channel sync complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(channel_id, channel = %channel.name, error = %e, "Channel sync failed");
                let _ = self.registry.set_status(channel_id, SyncStatus::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        channel: &Channel,
        ctx: &PassContext,
        progress: mpsc::Sender<AcquireProgress>,
    ) -> Result<ChannelSummary, ChannelError> {
        let settings = ctx.settings();
        let dir = self.channel_folder(channel);
        ensure_dir_all(&dir).await.map_err(ChannelError::Storage)?;

        let mut inventory = build_inventory(&dir, channel.media_type, self.media.tagger.as_ref())
            .await
            .map_err(ChannelError::Storage)?;
        debug!(channel_id = channel.id, existing = inventory.len(), "Inventory built");

        let now = Utc::now();
        let filter = CandidateFilter::for_channel(channel, settings.defer_hours, now);
        let request = DiscoveryRequest {
            channel_name: channel.name.clone(),
            source_url: channel.source_url(),
            cutoff: filter.cutoff(),
            search_limit: channel.search_limit,
            live_rule: channel.live_rule,
        };
        let mut candidates = self
            .media
            .discovery
            .discover(&request)
            .await
            .map_err(ChannelError::Discovery)?;
        sort_newest_first(&mut candidates);

        let selection = select(&filter, candidates, &inventory);
        let mut summary = ChannelSummary {
            skipped: selection.skipped,
            ..ChannelSummary::default()
        };
        info!(
            channel_id = channel.id,
            selected = selection.accepted.len(),
            skipped = selection.skipped,
            halted = selection.halted,
            "Candidates selected"
        );

        let format_id = match channel.media_type {
            MediaType::Video => settings.video_format_id.clone(),
            MediaType::Audio => settings.audio_format_id.clone(),
        };
        let subtitles = settings.include_subtitles.then(|| SubtitleOptions {
            languages: settings.subtitle_languages.clone(),
        });

        for candidate in selection.accepted {
            // Two entries of one batch can share a title.
            if inventory.contains(&candidate) {
                continue;
            }

            let file_stem = sanitize_title(&candidate.title);
            let request = AcquireRequest {
                candidate,
                output_dir: dir.clone(),
                file_stem: file_stem.clone(),
                media_type: channel.media_type,
                format_id: format_id.clone(),
                subtitles: subtitles.clone(),
            };
            info!(channel_id = channel.id, title = %request.candidate.title, "Downloading");

            let path = self
                .media
                .acquirer
                .acquire(&request, progress.clone())
                .await
                .map_err(|source| ChannelError::Acquisition {
                    title: request.candidate.title.clone(),
                    source,
                })?;
            ctx.mark_changed();
            summary.acquired += 1;

            let tags = ItemTags::for_candidate(&request.candidate, Utc::now());
            if let Err(e) = self.media.tagger.embed(&path, &tags).await {
                warn!(path = %path.display(), error = %e, "Failed to embed tags");
            }

            inventory.insert_id(request.candidate.id.clone());
            inventory.insert_title(file_stem);
        }

        let sweep = self
            .sweeper
            .sweep(&dir, channel.media_type, channel.keep_days, Utc::now())
            .await
            .map_err(ChannelError::Retention)?;
        if sweep.changed() {
            ctx.mark_changed();
        }
        summary.deleted = sweep.deleted;

        summary.item_count = count_items(&dir, channel.media_type)
            .await
            .map_err(ChannelError::Storage)?;
        Ok(summary)
    }
}
