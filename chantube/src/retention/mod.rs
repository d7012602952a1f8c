//! Retention sweeper.
//!
//! Removes local items older than a channel's `Keep_Days`. Age is measured
//! from the acquisition timestamp embedded in the file, falling back to the
//! filesystem modification time for files without one.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::domain::{KeepDays, MediaType};
use crate::media::MediaTagger;
use crate::utils::fs::{FileEntry, list_files, remove_file_if_exists};

/// Subtitle sidecar extensions deleted alongside their media file.
pub const SIDECAR_EXTENSIONS: &[&str] = &["srt", "vtt"];

/// Result of one sweep over a channel folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Media files deleted.
    pub deleted: usize,
    /// Media files kept.
    pub retained: usize,
    /// Subtitle sidecars deleted, with their media or as orphans.
    pub sidecars_deleted: usize,
}

impl SweepReport {
    pub fn changed(&self) -> bool {
        self.deleted > 0 || self.sidecars_deleted > 0
    }
}

/// Deletes expired items from channel folders.
#[derive(Clone)]
pub struct RetentionSweeper {
    tagger: Arc<dyn MediaTagger>,
}

impl RetentionSweeper {
    pub fn new(tagger: Arc<dyn MediaTagger>) -> Self {
        Self { tagger }
    }

    /// Sweep `dir`, deleting media (and sidecars) older than `keep_days`.
    pub async fn sweep(
        &self,
        dir: &Path,
        media_type: MediaType,
        keep_days: KeepDays,
        now: DateTime<Utc>,
    ) -> Result<SweepReport> {
        let KeepDays::Days(days) = keep_days else {
            debug!(dir = %dir.display(), "Permanent retention, skipping sweep");
            return Ok(SweepReport::default());
        };
        let threshold = Duration::days(i64::from(days));

        let files = list_files(dir).await?;
        let (media, sidecars): (Vec<_>, Vec<_>) = files
            .into_iter()
            .filter(|f| {
                f.extension()
                    .is_some_and(|e| media_type.matches_extension(&e) || is_sidecar(&e))
            })
            .partition(|f| f.extension().is_some_and(|e| media_type.matches_extension(&e)));

        let mut report = SweepReport::default();
        let mut expired_stems = Vec::new();
        let mut kept_stems = Vec::new();

        for file in &media {
            let Some(acquired) = self.acquired_at(file).await else {
                warn!(path = %file.path.display(), "No usable timestamp, keeping file");
                report.retained += 1;
                if let Some(stem) = file.stem() {
                    kept_stems.push(stem.to_string());
                }
                continue;
            };

            let age = now - acquired;
            if age > threshold {
                remove_file_if_exists(&file.path).await?;
                info!(
                    path = %file.path.display(),
                    age_days = age.num_days(),
                    keep_days = days,
                    "Deleted expired item"
                );
                report.deleted += 1;
                if let Some(stem) = file.stem() {
                    expired_stems.push(stem.to_string());
                }
            } else {
                report.retained += 1;
                if let Some(stem) = file.stem() {
                    kept_stems.push(stem.to_string());
                }
            }
        }

        for sidecar in &sidecars {
            let Some(name) = sidecar.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let delete = if belongs_to(name, &expired_stems) {
                true
            } else if belongs_to(name, &kept_stems) {
                false
            } else {
                sidecar
                    .modified
                    .map(DateTime::<Utc>::from)
                    .is_some_and(|m| now - m > threshold)
            };

            if delete && remove_file_if_exists(&sidecar.path).await? {
                debug!(path = %sidecar.path.display(), "Deleted subtitle sidecar");
                report.sidecars_deleted += 1;
            }
        }

        Ok(report)
    }

    async fn acquired_at(&self, file: &FileEntry) -> Option<DateTime<Utc>> {
        match self.tagger.read(&file.path).await {
            Ok(Some(tags)) if tags.acquired_at.is_some() => return tags.acquired_at,
            Ok(_) => {}
            Err(e) => {
                debug!(path = %file.path.display(), error = %e, "Failed to read embedded tags");
            }
        }
        debug!(path = %file.path.display(), "No embedded timestamp, using modification time");
        file.modified.map(DateTime::<Utc>::from)
    }
}

fn is_sidecar(ext: &str) -> bool {
    SIDECAR_EXTENSIONS.contains(&ext)
}

/// Sidecars are named `<stem>.<ext>` or `<stem>.<lang>.<ext>`.
fn belongs_to(sidecar_name: &str, stems: &[String]) -> bool {
    stems.iter().any(|stem| {
        sidecar_name
            .strip_prefix(stem.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    })
}
