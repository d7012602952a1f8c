//! Local channel folders: listing, inventory and item counts.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::MediaTagger;
use crate::Result;
use crate::domain::{Inventory, MediaType};
use crate::utils::filename::sanitize_title;
use crate::utils::fs::{FileEntry, list_files};

/// Folder for a channel: `<root>/<sanitized channel name>`.
pub fn channel_dir(root: &Path, channel_name: &str) -> PathBuf {
    root.join(sanitize_title(channel_name))
}

/// Media files in `dir` for the given type. Partially tagged temp files are
/// left out.
pub async fn media_files(dir: &Path, media_type: MediaType) -> Result<Vec<FileEntry>> {
    Ok(list_files(dir)
        .await?
        .into_iter()
        .filter(|f| {
            f.extension()
                .is_some_and(|ext| media_type.matches_extension(&ext))
                && !f.stem().is_some_and(|s| s.ends_with(".tagging"))
        })
        .collect())
}

/// Collect embedded ids and filename stems of everything already in `dir`.
pub async fn build_inventory(
    dir: &Path,
    media_type: MediaType,
    tagger: &dyn MediaTagger,
) -> Result<Inventory> {
    let mut inventory = Inventory::new();

    for file in media_files(dir, media_type).await? {
        if let Some(stem) = file.stem() {
            inventory.insert_title(stem);
        }
        match tagger.read(&file.path).await {
            Ok(Some(tags)) => {
                if let Some(id) = tags.id {
                    inventory.insert_id(id);
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(path = %file.path.display(), error = %e, "Could not read tags");
            }
        }
    }

    Ok(inventory)
}

/// Number of retained media items in `dir`.
pub async fn count_items(dir: &Path, media_type: MediaType) -> Result<u64> {
    Ok(media_files(dir, media_type).await?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ItemTags;
    use crate::media::testing::MemoryTagger;

    #[tokio::test]
    async fn test_inventory_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let tagger = MemoryTagger::default();

        let tagged = dir.path().join("First.mp4");
        std::fs::write(&tagged, b"x").unwrap();
        tagger.insert(
            &tagged,
            ItemTags {
                id: Some("id-1".to_string()),
                ..ItemTags::default()
            },
        );
        std::fs::write(dir.path().join("Second.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("Second.en.srt"), b"x").unwrap();
        std::fs::write(dir.path().join("Third.tagging.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"x").unwrap();

        let inventory = build_inventory(dir.path(), MediaType::Video, &tagger)
            .await
            .unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(count_items(dir.path(), MediaType::Video).await.unwrap(), 2);
        assert_eq!(count_items(dir.path(), MediaType::Audio).await.unwrap(), 1);
    }

    #[test]
    fn test_channel_dir_sanitized() {
        assert_eq!(
            channel_dir(Path::new("/v"), "AC/DC: Live"),
            PathBuf::from("/v/AC DC Live")
        );
    }
}
