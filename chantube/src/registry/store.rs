//! JSON persistence for the channel list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::Result;
use crate::domain::Channel;
use crate::utils::json::{read_json_or_default, write_json_atomic};

pub const CHANNEL_LIST_FILE: &str = "channel_list.json";

/// Channels sorted case-insensitively by name, ties broken by id.
pub fn sort_channels(channels: &mut [Channel]) {
    channels.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
}

/// Reads and writes `channel_list.json`.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    path: PathBuf,
}

impl ChannelStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(CHANNEL_LIST_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the channel list.
    ///
    /// Missing or malformed files yield an empty list. Statuses left
    /// transient by an interrupted pass become `Incomplete`, and duplicate
    /// ids are reassigned.
    pub fn load(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = read_json_or_default(&self.path, "channel list");

        for channel in &mut channels {
            if channel.last_synced.is_transient() {
                warn!(
                    channel_id = channel.id,
                    channel = %channel.name,
                    status = %channel.last_synced,
                    "Channel was mid-sync at shutdown, marking incomplete"
                );
                channel.last_synced = channel.last_synced.reconciled();
            }
        }

        let mut seen = HashSet::new();
        let mut next_id = channels.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        for channel in &mut channels {
            if !seen.insert(channel.id) {
                warn!(
                    channel = %channel.name,
                    old_id = channel.id,
                    new_id = next_id,
                    "Duplicate channel id, reassigning"
                );
                channel.id = next_id;
                seen.insert(next_id);
                next_id += 1;
            }
        }

        sort_channels(&mut channels);
        info!(path = %self.path.display(), count = channels.len(), "Loaded channel list");
        channels
    }

    /// Atomically replace the file with `channels`.
    pub fn save(&self, channels: &[Channel]) -> Result<()> {
        write_json_atomic(&self.path, channels)
    }
}
