//! Library refresh notifications.
//!
//! After a pass that changed anything on disk, downstream media servers are
//! asked to rescan. Servers are configured as `"Name: value"` lists, one for
//! addresses and one for tokens; a server is contacted only when it appears
//! in both.

mod dispatcher;
mod jellyfin;
mod plex;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use jellyfin::JellyfinRefresher;
pub use plex::PlexRefresher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Timeout applied to every refresh request.
pub const REFRESH_TIMEOUT_SECS: u64 = 30;

/// Supported downstream media servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaServerKind {
    Plex,
    Jellyfin,
}

impl MediaServerKind {
    /// Match a configured service name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "plex" => Some(Self::Plex),
            "jellyfin" => Some(Self::Jellyfin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plex => "Plex",
            Self::Jellyfin => "Jellyfin",
        }
    }
}

impl std::fmt::Display for MediaServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw media-server settings as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaServerConfig {
    /// e.g. `"Plex: http://192.168.1.2:32400, Jellyfin: http://192.168.1.2:8096"`.
    pub addresses: String,
    /// e.g. `"Plex: abc, Jellyfin: def"`.
    pub tokens: String,
    pub library_name: String,
}

/// Parse a comma-separated `"Name: value"` list.
///
/// Each entry is split on its first `:` so URL values keep their scheme and
/// port. Entries without a name or value are dropped.
pub fn parse_service_map(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, value) = entry.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                None
            } else {
                Some((name.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// A fully configured server to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTarget {
    pub kind: MediaServerKind,
    pub address: String,
    pub token: String,
    /// Library to refresh; empty means all.
    pub library_name: String,
}

/// Issues the refresh call for one kind of media server.
#[async_trait]
pub trait LibraryRefresher: Send + Sync {
    fn kind(&self) -> MediaServerKind;

    async fn refresh(&self, target: &RefreshTarget) -> Result<()>;
}
