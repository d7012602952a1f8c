//! Jellyfin library refresh.

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{LibraryRefresher, MediaServerKind, REFRESH_TIMEOUT_SECS, RefreshTarget};
use crate::{Error, Result};

const TOKEN_HEADER: &str = "X-Emby-Token";

/// Triggers a full library scan; Jellyfin has no per-library refresh endpoint
/// that takes a name.
pub struct JellyfinRefresher {
    client: Client,
}

impl JellyfinRefresher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REFRESH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for JellyfinRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LibraryRefresher for JellyfinRefresher {
    fn kind(&self) -> MediaServerKind {
        MediaServerKind::Jellyfin
    }

    async fn refresh(&self, target: &RefreshTarget) -> Result<()> {
        let url = format!("{}/Library/Refresh", target.address.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &target.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "Jellyfin refresh failed: {status} - {body}"
            )));
        }

        info!(address = %target.address, "Jellyfin library refresh requested");
        Ok(())
    }
}
