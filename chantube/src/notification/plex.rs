//! Plex library refresh.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{LibraryRefresher, MediaServerKind, REFRESH_TIMEOUT_SECS, RefreshTarget};
use crate::{Error, Result};

const TOKEN_HEADER: &str = "X-Plex-Token";

#[derive(Debug, Deserialize)]
struct SectionsResponse {
    #[serde(rename = "MediaContainer")]
    container: SectionsContainer,
}

#[derive(Debug, Default, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    title: String,
}

/// Keys of sections whose title matches `library_name`, ignoring case.
fn matching_section_keys(body: &str, library_name: &str) -> Result<Vec<String>> {
    let response: SectionsResponse = serde_json::from_str(body)?;
    let wanted = library_name.trim().to_lowercase();
    Ok(response
        .container
        .directories
        .into_iter()
        .filter(|s| s.title.trim().to_lowercase() == wanted)
        .map(|s| s.key)
        .collect())
}

pub struct PlexRefresher {
    client: Client,
}

impl PlexRefresher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REFRESH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn get(&self, url: &str, token: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!("Plex request to {url} failed: {status}")));
        }
        Ok(response.text().await?)
    }
}

impl Default for PlexRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LibraryRefresher for PlexRefresher {
    fn kind(&self) -> MediaServerKind {
        MediaServerKind::Plex
    }

    async fn refresh(&self, target: &RefreshTarget) -> Result<()> {
        let base = target.address.trim_end_matches('/');

        if target.library_name.trim().is_empty() {
            self.get(&format!("{base}/library/sections/all/refresh"), &target.token)
                .await?;
            info!(address = %base, "Plex refresh requested for all libraries");
            return Ok(());
        }

        let body = self
            .get(&format!("{base}/library/sections"), &target.token)
            .await?;
        let keys = matching_section_keys(&body, &target.library_name)?;
        if keys.is_empty() {
            return Err(Error::not_found("Plex library", &target.library_name));
        }

        for key in keys {
            debug!(section = %key, "Refreshing Plex section");
            self.get(&format!("{base}/library/sections/{key}/refresh"), &target.token)
                .await?;
        }
        info!(address = %base, library = %target.library_name, "Plex library refresh requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_section_keys() {
        let body = r#"{"MediaContainer":{"size":3,"Directory":[
            {"key":"1","title":"Movies","type":"movie"},
            {"key":"4","title":"youtube","type":"movie"},
            {"key":"7","title":"YouTube ","type":"show"}
        ]}}"#;
        let keys = matching_section_keys(body, "YouTube").unwrap();
        assert_eq!(keys, vec!["4".to_string(), "7".to_string()]);
        assert!(matching_section_keys(body, "Music").unwrap().is_empty());
    }

    #[test]
    fn test_empty_container() {
        let keys = matching_section_keys(r#"{"MediaContainer":{"size":0}}"#, "x").unwrap();
        assert!(keys.is_empty());
        assert!(matching_section_keys("<xml/>", "x").is_err());
    }
}
