//! Process-level configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::ApiServerConfig;
use crate::domain::MediaType;
use crate::media::{FfmpegTagger, YtDlpConfig};

const DEFAULT_POLL_SECS: u64 = 60;

/// Where channel folders and state files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub config_dir: PathBuf,
    pub video_dir: PathBuf,
    pub audio_dir: PathBuf,
}

impl StoragePaths {
    /// Root directory for a media type.
    pub fn root_for(&self, media_type: MediaType) -> &PathBuf {
        match media_type {
            MediaType::Video => &self.video_dir,
            MediaType::Audio => &self.audio_dir,
        }
    }
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            video_dir: PathBuf::from("download/video"),
            audio_dir: PathBuf::from("download/audio"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: StoragePaths,
    pub log_dir: PathBuf,
    pub api: ApiServerConfig,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub scheduler_poll: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: StoragePaths::default(),
            log_dir: PathBuf::from("logs"),
            api: ApiServerConfig::default(),
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            scheduler_poll: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }
}

impl AppConfig {
    /// Read from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset or blank values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let path = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| PathBuf::from(v.trim()))
        };

        if let Some(p) = path("CONFIG_DIR") {
            config.paths.config_dir = p;
        }
        if let Some(p) = path("VIDEO_DOWNLOAD_PATH") {
            config.paths.video_dir = p;
        }
        if let Some(p) = path("AUDIO_DOWNLOAD_PATH") {
            config.paths.audio_dir = p;
        }
        if let Some(p) = path("LOG_DIR") {
            config.log_dir = p;
        }
        if let Some(p) = path("YTDLP_PATH") {
            config.ytdlp_path = p;
        }
        if let Some(p) = path("FFMPEG_PATH") {
            config.ffmpeg_path = p;
        }
        if let Some(p) = path("FFPROBE_PATH") {
            config.ffprobe_path = p;
        }

        if let Some(bind_address) = lookup("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.api.bind_address = bind_address.trim().to_string();
        }
        if let Some(port) = lookup("API_PORT")
            && let Ok(parsed) = port.trim().parse::<u16>()
        {
            config.api.port = parsed;
        }
        if let Some(secs) = lookup("SCHEDULER_POLL_SECS")
            && let Ok(parsed) = secs.trim().parse::<u64>()
            && parsed > 0
        {
            config.scheduler_poll = Duration::from_secs(parsed);
        }

        config
    }

    pub fn ytdlp(&self) -> YtDlpConfig {
        YtDlpConfig {
            binary_path: self.ytdlp_path.clone(),
            ffmpeg_path: Some(self.ffmpeg_path.clone()),
        }
    }

    pub fn tagger(&self) -> FfmpegTagger {
        FfmpegTagger::new(self.ffmpeg_path.clone(), self.ffprobe_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.paths, StoragePaths::default());
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.api.bind_address, "0.0.0.0");
        assert_eq!(config.scheduler_poll, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CONFIG_DIR", "/data/config"),
            ("AUDIO_DOWNLOAD_PATH", "/data/audio"),
            ("API_PORT", "8080"),
            ("API_BIND_ADDRESS", " "),
            ("SCHEDULER_POLL_SECS", "0"),
            ("FFMPEG_PATH", "/opt/ffmpeg"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.paths.config_dir, PathBuf::from("/data/config"));
        assert_eq!(config.paths.root_for(MediaType::Audio), &PathBuf::from("/data/audio"));
        assert_eq!(config.paths.video_dir, PathBuf::from("download/video"));
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.bind_address, "0.0.0.0");
        assert_eq!(config.scheduler_poll, Duration::from_secs(60));
        assert_eq!(config.ytdlp().ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
    }
}
