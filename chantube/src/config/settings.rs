//! Runtime settings persisted in `settings_config.json`.

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::Result;
use crate::notification::{MediaServerConfig, MediaServerKind, parse_service_map};
use crate::utils::json::{read_json_or_default, write_json_atomic};

pub const SETTINGS_FILE: &str = "settings_config.json";

fn default_sync_start_times() -> Vec<u32> {
    vec![0]
}

fn default_media_server_addresses() -> String {
    "Plex: http://192.168.1.2:32400".to_string()
}

fn default_media_server_tokens() -> String {
    "Plex: abc".to_string()
}

fn default_library_name() -> String {
    "YouTube".to_string()
}

fn default_concurrent_limit() -> usize {
    2
}

fn default_video_format_id() -> String {
    "137".to_string()
}

fn default_audio_format_id() -> String {
    "140".to_string()
}

fn default_subtitle_languages() -> String {
    "en".to_string()
}

/// User-editable runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SettingsFile")]
pub struct Settings {
    /// Local hours (0..=23) at which a sync pass starts.
    pub sync_start_times: Vec<u32>,
    pub media_server_addresses: String,
    pub media_server_tokens: String,
    pub media_server_library_name: String,
    pub concurrent_limit: usize,
    pub video_format_id: String,
    pub audio_format_id: String,
    /// Skip non-live items younger than this many hours.
    pub defer_hours: u32,
    pub include_subtitles: bool,
    pub subtitle_languages: String,
}

/// Stored shape, including the single-server `plex_*` keys of older files.
#[derive(Deserialize)]
struct SettingsFile {
    #[serde(default = "default_sync_start_times")]
    sync_start_times: Vec<u32>,
    media_server_addresses: Option<String>,
    media_server_tokens: Option<String>,
    media_server_library_name: Option<String>,
    plex_address: Option<String>,
    plex_token: Option<String>,
    plex_library_name: Option<String>,
    #[serde(default = "default_concurrent_limit")]
    concurrent_limit: usize,
    #[serde(default = "default_video_format_id")]
    video_format_id: String,
    #[serde(default = "default_audio_format_id")]
    audio_format_id: String,
    #[serde(default)]
    defer_hours: u32,
    #[serde(default)]
    include_subtitles: bool,
    #[serde(default = "default_subtitle_languages")]
    subtitle_languages: String,
}

impl From<SettingsFile> for Settings {
    fn from(file: SettingsFile) -> Self {
        Self {
            sync_start_times: file.sync_start_times,
            media_server_addresses: file
                .media_server_addresses
                .or_else(|| file.plex_address.as_deref().map(legacy_plex_entry))
                .unwrap_or_else(default_media_server_addresses),
            media_server_tokens: file
                .media_server_tokens
                .or_else(|| file.plex_token.as_deref().map(legacy_plex_entry))
                .unwrap_or_else(default_media_server_tokens),
            media_server_library_name: file
                .media_server_library_name
                .or(file.plex_library_name)
                .unwrap_or_else(default_library_name),
            concurrent_limit: file.concurrent_limit,
            video_format_id: file.video_format_id,
            audio_format_id: file.audio_format_id,
            defer_hours: file.defer_hours,
            include_subtitles: file.include_subtitles,
            subtitle_languages: file.subtitle_languages,
        }
    }
}

/// Older files hold a bare Plex address or token; name it so it resolves.
fn legacy_plex_entry(value: &str) -> String {
    let value = value.trim();
    let named = parse_service_map(value)
        .iter()
        .any(|(name, _)| MediaServerKind::from_name(name).is_some());
    if value.is_empty() || named {
        value.to_string()
    } else {
        format!("{}: {value}", MediaServerKind::Plex)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_start_times: default_sync_start_times(),
            media_server_addresses: default_media_server_addresses(),
            media_server_tokens: default_media_server_tokens(),
            media_server_library_name: default_library_name(),
            concurrent_limit: default_concurrent_limit(),
            video_format_id: default_video_format_id(),
            audio_format_id: default_audio_format_id(),
            defer_hours: 0,
            include_subtitles: false,
            subtitle_languages: default_subtitle_languages(),
        }
    }
}

impl Settings {
    /// Worker pool size; never below one.
    pub fn worker_count(&self) -> usize {
        self.concurrent_limit.max(1)
    }

    pub fn media_servers(&self) -> MediaServerConfig {
        MediaServerConfig {
            addresses: self.media_server_addresses.clone(),
            tokens: self.media_server_tokens.clone(),
            library_name: self.media_server_library_name.clone(),
        }
    }

    /// Clamp loaded values into range.
    fn normalized(mut self) -> Self {
        self.sync_start_times = normalize_hours(self.sync_start_times);
        if self.sync_start_times.is_empty() {
            self.sync_start_times = default_sync_start_times();
        }
        self.concurrent_limit = self.concurrent_limit.max(1);
        self
    }
}

fn normalize_hours(hours: Vec<u32>) -> Vec<u32> {
    let mut hours: Vec<u32> = hours
        .into_iter()
        .map(|h| if h > 23 { 0 } else { h })
        .collect();
    hours.sort_unstable();
    hours.dedup();
    hours
}

/// Parse a comma-separated list of trigger hours.
///
/// Non-digit characters are stripped from each entry and out-of-range
/// values become 0. Empty input or an entry with no digits yields `[0]`.
pub fn parse_sync_hours(raw: &str) -> Vec<u32> {
    if raw.trim().is_empty() {
        error!("Empty sync start times, defaulting to 0");
        return default_sync_start_times();
    }

    let mut hours = Vec::new();
    for entry in raw.split(',') {
        let digits: String = entry.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(hour) => hours.push(hour),
            Err(e) => {
                error!(entry = %entry.trim(), error = %e, "Invalid sync start time, defaulting to 0");
                return default_sync_start_times();
            }
        }
    }

    normalize_hours(hours)
}

/// Settings with write-through persistence.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Load from `<config_dir>/settings_config.json`, falling back to defaults.
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join(SETTINGS_FILE);
        let settings = read_json_or_default::<Settings>(&path, "settings").normalized();
        info!(
            path = %path.display(),
            hours = ?settings.sync_start_times,
            workers = settings.worker_count(),
            "Loaded settings"
        );
        Self {
            path,
            current: RwLock::new(settings),
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Settings {
        self.current.read().clone()
    }

    pub fn sync_hours(&self) -> Vec<u32> {
        self.current.read().sync_start_times.clone()
    }

    /// Replace the settings and persist them.
    pub fn replace(&self, settings: Settings) -> Result<Settings> {
        let settings = settings.normalized();
        let _guard = self.write_lock.lock();
        write_json_atomic(&self.path, &settings)?;
        *self.current.write() = settings.clone();
        info!(path = %self.path.display(), "Settings saved");
        Ok(settings)
    }

    /// Persist the current settings (e.g. to create the file on first start).
    pub fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let settings = self.get();
        write_json_atomic(&self.path, &settings)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
