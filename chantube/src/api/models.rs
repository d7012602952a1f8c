//! Request and response bodies that differ from the domain types.

use serde::{Deserialize, Serialize};

use crate::config::{Settings, parse_sync_hours};
use crate::sync::TriggerResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub channels: usize,
    pub sync_running: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncTriggerResponse {
    pub result: TriggerResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogFilterBody {
    pub filter: String,
}

/// Partial settings update. Omitted fields keep their current value.
///
/// `sync_start_times` is the comma-separated form users type, e.g. `"3, 15"`.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub sync_start_times: Option<String>,
    pub media_server_addresses: Option<String>,
    pub media_server_tokens: Option<String>,
    pub media_server_library_name: Option<String>,
    pub concurrent_limit: Option<usize>,
    pub video_format_id: Option<String>,
    pub audio_format_id: Option<String>,
    pub defer_hours: Option<u32>,
    pub include_subtitles: Option<bool>,
    pub subtitle_languages: Option<String>,
}

impl SettingsUpdate {
    pub fn apply_to(self, mut settings: Settings) -> Settings {
        if let Some(raw) = self.sync_start_times {
            settings.sync_start_times = parse_sync_hours(&raw);
        }
        if let Some(v) = self.media_server_addresses {
            settings.media_server_addresses = v;
        }
        if let Some(v) = self.media_server_tokens {
            settings.media_server_tokens = v;
        }
        if let Some(v) = self.media_server_library_name {
            settings.media_server_library_name = v;
        }
        if let Some(v) = self.concurrent_limit {
            settings.concurrent_limit = v;
        }
        if let Some(v) = self.video_format_id {
            settings.video_format_id = v;
        }
        if let Some(v) = self.audio_format_id {
            settings.audio_format_id = v;
        }
        if let Some(v) = self.defer_hours {
            settings.defer_hours = v;
        }
        if let Some(v) = self.include_subtitles {
            settings.include_subtitles = v;
        }
        if let Some(v) = self.subtitle_languages {
            settings.subtitle_languages = v;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"sync_start_times": "15, 3", "concurrent_limit": 4}"#)
                .unwrap();
        let before = Settings::default();
        let after = update.apply_to(before.clone());

        assert_eq!(after.sync_start_times, vec![3, 15]);
        assert_eq!(after.concurrent_limit, 4);
        assert_eq!(after.video_format_id, before.video_format_id);
        assert_eq!(after.media_server_tokens, before.media_server_tokens);
    }
}
