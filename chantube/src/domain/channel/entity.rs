//! Channel entity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::SyncStatus;
use crate::Error;

/// Default lookback window in days.
pub const DEFAULT_DL_DAYS: u32 = 14;

/// Default retention in days.
pub const DEFAULT_KEEP_DAYS: u32 = 28;

/// Base URL used when a channel has no explicit link.
const YOUTUBE_BASE: &str = "https://www.youtube.com";

/// What kind of local file a channel produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    Video,
    Audio,
}

impl MediaType {
    /// File extensions counted as media for this type.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => &["mp4", "mkv", "webm"],
            Self::Audio => &["mp3", "m4a", "opus", "ogg"],
        }
    }

    /// Whether `ext` (without the dot, any case) is a media extension for this type.
    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// How a channel treats live and upcoming items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LiveRule {
    /// Skip anything carrying a live-status tag.
    #[default]
    Ignore,
    /// No live gating.
    Allow,
    /// Only live or upcoming items; at most one per pass.
    Only,
}

/// Retention threshold. Persisted as an integer where `-1` means permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepDays {
    Permanent,
    Days(u32),
}

impl KeepDays {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Permanent => -1,
            Self::Days(d) => i64::from(*d),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value < 0 {
            Self::Permanent
        } else {
            Self::Days(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

impl Default for KeepDays {
    fn default() -> Self {
        Self::Days(DEFAULT_KEEP_DAYS)
    }
}

impl Serialize for KeepDays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for KeepDays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::from_i64)
    }
}

fn default_dl_days() -> u32 {
    DEFAULT_DL_DAYS
}

/// A content source followed by the sync service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "DL_Days", default = "default_dl_days")]
    pub dl_days: u32,
    #[serde(rename = "Keep_Days", default)]
    pub keep_days: KeepDays,
    #[serde(rename = "Last_Synced", default)]
    pub last_synced: SyncStatus,
    #[serde(rename = "Item_Count", alias = "Video_Count", default)]
    pub item_count: u64,
    #[serde(rename = "Filter_Title_Text", default)]
    pub filter_title_text: String,
    #[serde(rename = "Negate_Filter", default)]
    pub negate_filter: bool,
    #[serde(rename = "Media_Type", default)]
    pub media_type: MediaType,
    #[serde(rename = "Search_Limit", default)]
    pub search_limit: Option<u32>,
    #[serde(rename = "Live_Rule", default)]
    pub live_rule: LiveRule,
}

impl Channel {
    /// Build a channel with the given id from user-supplied fields.
    pub fn from_draft(id: u64, draft: ChannelDraft) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            link: draft.link.trim().to_string(),
            dl_days: draft.dl_days,
            keep_days: draft.keep_days,
            last_synced: SyncStatus::NeverSynced,
            item_count: 0,
            filter_title_text: draft.filter_title_text,
            negate_filter: draft.negate_filter,
            media_type: draft.media_type,
            search_limit: draft.search_limit,
            live_rule: draft.live_rule,
        }
    }

    /// Replace the user-editable fields, keeping id, status and count.
    pub fn apply_draft(&mut self, draft: ChannelDraft) {
        let (id, last_synced, item_count) = (self.id, self.last_synced, self.item_count);
        *self = Self::from_draft(id, draft);
        self.last_synced = last_synced;
        self.item_count = item_count;
    }

    /// Source URL, falling back to the channel handle derived from the name.
    pub fn source_url(&self) -> String {
        if self.link.is_empty() {
            let handle: String = self.name.split_whitespace().collect();
            format!("{}/@{}", YOUTUBE_BASE, handle)
        } else {
            self.link.clone()
        }
    }

    /// Move to a new sync status, rejecting illegal transitions.
    pub fn set_status(&mut self, target: SyncStatus) -> Result<(), Error> {
        self.last_synced = self.last_synced.transition_to(target)?;
        Ok(())
    }
}

/// User-editable channel fields, as accepted by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDraft {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "DL_Days", default = "default_dl_days")]
    pub dl_days: u32,
    #[serde(rename = "Keep_Days", default)]
    pub keep_days: KeepDays,
    #[serde(rename = "Filter_Title_Text", default)]
    pub filter_title_text: String,
    #[serde(rename = "Negate_Filter", default)]
    pub negate_filter: bool,
    #[serde(rename = "Media_Type", default)]
    pub media_type: MediaType,
    #[serde(rename = "Search_Limit", default)]
    pub search_limit: Option<u32>,
    #[serde(rename = "Live_Rule", default)]
    pub live_rule: LiveRule,
}

impl ChannelDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: String::new(),
            dl_days: DEFAULT_DL_DAYS,
            keep_days: KeepDays::default(),
            filter_title_text: String::new(),
            negate_filter: false,
            media_type: MediaType::Video,
            search_limit: None,
            live_rule: LiveRule::Ignore,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("channel name must not be empty"));
        }
        if self.keep_days == KeepDays::Days(0) {
            return Err(Error::validation(
                "Keep_Days must be at least 1, or -1 to keep items forever",
            ));
        }
        if self.search_limit == Some(0) {
            return Err(Error::validation("Search_Limit must be at least 1"));
        }
        if !self.link.trim().is_empty() && url::Url::parse(self.link.trim()).is_err() {
            return Err(Error::validation(format!("invalid link: {}", self.link)));
        }
        Ok(())
    }
}
