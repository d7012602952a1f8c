//! Remote candidates and the local inventory they are checked against.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::filename::sanitize_title;

/// Live-status tag reported by the content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    /// A regular upload (or a finished and processed stream).
    #[default]
    None,
    Upcoming,
    Live,
    /// A stream that just ended and is still being processed.
    PostLive,
}

impl LiveStatus {
    /// Whether the item carries any live-status tag.
    pub fn is_tagged(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Currently live or scheduled.
    pub fn is_live_or_upcoming(&self) -> bool {
        matches!(self, Self::Live | Self::Upcoming)
    }
}

/// An item discovered on the remote side, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Duration in seconds, when known.
    pub duration: Option<u64>,
    /// Upload time; absent for upcoming items.
    pub uploaded_at: Option<DateTime<Utc>>,
    pub channel: String,
    pub live_status: LiveStatus,
}

/// Newest first, undated items ahead of everything else. Stable.
pub fn sort_newest_first(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| match (a.uploaded_at, b.uploaded_at) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(&x),
    });
}

/// What a channel folder already holds.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    ids: HashSet<String>,
    titles: HashSet<String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a content id read from an embedded tag.
    pub fn insert_id(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    /// Record a file stem. Stems are already sanitized titles.
    pub fn insert_title(&mut self, stem: impl Into<String>) {
        self.titles.insert(stem.into());
    }

    /// Whether the candidate is already present, by id or by sanitized title.
    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.ids.contains(&candidate.id) || self.titles.contains(&sanitize_title(&candidate.title))
    }

    pub fn len(&self) -> usize {
        self.titles.len().max(self.ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.titles.is_empty()
    }
}
