//! Channel sync status state machine.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::Error;

/// Format used for completion timestamps in the persisted channel list.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%y %H:%M:%S";

/// Per-channel sync status.
///
/// Persisted as a plain string (`"Never"`, `"Queued"`, `"In Progress"`,
/// a local timestamp, `"Failed"` or `"Incomplete"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// The channel has never been synced.
    #[default]
    NeverSynced,
    /// Submitted to the worker pool for the current pass.
    Queued,
    /// A worker is running the channel pipeline.
    InProgress,
    /// The last pass finished at the given local time.
    Complete(NaiveDateTime),
    /// The last pass hit an error for this channel.
    Failed,
    /// A pass was interrupted (e.g. process restart) before this channel finished.
    Incomplete,
}

impl SyncStatus {
    /// Completion status stamped with the current local time.
    pub fn complete_now() -> Self {
        Self::Complete(Local::now().naive_local())
    }

    /// Parse from the persisted string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "" | "Never" => Some(Self::NeverSynced),
            "Queued" => Some(Self::Queued),
            "In Progress" => Some(Self::InProgress),
            "Failed" => Some(Self::Failed),
            "Incomplete" => Some(Self::Incomplete),
            other => NaiveDateTime::parse_from_str(other, TIMESTAMP_FORMAT)
                .ok()
                .map(Self::Complete),
        }
    }

    /// Whether a pass currently owns this channel.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// Whether the last pass finished for this channel, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Failed)
    }

    /// Resolve a transient status left behind by an interrupted pass.
    pub fn reconciled(self) -> Self {
        if self.is_transient() {
            Self::Incomplete
        } else {
            self
        }
    }

    pub fn can_transition_to(&self, target: SyncStatus) -> bool {
        use SyncStatus::*;

        match (self, target) {
            // Any resting status can be picked up by a new pass.
            (NeverSynced | Complete(_) | Failed | Incomplete, Queued) => true,
            (Queued, InProgress | Failed) => true,
            (InProgress, Complete(_) | Failed) => true,
            _ => false,
        }
    }

    /// Attempt to transition to a new status.
    pub fn transition_to(&self, target: SyncStatus) -> Result<SyncStatus, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::validation(format!(
                "cannot transition from {} to {}",
                self, target
            )))
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverSynced => write!(f, "Never"),
            Self::Queued => write!(f, "Queued"),
            Self::InProgress => write!(f, "In Progress"),
            Self::Complete(at) => write!(f, "{}", at.format(TIMESTAMP_FORMAT)),
            Self::Failed => write!(f, "Failed"),
            Self::Incomplete => write!(f, "Incomplete"),
        }
    }
}

impl Serialize for SyncStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SyncStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "Unrecognised Last_Synced value, treating as incomplete");
            Self::Incomplete
        }))
    }
}
