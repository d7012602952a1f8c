//! Sync events for observers.
//!
//! Registry snapshots are published on every channel status change and at
//! pass boundaries; download progress is forwarded from the acquirer.
//! Publishing never blocks: slow subscribers lag and drop old events.

use serde::Serialize;
use tokio::sync::broadcast;

use super::PassReport;
use crate::domain::Channel;
use crate::media::AcquireProgress;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Full channel list after a change.
    Snapshot(Vec<Channel>),
    Progress(AcquireProgress),
    PassStarted { channels: usize },
    PassFinished(PassReport),
}

impl SyncEvent {
    pub fn description(&self) -> String {
        match self {
            Self::Snapshot(channels) => format!("snapshot of {} channels", channels.len()),
            Self::Progress(p) => format!("progress {:.1}% for {}", p.percent, p.title),
            Self::PassStarted { channels } => format!("pass started for {channels} channels"),
            Self::PassFinished(report) => format!("pass finished: {:?}", report.outcome),
        }
    }
}

pub struct SyncEventBroadcaster {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of receivers reached.
    pub fn publish(&self, event: SyncEvent) -> usize {
        if !matches!(event, SyncEvent::Progress(_)) {
            tracing::debug!("Publishing sync event: {}", event.description());
        }
        // No receivers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SyncEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SyncEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
