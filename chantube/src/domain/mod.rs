//! Domain layer: channels, candidates and sync status.

pub mod candidate;
pub mod channel;

pub use candidate::{Candidate, Inventory, LiveStatus, sort_newest_first};
pub use channel::{Channel, ChannelDraft, KeepDays, LiveRule, MediaType, SyncStatus};
