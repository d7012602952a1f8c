//! Channel aggregate: the followed source and its sync status.

mod entity;
mod status;

pub use entity::{
    Channel, ChannelDraft, DEFAULT_DL_DAYS, DEFAULT_KEEP_DAYS, KeepDays, LiveRule, MediaType,
};
pub use status::{SyncStatus, TIMESTAMP_FORMAT};
