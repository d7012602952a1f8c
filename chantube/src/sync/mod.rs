//! Sync orchestration: pass coordinator, per-channel pipeline and events.

mod context;
mod coordinator;
mod events;
mod pipeline;

pub use context::PassContext;
pub use coordinator::{PassOutcome, PassReport, SyncCoordinator, TriggerResult};
pub use events::{SyncEvent, SyncEventBroadcaster};
pub use pipeline::{ChannelPipeline, ChannelSummary};
