use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::config::Settings;

/// State shared by the workers of one sync pass.
///
/// Created fresh for every pass. The change flag only ever goes from false to
/// true and is read by the coordinator after all workers have joined.
#[derive(Debug)]
pub struct PassContext {
    changed: AtomicBool,
    started_at: DateTime<Utc>,
    settings: Settings,
}

impl PassContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            changed: AtomicBool::new(false),
            started_at: Utc::now(),
            settings,
        }
    }

    /// Record that local media was added or removed.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    pub fn changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Settings as they were when the pass started.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
