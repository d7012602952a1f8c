//! Window scheduler.
//!
//! Polls the wall clock and starts a sync pass when the current local hour is
//! one of the configured trigger hours. Each (date, hour) slot fires at most
//! once, however long the pass takes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SettingsStore;
use crate::sync::SyncCoordinator;

/// A trigger slot: one local hour on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireSlot {
    pub date: NaiveDate,
    pub hour: u32,
}

impl FireSlot {
    pub fn of(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            hour: now.hour(),
        }
    }
}

/// What the scheduler loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Fire(FireSlot),
    Wait(Duration),
}

/// Decide whether to start a pass at `now`.
pub fn next_action(
    now: NaiveDateTime,
    hours: &[u32],
    last_fired: Option<FireSlot>,
    poll: Duration,
) -> TickAction {
    let slot = FireSlot::of(now);
    if hours.contains(&slot.hour) && last_fired != Some(slot) {
        TickAction::Fire(slot)
    } else {
        TickAction::Wait(poll)
    }
}

/// Time left until the next top of the hour.
pub fn until_next_hour(now: NaiveDateTime) -> Duration {
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - into_hour.min(3599))
}

pub struct WindowScheduler {
    coordinator: Arc<SyncCoordinator>,
    settings: Arc<SettingsStore>,
    poll: Duration,
}

impl WindowScheduler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        settings: Arc<SettingsStore>,
        poll: Duration,
    ) -> Self {
        Self {
            coordinator,
            settings,
            poll,
        }
    }

    /// Run until `cancel` fires. An in-flight pass is dropped on cancel;
    /// channels it left mid-sync are reconciled on the next start.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            hours = ?self.settings.sync_hours(),
            poll_secs = self.poll.as_secs(),
            "Scheduler started"
        );
        let mut last_fired = None;

        loop {
            let now = Local::now().naive_local();
            let hours = self.settings.sync_hours();

            let wait = match next_action(now, &hours, last_fired, self.poll) {
                TickAction::Fire(slot) => {
                    last_fired = Some(slot);
                    info!(hour = slot.hour, "Sync window reached, starting pass");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        report = self.coordinator.run_pass() => {
                            debug!(outcome = ?report.outcome, "Scheduled pass done");
                        }
                    }
                    until_next_hour(Local::now().naive_local())
                }
                TickAction::Wait(wait) => wait,
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Scheduler stopped");
    }
}
