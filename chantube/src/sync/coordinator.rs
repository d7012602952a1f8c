//! Sync coordinator: runs one complete pass over every channel.
//!
//! A pass queues every idle channel, fans the channel pipelines out to a
//! semaphore-bounded `JoinSet`, waits for all of them, persists the registry
//! and, if anything changed on disk, asks the media servers to rescan.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{ChannelPipeline, PassContext, SyncEvent};
use crate::config::SettingsStore;
use crate::error::{ChannelError, PassError};
use crate::notification::{DispatchReport, NotificationDispatcher};
use crate::registry::ChannelRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Complete,
    /// Channel work finished but persisting or notifying failed.
    Incomplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Channels queued by this pass.
    pub channels: usize,
    pub completed: usize,
    pub failed: usize,
    /// Local media was added or removed.
    pub changed: bool,
    pub dispatch: Option<DispatchReport>,
    pub outcome: PassOutcome,
}

/// Result of a manual trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerResult {
    Started,
    AlreadyRunning,
}

pub struct SyncCoordinator {
    registry: Arc<ChannelRegistry>,
    settings: Arc<SettingsStore>,
    pipeline: ChannelPipeline,
    dispatcher: Arc<NotificationDispatcher>,
    /// Held for the duration of a pass.
    running: Arc<Mutex<()>>,
}

impl SyncCoordinator {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        settings: Arc<SettingsStore>,
        pipeline: ChannelPipeline,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            registry,
            settings,
            pipeline,
            dispatcher,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Run a pass, waiting for any pass already in flight to finish first.
    pub async fn run_pass(&self) -> PassReport {
        let guard = self.running.clone().lock_owned().await;
        self.run_locked(guard).await
    }

    /// Start a pass in the background unless one is already running.
    pub fn trigger_now(self: &Arc<Self>) -> TriggerResult {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            info!("Manual sync requested while a pass is running");
            return TriggerResult::AlreadyRunning;
        };

        info!("Manual sync triggered");
        self.registry.publish_snapshot();
        let this = self.clone();
        tokio::spawn(async move {
            this.run_locked(guard).await;
        });
        TriggerResult::Started
    }

    async fn run_locked(&self, _guard: OwnedMutexGuard<()>) -> PassReport {
        let ctx = Arc::new(PassContext::new(self.settings.get()));
        let events = self.registry.events().clone();

        self.registry.publish_snapshot();
        let queued = self.registry.queue_idle();
        let workers = ctx.settings().worker_count();
        info!(channels = queued.len(), workers, "Sync pass started");
        events.publish(SyncEvent::PassStarted {
            channels: queued.len(),
        });

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for channel in &queued {
            let id = channel.id;
            let pipeline = self.pipeline.clone();
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (id, Err(ChannelError::Removed(id)));
                };
                (id, pipeline.process_channel(id, &ctx).await)
            });
        }

        let mut completed = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => completed += 1,
                Ok((id, Err(ChannelError::Removed(_)))) => {
                    debug!(channel_id = id, "Channel removed during pass");
                }
                Ok((_, Err(_))) => failed += 1,
                Err(e) => error!(error = %e, "Channel task panicked"),
            }
        }

        // A panicked worker leaves its channel transient.
        for channel in &queued {
            if self.registry.fail_if_transient(channel.id) {
                warn!(channel_id = channel.id, "Channel left mid-sync, marked failed");
                failed += 1;
            }
        }

        let mut outcome = PassOutcome::Complete;
        if !self.registry.is_empty()
            && let Err(e) = self.registry.persist()
        {
            error!(error = %PassError::Persist(e), "Sync pass could not save state");
            outcome = PassOutcome::Incomplete;
        }

        let changed = ctx.changed();
        let mut dispatch = None;
        if changed {
            let servers = ctx.settings().media_servers();
            if NotificationDispatcher::has_targets(&servers) {
                let report = self.dispatcher.dispatch(&servers).await;
                if !report.is_success() {
                    let err = PassError::Dispatch {
                        attempted: report.attempted.len(),
                        failed: report.failed.len(),
                    };
                    error!(error = %err, "Library refresh incomplete");
                    outcome = PassOutcome::Incomplete;
                }
                dispatch = Some(report);
            } else {
                debug!("No media servers configured, skipping refresh");
            }
        }

        let report = PassReport {
            started_at: ctx.started_at(),
            finished_at: Utc::now(),
            channels: queued.len(),
            completed,
            failed,
            changed,
            dispatch,
            outcome,
        };
        info!(
            completed,
            failed,
            changed,
            outcome = ?report.outcome,
            "Sync pass finished"
        );

        self.registry.publish_snapshot();
        events.publish(SyncEvent::PassFinished(report.clone()));
        report
    }
}
