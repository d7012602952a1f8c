use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use chantube::api::{ApiServer, AppState};
use chantube::config::{AppConfig, SettingsStore};
use chantube::logging;
use chantube::media::MediaBackend;
use chantube::notification::NotificationDispatcher;
use chantube::registry::ChannelRegistry;
use chantube::scheduler::WindowScheduler;
use chantube::sync::{ChannelPipeline, SyncCoordinator, SyncEventBroadcaster};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // The guard flushes buffered file output on drop.
    let (logging_config, _log_guard) =
        logging::init_logging(&config.log_dir).context("failed to initialise logging")?;

    let settings = Arc::new(SettingsStore::load(&config.paths.config_dir));
    if !settings.path().exists() {
        settings.save().context("failed to write initial settings")?;
    }

    let events = SyncEventBroadcaster::new();
    let registry = Arc::new(ChannelRegistry::load(&config.paths.config_dir, events));
    tracing::info!(channels = registry.len(), "Channel registry loaded");

    let media = MediaBackend::external_tools(config.ytdlp(), config.tagger());
    let pipeline = ChannelPipeline::new(registry.clone(), media, config.paths.clone());
    let dispatcher = Arc::new(NotificationDispatcher::with_default_refreshers());
    let coordinator = Arc::new(SyncCoordinator::new(
        registry.clone(),
        settings.clone(),
        pipeline,
        dispatcher,
    ));

    let cancel = CancellationToken::new();
    logging_config.start_retention_cleanup(cancel.child_token());

    let scheduler = WindowScheduler::new(coordinator.clone(), settings.clone(), config.scheduler_poll);
    let scheduler_task = tokio::spawn(scheduler.run(cancel.child_token()));

    let state = AppState::new(registry.clone(), settings, coordinator)
        .with_logging_config(logging_config);
    let server = ApiServer::new(config.api.clone(), state, cancel.child_token());
    let mut server_task = tokio::spawn(async move { server.run().await });

    let finished = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
            None
        }
        joined = &mut server_task => Some(joined),
    };
    cancel.cancel();

    let joined = match finished {
        Some(joined) => joined,
        None => server_task.await,
    };
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
        Err(e) => tracing::error!(error = %e, "API server task ended abnormally"),
    }

    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }

    // A pass cut short leaves channels queued or in progress; they are
    // written as Incomplete.
    if let Err(e) = registry.persist() {
        tracing::error!(error = %e, "Failed to save channel list on shutdown");
    }

    tracing::info!("chantube stopped");
    Ok(())
}
