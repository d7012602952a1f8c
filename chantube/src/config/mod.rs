//! Configuration: process environment and persisted runtime settings.

mod app;
mod settings;

pub use app::{AppConfig, StoragePaths};
pub use settings::{SETTINGS_FILE, Settings, SettingsStore, parse_sync_hours};
