//! Channel registry.
//!
//! The registry holds the ordered channel list in memory and is the single
//! source of truth during runtime. User edits are written through to
//! `channel_list.json` immediately; status changes made by a sync pass stay
//! in memory until the coordinator persists them at the end of the pass.
//! Written files never carry `Queued`/`In Progress`: those are saved as
//! `Incomplete`.

mod store;

pub use store::{CHANNEL_LIST_FILE, ChannelStore, sort_channels};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{Channel, ChannelDraft, SyncStatus};
use crate::sync::{SyncEvent, SyncEventBroadcaster};
use crate::{Error, Result};

pub struct ChannelRegistry {
    channels: RwLock<Vec<Channel>>,
    store: ChannelStore,
    /// Serializes file writes.
    write_lock: Mutex<()>,
    /// Never reused while the process runs, so a worker cannot touch a
    /// channel added after its own was removed.
    next_id: AtomicU64,
    events: SyncEventBroadcaster,
}

impl ChannelRegistry {
    /// Load from `<config_dir>/channel_list.json`.
    pub fn load(config_dir: &Path, events: SyncEventBroadcaster) -> Self {
        let store = ChannelStore::new(config_dir);
        let channels = store.load();
        let next_id = channels.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            channels: RwLock::new(channels),
            store,
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(next_id),
            events,
        }
    }

    pub fn events(&self) -> &SyncEventBroadcaster {
        &self.events
    }

    pub fn list(&self) -> Vec<Channel> {
        self.channels.read().clone()
    }

    pub fn get(&self, id: u64) -> Option<Channel> {
        self.channels.read().iter().find(|c| c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Publish the current channel list to observers.
    pub fn publish_snapshot(&self) {
        self.events.publish(SyncEvent::Snapshot(self.list()));
    }

    /// Write the current list to disk.
    pub fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut snapshot = self.list();
        for channel in &mut snapshot {
            channel.last_synced = channel.last_synced.reconciled();
        }
        self.store.save(&snapshot)?;
        debug!(count = snapshot.len(), "Channel list saved");
        Ok(())
    }

    fn ensure_unique_name(channels: &[Channel], name: &str, except: Option<u64>) -> Result<()> {
        let wanted = name.trim().to_lowercase();
        if channels
            .iter()
            .any(|c| Some(c.id) != except && c.name.to_lowercase() == wanted)
        {
            return Err(Error::Conflict(format!("a channel named '{}' already exists", name.trim())));
        }
        Ok(())
    }

    /// Add a channel with the next free id.
    pub fn add(&self, draft: ChannelDraft) -> Result<Channel> {
        draft.validate()?;
        let channel = {
            let mut channels = self.channels.write();
            Self::ensure_unique_name(&channels, &draft.name, None)?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let channel = Channel::from_draft(id, draft);
            channels.push(channel.clone());
            sort_channels(&mut channels);
            channel
        };

        self.persist()?;
        info!(channel_id = channel.id, channel = %channel.name, "Channel added");
        self.publish_snapshot();
        Ok(channel)
    }

    /// Replace a channel's user-editable fields.
    pub fn update(&self, id: u64, draft: ChannelDraft) -> Result<Channel> {
        draft.validate()?;
        let channel = {
            let mut channels = self.channels.write();
            Self::ensure_unique_name(&channels, &draft.name, Some(id))?;
            let channel = channels
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| Error::not_found("channel", id))?;
            channel.apply_draft(draft);
            let updated = channel.clone();
            sort_channels(&mut channels);
            updated
        };

        self.persist()?;
        info!(channel_id = id, channel = %channel.name, "Channel updated");
        self.publish_snapshot();
        Ok(channel)
    }

    pub fn remove(&self, id: u64) -> Result<Channel> {
        let removed = {
            let mut channels = self.channels.write();
            let index = channels
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| Error::not_found("channel", id))?;
            channels.remove(index)
        };

        self.persist()?;
        info!(channel_id = id, channel = %removed.name, "Channel removed");
        self.publish_snapshot();
        Ok(removed)
    }

    /// Run `f` on one channel under a short write lock.
    pub fn with_channel_mut<R>(&self, id: u64, f: impl FnOnce(&mut Channel) -> R) -> Option<R> {
        let mut channels = self.channels.write();
        channels.iter_mut().find(|c| c.id == id).map(f)
    }

    /// Move a channel to `status` and publish a snapshot.
    pub fn set_status(&self, id: u64, status: SyncStatus) -> Result<()> {
        self.with_channel_mut(id, |c| c.set_status(status))
            .ok_or_else(|| Error::not_found("channel", id))??;
        debug!(channel_id = id, %status, "Channel status changed");
        self.publish_snapshot();
        Ok(())
    }

    /// Record a finished run. The count is only stored if the channel is
    /// still the one the pass started on, i.e. it can move to `Complete`.
    pub fn mark_complete(&self, id: u64, item_count: u64) -> Result<()> {
        self.with_channel_mut(id, |c| {
            c.set_status(SyncStatus::complete_now())?;
            c.item_count = item_count;
            Ok::<_, Error>(())
        })
        .ok_or_else(|| Error::not_found("channel", id))??;
        debug!(channel_id = id, item_count, "Channel marked complete");
        self.publish_snapshot();
        Ok(())
    }

    /// Queue every channel not already owned by a pass; returns them in
    /// registry order.
    pub fn queue_idle(&self) -> Vec<Channel> {
        let queued: Vec<Channel> = {
            let mut channels = self.channels.write();
            channels
                .iter_mut()
                .filter(|c| !c.last_synced.is_transient())
                .filter_map(|c| {
                    c.set_status(SyncStatus::Queued).ok()?;
                    Some(c.clone())
                })
                .collect()
        };
        if !queued.is_empty() {
            self.publish_snapshot();
        }
        queued
    }

    /// Mark `id` failed if a pass left it transient.
    pub fn fail_if_transient(&self, id: u64) -> bool {
        let changed = self
            .with_channel_mut(id, |c| {
                if c.last_synced.is_transient() {
                    c.last_synced = SyncStatus::Failed;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if changed {
            self.publish_snapshot();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, ChannelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ChannelRegistry::load(dir.path(), SyncEventBroadcaster::new());
        (dir, registry)
    }

    #[test]
    fn test_add_assigns_next_id_and_persists() {
        let (dir, registry) = registry();
        let a = registry.add(ChannelDraft::new("b-chan")).unwrap();
        let b = registry.add(ChannelDraft::new("A-chan")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        registry.remove(1).unwrap();
        let c = registry.add(ChannelDraft::new("c-chan")).unwrap();
        assert_eq!(c.id, 3);

        let reloaded = ChannelRegistry::load(dir.path(), SyncEventBroadcaster::new());
        let names: Vec<_> = reloaded.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["A-chan", "c-chan"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (_dir, registry) = registry();
        registry.add(ChannelDraft::new("Same")).unwrap();
        assert!(matches!(
            registry.add(ChannelDraft::new("same ")),
            Err(Error::Conflict(_))
        ));

        let other = registry.add(ChannelDraft::new("Other")).unwrap();
        assert!(registry.update(other.id, ChannelDraft::new("SAME")).is_err());
        assert!(registry.update(other.id, ChannelDraft::new("Other")).is_ok());
    }

    #[test]
    fn test_missing_channel_is_not_found() {
        let (_dir, registry) = registry();
        assert!(matches!(registry.remove(9), Err(Error::NotFound { .. })));
        assert!(registry.set_status(9, SyncStatus::Queued).is_err());
    }

    #[test]
    fn test_queue_idle_skips_transient() {
        let (_dir, registry) = registry();
        let a = registry.add(ChannelDraft::new("a")).unwrap();
        let b = registry.add(ChannelDraft::new("b")).unwrap();
        registry.set_status(a.id, SyncStatus::Queued).unwrap();

        let queued = registry.queue_idle();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, b.id);
        assert_eq!(registry.get(b.id).unwrap().last_synced, SyncStatus::Queued);

        assert!(registry.fail_if_transient(a.id));
        assert_eq!(registry.get(a.id).unwrap().last_synced, SyncStatus::Failed);
        assert!(!registry.fail_if_transient(a.id));
    }

    #[test]
    fn test_removed_highest_id_is_not_reused() {
        let (_dir, registry) = registry();
        registry.add(ChannelDraft::new("a")).unwrap();
        let b = registry.add(ChannelDraft::new("b")).unwrap();
        registry.set_status(b.id, SyncStatus::Queued).unwrap();
        registry.set_status(b.id, SyncStatus::InProgress).unwrap();

        registry.remove(b.id).unwrap();
        let c = registry.add(ChannelDraft::new("c")).unwrap();
        assert_ne!(c.id, b.id);

        // A worker that was still running for `b` finds nothing to update.
        assert!(registry.mark_complete(b.id, 7).is_err());
        assert_eq!(registry.get(c.id).unwrap().item_count, 0);
    }

    #[test]
    fn test_mark_complete_requires_in_progress() {
        let (_dir, registry) = registry();
        let a = registry.add(ChannelDraft::new("a")).unwrap();
        assert!(registry.mark_complete(a.id, 4).is_err());
        let unchanged = registry.get(a.id).unwrap();
        assert_eq!(unchanged.item_count, 0);
        assert_eq!(unchanged.last_synced, SyncStatus::NeverSynced);

        registry.set_status(a.id, SyncStatus::Queued).unwrap();
        registry.set_status(a.id, SyncStatus::InProgress).unwrap();
        registry.mark_complete(a.id, 4).unwrap();
        let done = registry.get(a.id).unwrap();
        assert_eq!(done.item_count, 4);
        assert!(matches!(done.last_synced, SyncStatus::Complete(_)));
    }

    #[test]
    fn test_edit_during_pass_writes_no_transient_status() {
        let (dir, registry) = registry();
        let a = registry.add(ChannelDraft::new("a")).unwrap();
        registry.queue_idle();
        registry.set_status(a.id, SyncStatus::InProgress).unwrap();

        registry.add(ChannelDraft::new("b")).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(CHANNEL_LIST_FILE)).unwrap();
        assert!(raw.contains("\"Incomplete\""));
        assert!(!raw.contains("In Progress"));
        assert!(!raw.contains("Queued"));

        // The live status is untouched.
        assert_eq!(registry.get(a.id).unwrap().last_synced, SyncStatus::InProgress);
    }

    #[tokio::test]
    async fn test_status_change_publishes_snapshot() {
        let (_dir, registry) = registry();
        let a = registry.add(ChannelDraft::new("a")).unwrap();
        let mut rx = registry.events().subscribe();

        registry.set_status(a.id, SyncStatus::Queued).unwrap();
        match rx.recv().await.unwrap() {
            SyncEvent::Snapshot(list) => assert_eq!(list[0].last_synced, SyncStatus::Queued),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
