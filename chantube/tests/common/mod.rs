//! In-memory collaborators and a wired-up coordinator for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

use chantube::config::{Settings, SettingsStore, StoragePaths};
use chantube::domain::{Candidate, Channel, ChannelDraft, LiveStatus, MediaType};
use chantube::media::{
    AcquireProgress, AcquireRequest, Acquirer, Discovery, DiscoveryRequest, ItemTags,
    MediaBackend, MediaTagger,
};
use chantube::notification::{
    LibraryRefresher, MediaServerKind, NotificationDispatcher, RefreshTarget,
};
use chantube::registry::ChannelRegistry;
use chantube::sync::{ChannelPipeline, SyncCoordinator, SyncEventBroadcaster};
use chantube::{Error, Result};

pub fn candidate(id: &str, title: &str, uploaded_at: Option<DateTime<Utc>>) -> Candidate {
    Candidate {
        id: id.to_string(),
        title: title.to_string(),
        link: format!("https://www.youtube.com/watch?v={id}"),
        duration: Some(600),
        uploaded_at,
        channel: String::new(),
        live_status: LiveStatus::None,
    }
}

pub fn hours_ago(hours: i64) -> Option<DateTime<Utc>> {
    Some(Utc::now() - chrono::Duration::hours(hours))
}

/// Remote listings keyed by channel name.
#[derive(Default)]
pub struct FakeSource {
    listings: Mutex<HashMap<String, Vec<Candidate>>>,
    broken: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<DiscoveryRequest>>,
}

impl FakeSource {
    pub fn set(&self, channel: &str, items: Vec<Candidate>) {
        let items = items
            .into_iter()
            .map(|mut c| {
                c.channel = channel.to_string();
                c
            })
            .collect();
        self.listings.lock().insert(channel.to_string(), items);
    }

    pub fn break_channel(&self, channel: &str) {
        self.broken.lock().push(channel.to_string());
    }
}

#[async_trait]
impl Discovery for FakeSource {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<Candidate>> {
        self.requests.lock().push(request.clone());
        if self.broken.lock().contains(&request.channel_name) {
            return Err(Error::process("listing failed: HTTP Error 404"));
        }
        Ok(self
            .listings
            .lock()
            .get(&request.channel_name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Writes a small file per request and tracks concurrency.
#[derive(Default)]
pub struct FakeAcquirer {
    pub delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Titles whose download panics the worker.
    panic_on: Mutex<Vec<String>>,
}

impl FakeAcquirer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn panic_on(&self, title: &str) {
        self.panic_on.lock().push(title.to_string());
    }
}

#[async_trait]
impl Acquirer for FakeAcquirer {
    async fn acquire(
        &self,
        request: &AcquireRequest,
        progress: mpsc::Sender<AcquireProgress>,
    ) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.lock().contains(&request.candidate.title) {
            panic!("acquirer blew up on {}", request.candidate.title);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let _ = progress.try_send(AcquireProgress {
            channel: request.candidate.channel.clone(),
            title: request.candidate.title.clone(),
            percent: 100.0,
            total: None,
            speed: None,
            eta: None,
        });

        let ext = match request.media_type {
            MediaType::Video => "mp4",
            MediaType::Audio => "mp3",
        };
        let path = request
            .output_dir
            .join(format!("{}.{ext}", request.file_stem));
        let written = tokio::fs::write(&path, request.candidate.id.as_bytes()).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        written?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct MemoryTagger {
    tags: Mutex<HashMap<PathBuf, ItemTags>>,
}

impl MemoryTagger {
    pub fn insert(&self, path: &Path, tags: ItemTags) {
        self.tags.lock().insert(path.to_path_buf(), tags);
    }
}

#[async_trait]
impl MediaTagger for MemoryTagger {
    async fn embed(&self, path: &Path, tags: &ItemTags) -> Result<()> {
        self.insert(path, tags.clone());
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Option<ItemTags>> {
        Ok(self.tags.lock().get(path).cloned())
    }
}

pub struct RecordingRefresher {
    kind: MediaServerKind,
    pub targets: Mutex<Vec<RefreshTarget>>,
    failing: AtomicBool,
}

impl RecordingRefresher {
    pub fn new(kind: MediaServerKind) -> Self {
        Self {
            kind,
            targets: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.targets.lock().len()
    }

    /// Record calls but answer them with an error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LibraryRefresher for RecordingRefresher {
    fn kind(&self) -> MediaServerKind {
        self.kind
    }

    async fn refresh(&self, target: &RefreshTarget) -> Result<()> {
        self.targets.lock().push(target.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Other(format!("{} refused the refresh", self.kind)));
        }
        Ok(())
    }
}

/// Everything a pass needs, rooted in a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub paths: StoragePaths,
    pub registry: Arc<ChannelRegistry>,
    pub settings: Arc<SettingsStore>,
    pub source: Arc<FakeSource>,
    pub acquirer: Arc<FakeAcquirer>,
    pub tagger: Arc<MemoryTagger>,
    pub plex: Arc<RecordingRefresher>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_acquirer(FakeAcquirer::default())
    }

    /// Plex is configured with a token so changed passes notify it.
    pub fn with_acquirer(acquirer: FakeAcquirer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths {
            config_dir: dir.path().join("config"),
            video_dir: dir.path().join("video"),
            audio_dir: dir.path().join("audio"),
        };

        let settings = Arc::new(SettingsStore::load(&paths.config_dir));
        settings
            .replace(Settings {
                media_server_addresses: "Plex: http://plex.local:32400".to_string(),
                media_server_tokens: "Plex: secret".to_string(),
                ..Settings::default()
            })
            .unwrap();

        let registry = Arc::new(ChannelRegistry::load(
            &paths.config_dir,
            SyncEventBroadcaster::new(),
        ));
        let source = Arc::new(FakeSource::default());
        let acquirer = Arc::new(acquirer);
        let tagger = Arc::new(MemoryTagger::default());
        let media = MediaBackend::new(source.clone(), acquirer.clone(), tagger.clone());
        let pipeline = ChannelPipeline::new(registry.clone(), media, paths.clone());

        let plex = Arc::new(RecordingRefresher::new(MediaServerKind::Plex));
        let refresher: Arc<dyn LibraryRefresher> = plex.clone();
        let dispatcher = Arc::new(NotificationDispatcher::new(vec![refresher]));
        let coordinator = Arc::new(SyncCoordinator::new(
            registry.clone(),
            settings.clone(),
            pipeline,
            dispatcher,
        ));

        Self {
            dir,
            paths,
            registry,
            settings,
            source,
            acquirer,
            tagger,
            plex,
            coordinator,
        }
    }

    pub fn add_channel(&self, draft: ChannelDraft) -> Channel {
        self.registry.add(draft).unwrap()
    }

    pub fn set_workers(&self, workers: usize) {
        let mut settings = self.settings.get();
        settings.concurrent_limit = workers;
        self.settings.replace(settings).unwrap();
    }

    /// Put a plain file where the config directory was, so saving the
    /// channel list fails even for a privileged user.
    pub fn break_config_dir(&self) {
        std::fs::remove_dir_all(&self.paths.config_dir).unwrap();
        std::fs::write(&self.paths.config_dir, b"not a directory").unwrap();
    }

    pub fn channel_dir(&self, channel: &Channel) -> PathBuf {
        chantube::media::library::channel_dir(
            self.paths.root_for(channel.media_type),
            &channel.name,
        )
    }
}
