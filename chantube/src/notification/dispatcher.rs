//! Best-effort fan-out of refresh calls to the configured servers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{
    LibraryRefresher, MediaServerConfig, MediaServerKind, RefreshTarget, parse_service_map,
};

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: Vec<MediaServerKind>,
    pub failed: Vec<MediaServerKind>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct NotificationDispatcher {
    refreshers: Vec<Arc<dyn LibraryRefresher>>,
}

impl NotificationDispatcher {
    pub fn new(refreshers: Vec<Arc<dyn LibraryRefresher>>) -> Self {
        Self { refreshers }
    }

    /// Plex and Jellyfin over HTTP.
    pub fn with_default_refreshers() -> Self {
        let plex: Arc<dyn LibraryRefresher> = Arc::new(super::PlexRefresher::new());
        let jellyfin: Arc<dyn LibraryRefresher> = Arc::new(super::JellyfinRefresher::new());
        Self::new(vec![plex, jellyfin])
    }

    /// Servers present in both the address and token lists.
    ///
    /// Unknown service names are logged and skipped.
    pub fn resolve_targets(config: &MediaServerConfig) -> Vec<RefreshTarget> {
        let tokens = parse_service_map(&config.tokens);
        let mut targets: Vec<RefreshTarget> = Vec::new();

        for (name, address) in parse_service_map(&config.addresses) {
            let Some(kind) = MediaServerKind::from_name(&name) else {
                warn!(service = %name, "Unknown media server, skipping");
                continue;
            };
            if targets.iter().any(|t| t.kind == kind) {
                continue;
            }
            let token = tokens
                .iter()
                .find(|(n, _)| MediaServerKind::from_name(n) == Some(kind))
                .map(|(_, t)| t.clone());
            let Some(token) = token else {
                info!(service = %kind, "No token configured, skipping");
                continue;
            };
            targets.push(RefreshTarget {
                kind,
                address,
                token,
                library_name: config.library_name.trim().to_string(),
            });
        }

        targets
    }

    pub fn has_targets(config: &MediaServerConfig) -> bool {
        !Self::resolve_targets(config).is_empty()
    }

    /// Refresh every configured server. A failure is logged and the next
    /// server is still attempted.
    pub async fn dispatch(&self, config: &MediaServerConfig) -> DispatchReport {
        let mut report = DispatchReport::default();

        for target in Self::resolve_targets(config) {
            let Some(refresher) = self.refreshers.iter().find(|r| r.kind() == target.kind) else {
                warn!(service = %target.kind, "No refresher registered, skipping");
                continue;
            };

            report.attempted.push(target.kind);
            if let Err(e) = refresher.refresh(&target).await {
                error!(service = %target.kind, address = %target.address, error = %e, "Library refresh failed");
                report.failed.push(target.kind);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::{Error, Result};

    struct FakeRefresher {
        kind: MediaServerKind,
        fail: bool,
        calls: Mutex<Vec<RefreshTarget>>,
    }

    impl FakeRefresher {
        fn new(kind: MediaServerKind, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LibraryRefresher for FakeRefresher {
        fn kind(&self) -> MediaServerKind {
            self.kind
        }

        async fn refresh(&self, target: &RefreshTarget) -> Result<()> {
            self.calls.lock().push(target.clone());
            if self.fail {
                Err(Error::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn config(addresses: &str, tokens: &str) -> MediaServerConfig {
        MediaServerConfig {
            addresses: addresses.to_string(),
            tokens: tokens.to_string(),
            library_name: "YouTube".to_string(),
        }
    }

    #[tokio::test]
    async fn test_only_servers_with_tokens_are_attempted() {
        let plex = FakeRefresher::new(MediaServerKind::Plex, false);
        let jellyfin = FakeRefresher::new(MediaServerKind::Jellyfin, false);
        let dispatcher = NotificationDispatcher::new(vec![
            plex.clone() as Arc<dyn LibraryRefresher>,
            jellyfin.clone(),
        ]);

        let cfg = config(
            "Plex: http://192.168.1.2:32400, Jellyfin: http://192.168.1.2:8096",
            "Plex: abc",
        );
        let report = dispatcher.dispatch(&cfg).await;

        assert_eq!(report.attempted, vec![MediaServerKind::Plex]);
        assert!(report.is_success());
        let calls = plex.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].address, "http://192.168.1.2:32400");
        assert_eq!(calls[0].token, "abc");
        assert!(jellyfin.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_next_server() {
        let plex = FakeRefresher::new(MediaServerKind::Plex, true);
        let jellyfin = FakeRefresher::new(MediaServerKind::Jellyfin, false);
        let dispatcher =
            NotificationDispatcher::new(vec![plex as Arc<dyn LibraryRefresher>, jellyfin.clone()]);

        let cfg = config("plex: http://a, JELLYFIN: http://b", "Plex: t1, jellyfin: t2");
        let report = dispatcher.dispatch(&cfg).await;

        assert_eq!(report.attempted.len(), 2);
        assert_eq!(report.failed, vec![MediaServerKind::Plex]);
        assert_eq!(jellyfin.calls.lock().len(), 1);
    }

    #[test]
    fn test_unknown_names_skipped() {
        let cfg = config("Emby: http://e, Plex: http://p", "Emby: x, Plex: y");
        let targets = NotificationDispatcher::resolve_targets(&cfg);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, MediaServerKind::Plex);
        assert!(!NotificationDispatcher::has_targets(&config("", "Plex: y")));
    }
}
