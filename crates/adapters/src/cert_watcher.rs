// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced filesystem watch for the host certificate.
//!
//! Watches the *directory* containing the cert, not the file itself, so an
//! atomic replace (write to a temp file, rename over the original) is seen
//! even though the original inode disappears. A single atomic rename is
//! often reported by the OS as `Rename`+`Create` microseconds apart; the two
//! event kinds are debounced independently so collapsing them doesn't also
//! collapse away a genuine `Remove`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(20);
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertEvent {
    Write,
    Remove,
}

#[derive(Debug, thiserror::Error)]
pub enum CertWatcherError {
    #[error("failed to watch certificate directory: {0}")]
    Watch(#[from] notify::Error),
    #[error("certificate path has no parent directory: {0}")]
    NoParentDir(PathBuf),
}

struct Debounce {
    last_write: Mutex<Option<Instant>>,
    last_remove: Mutex<Option<Instant>>,
}

impl Debounce {
    fn new() -> Self {
        Self {
            last_write: Mutex::new(None),
            last_remove: Mutex::new(None),
        }
    }

    /// Returns `true` if an event of this kind should be emitted now, and
    /// records the emission time so the next one within the window is
    /// suppressed.
    fn should_emit(&self, kind: CertEvent) -> bool {
        let slot = match kind {
            CertEvent::Write => &self.last_write,
            CertEvent::Remove => &self.last_remove,
        };
        let mut last = slot.lock();
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < DEBOUNCE_WINDOW {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

pub struct CertWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<CertEvent>,
}

impl CertWatcher {
    /// Begins watching `cert_path`'s containing directory. Events for any
    /// other file in that directory are filtered out.
    pub fn new(cert_path: impl AsRef<Path>) -> Result<Self, CertWatcherError> {
        let cert_path = cert_path.as_ref();
        let watch_dir = cert_path
            .parent()
            .ok_or_else(|| CertWatcherError::NoParentDir(cert_path.to_path_buf()))?
            .to_path_buf();
        let target = cert_path.to_path_buf();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let debounce = Arc::new(Debounce::new());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            let Some(mapped) = map_event(&event.kind) else {
                return;
            };
            if !event_matches_target(&event, &target) {
                return;
            }
            if !debounce.should_emit(mapped) {
                return;
            }
            if tx.blocking_send(mapped).is_err() {
                tracing::debug!(?mapped, "cert event dropped, receiver gone");
            }
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %watch_dir.display(), "watching certificate directory");

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Awaits the next cert event; returns `None` once the underlying
    /// watcher has failed and closed the channel. Callers should treat a
    /// closed channel as "cert-driven reloads disabled," not as fatal.
    pub async fn recv(&mut self) -> Option<CertEvent> {
        self.rx.recv().await
    }
}

fn map_event(kind: &EventKind) -> Option<CertEvent> {
    use notify::event::ModifyKind;
    match kind {
        EventKind::Create(_) => Some(CertEvent::Write),
        EventKind::Modify(ModifyKind::Name(_)) => Some(CertEvent::Remove),
        EventKind::Modify(_) => Some(CertEvent::Write),
        EventKind::Remove(_) => Some(CertEvent::Remove),
        _ => None,
    }
}

fn event_matches_target(event: &Event, target: &Path) -> bool {
    event.paths.iter().any(|p| paths_equal(p, target))
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::fs;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    #[yare::parameterized(
        create = { EventKind::Create(CreateKind::File), Some(CertEvent::Write) },
        modify = { EventKind::Modify(ModifyKind::Any), Some(CertEvent::Write) },
        modify_rename = { EventKind::Modify(ModifyKind::Name(RenameMode::Any)), Some(CertEvent::Remove) },
        remove = { EventKind::Remove(RemoveKind::File), Some(CertEvent::Remove) },
        access = { EventKind::Access(notify::event::AccessKind::Any), None },
    )]
    fn maps_notify_event_kinds(kind: EventKind, expected: Option<CertEvent>) {
        assert_eq!(map_event(&kind), expected);
    }

    async fn recv_within(watcher: &mut CertWatcher, millis: u64) -> Option<CertEvent> {
        tokio::time::timeout(StdDuration::from_millis(millis), watcher.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn write_then_remove_are_reported_independently() {
        let dir = tempdir().expect("tempdir");
        let cert_path = dir.path().join("cert.pem");
        fs::write(&cert_path, b"initial").expect("seed cert");

        let mut watcher = CertWatcher::new(&cert_path).expect("watch");

        fs::write(&cert_path, b"rotated").expect("rewrite cert");
        let first = recv_within(&mut watcher, 500).await;
        assert_eq!(first, Some(CertEvent::Write));

        fs::remove_file(&cert_path).expect("remove cert");
        let second = recv_within(&mut watcher, 500).await;
        assert_eq!(second, Some(CertEvent::Remove));
    }

    #[tokio::test]
    async fn debounces_rapid_writes_of_the_same_kind() {
        let dir = tempdir().expect("tempdir");
        let cert_path = dir.path().join("cert.pem");
        fs::write(&cert_path, b"initial").expect("seed cert");

        let mut watcher = CertWatcher::new(&cert_path).expect("watch");
        for i in 0..5 {
            fs::write(&cert_path, format!("v{i}")).expect("rewrite cert");
        }

        let first = recv_within(&mut watcher, 500).await;
        assert_eq!(first, Some(CertEvent::Write));
        // subsequent rapid writes within the debounce window should not
        // all individually surface.
        let extra = recv_within(&mut watcher, 10).await;
        assert!(extra.is_none() || extra == Some(CertEvent::Write));
    }

    #[tokio::test]
    async fn ignores_events_for_unrelated_files() {
        let dir = tempdir().expect("tempdir");
        let cert_path = dir.path().join("cert.pem");
        fs::write(&cert_path, b"initial").expect("seed cert");
        let mut watcher = CertWatcher::new(&cert_path).expect("watch");

        fs::write(dir.path().join("unrelated.txt"), b"noise").expect("write unrelated");
        let event = recv_within(&mut watcher, 200).await;
        assert!(event.is_none());
    }
}
