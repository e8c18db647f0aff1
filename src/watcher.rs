//! Source directory watcher.
//!
//! The notify backend only enqueues work; bundles are processed one at a
//! time on the thread that calls [`BundleWatcher::run`], in arrival order.

use crate::error::{Error, Result};
use crate::model::is_bundle_path;
use log::{debug, info, warn};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const MAX_SETTLE_CHECKS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Bundle(PathBuf),
    Shutdown,
}

pub struct BundleWatcher {
    _watcher: RecommendedWatcher,
    tx: Sender<WatchEvent>,
    rx: Receiver<WatchEvent>,
}

impl BundleWatcher {
    pub fn new(source_dir: &Path) -> Result<Self> {
        if !source_dir.is_dir() {
            return Err(Error::MissingSourceDir(source_dir.to_path_buf()));
        }

        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in bundle_paths(&event) {
                    info!("AppImage changed: {:?}", path);
                    let _ = event_tx.send(WatchEvent::Bundle(path));
                }
            }
            Err(e) => warn!("Watch error: {}", e),
        })?;
        watcher.watch(source_dir, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", source_dir);

        Ok(Self { _watcher: watcher, tx, rx })
    }

    /// Sender into the work queue, used to request shutdown from a signal handler.
    pub fn sender(&self) -> Sender<WatchEvent> {
        self.tx.clone()
    }

    /// Processes queued bundles until shutdown. Each path is handed to
    /// `handler` once its size has stopped changing.
    pub fn run(self, settle: Duration, mut handler: impl FnMut(&Path)) {
        let Self { _watcher, tx, rx } = self;
        drop(tx);
        run_queue(&rx, |path| {
            if wait_until_settled(path, settle) {
                handler(path);
            } else {
                debug!("{:?} disappeared before it could be processed", path);
            }
        });
        drop(_watcher);
    }
}

/// Bundle paths that an event makes available: created files, rename targets
/// and metadata changes. The last covers a download made executable after it
/// landed, which fails to unpack until then.
pub fn bundle_paths(event: &Event) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1).into_iter().collect(),
        _ => Vec::new(),
    };
    paths.into_iter().filter(|p| is_bundle_path(p)).cloned().collect()
}

/// Drains `rx` in arrival order until `Shutdown` or disconnection.
/// Back-to-back events for the same path are handled once.
pub fn run_queue(rx: &Receiver<WatchEvent>, mut handler: impl FnMut(&Path)) {
    let mut pending = None;
    loop {
        let event = match pending.take() {
            Some(event) => event,
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => {
                    warn!("Watch queue disconnected");
                    break;
                }
            },
        };

        match event {
            WatchEvent::Shutdown => {
                info!("Stopping AppImage monitor");
                break;
            }
            WatchEvent::Bundle(path) => {
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WatchEvent::Bundle(ref p) if *p == path => continue,
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                handler(&path);
            }
        }
    }
}

/// Waits until the size of `path` is stable across one `interval`.
/// Returns false if the file vanished.
pub fn wait_until_settled(path: &Path, interval: Duration) -> bool {
    let size = |p: &Path| fs::metadata(p).ok().map(|m| m.len());
    let Some(mut last) = size(path) else {
        return false;
    };
    if interval.is_zero() {
        return true;
    }

    for _ in 0..MAX_SETTLE_CHECKS {
        thread::sleep(interval);
        let Some(current) = size(path) else {
            return false;
        };
        if current == last {
            return true;
        }
        debug!("{:?} still growing ({} bytes)", path, current);
        last = current;
    }
    warn!("{:?} is still changing, processing it anyway", path);
    true
}
