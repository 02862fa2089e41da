//! Hot-reload watcher for script files

use crate::scripting::library::SCRIPT_EXTENSION;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher thread panicked")]
    Join,
}

/// Configuration for the script watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// A changed file is reported once it has seen no writes for this long
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
        }
    }
}

/// Control handle for managing the watcher thread
struct WatcherControlHandle {
    stop_sender: Sender<()>,
    thread_handle: thread::JoinHandle<()>,
}

/// Watches a scripts directory and reports changed script files
///
/// Writes, creations and deletions are all reported as the affected path; a
/// reported path that no longer exists was deleted. Changes are collected on a
/// background thread and the host drains them with
/// [`ScriptWatcher::poll_changes`] from its own loop.
pub struct ScriptWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
    changes: Receiver<PathBuf>,
    control_handle: Option<WatcherControlHandle>,
}

/// Whether a path names a script file
pub fn is_script_path(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION)
}

impl ScriptWatcher {
    pub fn new<P: AsRef<Path>>(dir: P, config: WatcherConfig) -> Result<Self, WatchError> {
        let dir = dir.as_ref().to_path_buf();
        info!(path = ?dir, "Creating script watcher");

        let (event_tx, event_rx) = mpsc::channel::<Event>();
        let (change_tx, change_rx) = mpsc::channel::<PathBuf>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res| match res {
                Ok(event) => {
                    if let Err(e) = event_tx.send(event) {
                        error!(error = %e, "Failed to send file event");
                    }
                }
                Err(e) => error!(error = %e, "File watcher error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(watch_path = ?dir, "Started watching for file changes");

        let thread_handle = thread::spawn(move || {
            Self::event_loop(config, event_rx, change_tx, stop_rx);
        });

        Ok(Self {
            _watcher: watcher,
            dir,
            changes: change_rx,
            control_handle: Some(WatcherControlHandle {
                stop_sender: stop_tx,
                thread_handle,
            }),
        })
    }

    fn event_loop(
        config: WatcherConfig,
        event_rx: Receiver<Event>,
        change_tx: Sender<PathBuf>,
        stop_rx: Receiver<()>,
    ) {
        // Paths with unreported changes, keyed to their latest event
        let mut quiet_since: HashMap<PathBuf, Instant> = HashMap::new();

        loop {
            if stop_rx.try_recv().is_ok() {
                debug!("Script watcher received stop signal");
                break;
            }

            match event_rx.recv_timeout(Duration::from_millis(20)) {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        for path in event.paths.into_iter().filter(|p| is_script_path(p)) {
                            if quiet_since.insert(path.clone(), Instant::now()).is_some() {
                                debug!(path = ?path, "Debouncing rapid file changes");
                            }
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("Event channel disconnected, stopping watcher");
                    break;
                }
            }

            // A file is reported once writes to it have stopped for the debounce window
            let now = Instant::now();
            let settled: Vec<PathBuf> = quiet_since
                .iter()
                .filter(|(_, last)| now.duration_since(**last) >= config.debounce_duration)
                .map(|(path, _)| path.clone())
                .collect();
            for path in settled {
                quiet_since.remove(&path);
                if change_tx.send(path).is_err() {
                    return;
                }
            }
        }

        info!("Script watcher event loop stopped");
    }

    /// Drain changed script paths, deduplicated, in first-seen order
    pub fn poll_changes(&self) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = Vec::new();
        while let Ok(path) = self.changes.try_recv() {
            if !changed.contains(&path) {
                changed.push(path);
            }
        }
        changed
    }

    /// Get the directory being watched
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop the watcher and join its thread
    pub fn stop(mut self) -> Result<(), WatchError> {
        if let Some(control) = self.control_handle.take() {
            info!(path = ?self.dir, "Stopping script watcher");

            if let Err(e) = control.stop_sender.send(()) {
                warn!(error = %e, "Failed to send stop signal to watcher thread");
            }
            control.thread_handle.join().map_err(|_| WatchError::Join)?;

            info!("Script watcher stopped successfully");
        }
        Ok(())
    }
}

impl Drop for ScriptWatcher {
    fn drop(&mut self) {
        if let Some(control) = self.control_handle.take() {
            debug!("ScriptWatcher dropped without calling stop() - signalling thread");
            let _ = control.stop_sender.send(());
        }
    }
}
