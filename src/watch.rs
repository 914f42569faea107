//! Incremental updater: file-system events, debouncing and the update state machine.

use crate::error::{IndexError, Result};
use crate::indexer::Indexer;
use crate::model::RunReport;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdaterState {
    Idle,
    DetectingChange,
    Reextracting,
    ResolvingCalls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Translates a watcher event. Access events yield nothing.
    pub fn from_notify(event: &Event) -> Vec<ChangeEvent> {
        let kind = match event.kind {
            EventKind::Access(_) => return Vec::new(),
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            // Renames report both ends; existence decides which side each path is.
            EventKind::Modify(ModifyKind::Name(_)) => None,
            _ => Some(ChangeKind::Modified),
        };
        event
            .paths
            .iter()
            .map(|path| {
                let kind = kind.unwrap_or(if path.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Deleted
                });
                ChangeEvent::new(path.clone(), kind)
            })
            .collect()
    }
}

/// Collapses events for the same path; the latest event wins.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<PathBuf, ChangeEvent>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
            last_event: None,
        }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        let newest = self
            .last_event
            .map_or(event.timestamp, |last| last.max(event.timestamp));
        self.last_event = Some(newest);
        match self.pending.get(&event.path) {
            Some(existing) if existing.timestamp > event.timestamp => {}
            _ => {
                self.pending.insert(event.path.clone(), event);
            }
        }
    }

    /// Ready once no event arrived for a full window.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_event {
            Some(last) => !self.pending.is_empty() && now.saturating_duration_since(last) >= self.window,
            None => false,
        }
    }

    /// Puts back a change set that failed to apply, restarting the window at `now`.
    pub fn requeue(&mut self, events: Vec<ChangeEvent>, now: Instant) {
        for event in events {
            self.push(ChangeEvent {
                timestamp: now,
                ..event
            });
        }
    }

    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Drives an [`Indexer`] through `Idle -> DetectingChange -> Reextracting ->
/// ResolvingCalls -> Idle` for each debounced change set.
pub struct Updater {
    indexer: Indexer,
    debouncer: Debouncer,
    state: Arc<Mutex<UpdaterState>>,
}

impl Updater {
    pub fn new(indexer: Indexer, debounce: Duration) -> Self {
        Self {
            indexer,
            debouncer: Debouncer::new(debounce),
            state: Arc::new(Mutex::new(UpdaterState::Idle)),
        }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn into_indexer(self) -> Indexer {
        self.indexer
    }

    pub fn state(&self) -> UpdaterState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: UpdaterState) {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *guard != state {
            tracing::trace!(from = ?*guard, to = ?state, "updater state");
            *guard = state;
        }
    }

    fn shared_state(&self) -> Arc<Mutex<UpdaterState>> {
        Arc::clone(&self.state)
    }

    /// Queues an event unless it falls under an ignored directory or outside the root.
    pub fn on_event(&mut self, event: ChangeEvent) {
        let Some(rel_path) = self.indexer.relative_path(&event.path) else {
            return;
        };
        if rel_path == "." || self.indexer.ignores().is_ignored_path(&rel_path) {
            return;
        }
        let first_component = rel_path.split('/').next().unwrap_or(&rel_path);
        if self.indexer.ignores().contains(first_component) {
            return;
        }
        self.debouncer.push(event);
        self.set_state(UpdaterState::DetectingChange);
    }

    /// Runs an update if the debounce window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Result<Option<RunReport>> {
        if !self.debouncer.is_ready(now) {
            return Ok(None);
        }
        self.flush().map(Some)
    }

    /// Applies every pending change now, regardless of the debounce window.
    /// A change set that hit a busy store stays queued for the next window.
    pub fn flush(&mut self) -> Result<RunReport> {
        let events = self.debouncer.drain();
        let paths: Vec<PathBuf> = events.iter().map(|event| event.path.clone()).collect();
        let result = self.apply(&paths);
        if let Err(IndexError::StorageTransient { .. }) = &result {
            self.debouncer.requeue(events, Instant::now());
        }
        if self.debouncer.is_empty() {
            self.set_state(UpdaterState::Idle);
        } else {
            self.set_state(UpdaterState::DetectingChange);
        }
        result
    }

    pub fn pending(&self) -> usize {
        self.debouncer.len()
    }

    fn apply(&mut self, paths: &[PathBuf]) -> Result<RunReport> {
        self.set_state(UpdaterState::Reextracting);
        let update = self.indexer.reextract(paths)?;
        if !update.is_noop() {
            self.set_state(UpdaterState::ResolvingCalls);
        }
        self.indexer.commit_update(update)
    }

    /// Full re-index, used when the watcher lost events.
    pub fn rescan(&mut self) -> Result<RunReport> {
        self.debouncer.drain();
        self.set_state(UpdaterState::Reextracting);
        let result = self.indexer.index_all();
        self.set_state(UpdaterState::Idle);
        result
    }
}

pub struct WatchHandle {
    stop: Sender<()>,
    state: Arc<Mutex<UpdaterState>>,
    thread: Option<thread::JoinHandle<Result<()>>>,
}

impl WatchHandle {
    pub fn state(&self) -> UpdaterState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Stops the loop and waits for an in-flight update to finish.
    pub fn stop(mut self) -> Result<()> {
        let _ = self.stop.send(());
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(IndexError::config("watch thread panicked"))),
            None => Ok(()),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

/// Starts watching the indexer's repository on a background thread.
pub fn start(indexer: Indexer, debounce: Duration) -> Result<WatchHandle> {
    let root = indexer.root().to_path_buf();
    let updater = Updater::new(indexer, debounce);
    let state = updater.shared_state();
    let (stop_tx, stop_rx) = mpsc::channel();
    let (watcher, events) = try_start_watcher(&root)?;
    let thread = thread::spawn(move || {
        let result = run_loop(updater, watcher, events, stop_rx);
        if let Err(err) = &result {
            tracing::error!("watch stopped: {err}");
        }
        result
    });
    tracing::info!(root = %root.display(), "watching for changes");
    Ok(WatchHandle {
        stop: stop_tx,
        state,
        thread: Some(thread),
    })
}

fn run_loop(
    mut updater: Updater,
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    loop {
        if stop_requested(&stop_rx) {
            return Ok(());
        }
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if event.need_rescan() {
                    log_report(updater.rescan(), "rescan")?;
                    continue;
                }
                for change in ChangeEvent::from_notify(&event) {
                    updater.on_event(change);
                }
            }
            Ok(Err(err)) => tracing::warn!("watch error: {err}"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(IndexError::config("file watcher disconnected"));
            }
        }
        if let Some(result) = updater.poll(Instant::now()).transpose() {
            log_report(result, "update")?;
        }
    }
}

/// Logs a finished update. Only run-level failures stop the loop.
fn log_report(result: Result<RunReport>, what: &str) -> Result<()> {
    match result {
        Ok(report) => {
            tracing::info!(
                files = report.files_processed,
                skipped = report.files_skipped.len(),
                calls_resolved = report.calls_resolved,
                calls_unresolved = report.calls_unresolved,
                duration_ms = report.duration_ms,
                "{what} applied"
            );
            Ok(())
        }
        Err(err @ IndexError::Cancelled) => Err(err),
        Err(err @ IndexError::StorageTransient { .. }) => {
            tracing::error!("{what} failed, will retry after the next debounce window: {err}");
            Ok(())
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::warn!("{what} failed: {err}");
            Ok(())
        }
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    match stop_rx.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

fn try_start_watcher(
    repo_root: &Path,
) -> Result<(RecommendedWatcher, Receiver<notify::Result<Event>>)> {
    let (event_tx, event_rx) = mpsc::channel();
    let handler = move |res| {
        let _ = event_tx.send(res);
    };
    let mut watcher = notify::recommended_watcher(handler)
        .map_err(|err| IndexError::config(format!("file watcher: {err}")))?;
    watcher
        .watch(repo_root, RecursiveMode::Recursive)
        .map_err(|err| IndexError::config(format!("watch {}: {err}", repo_root.display())))?;
    Ok((watcher, event_rx))
}
