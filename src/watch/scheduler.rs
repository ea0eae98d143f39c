//! The watch loop.
//!
//! A single task owns the due-time queue and the last-seen version table, so
//! neither needs locking. Each cycle pops the earliest due path, waits for its
//! due time, fetches it, applies the refresh policy and re-inserts the path
//! with its next due time.
//!
//! ```text
//!            ┌──────────── registration ────────────┐
//!            ▼                                      │
//!  Idle ──(entry available)──> Waiting ──(due)──> fetch ──> policy ──> store + emit
//!   ▲                             ▲                 │                      │
//!   └──────(queue empty)──────────┴──── re-insert ◄─┴──────────────────────┘
//!                                          │
//!                                   (fetch error) ──> Terminated
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::IntGauge;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::DueEntry;
use super::DueQueue;
use super::EventPublisher;
use super::RefreshPolicy;
use super::SecretEvent;
use crate::metrics::EVENTS_TOTAL;
use crate::metrics::FETCH_ERRORS_TOTAL;
use crate::metrics::FETCH_LATENCY_MS;
use crate::metrics::FETCH_TOTAL;
use crate::metrics::QUEUE_DEPTH;
use crate::BackendError;
use crate::BackendKind;
use crate::Error;
use crate::FailurePolicy;
use crate::Fetched;
use crate::Result;
use crate::RevisionHint;
use crate::SecretBackend;
use crate::SecretStore;
use crate::WatchConfig;

/// A path handed to the watch loop, with the revision hint of the fetch
/// that registered it as its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPath {
    pub path: String,
    pub baseline: RevisionHint,
    /// Completion time of the baseline fetch; the first check is due one
    /// interval after it
    pub fetched_at: Instant,
}

impl WatchedPath {
    /// Baseline fetched just now.
    pub fn new(
        path: impl Into<String>,
        baseline: RevisionHint,
    ) -> Self {
        Self::at(path, baseline, Instant::now())
    }

    pub fn at(
        path: impl Into<String>,
        baseline: RevisionHint,
        fetched_at: Instant,
    ) -> Self {
        Self {
            path: path.into(),
            baseline,
            fetched_at,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.baseline.kind()
    }
}

/// Why the watch loop stopped.
#[derive(Debug, Clone)]
pub enum TerminationReason {
    /// Nothing was registered when the loop started
    EmptyWatchSet,
    /// A fetch failed and the failure policy stopped all watching
    FetchFailed { path: String, error: BackendError },
    /// Shutdown was signalled, or the shutdown sender was dropped
    Shutdown,
    /// The loop reached a state it cannot continue from
    Internal(String),
}

#[derive(Debug, Clone)]
pub enum WatchStatus {
    Starting,
    Running,
    Terminated(TerminationReason),
}

impl WatchStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, WatchStatus::Terminated(_))
    }
}

pub struct WatchScheduler<B>
where B: SecretBackend
{
    config: WatchConfig,
    backend: Arc<B>,
    store: Arc<SecretStore>,
    publisher: Option<EventPublisher>,

    queue: DueQueue,
    // Every path that is queued or being serviced
    kinds: HashMap<String, BackendKind>,
    last_versions: HashMap<String, u64>,

    registrations: Option<mpsc::UnboundedReceiver<WatchedPath>>,
    shutdown_signal: watch::Receiver<()>,
    status: watch::Sender<WatchStatus>,
    // Tracks `queue.len()` after every queue mutation
    queue_depth: IntGauge,
}

async fn next_registration(registrations: &mut Option<mpsc::UnboundedReceiver<WatchedPath>>) -> Option<WatchedPath> {
    match registrations {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<B> WatchScheduler<B>
where B: SecretBackend
{
    pub fn new(
        config: WatchConfig,
        backend: Arc<B>,
        store: Arc<SecretStore>,
        publisher: EventPublisher,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        let (status, _) = watch::channel(WatchStatus::Starting);
        Self {
            config,
            backend,
            store,
            publisher: Some(publisher),
            queue: DueQueue::new(),
            kinds: HashMap::new(),
            last_versions: HashMap::new(),
            registrations: None,
            shutdown_signal,
            status,
            queue_depth: QUEUE_DEPTH.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_queue_depth_gauge(
        mut self,
        gauge: IntGauge,
    ) -> Self {
        self.queue_depth = gauge;
        self
    }

    /// Accept paths registered after the loop has started.
    pub fn with_registrations(
        mut self,
        registrations: mpsc::UnboundedReceiver<WatchedPath>,
    ) -> Self {
        self.registrations = Some(registrations);
        self
    }

    pub fn status(&self) -> watch::Receiver<WatchStatus> {
        self.status.subscribe()
    }

    /// Number of paths queued or being serviced.
    pub fn watched_len(&self) -> usize {
        self.kinds.len()
    }

    /// Adds a path to the initial watch set.
    ///
    /// The first check is due one interval after `watched.fetched_at`, which
    /// may already be in the past.
    pub fn register(
        &mut self,
        watched: WatchedPath,
    ) {
        self.enqueue(watched);
    }

    fn enqueue(
        &mut self,
        watched: WatchedPath,
    ) {
        if self.kinds.contains_key(&watched.path) {
            warn!(path = %watched.path, "path is already watched, ignoring registration");
            return;
        }

        let interval = match watched.baseline {
            RevisionHint::Version(version) => {
                if !self.config.versioned_enabled() {
                    debug!(path = %watched.path, "version watching disabled, path not scheduled");
                    return;
                }
                self.last_versions.insert(watched.path.clone(), version);
                self.config.version_period()
            }
            RevisionHint::Lease(lease) => lease,
        };

        trace!(path = %watched.path, ?interval, "scheduling path");
        self.kinds.insert(watched.path.clone(), watched.kind());
        self.requeue(watched.path, watched.fetched_at + interval);
    }

    fn requeue(
        &mut self,
        path: impl Into<String>,
        due: Instant,
    ) {
        self.queue.insert(path, due);
        self.queue_depth.set(self.queue.len() as i64);
    }

    fn forget(
        &mut self,
        path: &str,
    ) {
        self.kinds.remove(path);
        self.last_versions.remove(path);
    }

    fn on_registration(
        &mut self,
        registration: Option<WatchedPath>,
    ) {
        match registration {
            Some(watched) => self.enqueue(watched),
            None => {
                debug!("registration channel closed");
                self.registrations = None;
            }
        }
    }

    /// Runs the watch loop until it terminates.
    ///
    /// Returns `Ok(())` when there was nothing to watch, `Err(Error::Exit)`
    /// on shutdown and the fetch error that stopped the loop otherwise. In
    /// every case the event channel is closed and the final status published
    /// before returning.
    pub async fn run(mut self) -> Result<()> {
        if self.queue.is_empty() {
            warn!("No watchable paths found for secret watching.");
            self.finish(TerminationReason::EmptyWatchSet);
            return Ok(());
        }

        info!(
            paths = self.queue.len(),
            version_period_ms = self.config.version_period_ms,
            "secret watch loop started"
        );
        self.status.send_replace(WatchStatus::Running);

        let reason = loop {
            if let Err(reason) = self.step().await {
                break reason;
            }
        };

        let result = match &reason {
            TerminationReason::EmptyWatchSet => Ok(()),
            TerminationReason::Shutdown => Err(Error::Exit),
            TerminationReason::FetchFailed { error, .. } => Err(Error::Backend(error.clone())),
            TerminationReason::Internal(message) => Err(Error::Fatal(message.clone())),
        };
        self.finish(reason);
        result
    }

    /// One pass through the state machine: idle wait, or wait for the
    /// earliest due path and service it.
    async fn step(&mut self) -> std::result::Result<(), TerminationReason> {
        let entry = match self.queue.pop_min() {
            Some(entry) => entry,
            None => return self.idle().await,
        };
        self.queue_depth.set(self.queue.len() as i64);

        if !self.wait_until_due(&entry).await? {
            return Ok(());
        }

        match self.service(&entry.path).await {
            Ok(()) => Ok(()),
            Err(Error::Backend(e)) => self.on_fetch_error(&entry.path, e),
            Err(Error::Exit) => Err(TerminationReason::Shutdown),
            Err(e) => {
                error!(path = %entry.path, %e, "watch loop failed");
                Err(TerminationReason::Internal(e.to_string()))
            }
        }
    }

    async fn idle(&mut self) -> std::result::Result<(), TerminationReason> {
        trace!("watch queue empty, idling");
        let idle_poll = self.config.idle_poll();

        tokio::select! {
            biased;
            _ = self.shutdown_signal.changed() => {
                return Err(TerminationReason::Shutdown);
            }
            registration = next_registration(&mut self.registrations) => {
                self.on_registration(registration);
            }
            _ = tokio::time::sleep(idle_poll) => {}
        }
        Ok(())
    }

    /// Holds `entry` until it is due.
    ///
    /// Returns `Ok(false)` when a new registration interrupted the wait: the
    /// held entry goes back into the queue so that an earlier due newcomer
    /// is not serviced late.
    async fn wait_until_due(
        &mut self,
        entry: &DueEntry,
    ) -> std::result::Result<bool, TerminationReason> {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_signal.changed() => {
                    return Err(TerminationReason::Shutdown);
                }
                _ = tokio::time::sleep_until(entry.due) => {
                    return Ok(true);
                }
                registration = next_registration(&mut self.registrations) => {
                    if registration.is_some() {
                        self.requeue(entry.path.clone(), entry.due);
                        self.on_registration(registration);
                        return Ok(false);
                    }
                    self.on_registration(registration);
                }
            }
        }
    }

    async fn fetch(
        &mut self,
        path: &str,
    ) -> Result<Fetched> {
        let backend = &self.backend;
        let timeout = self.config.fetch_timeout();
        let fetch = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, backend.fetch(path)).await {
                    Ok(fetched) => fetched,
                    Err(_) => Err(BackendError::Timeout {
                        path: path.to_string(),
                        duration: limit,
                    }),
                },
                None => backend.fetch(path).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown_signal.changed() => Err(Error::Exit),
            fetched = fetch => fetched.map_err(Error::Backend),
        }
    }

    async fn service(
        &mut self,
        path: &str,
    ) -> Result<()> {
        let kind = match self.kinds.get(path) {
            Some(kind) => *kind,
            None => return Err(Error::Fatal(format!("path {} is queued but not registered", path))),
        };
        let label = [kind.as_str()];
        FETCH_TOTAL.with_label_values(&label).inc();

        let started = Instant::now();
        let fetched = self.fetch(path).await;
        let completed = Instant::now();
        FETCH_LATENCY_MS
            .with_label_values(&label)
            .observe(completed.duration_since(started).as_secs_f64() * 1000.0);
        let fetched = fetched?;

        let policy = RefreshPolicy::for_kind(kind, self.config.version_period());
        let decision = policy.apply(path, fetched.hint, self.last_versions.get(path).copied())?;

        if let Some(version) = decision.record_version {
            self.last_versions.insert(path.to_string(), version);
        }

        if decision.publish {
            debug!(path, kind = kind.as_str(), "secret changed");
            self.store.write(path, fetched.value.clone());
            EVENTS_TOTAL.with_label_values(&label).inc();

            if let Some(publisher) = self.publisher.as_mut() {
                let event = SecretEvent {
                    path: path.to_string(),
                    value: fetched.value,
                };
                publisher.emit(event, &mut self.shutdown_signal).await?;
            }
        } else {
            trace!(path, "no newer version");
        }

        let next_due = completed + decision.next_interval;
        trace!(path, next_in = ?decision.next_interval, "rescheduling");
        self.requeue(path, next_due);
        Ok(())
    }

    fn on_fetch_error(
        &mut self,
        path: &str,
        error: BackendError,
    ) -> std::result::Result<(), TerminationReason> {
        let kind = self.kinds.get(path).map(BackendKind::as_str).unwrap_or("unknown");
        FETCH_ERRORS_TOTAL.with_label_values(&[kind]).inc();

        if self.config.failure_policy == FailurePolicy::IsolatePath && !error.is_systemic() {
            error!(path, %error, "Error watching secret, path dropped from watch");
            self.forget(path);
            return Ok(());
        }

        error!(path, %error, "Error watching secret, watch loop stopped");
        Err(TerminationReason::FetchFailed {
            path: path.to_string(),
            error,
        })
    }

    fn finish(
        &mut self,
        reason: TerminationReason,
    ) {
        info!(?reason, "secret watch loop terminated");
        self.queue = DueQueue::new();
        self.queue_depth.set(0);
        // status first, so a subscriber seeing the end of the stream also
        // sees why
        self.status.send_replace(WatchStatus::Terminated(reason));
        if let Some(publisher) = self.publisher.take() {
            publisher.terminate();
        }
    }
}
