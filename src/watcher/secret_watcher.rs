use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::WatchHandle;
use crate::BackendError;
use crate::Error;
use crate::EventPublisher;
use crate::Fetched;
use crate::MountTable;
use crate::RegistrationError;
use crate::ResolvedPath;
use crate::Result;
use crate::SecretBackend;
use crate::SecretStore;
use crate::WatchConfig;
use crate::WatchScheduler;
use crate::WatchedPath;

/// Loads secrets into a [`SecretStore`] and keeps them fresh.
///
/// ```ignore
/// let mut watcher = SecretWatcher::new(config.watch, backend, mounts, store.clone());
/// watcher.add_paths(["secret/app/db:password", "database/readonly"]).await?;
///
/// let mut handle = watcher.start()?;
/// let mut events = handle.subscribe().unwrap();
/// while let Some(event) = events.recv().await {
///     reconnect_with(&event.value);
/// }
/// ```
pub struct SecretWatcher<B>
where B: SecretBackend
{
    config: WatchConfig,
    backend: Arc<B>,
    mounts: MountTable,
    store: Arc<SecretStore>,

    watched: HashSet<String>,
    // Registered before start, handed to the loop as its initial set
    pending: Vec<WatchedPath>,
    registrations: Option<mpsc::UnboundedSender<WatchedPath>>,
}

impl<B> SecretWatcher<B>
where B: SecretBackend
{
    pub fn new(
        config: WatchConfig,
        backend: Arc<B>,
        mounts: MountTable,
        store: Arc<SecretStore>,
    ) -> Self {
        Self {
            config,
            backend,
            mounts,
            store,
            watched: HashSet::new(),
            pending: Vec::new(),
            registrations: None,
        }
    }

    pub fn store(&self) -> &Arc<SecretStore> {
        &self.store
    }

    pub fn is_started(&self) -> bool {
        self.registrations.is_some()
    }

    /// Number of paths added so far, whether or not the loop schedules them.
    pub fn watched_len(&self) -> usize {
        self.watched.len()
    }

    /// Loads every path into the store and registers it for watching.
    ///
    /// Stops at the first path that cannot be resolved or fetched; paths
    /// before it stay registered.
    pub async fn add_paths<I, S>(
        &mut self,
        paths: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.add_path(path.as_ref()).await?;
        }
        Ok(())
    }

    /// Loads `path` into the store and registers it for watching.
    ///
    /// Once the watch loop has terminated nothing is fetched and
    /// `RegistrationError::NotRunning` is returned.
    pub async fn add_path(
        &mut self,
        path: &str,
    ) -> Result<()> {
        if self.watched.contains(path) {
            return Err(RegistrationError::AlreadyWatched { path: path.to_string() }.into());
        }
        if self.registrations.as_ref().is_some_and(|sender| sender.is_closed()) {
            return Err(RegistrationError::NotRunning { path: path.to_string() }.into());
        }

        let resolved = self.mounts.resolve(path)?;
        let fetched = self.initial_fetch(&resolved).await?;
        let fetched_at = Instant::now();

        self.store.write(path, fetched.value);
        debug!(path, kind = resolved.kind.as_str(), "secret loaded");

        let watched = WatchedPath::at(path, fetched.hint, fetched_at);
        match &self.registrations {
            Some(sender) => {
                // the loop may have stopped during the initial fetch
                if sender.send(watched).is_err() {
                    warn!(path, "watch loop stopped, path loaded but not watched");
                    return Err(RegistrationError::NotRunning { path: path.to_string() }.into());
                }
            }
            None => self.pending.push(watched),
        }
        self.watched.insert(path.to_string());
        Ok(())
    }

    async fn initial_fetch(
        &self,
        resolved: &ResolvedPath,
    ) -> Result<Fetched> {
        let path = resolved.path.as_str();
        let fetched = match self.config.fetch_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.backend.fetch(path)).await {
                Ok(fetched) => fetched,
                Err(_) => Err(BackendError::Timeout {
                    path: path.to_string(),
                    duration: limit,
                }),
            },
            None => self.backend.fetch(path).await,
        };

        let fetched = fetched.and_then(|fetched| {
            if fetched.hint.kind() == resolved.kind {
                Ok(fetched)
            } else {
                Err(BackendError::UnexpectedHint {
                    path: path.to_string(),
                    expected: resolved.kind,
                })
            }
        });

        fetched.map_err(|source| {
            Error::Registration(RegistrationError::InitialFetch {
                path: path.to_string(),
                source,
            })
        })
    }

    /// Spawns the watch loop on the current tokio runtime.
    ///
    /// The loop terminates right away if nothing was added before this call.
    pub fn start(&mut self) -> Result<WatchHandle> {
        if self.is_started() {
            return Err(Error::Fatal("secret watcher already started".to_string()));
        }

        let (publisher, events) = EventPublisher::channel(self.config.event_buffer_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (registrations, registration_rx) = mpsc::unbounded_channel();

        let mut scheduler = WatchScheduler::new(
            self.config.clone(),
            self.backend.clone(),
            self.store.clone(),
            publisher,
            shutdown_rx,
        )
        .with_registrations(registration_rx);
        for watched in self.pending.drain(..) {
            scheduler.register(watched);
        }

        info!(paths = scheduler.watched_len(), "starting secret watch");
        let status = scheduler.status();
        let task = tokio::spawn(scheduler.run());
        self.registrations = Some(registrations);

        Ok(WatchHandle::new(events, status, shutdown_tx, task))
    }
}
