//! In-process secret backend.
//!
//! Holds versioned secrets and leased roles in memory. Useful for embedding
//! the watcher in tests and for local development without a secret store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::BackendKind;
use super::Fetched;
use super::MountTable;
use super::SecretBackend;
use crate::BackendError;

#[derive(Debug)]
struct VersionedEntry {
    value: Bytes,
    version: u64,
}

#[derive(Debug)]
struct LeasedRole {
    lease: Duration,
    issued: u64,
}

#[derive(Debug, Default)]
struct State {
    versioned: HashMap<String, VersionedEntry>,
    roles: HashMap<String, LeasedRole>,
    failing: HashMap<String, BackendError>,
    unavailable: Option<String>,
    fetches: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    mounts: MountTable,
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new(mounts: MountTable) -> Self {
        Self {
            mounts,
            state: Mutex::new(State::default()),
        }
    }

    /// Writes a versioned secret and returns its new version.
    ///
    /// Versions start at 1 and increase by one on every write.
    pub fn put_versioned(
        &self,
        path: &str,
        value: impl Into<Bytes>,
    ) -> u64 {
        let mut state = self.state.lock();
        let entry = state.versioned.entry(path.to_string()).or_insert(VersionedEntry {
            value: Bytes::new(),
            version: 0,
        });
        entry.value = value.into();
        entry.version += 1;
        entry.version
    }

    /// Registers a leased role, or changes the lease of an existing one.
    pub fn set_lease(
        &self,
        path: &str,
        lease: Duration,
    ) {
        let mut state = self.state.lock();
        state
            .roles
            .entry(path.to_string())
            .and_modify(|role| role.lease = lease)
            .or_insert(LeasedRole { lease, issued: 0 });
    }

    /// Makes every subsequent fetch of `path` fail with `error`.
    pub fn fail_path(
        &self,
        path: &str,
        error: BackendError,
    ) {
        self.state.lock().failing.insert(path.to_string(), error);
    }

    pub fn heal_path(
        &self,
        path: &str,
    ) {
        self.state.lock().failing.remove(path);
    }

    /// Simulates the whole backend going away (`Some`) or coming back (`None`).
    pub fn set_unavailable(
        &self,
        reason: Option<String>,
    ) {
        self.state.lock().unavailable = reason;
    }

    /// Number of fetches served for `path`, failed ones included.
    pub fn fetch_count(
        &self,
        path: &str,
    ) -> u64 {
        self.state.lock().fetches.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    async fn fetch(
        &self,
        path: &str,
    ) -> std::result::Result<Fetched, BackendError> {
        let mut state = self.state.lock();
        *state.fetches.entry(path.to_string()).or_insert(0) += 1;

        if let Some(reason) = &state.unavailable {
            return Err(BackendError::Unavailable(reason.clone()));
        }
        if let Some(error) = state.failing.get(path) {
            return Err(error.clone());
        }

        let not_found = || BackendError::NotFound { path: path.to_string() };
        let resolved = self.mounts.resolve(path).map_err(|_| not_found())?;

        match resolved.kind {
            BackendKind::Versioned => {
                let entry = state.versioned.get(path).ok_or_else(not_found)?;
                Ok(Fetched::versioned(entry.value.clone(), entry.version))
            }
            BackendKind::Leased => {
                let role = state.roles.get_mut(path).ok_or_else(not_found)?;
                role.issued += 1;
                let credential = format!("v-{}-{}:pw-{}", resolved.key, role.issued, role.issued);
                Ok(Fetched::leased(credential, role.lease))
            }
        }
    }
}
