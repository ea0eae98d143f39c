//! Backend connector contract.
//!
//! The watch loop only needs two things from a secret backend: the current
//! value of a path and a revision hint telling it how to schedule the next
//! check. How the backend talks to the secret store is its own business.

mod memory;
mod mount_table;


pub use memory::*;
pub use mount_table::*;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::BackendError;

/// How a secrets engine signals freshness.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Rotated static secrets carrying an increasing version number
    Versioned,
    /// Dynamically issued credentials that expire after a lease
    Leased,
}

impl BackendKind {
    /// Maps a secrets engine type to its backend kind.
    pub fn from_engine_type(engine: &str) -> Option<Self> {
        match engine {
            "kv" => Some(BackendKind::Versioned),
            "database" => Some(BackendKind::Leased),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Versioned => "versioned",
            BackendKind::Leased => "leased",
        }
    }
}

/// Freshness signal returned with every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionHint {
    Version(u64),
    Lease(Duration),
}

impl RevisionHint {
    pub fn kind(&self) -> BackendKind {
        match self {
            RevisionHint::Version(_) => BackendKind::Versioned,
            RevisionHint::Lease(_) => BackendKind::Leased,
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub value: Bytes,
    pub hint: RevisionHint,
}

impl Fetched {
    pub fn versioned(
        value: impl Into<Bytes>,
        version: u64,
    ) -> Self {
        Self {
            value: value.into(),
            hint: RevisionHint::Version(version),
        }
    }

    pub fn leased(
        value: impl Into<Bytes>,
        lease: Duration,
    ) -> Self {
        Self {
            value: value.into(),
            hint: RevisionHint::Lease(lease),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretBackend: Send + Sync + 'static {
    /// Reads the current value of `path` together with its revision hint.
    async fn fetch(
        &self,
        path: &str,
    ) -> std::result::Result<Fetched, BackendError>;
}
