//! Secret Watch Error Hierarchy
//!
//! Errors are split by the layer that produces them: the backend connector,
//! path registration (everything that can fail before the watch loop starts)
//! and configuration. The watch loop itself never returns errors to a caller
//! while it is running; they are logged and reflected in
//! [`WatchStatus`](crate::WatchStatus).

use std::time::Duration;

use config::ConfigError;

use crate::BackendKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Secret backend failures (unreachable, missing path, bad payload)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Failures while registering a path for watching
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Configuration load or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Watch loop stopped by a shutdown signal
    #[error("Watch loop exited on shutdown signal")]
    Exit,

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The whole backend is unreachable
    #[error("Secret backend unavailable: {0}")]
    Unavailable(String),

    /// The path no longer resolves to a secret
    #[error("Secret ( {path} ) does not exist")]
    NotFound { path: String },

    /// The backend answered with something we cannot use
    #[error("Malformed response for ( {path} ): {reason}")]
    Malformed { path: String, reason: String },

    /// Fetch exceeded the configured timeout
    #[error("Fetch of ( {path} ) timed out after {duration:?}")]
    Timeout { path: String, duration: Duration },

    /// Revision hint kind does not match the backend kind of the path
    #[error("Fetch of ( {path} ) returned a revision hint that is not a {expected:?} hint")]
    UnexpectedHint { path: String, expected: BackendKind },
}

impl BackendError {
    /// Errors that say nothing about an individual path, only about the
    /// backend as a whole.
    pub fn is_systemic(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Secrets engine for key ( {path} ) does not exist")]
    NoMount { path: String },

    #[error("Secrets engine type ( {kind} ) of mount ( {mount} ) is not supported")]
    UnsupportedKind { mount: String, kind: String },

    #[error("Malformed secret path ( {path} ): {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Path ( {path} ) is already watched")]
    AlreadyWatched { path: String },

    #[error("Watch loop is not running, path ( {path} ) cannot be watched")]
    NotRunning { path: String },

    #[error("Error while adding path ( {path} ): {source}")]
    InitialFetch {
        path: String,
        #[source]
        source: BackendError,
    },
}
