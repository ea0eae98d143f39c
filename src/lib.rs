//! Keeps a cache of secrets fresh.
//!
//! Every watched path belongs to a secrets engine mount, and the mount's
//! engine type decides how freshness is tracked:
//!
//! - versioned (`kv`) secrets are polled on a fixed period and published when
//!   their version increases
//! - leased (`database`) credentials are re-issued whenever their lease runs
//!   out and always published
//!
//! One task owns the schedule. Changes are written to a shared
//! [`SecretStore`] and announced on a bounded event channel, see
//! [`SecretWatcher`] for the entry point.

mod backend;
mod config;
mod errors;
pub mod metrics;
mod store;
mod watch;
mod watcher;

pub use backend::*;
pub use config::*;
pub use errors::*;
pub use store::*;
pub use watch::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
