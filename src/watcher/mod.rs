//! Registration facade over the watch loop.
//!
//! [`SecretWatcher`] resolves paths against the mount table, loads their
//! current values into the store and hands them to the watch loop with the
//! revision hint of that first fetch as baseline. Paths added after
//! [`SecretWatcher::start`] are forwarded to the running loop.

mod handle;
mod secret_watcher;


pub use handle::*;
pub use secret_watcher::*;
