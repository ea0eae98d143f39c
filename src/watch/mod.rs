//! Watch scheduler for cached secrets
//!
//! Keeps the [`SecretStore`](crate::SecretStore) fresh by re-fetching every
//! watched path when it is due. Two refresh policies share one timer:
//!
//! - **Versioned** secrets are polled every `version_period_ms` and published
//!   only when the backend reports a higher version than the last one seen.
//! - **Leased** credentials are re-issued when their lease runs out and are
//!   always published. The lease returned by each fetch sets the next delay.
//!
//! ```text
//! ┌─────────────────┐
//! │   DueQueue      │ (path, due time), min-heap
//! └──────┬──────────┘
//!        │ pop_min + sleep_until(due)
//!        ▼
//! ┌─────────────────┐
//! │ SecretBackend   │ fetch(path) -> value + revision hint
//! └──────┬──────────┘
//!        ▼
//! ┌─────────────────┐
//! │ RefreshPolicy   │ versioned: compare / leased: always
//! └──────┬──────────┘
//!        ▼
//! ┌─────────────────┐       ┌─────────────────┐
//! │ SecretStore     │       │ EventPublisher  │ bounded mpsc, blocks when full
//! └─────────────────┘       └─────────────────┘
//!        │
//!        └───> re-insert with completion time + interval
//! ```
//!
//! # Error Handling
//!
//! With the default [`FailurePolicy::HaltAll`](crate::FailurePolicy) a single
//! failed fetch stops all watching. `IsolatePath` drops only the failing path
//! unless the whole backend is unavailable. Either way the event channel is
//! closed when the loop stops and the reason is published as a
//! [`WatchStatus`].

mod due_queue;
mod policy;
mod publisher;
mod scheduler;


pub use due_queue::*;
pub use policy::*;
pub use publisher::*;
pub use scheduler::*;
