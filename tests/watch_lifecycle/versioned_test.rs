use std::time::Duration;

use secret_watch::WatchConfig;
use secret_watch::WatchStatus;
use tokio::time::Instant;

use crate::common::harness;
use crate::common::next_event;
use crate::common::subscribe;
use crate::enable_logger;

const PASSWORD: &str = "secret/app/db:password";

fn config(version_period_ms: u64) -> WatchConfig {
    WatchConfig {
        version_period_ms,
        ..Default::default()
    }
}

/// # Case: rotation of a versioned secret
///
/// ## Setup:
/// - poll period 10s, initial version 1
/// - the secret is rotated at +15s
///
/// ## Criterias:
/// - polls at +10s and +20s, only the second publishes
/// - store holds the rotated value
/// - no further event while the version stays the same
#[tokio::test(start_paused = true)]
async fn test_rotation_is_published_once() {
    enable_logger();
    let mut h = harness(config(10_000));
    h.backend.put_versioned(PASSWORD, "first");
    h.watcher.add_paths([PASSWORD]).await.unwrap();
    assert_eq!(h.store.get_string(PASSWORD).as_deref(), Some("first"));

    let t0 = Instant::now();
    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(h.backend.fetch_count(PASSWORD), 2);
    assert_eq!(h.backend.put_versioned(PASSWORD, "second"), 2);

    let event = next_event(&mut events).await.unwrap();
    let elapsed = t0.elapsed();
    assert_eq!(event.path, PASSWORD);
    assert_eq!(event.value, "second");
    assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    assert_eq!(h.store.get_string(PASSWORD).as_deref(), Some("second"));

    // polls at +30s through +70s, all at version 2
    let quiet = tokio::time::timeout(Duration::from_secs(55), events.recv()).await;
    assert!(quiet.is_err(), "unchanged version must not be published");
    assert_eq!(h.backend.fetch_count(PASSWORD), 8);

    handle.shutdown();
    assert!(handle.join().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_version_watch_only_loads() {
    let mut h = harness(config(0));
    h.backend.put_versioned(PASSWORD, "first");
    h.watcher.add_paths([PASSWORD]).await.unwrap();

    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);
    let status = handle.status();

    // nothing schedulable, the loop ends on its own
    assert_eq!(next_event(&mut events).await, None);
    assert!(handle.join().await.is_ok());
    assert!(matches!(&*status.borrow(), WatchStatus::Terminated(_)));

    assert_eq!(h.store.get_string(PASSWORD).as_deref(), Some("first"));
    assert_eq!(h.backend.fetch_count(PASSWORD), 1);
}
