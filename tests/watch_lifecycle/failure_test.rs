use std::time::Duration;

use secret_watch::BackendError;
use secret_watch::Error;
use secret_watch::FailurePolicy;
use secret_watch::TerminationReason;
use secret_watch::WatchConfig;
use secret_watch::WatchStatus;

use crate::common::harness;
use crate::common::next_event;
use crate::common::subscribe;
use crate::enable_logger;

/// # Case: a watched secret disappears
///
/// ## Criterias:
/// - the whole loop stops, other paths are no longer refreshed
/// - the event stream ends
/// - join reports the fetch error, status names the failing path
#[tokio::test(start_paused = true)]
async fn test_fetch_error_stops_all_watching() {
    enable_logger();
    let mut h = harness(WatchConfig::default());
    h.backend.set_lease("database/doomed", Duration::from_secs(10));
    h.backend.set_lease("database/other", Duration::from_secs(30));
    h.watcher.add_paths(["database/doomed", "database/other"]).await.unwrap();
    h.backend.fail_path(
        "database/doomed",
        BackendError::NotFound {
            path: "database/doomed".to_string(),
        },
    );

    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);
    let status = handle.status();

    assert_eq!(next_event(&mut events).await, None);
    assert!(matches!(
        handle.join().await,
        Err(Error::Backend(BackendError::NotFound { .. }))
    ));
    match &*status.borrow() {
        WatchStatus::Terminated(TerminationReason::FetchFailed { path, .. }) => {
            assert_eq!(path, "database/doomed")
        }
        other => panic!("unexpected status: {:?}", other),
    }

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.backend.fetch_count("database/other"), 1);
}

/// # Case: isolate_path keeps healthy paths alive until the backend goes away
#[tokio::test(start_paused = true)]
async fn test_isolated_failure_then_backend_outage() {
    let config = WatchConfig {
        failure_policy: FailurePolicy::IsolatePath,
        ..Default::default()
    };
    let mut h = harness(config);
    h.backend.set_lease("database/doomed", Duration::from_secs(5));
    h.backend.set_lease("database/healthy", Duration::from_secs(10));
    h.watcher.add_paths(["database/doomed", "database/healthy"]).await.unwrap();
    h.backend.fail_path(
        "database/doomed",
        BackendError::Malformed {
            path: "database/doomed".to_string(),
            reason: "missing password".to_string(),
        },
    );

    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);

    assert_eq!(next_event(&mut events).await.unwrap().path, "database/healthy");
    assert_eq!(next_event(&mut events).await.unwrap().path, "database/healthy");
    assert_eq!(h.backend.fetch_count("database/doomed"), 2);

    h.backend.set_unavailable(Some("sealed".to_string()));
    assert_eq!(next_event(&mut events).await, None);
    assert!(matches!(
        handle.join().await,
        Err(Error::Backend(BackendError::Unavailable(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_stream_and_join() {
    let mut h = harness(WatchConfig::default());
    h.backend.set_lease("database/role", Duration::from_secs(3600));
    h.watcher.add_paths(["database/role"]).await.unwrap();

    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);
    let status = handle.status();

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown();

    assert_eq!(next_event(&mut events).await, None);
    assert!(matches!(handle.join().await, Err(Error::Exit)));
    assert!(matches!(
        &*status.borrow(),
        WatchStatus::Terminated(TerminationReason::Shutdown)
    ));
    assert_eq!(h.store.get_string("database/role").as_deref(), Some("v-role-1:pw-1"));
}
