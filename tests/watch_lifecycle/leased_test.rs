use std::time::Duration;

use secret_watch::WatchConfig;
use tokio::time::Instant;

use crate::common::harness;
use crate::common::next_event;
use crate::common::subscribe;
use crate::enable_logger;

const ROLE: &str = "database/readonly";

/// # Case: leased credential follows the lease of every re-issue
///
/// ## Setup:
/// - initial lease 300s
/// - lease shortened to 60s before the first renewal
///
/// ## Criterias:
/// - renewals at +300s, +360s and +420s
/// - every renewal is published with a fresh credential
#[tokio::test(start_paused = true)]
async fn test_credentials_reissued_on_lease_expiry() {
    enable_logger();
    let mut h = harness(WatchConfig::default());
    h.backend.set_lease(ROLE, Duration::from_secs(300));
    h.watcher.add_paths([ROLE]).await.unwrap();
    assert_eq!(h.store.get_string(ROLE).as_deref(), Some("v-readonly-1:pw-1"));

    let t0 = Instant::now();
    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);
    h.backend.set_lease(ROLE, Duration::from_secs(60));

    for (issued, due_secs) in [(2u64, 300u64), (3, 360), (4, 420)] {
        let event = next_event(&mut events).await.unwrap();
        let elapsed = t0.elapsed();
        assert_eq!(event.path, ROLE);
        assert_eq!(event.value, format!("v-readonly-{}:pw-{}", issued, issued));
        assert!(
            elapsed >= Duration::from_secs(due_secs) && elapsed < Duration::from_secs(due_secs + 1),
            "renewal {} at {:?}",
            issued,
            elapsed
        );
    }
    assert_eq!(h.store.get_string(ROLE).as_deref(), Some("v-readonly-4:pw-4"));

    handle.shutdown();
    assert!(handle.join().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_versioned_and_leased_share_one_schedule() {
    let config = WatchConfig {
        version_period_ms: 45_000,
        ..Default::default()
    };
    let mut h = harness(config);
    h.backend.put_versioned("secret/app:token", "t1");
    h.backend.set_lease("database/fast", Duration::from_secs(20));
    h.backend.set_lease("database/slow", Duration::from_secs(50));
    h.watcher
        .add_paths(["database/slow", "secret/app:token", "database/fast"])
        .await
        .unwrap();
    h.backend.put_versioned("secret/app:token", "t2");

    let mut handle = h.watcher.start().unwrap();
    let mut events = subscribe(&mut handle);

    // fast at 20 and 40, token at 45, slow at 50
    let mut order = Vec::new();
    for _ in 0..4 {
        order.push(next_event(&mut events).await.unwrap().path);
    }
    assert_eq!(
        order,
        vec!["database/fast", "database/fast", "secret/app:token", "database/slow"]
    );
    assert_eq!(h.store.get_string("secret/app:token").as_deref(), Some("t2"));

    handle.shutdown();
    assert!(handle.join().await.is_err());
}
