use std::sync::Arc;
use std::time::Duration;

use secret_watch::EventReceiver;
use secret_watch::InMemoryBackend;
use secret_watch::MountTable;
use secret_watch::SecretEvent;
use secret_watch::SecretStore;
use secret_watch::SecretWatcher;
use secret_watch::WatchConfig;
use secret_watch::WatchHandle;
use tokio::time::timeout;

pub const KV_MOUNT: &str = "secret/";
pub const DB_MOUNT: &str = "database/";

// generous under paused time, the clock jumps straight to the next timer
pub const EVENT_DEADLINE: Duration = Duration::from_secs(24 * 3600);

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub store: Arc<SecretStore>,
    pub watcher: SecretWatcher<InMemoryBackend>,
}

pub fn mount_table() -> MountTable {
    let mut mounts = MountTable::default();
    mounts.insert(KV_MOUNT, "kv");
    mounts.insert(DB_MOUNT, "database");
    mounts
}

pub fn harness(config: WatchConfig) -> Harness {
    let backend = Arc::new(InMemoryBackend::new(mount_table()));
    let store = Arc::new(SecretStore::new());
    let watcher = SecretWatcher::new(config, backend.clone(), mount_table(), store.clone());
    Harness {
        backend,
        store,
        watcher,
    }
}

pub fn subscribe(handle: &mut WatchHandle) -> EventReceiver {
    handle.subscribe().expect("event stream taken twice")
}

pub async fn next_event(events: &mut EventReceiver) -> Option<SecretEvent> {
    timeout(EVENT_DEADLINE, events.recv())
        .await
        .expect("no event before deadline")
}
