use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::BackendError;
use crate::Fetched;
use crate::MockSecretBackend;
use crate::SecretBackend;

/// Records every fetch the watch loop performs, in order.
#[derive(Clone, Default, Debug)]
pub struct FetchLog {
    calls: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl FetchLog {
    pub fn record(
        &self,
        path: &str,
    ) {
        self.calls.lock().push((path.to_string(), Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(path, _)| path.clone()).collect()
    }

    pub fn times_of(
        &self,
        path: &str,
    ) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, at)| *at)
            .collect()
    }
}

/// Builds a mock backend whose answer is computed by `respond(path, n)`,
/// where `n` counts the fetches of that path starting at 1.
pub fn scripted_backend<F>(
    log: FetchLog,
    mut respond: F,
) -> MockSecretBackend
where
    F: FnMut(&str, u64) -> std::result::Result<Fetched, BackendError> + Send + 'static,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut backend = MockSecretBackend::new();
    backend.expect_fetch().returning(move |path| {
        log.record(path);
        let n = counts.entry(path.to_string()).or_insert(0);
        *n += 1;
        respond(path, *n)
    });
    backend
}

/// Backend that takes `delay` to answer every fetch.
pub struct SlowBackend {
    pub delay: Duration,
    pub answer: Fetched,
}

#[async_trait]
impl SecretBackend for SlowBackend {
    async fn fetch(
        &self,
        _path: &str,
    ) -> std::result::Result<Fetched, BackendError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}
