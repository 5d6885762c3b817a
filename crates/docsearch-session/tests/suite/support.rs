use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docsearch_core::{ShardId, ShardRegistry};
use docsearch_index::{
    FetchError, LoaderOptions, QueryEngine, QueryOptions, ShardKey, ShardLoader, ShardSource,
};
use docsearch_session::SessionState;
use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};

pub fn shard_g() -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../docsearch-index/tests/fixtures/all_6.js");
    std::fs::read(path).unwrap()
}

pub fn key(id: u32) -> ShardKey {
    ShardKey::new("all", ShardId::new(id))
}

pub fn engine(source: Arc<dyn ShardSource>) -> Arc<QueryEngine> {
    let loader = ShardLoader::new(source, ShardRegistry::default(), LoaderOptions::default());
    Arc::new(QueryEngine::new("all", Arc::new(loader), QueryOptions::default()))
}

/// Serves fixed shards; individual shards can be held behind a gate or fail
/// a number of times.
#[derive(Default)]
pub struct TestSource {
    shards: HashMap<ShardKey, Vec<u8>>,
    gates: HashMap<ShardKey, Arc<Semaphore>>,
    failures: Mutex<HashMap<ShardKey, usize>>,
    fetches: Mutex<HashMap<ShardKey, usize>>,
}

impl TestSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard(mut self, key: ShardKey, bytes: impl Into<Vec<u8>>) -> Self {
        self.shards.insert(key, bytes.into());
        self
    }

    pub fn gate(&mut self, key: ShardKey) -> Arc<Semaphore> {
        Arc::clone(
            self.gates
                .entry(key)
                .or_insert_with(|| Arc::new(Semaphore::new(0))),
        )
    }

    pub fn failing(self, key: ShardKey, times: usize) -> Self {
        self.failures.lock().insert(key, times);
        self
    }

    pub fn fetch_count(&self, key: &ShardKey) -> usize {
        self.fetches.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ShardSource for TestSource {
    async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        *self.fetches.lock().entry(key.clone()).or_default() += 1;

        if let Some(gate) = self.gates.get(key) {
            gate.acquire()
                .await
                .map_err(|_| FetchError::Http {
                    message: "gate closed".into(),
                })?
                .forget();
        }

        if let Some(remaining) = self.failures.lock().get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Io {
                    location: key.to_string(),
                    message: "connection reset".into(),
                });
            }
        }

        self.shards.get(key).cloned().ok_or_else(|| FetchError::NotFound {
            location: key.to_string(),
        })
    }
}

/// Waits until the published state satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<SessionState>,
    pred: impl Fn(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}
