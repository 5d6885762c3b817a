use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use docsearch_core::ShardId;
use docsearch_index::{FetchError, ShardKey, ShardSource};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixtures_dir().join(name)).unwrap()
}

pub fn key(id: u32) -> ShardKey {
    ShardKey::new("all", ShardId::new(id))
}

/// In-memory source that counts fetches, can fail a number of times per
/// shard, and can hold every fetch until the test opens the gate.
#[derive(Default)]
pub struct ScriptedSource {
    shards: HashMap<ShardKey, Vec<u8>>,
    fetches: Mutex<HashMap<ShardKey, usize>>,
    failures: Mutex<HashMap<ShardKey, usize>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard(mut self, key: ShardKey, bytes: impl Into<Vec<u8>>) -> Self {
        self.shards.insert(key, bytes.into());
        self
    }

    /// The next `times` fetches of `key` fail with an IO error.
    pub fn failing(self, key: ShardKey, times: usize) -> Self {
        self.failures.lock().insert(key, times);
        self
    }

    /// Fetches block until a permit is added to the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn fetch_count(&self, key: &ShardKey) -> usize {
        self.fetches.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ShardSource for ScriptedSource {
    async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        *self.fetches.lock().entry(key.clone()).or_default() += 1;

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| FetchError::Http {
                message: "gate closed".into(),
            })?;
            // One permit releases one fetch.
            permit.forget();
        }

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Io {
                        location: key.to_string(),
                        message: "connection reset".into(),
                    });
                }
            }
        }

        self.shards
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                location: key.to_string(),
            })
    }
}
