use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docsearch_core::{Shard, ShardRegistry};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::{FetchError, LoadError};
use crate::source::{ShardKey, ShardSource};
use crate::wire::{decode_shard, ShardFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub format: ShardFormat,
    pub fetch_timeout: Duration,
    /// Payloads above this size are rejected before decoding.
    pub max_shard_bytes: u64,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            format: ShardFormat::Auto,
            fetch_timeout: Duration::from_secs(10),
            max_shard_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    Absent,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Fetches issued against the source. Coalesced requests do not count.
    pub fetches_started: u64,
    pub fetch_failures: u64,
    pub cached_shards: usize,
    pub cached_bytes: u64,
}

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<Shard>, LoadError>>>;

enum Slot {
    Loading { load_id: u64, future: LoadFuture },
    Ready(Arc<Shard>),
}

#[derive(Debug, Default)]
struct Counters {
    fetches_started: AtomicU64,
    fetch_failures: AtomicU64,
}

/// Fetches and decodes shards on demand.
///
/// - At most one fetch per shard is in flight; concurrent `load` calls for
///   the same shard await the same pending operation.
/// - Successfully loaded shards are kept for the lifetime of the loader.
/// - Failures are handed to every waiter and then forgotten, so the next
///   `load` retries.
///
/// Dropping a `load` future never aborts the underlying fetch; another
/// caller attaching to the same shard resumes it.
pub struct ShardLoader {
    source: Arc<dyn ShardSource>,
    registry: ShardRegistry,
    options: LoaderOptions,
    slots: Mutex<HashMap<ShardKey, Slot>>,
    next_load_id: AtomicU64,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for ShardLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardLoader")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ShardLoader {
    pub fn new(source: Arc<dyn ShardSource>, registry: ShardRegistry, options: LoaderOptions) -> Self {
        tracing::debug!(
            layout = %registry.layout(),
            fingerprint = registry.layout().fingerprint(),
            "creating shard loader"
        );
        Self {
            source,
            registry,
            options,
            slots: Mutex::new(HashMap::new()),
            next_load_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn status(&self, key: &ShardKey) -> ShardStatus {
        match self.slots.lock().get(key) {
            None => ShardStatus::Absent,
            Some(Slot::Loading { .. }) => ShardStatus::Loading,
            Some(Slot::Ready(_)) => ShardStatus::Ready,
        }
    }

    pub fn is_cached(&self, key: &ShardKey) -> bool {
        self.status(key) == ShardStatus::Ready
    }

    /// Returns the shard if it is already resident, without fetching.
    pub fn cached(&self, key: &ShardKey) -> Option<Arc<Shard>> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(shard)) => Some(Arc::clone(shard)),
            _ => None,
        }
    }

    pub fn stats(&self) -> LoaderStats {
        let slots = self.slots.lock();
        let mut cached_shards = 0;
        let mut cached_bytes = 0u64;
        for slot in slots.values() {
            if let Slot::Ready(shard) = slot {
                cached_shards += 1;
                cached_bytes = cached_bytes.saturating_add(shard.estimated_bytes());
            }
        }
        LoaderStats {
            fetches_started: self.counters.fetches_started.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            cached_shards,
            cached_bytes,
        }
    }

    pub async fn load(&self, key: &ShardKey) -> Result<Arc<Shard>, LoadError> {
        let (load_id, future) = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(Slot::Ready(shard)) => return Ok(Arc::clone(shard)),
                Some(Slot::Loading { load_id, future }) => {
                    tracing::trace!(shard = %key, "joining in-flight shard fetch");
                    (*load_id, future.clone())
                }
                None => {
                    let load_id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.start_fetch(key.clone());
                    slots.insert(
                        key.clone(),
                        Slot::Loading {
                            load_id,
                            future: future.clone(),
                        },
                    );
                    (load_id, future)
                }
            }
        };

        let result = future.await;
        self.settle(key, load_id, &result);
        result
    }

    /// Loads several shards concurrently; results are in input order.
    pub async fn load_many(
        &self,
        keys: impl IntoIterator<Item = ShardKey>,
    ) -> Vec<(ShardKey, Result<Arc<Shard>, LoadError>)> {
        futures::future::join_all(keys.into_iter().map(|key| async move {
            let result = self.load(&key).await;
            (key, result)
        }))
        .await
    }

    /// Warms the cache; returns how many of `keys` are resident afterwards.
    pub async fn prefetch(&self, keys: impl IntoIterator<Item = ShardKey>) -> usize {
        self.load_many(keys)
            .await
            .iter()
            .filter(|(_, result)| result.is_ok())
            .count()
    }

    fn settle(&self, key: &ShardKey, load_id: u64, result: &Result<Arc<Shard>, LoadError>) {
        let mut slots = self.slots.lock();
        let still_ours = matches!(
            slots.get(key),
            Some(Slot::Loading { load_id: current, .. }) if *current == load_id
        );
        if !still_ours {
            return;
        }
        match result {
            Ok(shard) => {
                slots.insert(key.clone(), Slot::Ready(Arc::clone(shard)));
            }
            Err(_) => {
                slots.remove(key);
            }
        }
    }

    fn start_fetch(&self, key: ShardKey) -> LoadFuture {
        self.counters.fetches_started.fetch_add(1, Ordering::Relaxed);

        let source = Arc::clone(&self.source);
        let registry = self.registry.clone();
        let options = self.options;
        let counters = Arc::clone(&self.counters);

        async move {
            let location = source.describe(&key);
            tracing::debug!(shard = %key, %location, "fetching shard");

            let bytes = match tokio::time::timeout(options.fetch_timeout, source.fetch(&key)).await {
                Ok(fetched) => fetched?,
                Err(_) => {
                    return Err(FetchError::Timeout {
                        location,
                        timeout_ms: options.fetch_timeout.as_millis() as u64,
                    }
                    .into())
                }
            };
            if bytes.len() as u64 > options.max_shard_bytes {
                return Err(FetchError::TooLarge {
                    location,
                    size: bytes.len() as u64,
                    limit: options.max_shard_bytes,
                }
                .into());
            }

            let shard = decode_shard(&bytes, options.format, key.id(), &registry)?;
            tracing::debug!(shard = %key, entries = shard.len(), "loaded shard");
            Ok(Arc::new(shard))
        }
        .map(move |result: Result<Arc<Shard>, LoadError>| {
            if let Err(err) = &result {
                counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                if err.is_fatal() {
                    tracing::error!(error = %err, "search index layout disagrees with the runtime");
                } else {
                    tracing::warn!(error = %err, "shard unavailable");
                }
            }
            result
        })
        .boxed()
        .shared()
    }
}
