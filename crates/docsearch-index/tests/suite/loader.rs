use std::sync::Arc;
use std::time::Duration;

use docsearch_core::ShardRegistry;
use docsearch_index::{FetchError, LoadError, LoaderOptions, ShardLoader, ShardStatus};

use crate::suite::support::{fixture, key, ScriptedSource};

fn loader(source: Arc<ScriptedSource>, options: LoaderOptions) -> ShardLoader {
    ShardLoader::new(source, ShardRegistry::default(), options)
}

#[tokio::test]
async fn concurrent_loads_share_one_fetch() {
    let (source, gate) = ScriptedSource::new()
        .with_shard(key(6), fixture("all_6.js"))
        .gated();
    let source = Arc::new(source);
    let loader = loader(Arc::clone(&source), LoaderOptions::default());
    let shard_key = key(6);

    let loads = futures::future::join_all((0..5).map(|_| loader.load(&shard_key)));
    let release = async {
        while source.fetch_count(&shard_key) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(loader.status(&shard_key), ShardStatus::Loading);
        gate.add_permits(1);
    };
    let (results, ()) = tokio::join!(loads, release);

    let shards: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert!(shards.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(source.fetch_count(&shard_key), 1);
    assert_eq!(loader.stats().fetches_started, 1);
    assert!(loader.is_cached(&shard_key));
}

#[tokio::test]
async fn dropped_waiter_does_not_abort_the_fetch() {
    let (source, gate) = ScriptedSource::new()
        .with_shard(key(6), fixture("all_6.js"))
        .gated();
    let source = Arc::new(source);
    let loader = loader(Arc::clone(&source), LoaderOptions::default());
    let shard_key = key(6);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), loader.load(&shard_key)).await;
    assert!(abandoned.is_err());
    assert_eq!(loader.status(&shard_key), ShardStatus::Loading);

    gate.add_permits(1);
    let shard = loader.load(&shard_key).await.unwrap();
    assert!(shard.get("getname").is_some());
    assert_eq!(source.fetch_count(&shard_key), 1);
}

#[tokio::test]
async fn failed_fetch_is_retried_by_the_next_load() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_shard(key(6), fixture("all_6.js"))
            .failing(key(6), 1),
    );
    let loader = loader(Arc::clone(&source), LoaderOptions::default());

    let err = loader.load(&key(6)).await.unwrap_err();
    assert!(matches!(err, LoadError::Fetch(FetchError::Io { .. })), "{err:?}");
    assert!(!err.is_fatal());
    assert_eq!(loader.status(&key(6)), ShardStatus::Absent);

    let shard = loader.load(&key(6)).await.unwrap();
    assert!(!shard.is_empty());
    assert_eq!(source.fetch_count(&key(6)), 2);

    let stats = loader.stats();
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.cached_shards, 1);
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let (source, _gate) = ScriptedSource::new()
        .with_shard(key(6), fixture("all_6.js"))
        .gated();
    let loader = loader(
        Arc::new(source),
        LoaderOptions {
            fetch_timeout: Duration::from_millis(20),
            ..LoaderOptions::default()
        },
    );

    let err = loader.load(&key(6)).await.unwrap_err();
    assert!(
        matches!(err, LoadError::Fetch(FetchError::Timeout { timeout_ms: 20, .. })),
        "{err:?}"
    );
    assert_eq!(loader.status(&key(6)), ShardStatus::Absent);
}

#[tokio::test]
async fn prefetch_warms_available_shards() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_shard(key(6), fixture("all_6.js"))
            .with_shard(key(0), "var searchData=[['alpha',['alpha',['../a.html',1,'']]]];"),
    );
    let loader = loader(Arc::clone(&source), LoaderOptions::default());

    let warmed = loader.prefetch([key(0), key(6), key(7)]).await;
    assert_eq!(warmed, 2);
    assert!(loader.is_cached(&key(0)));
    assert!(loader.is_cached(&key(6)));
    assert!(!loader.is_cached(&key(7)));
    assert!(loader.cached(&key(0)).is_some());
}
