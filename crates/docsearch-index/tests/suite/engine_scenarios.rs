use std::sync::Arc;

use docsearch_core::{ShardId, ShardRegistry, TargetKind};
use docsearch_index::{
    match_query, DirectorySource, LoaderOptions, MatchStrength, QueryEngine, QueryOptions,
    SearchError, ShardLoader,
};
use pretty_assertions::assert_eq;

use crate::suite::support::{fixture, fixtures_dir, key, ScriptedSource};

fn fixture_engine() -> QueryEngine {
    let source = DirectorySource::new(fixtures_dir(), "js");
    let loader = ShardLoader::new(Arc::new(source), ShardRegistry::default(), LoaderOptions::default());
    QueryEngine::new("all", Arc::new(loader), QueryOptions::default())
}

#[tokio::test]
async fn exact_match_keeps_every_overload_in_recorded_order() {
    let engine = fixture_engine();
    let results = engine.search("getname").await.unwrap();

    let row = &results.rows[0];
    assert_eq!(row.label, "getName");
    assert_eq!(row.strength, MatchStrength::Exact);
    let scopes: Vec<_> = row
        .targets
        .iter()
        .map(|target| target.scope.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(
        scopes,
        vec!["ASTDeclNode", "ASTFunction", "ASTProgram", "ASTVariableExpr", "TipAlpha"]
    );
    assert!(row.targets.iter().all(|target| target.kind == TargetKind::Method));
    assert_eq!(
        row.targets[1].locator,
        "../classASTFunction.html#ac0f4532488bb6ed7a916e2cd595f7bb3"
    );
    assert_eq!(results.shards_searched, vec![ShardId::new(6)]);
}

#[tokio::test]
async fn partial_query_matches_by_prefix() {
    let engine = fixture_engine();
    let results = engine.search("GetN").await.unwrap();
    assert_eq!(results.query, "getn");

    let rows: Vec<_> = results
        .rows
        .iter()
        .map(|row| (row.label.as_str(), row.strength, row.targets.len()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("getName", MatchStrength::Prefix, 5),
            ("getNames", MatchStrength::Prefix, 1),
            ("getNode", MatchStrength::Prefix, 1),
        ]
    );
}

#[test]
fn unrelated_query_does_not_match() {
    let registry = ShardRegistry::default();
    let shard = docsearch_index::decode_shard(
        &fixture("all_6.js"),
        Default::default(),
        ShardId::new(6),
        &registry,
    )
    .unwrap();
    assert!(match_query("xname", &shard).is_empty());
    assert!(match_query("getname", &shard)
        .iter()
        .any(|m| m.entry.key() == "getname"));
}

#[tokio::test]
async fn empty_query_is_inert() {
    let engine = fixture_engine();
    for raw in ["", "   ", "\t\n"] {
        let results = engine.search(raw).await.unwrap();
        assert!(results.is_empty());
    }
    assert_eq!(engine.loader().stats().fetches_started, 0);
}

#[tokio::test]
async fn exact_outranks_prefix_regardless_of_shard_order() {
    let engine = fixture_engine();
    let results = engine.search("getfield").await.unwrap();
    let rows: Vec<_> = results
        .rows
        .iter()
        .map(|row| (row.key.as_str(), row.strength))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("getfield", MatchStrength::Exact),
            ("getfields", MatchStrength::Prefix),
        ]
    );

    // Same entries, reversed on the wire.
    let reversed = r#"{
        "format": "docsearch-shard", "version": 1, "bucket": "g",
        "entries": [
            { "key": "getfields", "label": "getFields", "targets": [{ "locator": "../b.html#f" }] },
            { "key": "getfield", "label": "getField", "targets": [{ "locator": "../a.html#f" }] }
        ]
    }"#;
    let source = ScriptedSource::new().with_shard(key(6), reversed);
    let loader = ShardLoader::new(Arc::new(source), ShardRegistry::default(), LoaderOptions::default());
    let engine = QueryEngine::new("all", Arc::new(loader), QueryOptions::default());
    let results = engine.search("getfield").await.unwrap();
    let keys: Vec<_> = results.rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(keys, vec!["getfield", "getfields"]);
}

#[tokio::test]
async fn failed_shard_recovers_on_next_query() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_shard(key(6), fixture("all_6.js"))
            .failing(key(6), 1),
    );
    let loader = ShardLoader::new(source.clone(), ShardRegistry::default(), LoaderOptions::default());
    let engine = QueryEngine::new("all", Arc::new(loader), QueryOptions::default());

    let err = engine.search("getn").await.unwrap_err();
    assert!(matches!(err, SearchError::Unavailable { shard, .. } if shard == ShardId::new(6)));

    let results = engine.search("getna").await.unwrap();
    assert_eq!(results.rows[0].label, "getName");
    assert_eq!(source.fetch_count(&key(6)), 2);
}

#[tokio::test]
async fn layout_mismatch_makes_the_index_unusable() {
    let dir = tempfile::tempdir().unwrap();
    // A `g` shard published where the runtime expects `h`.
    std::fs::write(dir.path().join("all_7.js"), fixture("all_6.js")).unwrap();

    let loader = ShardLoader::new(
        Arc::new(DirectorySource::new(dir.path(), "js")),
        ShardRegistry::default(),
        LoaderOptions::default(),
    );
    let engine = QueryEngine::new("all", Arc::new(loader), QueryOptions::default());

    let err = engine.search("hello").await.unwrap_err();
    assert!(err.is_fatal(), "{err}");
    assert!(matches!(err, SearchError::IndexUnusable(_)));
}

#[tokio::test]
async fn results_are_truncated_to_max_results() {
    let source = DirectorySource::new(fixtures_dir(), "js");
    let loader = ShardLoader::new(Arc::new(source), ShardRegistry::default(), LoaderOptions::default());
    let engine = QueryEngine::new(
        "all",
        Arc::new(loader),
        QueryOptions {
            max_results: 4,
            ..QueryOptions::default()
        },
    );

    let results = engine.search("get").await.unwrap();
    assert!(results.truncated);
    assert_eq!(results.len(), 4);
    assert!(results.counts.prefix > 4);
    let labels: Vec<_> = results.rows.iter().map(|row| row.label.as_str()).collect();
    assert_eq!(labels, vec!["getActuals", "getAddressOfField", "getArg", "getArguments"]);
}
