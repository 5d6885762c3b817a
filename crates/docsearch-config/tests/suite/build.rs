use std::path::{Path, PathBuf};

use docsearch_config::{BuildError, SearchConfig};
use docsearch_index::{MatchStrength, SearchError};
use pretty_assertions::assert_eq;

const MANIFEST: &str = r#"
var indexSectionsWithContent =
{
  0: "abcdefghijklmnopqrstuvwxyz",
  1: "_abcdefghijklmnopqrstuvwxyz~"
};

var indexSectionNames =
{
  0: "all",
  1: "functions"
};
"#;

fn site() -> tempfile::TempDir {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../docsearch-index/tests/fixtures/all_6.js");
    let dir = tempfile::tempdir().unwrap();
    let search = dir.path().join("html/search");
    std::fs::create_dir_all(&search).unwrap();
    std::fs::copy(&fixture, search.join("all_6.js")).unwrap();
    // Same bytes under a section whose layout puts `g` at index 7.
    std::fs::copy(&fixture, search.join("functions_7.js")).unwrap();
    std::fs::write(search.join("searchdata.js"), MANIFEST).unwrap();
    dir
}

fn config(text: &str) -> SearchConfig {
    let (config, diagnostics) = SearchConfig::load_from_str_with_diagnostics(text).unwrap();
    assert!(diagnostics.is_ok(), "{diagnostics:?}");
    config
}

async fn first_row(config: &SearchConfig, base: &Path, query: &str) -> (String, MatchStrength) {
    let engine = config.build_engine(Some(base)).await.unwrap();
    let results = engine.search(query).await.unwrap();
    let row = &results.rows[0];
    (row.label.clone(), row.strength)
}

#[tokio::test]
async fn default_layout_searches_the_site() {
    let site = site();
    let config = config("");
    assert_eq!(
        first_row(&config, site.path(), "GetName").await,
        ("getName".to_owned(), MatchStrength::Exact)
    );
}

#[tokio::test]
async fn manifest_layout_selects_the_section() {
    let site = site();
    let config = config(
        r#"
[index]
section = "functions"
manifest = "searchdata.js"
"#,
    );
    let engine = config.build_engine(Some(site.path())).await.unwrap();
    assert_eq!(engine.registry().shard_count(), 28);

    let results = engine.search("getnam").await.unwrap();
    assert_eq!(results.rows[0].label, "getName");
    assert_eq!(results.rows[0].strength, MatchStrength::Prefix);
}

#[tokio::test]
async fn wrong_buckets_route_to_missing_shards() {
    let site = site();
    let config = config(
        r#"
[index]
buckets = "_abcdefghijklmnopqrstuvwxyz~"
"#,
    );
    let engine = config.build_engine(Some(site.path())).await.unwrap();
    // `g` now routes to all_7.js, which does not exist.
    match engine.search("getname").await {
        Err(SearchError::Unavailable { shard, .. }) => assert_eq!(shard.index(), 7),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unknown_manifest_section_is_an_error() {
    let site = site();
    let config = config(
        r#"
[index]
section = "macros"
manifest = "searchdata.js"
"#,
    );
    let err = config.build_engine(Some(site.path())).await.unwrap_err();
    assert!(
        matches!(&err, BuildError::UnknownSection { section } if section == "macros"),
        "{err:?}"
    );
}

#[tokio::test]
async fn missing_manifest_is_an_error() {
    let site = site();
    let config = config(
        r#"
[index]
manifest = "nope.js"
"#,
    );
    let err = config.build_engine(Some(site.path())).await.unwrap_err();
    assert!(matches!(err, BuildError::ManifestFetch(_)), "{err:?}");
}
