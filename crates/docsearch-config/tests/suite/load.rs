use docsearch_config::{
    ConfigError, ConfigValidationError, ConfigWarning, IndexFormat, SearchConfig,
    SubstringScopeConfig, CONFIG_FILE_NAME,
};
use pretty_assertions::assert_eq;

#[test]
fn full_config_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("public/search")).unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
[index]
root = "public/search"
section = "functions"
format = "json"

[loader]
fetch_timeout_ms = 2500
max_shard_bytes = 1048576

[query]
max_results = 20
substring_scope = "all_shards"

[logging]
level = "WARNING"
json = true
"#,
    )
    .unwrap();

    let (config, diagnostics) = SearchConfig::load_from_path_with_diagnostics(&path).unwrap();
    assert_eq!(config.index.section, "functions");
    assert_eq!(config.index.format, IndexFormat::Json);
    assert_eq!(config.index.extension(), "json");
    assert_eq!(config.loader.fetch_timeout().as_millis(), 2500);
    assert_eq!(config.query.max_results, 20);
    assert_eq!(config.query.substring_scope, SubstringScopeConfig::AllShards);
    assert!(config.logging.json);

    assert!(diagnostics.unknown_keys.is_empty());
    assert!(diagnostics.is_ok());
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::SubstringScopeLoadsWholeIndex { shard_count: 26 }]
    );

    let plain = SearchConfig::load_from_path(&path).unwrap();
    assert_eq!(plain, config);
}

#[test]
fn unknown_keys_are_reported_not_rejected() {
    let (config, diagnostics) = SearchConfig::load_from_str_with_diagnostics(
        r#"
[index]
sektion = "classes"

[query]
max_results = 10
fuzzy = true
"#,
    )
    .unwrap();

    assert_eq!(config.index.section, "all");
    assert_eq!(config.query.max_results, 10);
    assert_eq!(diagnostics.unknown_keys, vec!["index.sektion", "query.fuzzy"]);
    assert!(diagnostics.is_ok());
}

#[test]
fn semantic_errors_come_back_as_diagnostics() {
    let (_, diagnostics) = SearchConfig::load_from_str_with_diagnostics(
        r#"
[index]
root = "https://docs.example.com/search/"
buckets = "zyx"

[query]
max_results = 0
"#,
    )
    .unwrap();

    let mut paths = Vec::new();
    let mut http_rejected = false;
    for error in &diagnostics.errors {
        match error {
            ConfigValidationError::InvalidValue { toml_path, .. } => paths.push(toml_path.as_str()),
            ConfigValidationError::HttpRootUnsupported { .. } => http_rejected = true,
            _ => {}
        }
    }
    assert_eq!(paths, vec!["index.buckets", "query.max_results"]);
    assert_eq!(http_rejected, !cfg!(feature = "http"));
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    match SearchConfig::load_from_path(&path) {
        Err(ConfigError::Io { path: reported, .. }) => {
            assert!(reported.ends_with("nope.toml"), "{reported}")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn type_errors_are_fatal() {
    let err = SearchConfig::load_from_str_with_diagnostics("[loader]\nfetch_timeout_ms = -5\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn invalid_logging_level_is_a_warning() {
    let (_, diagnostics) =
        SearchConfig::load_from_str_with_diagnostics("[logging]\nlevel = \"=== nope\"\n").unwrap();
    assert!(diagnostics.is_ok());
    assert!(matches!(
        diagnostics.warnings.as_slice(),
        [ConfigWarning::LoggingLevelInvalid { .. }]
    ));
}

#[test]
fn buckets_beside_a_manifest_only_warn() {
    let (config, diagnostics) = SearchConfig::load_from_str_with_diagnostics(
        r#"
[index]
manifest = "searchdata.js"
buckets = "_abcdefghijlmnoprstuvw~"
"#,
    )
    .unwrap();

    assert_eq!(config.index.manifest.as_deref(), Some("searchdata.js"));
    assert!(diagnostics.is_ok());
    assert_eq!(diagnostics.warnings, vec![ConfigWarning::BucketsIgnored]);
}
