//! `docsearch.toml` configuration, engine construction and tracing setup.
//!
//! ```toml
//! [index]
//! root = "html/search"
//! section = "all"
//! manifest = "searchdata.js"
//!
//! [loader]
//! fetch_timeout_ms = 10000
//!
//! [query]
//! max_results = 50
//! substring_scope = "home_shard"
//!
//! [logging]
//! level = "info"
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once, OnceLock};
use std::time::Duration;

use docsearch_core::{LayoutError, ShardLayout, ShardRegistry};
use docsearch_index::{
    DirectorySource, FetchError, LoaderOptions, ManifestError, QueryEngine, QueryOptions,
    SearchManifest, ShardFormat, ShardLoader, ShardSource, SubstringScope,
};
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use url::Url;

mod diagnostics;
mod schema;
mod validation;

pub use diagnostics::{
    ConfigDiagnostics, ConfigValidationError, ConfigWarning, ValidationDiagnostics,
};
pub use schema::json_schema;
pub use validation::ConfigValidationContext;

/// Conventional file name of the config.
pub const CONFIG_FILE_NAME: &str = "docsearch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct SearchConfig {
    /// Where the generated index lives and how it is laid out.
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    /// Detect per shard.
    #[default]
    Auto,
    /// Generator JavaScript (`var searchData = [...]`).
    Doxygen,
    /// Versioned JSON envelope.
    Json,
}

impl From<IndexFormat> for ShardFormat {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Auto => ShardFormat::Auto,
            IndexFormat::Doxygen => ShardFormat::Doxygen,
            IndexFormat::Json => ShardFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct IndexConfig {
    /// Directory holding the shard files, or an `http(s)://` base URL when
    /// built with the `http` feature. Relative paths resolve against the
    /// directory containing the config file.
    #[serde(default = "IndexConfig::default_root")]
    pub root: String,

    /// Index section to search; also the shard file prefix (`all` →
    /// `all_6.js`).
    #[serde(default = "IndexConfig::default_section")]
    pub section: String,

    #[serde(default)]
    pub format: IndexFormat,

    /// Bucket characters, strictly ascending. Ignored when `manifest` is set.
    #[serde(default = "IndexConfig::default_buckets")]
    pub buckets: String,

    /// Generator manifest (`searchdata.js`) relative to `root`. When set, the
    /// layout of `section` is read from it.
    #[serde(default)]
    pub manifest: Option<String>,

    /// Shard file extension. Defaults to `js`, or `json` for the JSON format.
    #[serde(default)]
    pub extension: Option<String>,
}

impl IndexConfig {
    fn default_root() -> String {
        "html/search".to_owned()
    }

    fn default_section() -> String {
        "all".to_owned()
    }

    fn default_buckets() -> String {
        ShardLayout::alphabet().buckets().iter().collect()
    }

    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .unwrap_or_else(|| ShardFormat::from(self.format).extension())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            section: Self::default_section(),
            format: IndexFormat::default(),
            buckets: Self::default_buckets(),
            manifest: None,
            extension: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Upper bound for a single shard fetch.
    #[serde(default = "LoaderConfig::default_fetch_timeout_ms")]
    #[schemars(range(min = 1))]
    pub fetch_timeout_ms: u64,

    /// Shards larger than this are rejected.
    #[serde(default = "LoaderConfig::default_max_shard_bytes")]
    #[schemars(range(min = 1))]
    pub max_shard_bytes: u64,
}

impl LoaderConfig {
    fn default_fetch_timeout_ms() -> u64 {
        10_000
    }

    fn default_max_shard_bytes() -> u64 {
        16 * 1024 * 1024
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: Self::default_fetch_timeout_ms(),
            max_shard_bytes: Self::default_max_shard_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubstringScopeConfig {
    #[default]
    HomeShard,
    AllShards,
}

impl From<SubstringScopeConfig> for SubstringScope {
    fn from(scope: SubstringScopeConfig) -> Self {
        match scope {
            SubstringScopeConfig::HomeShard => SubstringScope::HomeShard,
            SubstringScopeConfig::AllShards => SubstringScope::AllShards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct QueryConfig {
    /// Rows kept per query.
    #[serde(default = "QueryConfig::default_max_results")]
    #[schemars(range(min = 1))]
    pub max_results: usize,

    /// Where substring matches are collected from.
    #[serde(default)]
    pub substring_scope: SubstringScopeConfig,
}

impl QueryConfig {
    fn default_max_results() -> usize {
        50
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: Self::default_max_results(),
            substring_scope: SubstringScopeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file. If it cannot be opened, file logging is
    /// skipped and the other sinks stay active.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: `level` merged with `RUST_LOG` when set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        match env_directives {
            Some(env_directives) => {
                let combined = format!(
                    "{},{env_directives}",
                    Self::normalize_level_directives(&self.level)
                );
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` would include a snippet of the input; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// Redacts quoted user values from a TOML/serde message.
fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED: OnceLock<Option<regex::Regex>> = OnceLock::new();
    let re = QUOTED.get_or_init(|| regex::Regex::new(r#""(?:\\.|[^"\\])*"|`[^`]*`"#).ok());
    match re {
        Some(re) => re
            .replace_all(message, |caps: &regex::Captures<'_>| {
                if caps[0].starts_with('`') {
                    "`<redacted>`"
                } else {
                    "\"<redacted>\""
                }
            })
            .into_owned(),
        None => message.to_owned(),
    }
}

/// Where shards are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRoot {
    Directory(PathBuf),
    Url(Url),
}

/// Failure to turn a config into a working [`QueryEngine`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid index.buckets: {0}")]
    Layout(#[from] LayoutError),

    #[error("failed to read manifest: {0}")]
    ManifestFetch(#[source] FetchError),

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("manifest has no section named {section:?}")]
    UnknownSection { section: String },

    #[error("index.root {root:?} is a URL; rebuild with the `http` feature")]
    HttpUnsupported { root: String },
}

impl SearchConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Loads and validates; unknown keys and semantic problems are returned
    /// as diagnostics rather than errors.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        let ctx = ConfigValidationContext {
            config_dir: path.parent(),
        };
        Self::load_with_context(&text, ctx)
    }

    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        Self::load_with_context(text, ConfigValidationContext::default())
    }

    fn load_with_context(
        text: &str,
        ctx: ConfigValidationContext<'_>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<SearchConfig>(text)?;
        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.extend_validation(config.validate_with_context(ctx));
        Ok((config, diagnostics))
    }

    /// `index.root` as a directory or URL; relative directories resolve
    /// against `base_dir`.
    pub fn index_root(&self, base_dir: Option<&Path>) -> IndexRoot {
        let root = self.index.root.trim();
        if root.starts_with("http://") || root.starts_with("https://") {
            if let Ok(url) = Url::parse(root) {
                return IndexRoot::Url(url);
            }
        }
        let path = PathBuf::from(root);
        match base_dir {
            Some(base) if path.is_relative() => IndexRoot::Directory(base.join(path)),
            _ => IndexRoot::Directory(path),
        }
    }

    /// Layout from `index.buckets`. The manifest, when configured, takes
    /// precedence inside [`SearchConfig::build_engine`].
    pub fn layout(&self) -> Result<ShardLayout, LayoutError> {
        ShardLayout::parse(self.index.buckets.trim())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            format: self.index.format.into(),
            fetch_timeout: self.loader.fetch_timeout(),
            max_shard_bytes: self.loader.max_shard_bytes,
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            max_results: self.query.max_results,
            substring_scope: self.query.substring_scope.into(),
        }
    }

    /// Builds a ready-to-query engine. Reads the manifest when one is
    /// configured; no shard is fetched.
    pub async fn build_engine(&self, base_dir: Option<&Path>) -> Result<QueryEngine, BuildError> {
        let extension = self.index.extension().to_owned();
        let (source, manifest): (Arc<dyn ShardSource>, Option<Vec<u8>>) =
            match self.index_root(base_dir) {
                IndexRoot::Directory(dir) => {
                    let source = DirectorySource::new(dir, extension);
                    let manifest = match &self.index.manifest {
                        Some(name) => Some(
                            source
                                .fetch_file(name)
                                .await
                                .map_err(BuildError::ManifestFetch)?,
                        ),
                        None => None,
                    };
                    (Arc::new(source), manifest)
                }
                IndexRoot::Url(url) => self.http_source(url, extension).await?,
            };

        let layout = match manifest {
            Some(bytes) => self.layout_from_manifest(&bytes)?,
            None => self.layout()?,
        };
        tracing::info!(
            section = %self.index.section,
            layout = %layout,
            shards = layout.len(),
            "search index configured"
        );

        let loader = ShardLoader::new(source, ShardRegistry::new(layout), self.loader_options());
        Ok(QueryEngine::new(
            self.index.section.as_str(),
            Arc::new(loader),
            self.query_options(),
        ))
    }

    fn layout_from_manifest(&self, bytes: &[u8]) -> Result<ShardLayout, BuildError> {
        let text = String::from_utf8_lossy(bytes);
        let manifest = SearchManifest::parse(&text)?;
        manifest
            .section(&self.index.section)
            .map(|section| section.layout.clone())
            .ok_or_else(|| BuildError::UnknownSection {
                section: self.index.section.clone(),
            })
    }

    #[cfg(feature = "http")]
    async fn http_source(
        &self,
        url: Url,
        extension: String,
    ) -> Result<(Arc<dyn ShardSource>, Option<Vec<u8>>), BuildError> {
        let source = docsearch_index::HttpSource::new(url, extension);
        let manifest = match &self.index.manifest {
            Some(name) => Some(
                source
                    .fetch_file(name)
                    .await
                    .map_err(BuildError::ManifestFetch)?,
            ),
            None => None,
        };
        Ok((Arc::new(source), manifest))
    }

    #[cfg(not(feature = "http"))]
    async fn http_source(
        &self,
        _url: Url,
        _extension: String,
    ) -> Result<(Arc<dyn ShardSource>, Option<Vec<u8>>), BuildError> {
        Err(BuildError::HttpUnsupported {
            root: self.index.root.clone(),
        })
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

struct FileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            guard: self.file.lock(),
        }
    }
}

struct FileWriter<'a> {
    guard: parking_lot::MutexGuard<'a, std::fs::File>,
}

impl Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let file = config.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let file_failed = config.file.is_some() && file.is_none();

        let mut make_writer: Option<BoxMakeWriter> = None;
        if config.stderr {
            // `TestWriter` keeps `cargo test` output captured in debug builds.
            make_writer = Some(if cfg!(debug_assertions) {
                BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
            } else {
                BoxMakeWriter::new(std::io::stderr)
            });
        }
        if let Some(file) = file {
            let file_writer = FileMakeWriter {
                file: Arc::new(Mutex::new(file)),
            };
            make_writer = Some(match make_writer {
                Some(existing) => BoxMakeWriter::new(existing.and(file_writer)),
                None => BoxMakeWriter::new(file_writer),
            });
        }
        let make_writer = make_writer.unwrap_or_else(|| BoxMakeWriter::new(std::io::sink));

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_failed {
            if let Some(path) = &config.file {
                tracing::warn!(
                    target: "docsearch.config",
                    path = %path.display(),
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
}
