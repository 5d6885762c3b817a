use std::path::Path;

use docsearch_core::ShardLayout;

use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{IndexRoot, LoggingConfig, SearchConfig, SubstringScopeConfig};

/// Context for semantic config validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigValidationContext<'a> {
    /// Directory containing the loaded config file; relative `index.root`
    /// paths resolve against it.
    pub config_dir: Option<&'a Path>,
}

impl SearchConfig {
    /// Validates semantic invariants, reporting as many problems as possible
    /// in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationDiagnostics {
        self.validate_with_context(ConfigValidationContext::default())
    }

    /// Like [`SearchConfig::validate`], but also checks that a directory root
    /// exists when `ctx` names the config directory.
    #[must_use]
    pub fn validate_with_context(&self, ctx: ConfigValidationContext<'_>) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();

        validate_index(self, ctx, &mut out);
        validate_loader(self, &mut out);
        validate_query(self, &mut out);
        validate_logging(self, &mut out);

        out
    }
}

fn invalid(out: &mut ValidationDiagnostics, toml_path: &str, message: impl Into<String>) {
    out.errors.push(ConfigValidationError::InvalidValue {
        toml_path: toml_path.to_owned(),
        message: message.into(),
    });
}

fn validate_index(config: &SearchConfig, ctx: ConfigValidationContext<'_>, out: &mut ValidationDiagnostics) {
    let index = &config.index;

    let section = index.section.trim();
    if section.is_empty() {
        invalid(out, "index.section", "must not be empty");
    } else if section.contains(&['/', '\\'][..]) {
        invalid(out, "index.section", "must be a file prefix, not a path");
    }

    if index.root.trim().is_empty() {
        invalid(out, "index.root", "must not be empty");
    }

    if matches!(&index.extension, Some(ext) if ext.trim().is_empty() || ext.starts_with('.')) {
        invalid(out, "index.extension", "must be a bare extension such as `js`");
    }

    if index.manifest.is_some() {
        if index.buckets != crate::IndexConfig::default().buckets {
            out.warnings.push(ConfigWarning::BucketsIgnored);
        }
    } else if let Err(err) = ShardLayout::parse(index.buckets.trim()) {
        invalid(out, "index.buckets", err.to_string());
    }

    match config.index_root(ctx.config_dir) {
        IndexRoot::Url(_) => {
            if !cfg!(feature = "http") {
                out.errors.push(ConfigValidationError::HttpRootUnsupported {
                    root: index.root.clone(),
                });
            }
        }
        IndexRoot::Directory(resolved) => {
            let checkable = resolved.is_absolute() || ctx.config_dir.is_some();
            if checkable && !index.root.trim().is_empty() && !resolved.is_dir() {
                out.warnings.push(ConfigWarning::IndexRootMissing { resolved });
            }
        }
    }
}

fn validate_loader(config: &SearchConfig, out: &mut ValidationDiagnostics) {
    if config.loader.fetch_timeout_ms == 0 {
        invalid(out, "loader.fetch_timeout_ms", "must be >= 1");
    }
    if config.loader.max_shard_bytes == 0 {
        invalid(out, "loader.max_shard_bytes", "must be >= 1");
    }
}

fn validate_query(config: &SearchConfig, out: &mut ValidationDiagnostics) {
    if config.query.max_results == 0 {
        invalid(out, "query.max_results", "must be >= 1");
    }

    if config.query.substring_scope == SubstringScopeConfig::AllShards {
        let shard_count = config
            .layout()
            .map(|layout| layout.len())
            .unwrap_or_else(|_| ShardLayout::alphabet().len());
        out.warnings
            .push(ConfigWarning::SubstringScopeLoadsWholeIndex { shard_count });
    }
}

fn validate_logging(config: &SearchConfig, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }
}
