use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docsearch_core::ShardId;

use crate::error::FetchError;

/// Address of one shard file: index section plus shard id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey {
    section: Arc<str>,
    id: ShardId,
}

impl ShardKey {
    pub fn new(section: impl Into<Arc<str>>, id: ShardId) -> Self {
        Self {
            section: section.into(),
            id,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    /// `<section>_<id>.<extension>` with the id in lowercase hex, the
    /// generator's file naming.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{self}.{extension}")
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:x}", self.section, self.id.index())
    }
}

/// Where shard bytes come from.
#[async_trait]
pub trait ShardSource: Send + Sync {
    async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError>;

    /// Human readable location of `key`, for diagnostics.
    fn describe(&self, key: &ShardKey) -> String {
        key.to_string()
    }
}

/// Reads shards from a directory of generated files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &ShardKey) -> PathBuf {
        self.root.join(key.file_name(&self.extension))
    }

    /// Reads a non-shard file (such as the manifest) next to the shards.
    pub async fn fetch_file(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        read_file(&self.root.join(name)).await
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(FetchError::NotFound {
            location: path.display().to_string(),
        }),
        Err(err) => Err(FetchError::Io {
            location: path.display().to_string(),
            message: err.to_string(),
        }),
    }
}

#[async_trait]
impl ShardSource for DirectorySource {
    async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        read_file(&self.path_for(key)).await
    }

    fn describe(&self, key: &ShardKey) -> String {
        self.path_for(key).display().to_string()
    }
}

/// Shards held in memory, e.g. embedded into a binary.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    shards: HashMap<ShardKey, Arc<[u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ShardKey, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.shards.insert(key, bytes.into());
    }

    pub fn with_shard(mut self, key: ShardKey, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(key, bytes);
        self
    }
}

#[async_trait]
impl ShardSource for MemorySource {
    async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        self.shards
            .get(key)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| FetchError::NotFound {
                location: key.to_string(),
            })
    }
}

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use url::Url;

    /// Fetches shards relative to a base URL.
    #[derive(Debug, Clone)]
    pub struct HttpSource {
        client: reqwest::Client,
        base: Url,
        extension: String,
    }

    impl HttpSource {
        pub fn new(base: Url, extension: impl Into<String>) -> Self {
            Self::with_client(reqwest::Client::new(), base, extension)
        }

        pub fn with_client(client: reqwest::Client, mut base: Url, extension: impl Into<String>) -> Self {
            // `Url::join` replaces the last segment unless the base ends in `/`.
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            Self {
                client,
                base,
                extension: extension.into(),
            }
        }

        pub fn url_for(&self, key: &ShardKey) -> Result<Url, FetchError> {
            self.join(&key.file_name(&self.extension))
        }

        /// Fetches a non-shard file (such as the manifest) relative to the
        /// base URL.
        pub async fn fetch_file(&self, name: &str) -> Result<Vec<u8>, FetchError> {
            self.get(self.join(name)?).await
        }

        fn join(&self, name: &str) -> Result<Url, FetchError> {
            self.base.join(name).map_err(|err| FetchError::Http {
                message: format!("invalid url for {name}: {err}"),
            })
        }

        async fn get(&self, url: Url) -> Result<Vec<u8>, FetchError> {
            let safe_url = sanitize_url(&url);
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| FetchError::Http {
                    message: format!("transport error for {safe_url}: {}", err.without_url()),
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound { location: safe_url });
            }
            if !status.is_success() {
                return Err(FetchError::Http {
                    message: format!("server returned status {} for {safe_url}", status.as_u16()),
                });
            }

            let body = response.bytes().await.map_err(|err| FetchError::Http {
                message: format!("failed reading body of {safe_url}: {}", err.without_url()),
            })?;
            Ok(body.to_vec())
        }
    }

    #[async_trait]
    impl ShardSource for HttpSource {
        async fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
            self.get(self.url_for(key)?).await
        }

        fn describe(&self, key: &ShardKey) -> String {
            self.url_for(key)
                .map(|url| sanitize_url(&url))
                .unwrap_or_else(|_| key.to_string())
        }
    }

    /// Drops credentials and query strings before a URL reaches logs.
    fn sanitize_url(url: &Url) -> String {
        let mut url = url.clone();
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

}
