//! Object storage abstraction for inputs and the quarantine mirror.
//!
//! Provides a unified interface for the local filesystem and Azure Blob
//! Storage, the two places tabular inputs are fetched from.

mod azure;
mod local;

pub use azure::AzureConfig;
pub use local::LocalConfig;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

const ABFS_URL: &str = r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$";
const AZURE_HTTPS: &str = r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$";

static AZURE_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [ABFS_URL, AZURE_HTTPS]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern"))
        .collect()
});

static LOCAL_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [FILE_URI, FILE_URL, FILE_PATH]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern"))
        .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Azure(AzureConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    ///
    /// With `with_key`, a local URL is split into its parent directory and
    /// the file name, so the provider addresses one file.
    pub fn parse_url(url: &str, with_key: bool) -> Result<Self, StorageError> {
        let url = normalize_local(url);

        if let Some(caps) = AZURE_MATCHERS.iter().find_map(|r| r.captures(&url)) {
            return Ok(BackendConfig::Azure(AzureConfig {
                account: caps["account"].to_string(),
                container: caps["container"].to_string(),
                key: caps.name("key").map(|k| k.as_str().into()),
            }));
        }

        if let Some(caps) = LOCAL_MATCHERS.iter().find_map(|r| r.captures(&url)) {
            return Ok(Self::parse_local(&caps["path"], with_key));
        }

        InvalidUrlSnafu { url: url.into_owned() }.fail()
    }

    fn parse_local(path: &str, with_key: bool) -> Self {
        let mut path = if path.starts_with('/') {
            std::path::PathBuf::from(path)
        } else {
            std::path::PathBuf::from(format!("/{path}"))
        };

        let key = if with_key {
            let key = path
                .file_name()
                .map(|name| Path::from(name.to_string_lossy().as_ref()));
            path.pop();
            key
        } else {
            None
        };

        BackendConfig::Local(LocalConfig {
            root: path.to_string_lossy().into_owned(),
            key,
            create_root: !with_key,
        })
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            BackendConfig::Local(local) => local.key.as_ref(),
        }
    }
}

/// Turn a relative filesystem path into an absolute one.
fn normalize_local(url: &str) -> Cow<'_, str> {
    if url.contains("://") || url.starts_with('/') || url.starts_with("file:") {
        return Cow::Borrowed(url);
    }
    match std::path::absolute(url) {
        Ok(path) => Cow::Owned(path.to_string_lossy().into_owned()),
        Err(_) => Cow::Borrowed(url),
    }
}

impl StorageProvider {
    /// Create a storage provider rooted at a directory or blob prefix.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        Self::construct(BackendConfig::parse_url(url, false)?, options).await
    }

    /// Create a storage provider addressing a single object.
    pub async fn for_object(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        Self::construct(BackendConfig::parse_url(url, true)?, options).await
    }

    async fn construct(
        config: BackendConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match config {
            BackendConfig::Azure(config) => Self::construct_azure(config, options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Get the contents of an object relative to the configured key.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let location = self.qualify_path(&path);
        debug!("Fetching {}/{}", self.canonical_url, location);

        self.object_store
            .get(&location)
            .await
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// Put a payload to a path relative to the configured key.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let location = self.qualify_path(path);
        self.object_store
            .put(&location, payload)
            .await
            .context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Canonical URL of the storage root.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }
}

/// Download a whole object (file path or blob URL) into memory.
pub async fn fetch(url: &str, options: HashMap<String, String>) -> Result<Bytes, StorageError> {
    let provider = StorageProvider::for_object(url, options).await?;
    provider.get(Path::default()).await
}
