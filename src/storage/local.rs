//! Local filesystem backend.

use object_store::local::LocalFileSystem;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// A directory on the local filesystem, optionally narrowed to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub root: String,
    pub key: Option<Path>,
    /// Create `root` when it is missing. Only set for write targets, so an
    /// absent input still fails as "not found".
    pub create_root: bool,
}

impl StorageProvider {
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        if config.create_root {
            tokio::fs::create_dir_all(&config.root)
                .await
                .context(IoSnafu)?;
        }

        let store = LocalFileSystem::new_with_prefix(&config.root).context(ObjectStoreSnafu)?;
        Ok(Self {
            canonical_url: format!("file://{}", config.root),
            object_store: Arc::new(store),
            config: BackendConfig::Local(config),
        })
    }
}
