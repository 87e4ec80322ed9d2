//! Filesystem-style facade over the remote store.
//!
//! The adapter holds no state across calls apart from its caches. Each
//! operation resolves, checks scope, acts, invalidates and returns; the
//! pieces live in `resolver`, `scope`, `listing`, `content` and `mutation`.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use drivefs_common::backend::{CachePool, RemoteClient};

use crate::config::{AdapterConfig, ROOT_MARKER};
use crate::error::{Error, Result};
use crate::identity_cache::{IdentityCache, ParentMap};
use crate::item::{Item, Visibility};

pub struct DriveAdapter {
    pub(crate) client: Arc<dyn RemoteClient>,
    pub(crate) pool: Option<Arc<dyn CachePool>>,
    pub(crate) config: AdapterConfig,
    pub(crate) identity: IdentityCache,
    pub(crate) parents: Arc<ParentMap>,
    last_item: RwLock<Option<Item>>,
    /// Real ID behind the `root` alias, resolved on first need.
    pub(crate) canonical_root: OnceCell<Option<String>>,
}

impl DriveAdapter {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        pool: Option<Arc<dyn CachePool>>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            client,
            pool,
            config,
            identity: IdentityCache::new(),
            parents: Arc::new(ParentMap::new()),
            last_item: RwLock::new(None),
            canonical_root: OnceCell::new(),
        }
    }

    /// Share a parent map with other adapters in this process.
    pub fn with_parent_map(mut self, parents: Arc<ParentMap>) -> Self {
        self.parents = parents;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn root_id(&self) -> &str {
        self.config.root_id()
    }

    /// The item most recently created, read, updated or deleted. Mutating
    /// remote calls often return partial records; callers use this to learn
    /// the ID the store assigned.
    pub fn last_item(&self) -> Option<Item> {
        self.last_item.read().unwrap().clone()
    }

    pub(crate) fn remember(&self, item: &Item) {
        *self.last_item.write().unwrap() = Some(item.clone());
    }

    pub async fn file_exists(&self, path: &str) -> bool {
        self.get(path).await.is_ok()
    }

    /// Always shallow; `deep` is accepted for interface compatibility.
    /// Every call re-runs the full cache/fetch protocol.
    pub async fn list_contents(
        &self,
        path: &str,
        deep: bool,
    ) -> Result<impl Iterator<Item = Item>> {
        if deep {
            debug!(path, "Deep listing requested, returning a shallow listing");
        }
        Ok(self.list(path).await?.into_iter())
    }

    /// `directory` for containers.
    pub async fn mime_type(&self, path: &str) -> Result<String> {
        match self.get(path).await? {
            Item::Directory(_) => Ok("directory".to_string()),
            Item::File(file) => Ok(file.mime_type().to_string()),
        }
    }

    pub async fn last_modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let item = self.get_file(path).await?;
        item.last_modified()
            .ok_or_else(|| Error::metadata(path, "no modification time recorded"))
    }

    pub async fn file_size(&self, path: &str) -> Result<u64> {
        let item = self.get_file(path).await?;
        Ok(item.as_file().map(|f| f.size()).unwrap_or(0))
    }

    pub async fn visibility(&self, path: &str) -> Result<Visibility> {
        Ok(self.get_file(path).await?.visibility())
    }

    /// The remote permission model cannot be mapped onto a visibility level.
    pub async fn set_visibility(&self, path: &str, _visibility: Visibility) -> Result<()> {
        Err(Error::VisibilitySettingUnsupported {
            path: path.to_string(),
        })
    }

    async fn get_file(&self, path: &str) -> Result<Item> {
        let item = self.get(path).await?;
        if item.is_dir() {
            return Err(Error::metadata(path, "file does not exist or is a directory"));
        }
        Ok(item)
    }

    /// Split `<...>/<parent>/<name>` into the parent ID (configured root when
    /// absent) and the trailing name.
    pub(crate) fn split_target<'a>(&'a self, path: &'a str) -> (&'a str, &'a str) {
        let trimmed = path.trim_matches('/');
        let (parent, name) = match trimmed.rsplit_once('/') {
            Some((rest, name)) => (trailing_segment(rest), name),
            None => ("", trimmed),
        };
        (self.normalize_parent(parent), name)
    }

    /// Empty segments and the root marker stand for the configured root.
    pub(crate) fn normalize_parent<'a>(&'a self, id: &'a str) -> &'a str {
        if id.is_empty() || id == ROOT_MARKER {
            self.root_id()
        } else {
            id
        }
    }

    pub(crate) fn is_root_path(&self, path: &str) -> bool {
        let trimmed = path.trim_matches('/');
        let id = trailing_segment(trimmed);
        trimmed.is_empty()
            || trimmed == self.config.root
            || id == self.root_id()
            || id == ROOT_MARKER
            || self.canonical_root.get().and_then(|c| c.as_deref()) == Some(id)
    }

    // Cache pool access. Pool failures degrade to misses; they never fail
    // an operation.

    pub(crate) fn cache_get(&self, key: &str) -> Option<serde_json::Value> {
        let pool = self.pool.as_ref()?;
        match pool.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    pub(crate) fn cache_set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.set(key, value, ttl) {
                warn!(key, error = %e, "Cache write failed");
            }
        }
    }

    pub(crate) fn cache_save_deferred(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.save_deferred(key, value, ttl) {
                warn!(key, error = %e, "Deferred cache write failed");
            }
        }
    }

    pub(crate) fn cache_commit(&self) {
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.commit() {
                warn!(error = %e, "Cache commit failed");
            }
        }
    }

    pub(crate) fn cache_delete(&self, key: &str) {
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.delete(key) {
                warn!(key, error = %e, "Cache delete failed");
            }
        }
    }
}

/// Last non-empty segment of a synthetic path, i.e. the item ID.
pub(crate) fn trailing_segment(path: &str) -> &str {
    path.trim_matches('/').rsplit('/').next().unwrap_or("")
}
