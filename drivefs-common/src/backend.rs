//! Collaborator traits the adapter is built on.
//!
//! `RemoteClient` performs the raw calls against the object store;
//! `CachePool` is the persistent key-value cache shared across requests.
//! The adapter owns caching, scope enforcement and path mapping; the
//! implementations of these traits own only transport and storage.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::records::RemoteRecord;

/// Fields requested when resolving a single item.
pub const GET_FIELDS: &str = "id,kind,mimeType,createdTime,modifiedTime,name,parents,permissions,size,webContentLink,webViewLink,iconLink,contentHints,imageMediaMetadata,capabilities,exportLinks,resourceKey,fileExtension,trashed";

/// Fields requested per page when listing a container.
pub const LIST_FIELDS: &str = "files(id,kind,mimeType,createdTime,modifiedTime,name,parents,permissions,size,webContentLink,webViewLink,iconLink,contentHints,imageMediaMetadata,capabilities,exportLinks,resourceKey,fileExtension,trashed),nextPageToken";

/// Fields requested by containment walks.
pub const PARENT_FIELDS: &str = "id,name,parents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    /// Everything the item model reads.
    Full,
    /// Just enough to follow the parent chain.
    Parents,
}

impl FieldSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSet::Full => GET_FIELDS,
            FieldSet::Parents => PARENT_FIELDS,
        }
    }
}

/// One page request against the list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub q: String,
    pub page_size: u32,
    pub order_by: String,
    pub page_token: Option<String>,
    /// Set when listing inside a shared drive.
    pub drive_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub files: Vec<RemoteRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata sent with create, update and copy calls. Unset fields are
/// left untouched by the remote store.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed: Option<bool>,
}

/// Parent-set changes applied by an update (a move).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl ParentChange {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Raw calls against the remote object store.
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch a single item by ID.
    async fn get(&self, id: &str, fields: FieldSet) -> Result<RemoteRecord, RemoteError>;

    /// Fetch one page of a listing.
    async fn list(&self, query: &ListQuery) -> Result<ListPage, RemoteError>;

    /// Create an item, optionally with content.
    async fn create(&self, metadata: &RecordPatch, media: Option<Bytes>) -> Result<RemoteRecord, RemoteError>;

    /// Patch an item's metadata, parent set and optionally its content.
    async fn update(
        &self,
        id: &str,
        patch: &RecordPatch,
        parents: &ParentChange,
        media: Option<Bytes>,
    ) -> Result<RemoteRecord, RemoteError>;

    /// Server-side copy of an item.
    async fn copy(&self, id: &str, metadata: &RecordPatch) -> Result<RemoteRecord, RemoteError>;

    /// Export a native document to the given MIME type.
    async fn export(&self, id: &str, mime_type: &str) -> Result<Bytes, RemoteError>;

    /// Download the raw content of a binary file.
    async fn download(&self, id: &str) -> Result<Bytes, RemoteError>;
}

/// Persistent key-value cache with per-entry expiry.
///
/// A stored JSON `null` is a valid value (used for negative caching) and is
/// returned as `Some(Value::Null)`; `None` means a miss.
pub trait CachePool: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()>;

    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Queue a write; it becomes visible after `commit`.
    fn save_deferred(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()>;

    /// Flush all deferred writes.
    fn commit(&self) -> anyhow::Result<()>;
}
