//! Resolved remote objects.
//!
//! An [`Item`] is built only from a raw remote record or from its cache
//! record, and never changes afterwards. Its `path` is synthetic:
//! `<parent-id>/<own-id>`, or just `<own-id>` directly under the root marker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drivefs_common::records::RemoteRecord;

use crate::config::ROOT_MARKER;

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// Serializable projection of an [`Item`] stored in the persistent cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheRecord {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub path: String,
    pub file: RemoteRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    File(FileItem),
    Directory(DirectoryItem),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    path: String,
    visibility: Visibility,
    record: RemoteRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryItem {
    path: String,
    visibility: Visibility,
    record: RemoteRecord,
}

impl FileItem {
    pub fn size(&self) -> u64 {
        self.record.size.unwrap_or(0)
    }

    pub fn mime_type(&self) -> &str {
        self.record.mime_type.as_deref().unwrap_or(DEFAULT_MIME)
    }
}

impl Item {
    /// Convert a raw remote record listed (or fetched) under `parent`.
    pub fn from_record(mut record: RemoteRecord, parent: &str) -> Self {
        if record.is_folder() {
            let path = item_path(parent, record.id.as_deref().unwrap_or(""));
            return Item::directory(path, record);
        }
        // A listing envelope carries no ID of its own; it stands for the
        // container that was listed.
        if record.is_file_list() && record.id.is_none() {
            record.id = Some(parent.to_string());
            return Item::directory(parent.to_string(), record);
        }
        let path = item_path(parent, record.id.as_deref().unwrap_or(""));
        Item::file(path, record)
    }

    pub fn from_cache_record(cached: CacheRecord) -> Self {
        match cached.kind {
            ItemKind::File => Item::file(cached.path, cached.file),
            ItemKind::Directory => Item::directory(cached.path, cached.file),
        }
    }

    pub fn from_cache_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<CacheRecord>(value).map(Item::from_cache_record)
    }

    pub fn to_cache_record(&self) -> CacheRecord {
        CacheRecord {
            kind: self.kind(),
            path: self.path().to_string(),
            file: self.record().clone(),
        }
    }

    pub fn to_cache_value(&self) -> serde_json::Value {
        // Cannot fail: every map in a CacheRecord is keyed by strings.
        serde_json::to_value(self.to_cache_record()).unwrap_or(serde_json::Value::Null)
    }

    fn file(path: String, record: RemoteRecord) -> Self {
        Item::File(FileItem {
            path,
            visibility: derive_visibility(&record),
            record,
        })
    }

    fn directory(path: String, record: RemoteRecord) -> Self {
        Item::Directory(DirectoryItem {
            path,
            visibility: derive_visibility(&record),
            record,
        })
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::File(_) => ItemKind::File,
            Item::Directory(_) => ItemKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Item::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileItem> {
        match self {
            Item::File(f) => Some(f),
            Item::Directory(_) => None,
        }
    }

    pub fn record(&self) -> &RemoteRecord {
        match self {
            Item::File(f) => &f.record,
            Item::Directory(d) => &d.record,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Item::File(f) => &f.path,
            Item::Directory(d) => &d.path,
        }
    }

    pub fn id(&self) -> &str {
        self.record().id.as_deref().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        &self.record().name
    }

    pub fn parents(&self) -> &[String] {
        &self.record().parents
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Item::File(f) => f.visibility,
            Item::Directory(d) => d.visibility,
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.record().modified_time
    }
}

/// Public iff some permission lets anonymous users read the item.
pub fn derive_visibility(record: &RemoteRecord) -> Visibility {
    if record.permissions.iter().any(|p| p.grants_anonymous_read()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

pub fn item_path(parent: &str, id: &str) -> String {
    if parent.is_empty() || parent == ROOT_MARKER {
        id.to_string()
    } else {
        format!("{}/{}", parent, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivefs_common::records::{Permission, FOLDER_MIME};

    fn record(id: &str, mime: &str) -> RemoteRecord {
        RemoteRecord {
            id: Some(id.to_string()),
            mime_type: Some(mime.to_string()),
            name: format!("{}.name", id),
            parents: vec!["p1".to_string()],
            size: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_folder_mime_yields_directory() {
        let item = Item::from_record(record("d1", FOLDER_MIME), "p1");
        assert!(item.is_dir());
        assert_eq!(item.path(), "p1/d1");
        assert_eq!(item.id(), "d1");
    }

    #[test]
    fn test_file_list_without_id_yields_directory() {
        let envelope = RemoteRecord {
            kind: Some("drive#fileList".to_string()),
            ..Default::default()
        };
        let item = Item::from_record(envelope, "folder-9");
        assert!(item.is_dir());
        assert_eq!(item.id(), "folder-9");
    }

    #[test]
    fn test_other_records_yield_files() {
        let item = Item::from_record(record("f1", "text/plain"), "root");
        let file = item.as_file().unwrap();
        assert_eq!(item.path(), "f1");
        assert_eq!(file.size(), 42);
        assert_eq!(file.mime_type(), "text/plain");

        let native = Item::from_record(record("doc", "application/vnd.google-apps.document"), "p1");
        assert!(!native.is_dir());
    }

    #[test]
    fn test_visibility_derivation() {
        let mut rec = record("f1", "text/plain");
        assert_eq!(derive_visibility(&rec), Visibility::Private);

        rec.permissions.push(Permission {
            grantee_type: "anyone".to_string(),
            role: "writer".to_string(),
            ..Default::default()
        });
        assert_eq!(derive_visibility(&rec), Visibility::Private);

        rec.permissions.push(Permission {
            grantee_type: "anyone".to_string(),
            role: "reader".to_string(),
            ..Default::default()
        });
        let item = Item::from_record(rec, "p1");
        assert_eq!(item.visibility(), Visibility::Public);
        assert_eq!(item.visibility().to_string(), "public");
    }

    #[test]
    fn test_cache_record_is_lossless() {
        let mut rec = record("f1", "image/png");
        rec.modified_time = Some("2024-05-01T12:00:00Z".parse().unwrap());
        rec.extra.insert(
            "contentHints".to_string(),
            serde_json::json!({"indexableText": "logo"}),
        );
        rec.capabilities = Some(serde_json::json!({"canEdit": false}));
        let item = Item::from_record(rec, "p1");

        let value = item.to_cache_value();
        assert_eq!(value["type"], "file");
        assert_eq!(value["path"], "p1/f1");

        let restored = Item::from_cache_value(value).unwrap();
        assert_eq!(restored, item);
    }

    #[test]
    fn test_cache_record_keeps_variant_tag() {
        let dir = Item::from_record(record("d1", FOLDER_MIME), "root");
        let restored = Item::from_cache_record(dir.to_cache_record());
        assert!(restored.is_dir());
        assert_eq!(restored.path(), "d1");
    }
}
