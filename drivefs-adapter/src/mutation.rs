use bytes::Bytes;
use drivefs_common::backend::{ParentChange, RecordPatch};
use drivefs_common::records::FOLDER_MIME;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;

use crate::adapter::DriveAdapter;
use crate::content::content_keys;
use crate::error::{Error, ErrorKind, Result};
use crate::item::Item;
use crate::pool::{item_key, listing_key, parent_key};

impl DriveAdapter {
    /// Create or overwrite a file. `path` is `<parent-id>/<name>` for a new
    /// file or `<parent-id>/<file-id>` to replace existing content.
    pub async fn write(&self, path: &str, contents: Bytes) -> Result<Item> {
        let write_failed = |reason: String| Error::WriteFailed {
            path: path.to_string(),
            reason,
        };

        let (parent_id, name) = self.split_target(path);
        if name.is_empty() {
            return Err(write_failed("missing file name".to_string()));
        }
        let parent = self
            .get(parent_id)
            .await
            .map_err(|e| e.recast(|r| write_failed(format!("parent {} does not exist: {}", parent_id, r))))?;
        if !parent.is_dir() {
            return Err(write_failed(format!("parent {} is not a directory", parent_id)));
        }

        let existing = match self.get(path).await {
            Ok(item) if item.is_dir() => {
                return Err(write_failed("target is a directory".to_string()));
            }
            Ok(item) => Some(item),
            Err(e) if e.kind() == ErrorKind::OutOfScope => return Err(e),
            Err(_) => None,
        };

        let record = match &existing {
            Some(item) => {
                self.identity.invalidate(item.id());
                self.client
                    .update(item.id(), &RecordPatch::default(), &ParentChange::default(), Some(contents))
                    .await
            }
            None => {
                let patch = RecordPatch {
                    name: Some(name.to_string()),
                    mime_type: Some(mime_guess::from_path(name).first_or_octet_stream().to_string()),
                    parents: Some(vec![parent.id().to_string()]),
                    ..Default::default()
                };
                self.client.create(&patch, Some(contents)).await
            }
        }
        .map_err(|e| write_failed(e.to_string()))?;

        if record.id.is_none() {
            return Err(write_failed("remote store returned no usable result".to_string()));
        }
        let item = Item::from_record(record, parent_id);

        self.identity.invalidate(parent.id());
        self.cache_delete(&listing_key(self.root_id(), parent.id()));
        if let Some(old) = &existing {
            for container in old.parents() {
                self.identity.invalidate(container);
                self.cache_delete(&listing_key(self.root_id(), container));
            }
            self.cache_delete(&item_key(old.id()));
            for key in content_keys(old) {
                self.cache_delete(&key);
            }
        }

        info!(path, id = item.id(), created = existing.is_none(), "File written");
        self.remember(&item);
        Ok(item)
    }

    /// Buffer `reader` fully, then [`write`](Self::write) it.
    pub async fn write_stream<R>(&self, path: &str, mut reader: R) -> Result<Item>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Error::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        self.write(path, Bytes::from(buf)).await
    }

    /// Move a file to the trash.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let item = self.resolve_for_delete(path).await?;
        if item.is_dir() {
            return Err(Error::DeleteFailed {
                path: path.to_string(),
                reason: "provided path is a directory, not a file".to_string(),
            });
        }
        self.trash(path, &item).await?;
        for key in content_keys(&item) {
            self.cache_delete(&key);
        }
        Ok(())
    }

    /// Move a directory (and therefore its subtree) to the trash.
    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        let item = self.resolve_for_delete(path).await?;
        if !item.is_dir() {
            return Err(Error::DeleteFailed {
                path: path.to_string(),
                reason: "provided path is a file, not a directory".to_string(),
            });
        }
        self.trash(path, &item).await
    }

    async fn resolve_for_delete(&self, path: &str) -> Result<Item> {
        let root_denied = || Error::DeleteFailed {
            path: path.to_string(),
            reason: "the root cannot be deleted".to_string(),
        };
        if self.is_root_path(path) {
            return Err(root_denied());
        }
        let item = self.get(path).await.map_err(|e| {
            e.recast(|r| Error::DeleteFailed {
                path: path.to_string(),
                reason: format!("file or directory does not exist: {}", r),
            })
        })?;
        // The path may name the root by its canonical ID.
        if self.is_root(item.id()).await {
            return Err(root_denied());
        }
        Ok(item)
    }

    async fn trash(&self, path: &str, item: &Item) -> Result<()> {
        self.identity.invalidate(item.id());
        let patch = RecordPatch {
            trashed: Some(true),
            ..Default::default()
        };
        self.client
            .update(item.id(), &patch, &ParentChange::default(), None)
            .await
            .map_err(|e| Error::DeleteFailed {
                path: path.to_string(),
                reason: format!("error marking item as trashed: {}", e),
            })?;

        self.cache_delete(&item_key(item.id()));
        for parent in item.parents() {
            self.identity.invalidate(parent);
            self.cache_delete(&listing_key(self.root_id(), parent));
        }
        info!(path, id = item.id(), "Item trashed");
        self.remember(item);
        Ok(())
    }

    /// Create a folder named after the trailing segment of `path`.
    pub async fn create_directory(&self, path: &str) -> Result<Item> {
        let failed = |reason: String| Error::CreateDirectoryFailed {
            path: path.to_string(),
            reason,
        };

        let (parent_id, name) = self.split_target(path);
        if name.is_empty() {
            return Err(failed("missing directory name".to_string()));
        }
        let parent = self
            .get(parent_id)
            .await
            .map_err(|e| e.recast(|r| failed(format!("parent {} does not exist: {}", parent_id, r))))?;
        if !parent.is_dir() {
            return Err(failed(format!("parent {} is not a directory", parent_id)));
        }

        let patch = RecordPatch {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME.to_string()),
            parents: Some(vec![parent.id().to_string()]),
            ..Default::default()
        };
        let record = self
            .client
            .create(&patch, None)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if record.id.is_none() {
            return Err(failed("remote store returned no usable result".to_string()));
        }
        let item = Item::from_record(record, parent_id);

        self.identity.invalidate(parent.id());
        self.cache_delete(&listing_key(self.root_id(), parent.id()));
        info!(path, id = item.id(), "Directory created");
        self.remember(&item);
        Ok(item)
    }

    /// Move `source` under the container named by `destination`'s parent
    /// segment, renaming it when the trailing segment is a new name.
    pub async fn move_item(&self, source: &str, destination: &str) -> Result<Item> {
        let failed = |reason: String| Error::MoveFailed {
            path: source.to_string(),
            reason,
        };

        let item = self
            .get(source)
            .await
            .map_err(|e| e.recast(|r| failed(format!("source does not exist: {}", r))))?;
        let (target_id, filename) = self.split_target(destination);
        let target = self.get(target_id).await.map_err(|e| {
            e.recast(|r| failed(format!("target parent {} does not exist: {}", target_id, r)))
        })?;
        if !target.is_dir() {
            return Err(failed(format!("target parent {} is not a directory", target_id)));
        }

        let mut changes = ParentChange::default();
        if !item.parents().iter().any(|p| p == target.id()) {
            changes.add.push(target.id().to_string());
            changes.remove = item.parents().to_vec();
        }
        let patch = RecordPatch {
            name: new_name(&item, filename),
            ..Default::default()
        };

        let record = self
            .client
            .update(item.id(), &patch, &changes, None)
            .await
            .map_err(|e| failed(e.to_string()))?;

        self.identity.invalidate(item.id());
        self.identity.invalidate(target.id());
        self.parents.invalidate(item.id());
        self.cache_delete(&item_key(item.id()));
        self.cache_delete(&parent_key(item.id()));
        self.cache_delete(&listing_key(self.root_id(), target.id()));
        for parent in item.parents() {
            self.identity.invalidate(parent);
            self.cache_delete(&listing_key(self.root_id(), parent));
        }

        let moved = if record.id.is_some() {
            Item::from_record(record, target_id)
        } else {
            item
        };
        info!(source, destination, id = moved.id(), "Item moved");
        self.remember(&moved);
        Ok(moved)
    }

    /// Server-side copy of a file into the container named by
    /// `destination`'s parent segment.
    pub async fn copy(&self, source: &str, destination: &str) -> Result<Item> {
        let failed = |reason: String| Error::CopyFailed {
            path: source.to_string(),
            reason,
        };

        let item = self
            .get(source)
            .await
            .map_err(|e| e.recast(|r| failed(format!("source does not exist: {}", r))))?;
        if item.is_dir() {
            return Err(failed("directories cannot be copied".to_string()));
        }
        let (target_id, filename) = self.split_target(destination);
        let target = self.get(target_id).await.map_err(|e| {
            e.recast(|r| failed(format!("target parent {} does not exist: {}", target_id, r)))
        })?;
        if !target.is_dir() {
            return Err(failed(format!("target parent {} is not a directory", target_id)));
        }

        let patch = RecordPatch {
            name: new_name(&item, filename),
            parents: Some(vec![target.id().to_string()]),
            ..Default::default()
        };
        let record = self
            .client
            .copy(item.id(), &patch)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if record.id.is_none() {
            return Err(failed("remote store returned no usable result".to_string()));
        }

        self.identity.invalidate(target.id());
        self.cache_delete(&listing_key(self.root_id(), target.id()));
        let copied = Item::from_record(record, target_id);
        info!(source, destination, id = copied.id(), "File copied");
        self.remember(&copied);
        Ok(copied)
    }
}

/// A destination segment naming the item itself (by name or ID) keeps the
/// current name.
fn new_name(item: &Item, segment: &str) -> Option<String> {
    if segment.is_empty() || segment == item.name() || segment == item.id() {
        None
    } else {
        Some(segment.to_string())
    }
}
