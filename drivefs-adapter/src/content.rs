use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use drivefs_common::export::{export_formats, validated_export_format};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::DriveAdapter;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::pool::content_key;

impl DriveAdapter {
    /// Full content of a file. Native documents are exported to
    /// `export_format` (or their default format when it is not allowed).
    pub async fn read(&self, path: &str, export_format: &str) -> Result<Bytes> {
        let item = self.get(path).await?;
        let file = item
            .as_file()
            .ok_or_else(|| Error::metadata(path, "file does not exist or is a directory"))?;

        // Downloads ignore the format, so only exports key on it.
        let export = item
            .record()
            .is_native_document()
            .then(|| validated_export_format(file.mime_type(), export_format));
        let key = content_key(item.id(), export.as_deref());

        if let Some(value) = self.cache_get(&key) {
            match value.as_str().map(|s| BASE64.decode(s)) {
                Some(Ok(decoded)) => {
                    debug!(id = item.id(), bytes = decoded.len(), "Content served from cache pool");
                    return Ok(Bytes::from(decoded));
                }
                _ => {
                    warn!(id = item.id(), "Discarding unreadable cached content");
                    self.cache_delete(&key);
                }
            }
        }

        let body = match &export {
            Some(format) => self.client.export(item.id(), format).await,
            None => self.client.download(item.id()).await,
        }
        .map_err(|e| Error::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        debug!(id = item.id(), bytes = body.len(), export = ?export, "Content downloaded");

        if self.pool.is_some() {
            self.cache_set(&key, Value::String(BASE64.encode(&body)), self.config.content_ttl());
        }
        Ok(body)
    }

    /// Same as [`read`](Self::read) in the default format, as a readable
    /// handle positioned at the start.
    pub async fn read_stream(&self, path: &str) -> Result<Cursor<Bytes>> {
        Ok(Cursor::new(self.read(path, "").await?))
    }
}

/// Every content key `item` may have been cached under.
pub(crate) fn content_keys(item: &Item) -> Vec<String> {
    let mime = item.record().mime_type.as_deref().unwrap_or("");
    std::iter::once(content_key(item.id(), None))
        .chain(
            export_formats(mime)
                .iter()
                .map(|format| content_key(item.id(), Some(*format))),
        )
        .collect()
}
