use drivefs_common::backend::FieldSet;
use tracing::{debug, warn};

use crate::adapter::{trailing_segment, DriveAdapter};
use crate::config::ROOT_MARKER;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::pool::item_key;

impl DriveAdapter {
    /// Resolve a synthetic path to an item.
    ///
    /// Only the trailing segment is used. Lookups go identity cache, then
    /// the persistent pool, then the remote store; whatever the source, the
    /// item has passed the scope guard before it is returned.
    pub async fn get(&self, path: &str) -> Result<Item> {
        let id = match trailing_segment(path) {
            "" => self.root_id(),
            id => id,
        }
        .to_string();

        if let Some(item) = self.identity.get(&id) {
            self.remember(&item);
            return Ok(item);
        }

        let key = item_key(&id);
        if let Some(value) = self.cache_get(&key) {
            match Item::from_cache_value(value) {
                Ok(item) => {
                    // The pool is shared between roots, so a hit proves
                    // nothing about this adapter's scope.
                    self.assert_within_root(&item).await?;
                    debug!(id = %id, "Item served from cache pool");
                    self.identity.put_as(&id, &item);
                    self.remember(&item);
                    return Ok(item);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Discarding unreadable cache record");
                    self.cache_delete(&key);
                }
            }
        }

        let record = self
            .client
            .get(&id, FieldSet::Full)
            .await
            .map_err(|e| Error::metadata(path, e))?;
        if record.id.is_none() {
            return Err(Error::metadata(path, "remote record has no ID"));
        }
        let item = Item::from_record(record, ROOT_MARKER);
        self.assert_within_root(&item).await?;

        debug!(id = %id, kind = ?item.kind(), "Item fetched from remote");
        self.cache_set(&key, item.to_cache_value(), self.config.metadata_ttl());
        self.identity.put(&item);
        if item.id() != id {
            self.identity.put_as(&id, &item);
        }
        self.remember(&item);
        Ok(item)
    }
}
