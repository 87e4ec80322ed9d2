use drivefs_common::backend::ListQuery;
use tracing::{debug, info, warn};

use crate::adapter::{trailing_segment, DriveAdapter};
use crate::error::{Error, Result};
use crate::item::{CacheRecord, Item};
use crate::pool::{item_key, listing_key};

const PAGE_SIZE: u32 = 100;
const ORDER_BY: &str = "folder,name";

impl DriveAdapter {
    /// Immediate children of a container, directories first then by name,
    /// at most `max_items_per_level` of them. Trashed items never appear.
    pub async fn list(&self, path: &str) -> Result<Vec<Item>> {
        let parent_id = self.normalize_parent(trailing_segment(path)).to_string();
        let parent = self.get(&parent_id).await?;
        if !parent.is_dir() {
            return Err(Error::metadata(path, "not a directory"));
        }

        let key = listing_key(self.root_id(), parent.id());
        if let Some(value) = self.cache_get(&key) {
            match serde_json::from_value::<Vec<CacheRecord>>(value) {
                Ok(records) => {
                    debug!(parent = %parent_id, count = records.len(), "Listing served from cache pool");
                    return Ok(records.into_iter().map(Item::from_cache_record).collect());
                }
                Err(e) => {
                    warn!(parent = %parent_id, error = %e, "Discarding unreadable listing");
                    self.cache_delete(&key);
                }
            }
        }

        let items = self.fetch_listing(&parent_id, parent.id(), path).await?;
        info!(parent = %parent_id, count = items.len(), "Listing fetched");

        if self.pool.is_some() {
            let ttl = self.config.metadata_ttl();
            for item in &items {
                self.cache_save_deferred(&item_key(item.id()), item.to_cache_value(), ttl);
            }
            self.cache_commit();
            let aggregate = items.iter().map(Item::to_cache_value).collect();
            self.cache_set(&key, serde_json::Value::Array(aggregate), ttl);
        }
        Ok(items)
    }

    /// Page through the remote listing until exhausted or the cap is hit.
    /// `path_parent` is what child paths are built from; `remote_parent`
    /// is the resolved container ID.
    async fn fetch_listing(
        &self,
        path_parent: &str,
        remote_parent: &str,
        path: &str,
    ) -> Result<Vec<Item>> {
        let cap = self.config.max_items_per_level;
        let mut items = Vec::new();
        let mut page_token = None;

        loop {
            let query = ListQuery {
                q: children_query(remote_parent),
                page_size: PAGE_SIZE,
                order_by: ORDER_BY.to_string(),
                page_token: page_token.take(),
                drive_id: self.config.shared_drive_id().map(str::to_string),
            };
            let page = self
                .client
                .list(&query)
                .await
                .map_err(|e| Error::metadata(path, e))?;
            debug!(parent = %remote_parent, count = page.files.len(), "Listing page received");

            items.extend(
                page.files
                    .into_iter()
                    .filter(|r| r.trashed != Some(true))
                    .map(|r| Item::from_record(r, path_parent)),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() && items.len() < cap => page_token = Some(token),
                _ => break,
            }
        }

        sort_listing(&mut items);
        items.truncate(cap);
        Ok(items)
    }
}

pub(crate) fn children_query(parent: &str) -> String {
    format!(
        "trashed = false and '{}' in parents",
        parent.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

/// Directories first, then case-insensitive name.
pub(crate) fn sort_listing(items: &mut [Item]) {
    items.sort_by_cached_key(|item| (!item.is_dir(), item.name().to_lowercase()));
}
