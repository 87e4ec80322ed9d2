//! Containment checks against the configured root.
//!
//! Remote items can have several parents; the walk always follows the
//! first. Parent links are cached in the shared [`ParentMap`] and in the
//! pool, with a longer TTL for confirmed chain ends.
//!
//! [`ParentMap`]: crate::identity_cache::ParentMap

use drivefs_common::backend::FieldSet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::DriveAdapter;
use crate::config::ROOT_MARKER;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::pool::parent_key;

/// Parent chains deeper than this are treated as out of scope.
pub const MAX_SCOPE_DEPTH: usize = 64;

impl DriveAdapter {
    /// Succeeds iff `item` is the root or a descendant of it.
    pub async fn assert_within_root(&self, item: &Item) -> Result<()> {
        let root = self.root_id();
        let id = item.id();
        if id == root {
            return Ok(());
        }

        // The record already names its first hop.
        let mut hint = item.record().first_parent().map(str::to_string);
        let mut current = id.to_string();
        let mut chain_ended = false;

        for _ in 0..MAX_SCOPE_DEPTH {
            let parent = match hint.take() {
                Some(parent) => {
                    self.learn_parent(&current, &parent);
                    parent
                }
                None => match self.parent_of(&current).await? {
                    Some(parent) => parent,
                    None => {
                        chain_ended = true;
                        break;
                    }
                },
            };
            if self.is_root_id(&parent) {
                return Ok(());
            }
            current = parent;
        }

        if chain_ended && self.is_canonical_root(&current).await {
            return Ok(());
        }
        if !chain_ended {
            warn!(id, depth = MAX_SCOPE_DEPTH, "Parent chain too deep, denying access");
        }
        debug!(id, root, "Item outside of root");
        Err(Error::OutOfScope { id: id.to_string() })
    }

    /// First parent of `id`, `None` when the store reports none or the
    /// item no longer exists. Transport failures are not cached.
    pub(crate) async fn parent_of(&self, id: &str) -> Result<Option<String>> {
        if let Some(parent) = self.parents.get(id) {
            return Ok(parent);
        }

        let key = parent_key(id);
        if let Some(value) = self.cache_get(&key) {
            let parent = value.as_str().map(str::to_string);
            self.parents.put(id, parent.clone());
            return Ok(parent);
        }

        let parent = match self.client.get(id, FieldSet::Parents).await {
            Ok(record) => record.first_parent().map(str::to_string),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(Error::metadata(id, e)),
        };

        self.parents.put(id, parent.clone());
        match &parent {
            Some(p) => self.cache_set(&key, Value::String(p.clone()), self.config.parent_ttl()),
            None => self.cache_set(&key, Value::Null, self.config.missing_parent_ttl()),
        }
        Ok(parent)
    }

    fn learn_parent(&self, id: &str, parent: &str) {
        if self.parents.get(id).flatten().as_deref() == Some(parent) {
            return;
        }
        self.parents.put(id, Some(parent.to_string()));
        self.cache_set(
            &parent_key(id),
            Value::String(parent.to_string()),
            self.config.parent_ttl(),
        );
    }

    /// Whether `id` names the root, resolving the `root` alias if needed.
    pub(crate) async fn is_root(&self, id: &str) -> bool {
        self.is_root_id(id) || self.is_canonical_root(id).await
    }

    fn is_root_id(&self, id: &str) -> bool {
        id == self.root_id() || self.canonical_root.get().and_then(|c| c.as_deref()) == Some(id)
    }

    /// Only the `root` alias can differ from the ID the store reports, so
    /// that is the only case that costs a lookup.
    async fn is_canonical_root(&self, id: &str) -> bool {
        if self.root_id() != ROOT_MARKER {
            return false;
        }
        let canonical = self
            .canonical_root
            .get_or_init(|| async {
                match self.client.get(ROOT_MARKER, FieldSet::Parents).await {
                    Ok(record) => record.id,
                    Err(e) => {
                        warn!(error = %e, "Unable to resolve root alias");
                        None
                    }
                }
            })
            .await;
        canonical.as_deref() == Some(id)
    }
}
