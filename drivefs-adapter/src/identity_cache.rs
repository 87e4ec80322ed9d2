use std::collections::HashMap;
use std::sync::RwLock;

use crate::item::Item;

/// Per-adapter map of remote ID → resolved item.
///
/// Lives as long as the adapter, normally one inbound request. Entries are
/// inserted only after they passed the scope guard.
pub struct IdentityCache {
    items: RwLock<HashMap<String, Item>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Item> {
        self.items.read().unwrap().get(id).cloned()
    }

    pub fn put(&self, item: &Item) {
        self.items
            .write()
            .unwrap()
            .insert(item.id().to_string(), item.clone());
    }

    /// Store under an alias the store resolved to a different ID.
    pub fn put_as(&self, key: &str, item: &Item) {
        self.items
            .write()
            .unwrap()
            .insert(key.to_string(), item.clone());
    }

    pub fn invalidate(&self, id: &str) {
        self.items.write().unwrap().remove(id);
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote ID → resolved parent ID (`None` = confirmed top of a chain).
///
/// Only used by containment walks. Wrap in an `Arc` to share it between
/// adapters in one process.
pub struct ParentMap {
    parents: RwLock<HashMap<String, Option<String>>>,
}

impl ParentMap {
    pub fn new() -> Self {
        Self {
            parents: RwLock::new(HashMap::new()),
        }
    }

    /// `None` on miss, `Some(None)` for a known chain end.
    pub fn get(&self, id: &str) -> Option<Option<String>> {
        self.parents.read().unwrap().get(id).cloned()
    }

    pub fn put(&self, id: &str, parent: Option<String>) {
        self.parents.write().unwrap().insert(id.to_string(), parent);
    }

    pub fn invalidate(&self, id: &str) {
        self.parents.write().unwrap().remove(id);
    }
}

impl Default for ParentMap {
    fn default() -> Self {
        Self::new()
    }
}
