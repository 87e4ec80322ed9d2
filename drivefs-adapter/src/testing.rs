//! In-memory stand-in for the remote store, with a call log.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use drivefs_common::backend::{
    CachePool, FieldSet, ListPage, ListQuery, ParentChange, RecordPatch, RemoteClient, RemoteError,
};
use drivefs_common::records::{Permission, RemoteRecord, FOLDER_MIME};

use crate::adapter::DriveAdapter;
use crate::config::{AdapterConfig, ROOT_MARKER};
use crate::item::Item;
use crate::pool::MemoryPool;

pub(crate) fn adapter(
    fake: &Arc<FakeDrive>,
    pool: Option<Arc<MemoryPool>>,
    config: AdapterConfig,
) -> DriveAdapter {
    DriveAdapter::new(
        fake.clone(),
        pool.map(|p| p as Arc<dyn CachePool>),
        config,
    )
}

pub(crate) struct FakeDrive {
    root_id: String,
    records: Mutex<HashMap<String, RemoteRecord>>,
    content: Mutex<HashMap<String, Bytes>>,
    pages: Mutex<HashMap<String, Vec<Vec<String>>>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    last_query: Mutex<Option<ListQuery>>,
    last_update: Mutex<Option<(RecordPatch, ParentChange)>>,
    next_id: AtomicUsize,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::with_root_id(ROOT_MARKER)
    }

    /// The `root` alias resolves to `root_id`.
    pub fn with_root_id(root_id: &str) -> Self {
        let fake = Self {
            root_id: root_id.to_string(),
            records: Mutex::new(HashMap::new()),
            content: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            last_query: Mutex::new(None),
            last_update: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        };
        let mut root = record(root_id, "My Drive", FOLDER_MIME);
        root.parents.clear();
        fake.insert(root);
        fake
    }

    pub fn add_folder(&self, id: &str, parent: &str, name: &str) {
        let mut rec = record(id, name, FOLDER_MIME);
        rec.parents = vec![parent.to_string()];
        self.insert(rec);
    }

    pub fn add_file(&self, id: &str, parent: &str, name: &str, mime: &str, data: &[u8]) {
        let mut rec = record(id, name, mime);
        rec.parents = vec![parent.to_string()];
        rec.size = Some(data.len() as u64);
        self.insert(rec);
        self.content
            .lock()
            .unwrap()
            .insert(id.to_string(), Bytes::copy_from_slice(data));
    }

    /// Build an item without registering it.
    pub fn item(&self, id: &str, parent: &str, name: &str, mime: &str) -> Item {
        let mut rec = record(id, name, mime);
        rec.parents = vec![parent.to_string()];
        Item::from_record(rec, parent)
    }

    pub fn make_public(&self, id: &str) {
        self.modify(id, |rec| {
            rec.permissions.push(Permission {
                grantee_type: "anyone".to_string(),
                role: "reader".to_string(),
                ..Default::default()
            })
        });
    }

    pub fn trash(&self, id: &str) {
        self.modify(id, |rec| rec.trashed = Some(true));
    }

    /// Serve listings of `parent` in exactly these pages.
    pub fn set_pages(&self, parent: &str, pages: &[&[&str]]) {
        let pages = pages
            .iter()
            .map(|page| page.iter().map(|id| id.to_string()).collect())
            .collect();
        self.pages.lock().unwrap().insert(parent.to_string(), pages);
    }

    /// Make every call of `op` fail until cleared.
    pub fn fail_on(&self, op: &str) {
        self.failures.lock().unwrap().insert(op.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn last_query(&self) -> Option<ListQuery> {
        self.last_query.lock().unwrap().clone()
    }

    pub fn last_patch(&self) -> Option<RecordPatch> {
        self.last_update.lock().unwrap().as_ref().map(|(p, _)| p.clone())
    }

    pub fn last_parent_change(&self) -> Option<ParentChange> {
        self.last_update.lock().unwrap().as_ref().map(|(_, c)| c.clone())
    }

    pub fn content(&self, id: &str) -> Option<Bytes> {
        self.content.lock().unwrap().get(id).cloned()
    }

    pub fn is_trashed(&self, id: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .and_then(|r| r.trashed)
            .unwrap_or(false)
    }

    pub fn parents_of(&self, id: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .map(|r| r.parents.clone())
            .unwrap_or_default()
    }

    fn insert(&self, rec: RemoteRecord) {
        let id = rec.id.clone().unwrap_or_default();
        self.records.lock().unwrap().insert(id, rec);
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut RemoteRecord)) {
        if let Some(rec) = self.records.lock().unwrap().get_mut(id) {
            f(rec);
        }
    }

    fn enter(&self, op: &str, call: String) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.failures.lock().unwrap().contains(op) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn resolve(&self, id: &str) -> String {
        if id == ROOT_MARKER {
            self.root_id.clone()
        } else {
            id.to_string()
        }
    }

    fn lookup(&self, id: &str) -> Result<RemoteRecord, RemoteError> {
        self.records
            .lock()
            .unwrap()
            .get(&self.resolve(id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn new_id(&self) -> String {
        format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn record(id: &str, name: &str, mime: &str) -> RemoteRecord {
    RemoteRecord {
        id: Some(id.to_string()),
        kind: Some("drive#file".to_string()),
        mime_type: Some(mime.to_string()),
        name: name.to_string(),
        created_time: Some(Utc::now()),
        modified_time: Some(Utc::now()),
        ..Default::default()
    }
}

/// Pulls `X` out of `... 'X' in parents`.
fn parent_from_query(q: &str) -> String {
    q.split('\'').nth(1).unwrap_or_default().to_string()
}

#[async_trait::async_trait]
impl RemoteClient for FakeDrive {
    async fn get(&self, id: &str, fields: FieldSet) -> Result<RemoteRecord, RemoteError> {
        match fields {
            FieldSet::Full => {
                self.enter("get", format!("get:{}", id))?;
                self.lookup(id)
            }
            FieldSet::Parents => {
                self.enter("parents", format!("parents:{}", id))?;
                let rec = self.lookup(id)?;
                Ok(RemoteRecord {
                    id: rec.id,
                    name: rec.name,
                    parents: rec.parents,
                    ..Default::default()
                })
            }
        }
    }

    async fn list(&self, query: &ListQuery) -> Result<ListPage, RemoteError> {
        let parent = self.resolve(&parent_from_query(&query.q));
        let token = query.page_token.clone();
        self.enter(
            "list",
            format!("list:{}:{}", parent, token.as_deref().unwrap_or("-")),
        )?;
        *self.last_query.lock().unwrap() = Some(query.clone());

        let index: usize = token.as_deref().unwrap_or("0").parse().unwrap_or(0);
        let records = self.records.lock().unwrap();

        // Trash filtering is left to the caller.
        if let Some(pages) = self.pages.lock().unwrap().get(&parent) {
            let files: Vec<RemoteRecord> = pages
                .get(index)
                .map(|ids| ids.iter().filter_map(|id| records.get(id).cloned()).collect())
                .unwrap_or_default();
            let next_page_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
            return Ok(ListPage {
                files,
                next_page_token,
            });
        }

        let mut children: Vec<RemoteRecord> = records
            .values()
            .filter(|r| r.parents.iter().any(|p| *p == parent))
            .cloned()
            .collect();
        children.sort_by_key(|r| (!r.is_folder(), r.name.clone()));
        let page_size = query.page_size as usize;
        let files: Vec<_> = children.iter().skip(index).take(page_size).cloned().collect();
        let next = index + page_size;
        Ok(ListPage {
            files,
            next_page_token: (next < children.len()).then(|| next.to_string()),
        })
    }

    async fn create(&self, metadata: &RecordPatch, media: Option<Bytes>) -> Result<RemoteRecord, RemoteError> {
        let name = metadata.name.clone().unwrap_or_default();
        self.enter("create", format!("create:{}", name))?;
        let id = self.new_id();
        let mime = metadata
            .mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let mut rec = record(&id, &name, &mime);
        rec.parents = metadata.parents.clone().unwrap_or_default();
        if let Some(data) = media {
            rec.size = Some(data.len() as u64);
            self.content.lock().unwrap().insert(id.clone(), data);
        }
        self.insert(rec.clone());
        Ok(rec)
    }

    async fn update(
        &self,
        id: &str,
        patch: &RecordPatch,
        parents: &ParentChange,
        media: Option<Bytes>,
    ) -> Result<RemoteRecord, RemoteError> {
        self.enter("update", format!("update:{}", id))?;
        *self.last_update.lock().unwrap() = Some((patch.clone(), parents.clone()));

        let mut records = self.records.lock().unwrap();
        let rec = records
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(name) = &patch.name {
            rec.name = name.clone();
        }
        if let Some(trashed) = patch.trashed {
            rec.trashed = Some(trashed);
        }
        rec.parents.retain(|p| !parents.remove.contains(p));
        rec.parents.extend(parents.add.iter().cloned());
        if let Some(data) = media {
            rec.size = Some(data.len() as u64);
            self.content.lock().unwrap().insert(id.to_string(), data);
        }
        rec.modified_time = Some(Utc::now());
        Ok(rec.clone())
    }

    async fn copy(&self, id: &str, metadata: &RecordPatch) -> Result<RemoteRecord, RemoteError> {
        self.enter("copy", format!("copy:{}", id))?;
        let mut rec = self.lookup(id)?;
        let new_id = self.new_id();
        rec.id = Some(new_id.clone());
        if let Some(name) = &metadata.name {
            rec.name = name.clone();
        }
        if let Some(parents) = &metadata.parents {
            rec.parents = parents.clone();
        }
        if let Some(data) = self.content(id) {
            self.content.lock().unwrap().insert(new_id, data);
        }
        self.insert(rec.clone());
        Ok(rec)
    }

    async fn export(&self, id: &str, mime_type: &str) -> Result<Bytes, RemoteError> {
        self.enter("export", format!("export:{}:{}", id, mime_type))?;
        self.lookup(id)?;
        Ok(Bytes::from(format!("{} as {}", id, mime_type)))
    }

    async fn download(&self, id: &str) -> Result<Bytes, RemoteError> {
        self.enter("download", format!("download:{}", id))?;
        self.content(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}
