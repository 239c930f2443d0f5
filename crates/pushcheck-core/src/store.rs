//! Request store implementations.
//!
//! [`MemoryStore`] keeps everything in process. [`JsonFileStore`] wraps it
//! and writes a JSON snapshot back to disk after every update, which is
//! what the command line tool uses.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::{Push, PushId, PushRequest, RequestId, RequestState, RequestUpdate, Revision};
use crate::traits::RequestStore;

/// On-disk layout of the request snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub requests: Vec<PushRequest>,
    #[serde(default)]
    pub pushes: Vec<Push>,
}

#[derive(Debug, Default)]
struct Tables {
    requests: BTreeMap<RequestId, PushRequest>,
    pushes: BTreeMap<PushId, Push>,
}

/// In-memory request store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the contents of `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for request in snapshot.requests {
            store.insert_request(request);
        }
        for push in snapshot.pushes {
            store.insert_push(push);
        }
        store
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a request.
    pub fn insert_request(&self, request: PushRequest) {
        self.tables().requests.insert(request.id, request);
    }

    /// Insert or replace a push.
    pub fn insert_push(&self, push: Push) {
        self.tables().pushes.insert(push.id, push);
    }

    /// Current contents, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let tables = self.tables();
        Snapshot {
            requests: tables.requests.values().cloned().collect(),
            pushes: tables.pushes.values().cloned().collect(),
        }
    }
}

impl RequestStore for MemoryStore {
    fn get_request(&self, id: RequestId) -> Result<Option<PushRequest>> {
        Ok(self.tables().requests.get(&id).cloned())
    }

    fn get_request_by_revision(
        &self,
        revision: &Revision,
        exclude: RequestId,
    ) -> Result<Option<PushRequest>> {
        Ok(self
            .tables()
            .requests
            .values()
            .find(|r| r.id != exclude && &r.revision == revision && is_live(r))
            .cloned())
    }

    fn update_request(
        &self,
        id: RequestId,
        update: &RequestUpdate,
    ) -> Result<Option<PushRequest>> {
        let mut tables = self.tables();
        let Some(current) = tables.requests.remove(&id) else {
            return Ok(None);
        };
        let updated = current.updated(update);
        tables.requests.insert(id, updated.clone());
        Ok(Some(updated))
    }

    fn get_push_for_request(&self, id: RequestId) -> Result<Option<PushId>> {
        Ok(self
            .tables()
            .pushes
            .values()
            .find(|p| p.requests.contains(&id))
            .map(|p| p.id))
    }

    fn get_request_ids_in_push(&self, push: PushId) -> Result<Vec<RequestId>> {
        Ok(self
            .tables()
            .pushes
            .get(&push)
            .map(|p| p.requests.clone())
            .unwrap_or_default())
    }
}

/// Request store persisted as a JSON snapshot file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl JsonFileStore {
    /// Open the snapshot at `path`. A missing file is an empty store.
    ///
    /// # Errors
    /// Returns error if the file exists but can't be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| Error::StoreParse {
                file: path.clone(),
                message: e.to_string(),
            })?
        } else {
            Snapshot::default()
        };
        debug!(
            path = %path.display(),
            requests = snapshot.requests.len(),
            pushes = snapshot.pushes.len(),
            "opened request store"
        );
        Ok(Self {
            path,
            memory: MemoryStore::from_snapshot(snapshot),
        })
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to disk.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.memory.snapshot())?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// The in-memory view.
    #[must_use]
    pub const fn memory(&self) -> &MemoryStore {
        &self.memory
    }
}

impl RequestStore for JsonFileStore {
    fn get_request(&self, id: RequestId) -> Result<Option<PushRequest>> {
        self.memory.get_request(id)
    }

    fn get_request_by_revision(
        &self,
        revision: &Revision,
        exclude: RequestId,
    ) -> Result<Option<PushRequest>> {
        self.memory.get_request_by_revision(revision, exclude)
    }

    fn update_request(
        &self,
        id: RequestId,
        update: &RequestUpdate,
    ) -> Result<Option<PushRequest>> {
        let updated = self.memory.update_request(id, update)?;
        if updated.is_some() {
            self.save()?;
        }
        Ok(updated)
    }

    fn get_push_for_request(&self, id: RequestId) -> Result<Option<PushId>> {
        self.memory.get_push_for_request(id)
    }

    fn get_request_ids_in_push(&self, push: PushId) -> Result<Vec<RequestId>> {
        self.memory.get_request_ids_in_push(push)
    }
}

/// Whether `request` counts when looking for duplicate revisions.
#[must_use]
pub fn is_live(request: &PushRequest) -> bool {
    request.state != RequestState::Discarded
}
