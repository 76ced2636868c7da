//! StateStore — redb-backed state persistence for greenline.
//!
//! Provides typed CRUD operations over services, task specifications,
//! and archived promotion attempts. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.open_table(TASK_SPECS).map_err(map_err!(Table))?;
        txn.open_table(ATTEMPTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Services ───────────────────────────────────────────────────

    /// Insert or update a service record.
    pub fn put_service(&self, record: &ServiceRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service = %record.id, "service record stored");
        Ok(())
    }

    /// Get a service by id.
    pub fn get_service(&self, id: &str) -> StateResult<Option<ServiceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ServiceRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all services.
    pub fn list_services(&self) -> StateResult<Vec<ServiceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ServiceRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Update a service's status, bumping `updated_at`.
    pub fn set_service_status(&self, id: &str, status: ServiceStatus) -> StateResult<()> {
        let mut record = self
            .get_service(id)?
            .ok_or_else(|| StateError::NotFound(format!("service {id}")))?;
        record.status = status;
        record.updated_at = epoch_secs();
        self.put_service(&record)
    }

    /// Point a service at a new current task spec revision and mark it
    /// stable again.
    pub fn set_service_revision(&self, id: &str, revision: u32) -> StateResult<()> {
        let mut record = self
            .get_service(id)?
            .ok_or_else(|| StateError::NotFound(format!("service {id}")))?;
        record.task_spec_revision = revision;
        record.status = ServiceStatus::Stable;
        record.updated_at = epoch_secs();
        self.put_service(&record)
    }

    // ── Task specifications ────────────────────────────────────────

    /// Register a task specification revision.
    pub fn put_task_spec(&self, spec: &TaskSpecRecord) -> StateResult<()> {
        let key = spec.table_key();
        let value = serde_json::to_vec(spec).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TASK_SPECS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "task spec stored");
        Ok(())
    }

    /// Get a specific task spec revision for a service.
    pub fn get_task_spec(&self, service: &str, revision: u32) -> StateResult<Option<TaskSpecRecord>> {
        let key = task_spec_key(service, revision);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASK_SPECS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let spec: TaskSpecRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(spec))
            }
            None => Ok(None),
        }
    }

    /// The highest registered revision for a service, if any.
    pub fn latest_task_spec(&self, service: &str) -> StateResult<Option<TaskSpecRecord>> {
        let prefix = format!("{service}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASK_SPECS).map_err(map_err!(Table))?;
        let mut latest: Option<TaskSpecRecord> = None;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(prefix.as_str()) {
                continue;
            }
            // Keys within a prefix sort by revision, so the last match wins.
            let spec: TaskSpecRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            latest = Some(spec);
        }
        Ok(latest)
    }

    // ── Promotion attempts ─────────────────────────────────────────

    /// Archive a finished promotion attempt.
    pub fn put_attempt(&self, record: &AttemptRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ATTEMPTS).map_err(map_err!(Table))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(attempt = %record.id, outcome = ?record.outcome, "attempt archived");
        Ok(())
    }

    /// Get an archived attempt by id.
    pub fn get_attempt(&self, id: &str) -> StateResult<Option<AttemptRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ATTEMPTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: AttemptRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all archived attempts.
    pub fn list_attempts(&self) -> StateResult<Vec<AttemptRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ATTEMPTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: AttemptRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// List archived attempts for one service.
    pub fn list_attempts_for_service(&self, service: &str) -> StateResult<Vec<AttemptRecord>> {
        Ok(self
            .list_attempts()?
            .into_iter()
            .filter(|a| a.service == service)
            .collect())
    }
}
