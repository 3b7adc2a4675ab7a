//! StateStore — redb-backed resource store for sandbox instances and pools.
//!
//! Provides typed operations over instances and dialect pools. All values
//! are JSON-serialized into redb's `&[u8]` value columns. Every write bumps
//! the record's `resource_version`; conditional writes compare it inside the
//! same write transaction, so at most one writer wins per observed version.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
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

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe resource store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "resource store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory resource store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(POOLS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Create a new `Pending` instance owned by `pool`.
    ///
    /// The store assigns the name (`{pool}-{seq:05}`), the initial
    /// resource version, and the creation time.
    pub fn create_instance(&self, pool: &DialectPool) -> StateResult<SandboxInstance> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let instance;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let seq = meta
                .get(INSTANCE_SEQ)
                .map_err(map_err!(Read))?
                .map(|g| g.value())
                .unwrap_or(0)
                + 1;
            meta.insert(INSTANCE_SEQ, seq).map_err(map_err!(Write))?;

            instance = SandboxInstance {
                name: format!("{}-{seq:05}", pool.name),
                dialect: pool.dialect,
                pool: pool.name.clone(),
                claim: ClaimState::Unclaimed,
                phase: InstancePhase::Pending,
                conditions: vec![InstanceCondition {
                    kind: ConditionKind::Scheduled,
                    status: true,
                }],
                address: None,
                resource_version: 1,
                created_at: epoch_secs(),
            };
            let value = serde_json::to_vec(&instance).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            table
                .insert(instance.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance = %instance.name, pool = %pool.name, "instance created");
        Ok(instance)
    }

    /// Insert or overwrite an instance unconditionally.
    ///
    /// The stored resource version becomes one past whichever is larger: the
    /// version already stored or the one on `instance`. Returns the record
    /// as written.
    pub fn put_instance(&self, instance: &SandboxInstance) -> StateResult<SandboxInstance> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut written = instance.clone();
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let stored_version = match table.get(instance.name.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode::<SandboxInstance>(guard.value())?.resource_version,
                None => 0,
            };
            written.resource_version = stored_version.max(instance.resource_version) + 1;
            let value = serde_json::to_vec(&written).map_err(map_err!(Serialize))?;
            table
                .insert(written.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(written)
    }

    /// Get an instance by name.
    pub fn get_instance(&self, name: &str) -> StateResult<Option<SandboxInstance>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List instances matching `selector`, in name order.
    pub fn list_instances(&self, selector: &InstanceSelector) -> StateResult<Vec<SandboxInstance>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let instance: SandboxInstance = decode(value.value())?;
            if selector.matches(&instance) {
                results.push(instance);
            }
        }
        Ok(results)
    }

    /// Set the claim state of an instance if its version is still `expected_version`.
    ///
    /// Fails with `Conflict` when another writer got there first and with
    /// `NotFound` when the instance is gone.
    pub fn patch_claim(
        &self,
        name: &str,
        expected_version: u64,
        claim: ClaimState,
    ) -> StateResult<SandboxInstance> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let patched;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let current: SandboxInstance = match table.get(name).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(name.to_string())),
            };
            check_version(name, expected_version, current.resource_version)?;
            patched = SandboxInstance {
                claim,
                resource_version: current.resource_version + 1,
                ..current
            };
            let value = serde_json::to_vec(&patched).map_err(map_err!(Serialize))?;
            table
                .insert(name, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance = %name, ?claim, version = patched.resource_version, "claim patched");
        Ok(patched)
    }

    /// Delete an instance by name. Returns true if it existed.
    pub fn delete_instance(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance = %name, existed, "instance deleted");
        Ok(existed)
    }

    /// Overwrite an instance only if its stored version is still `expected_version`.
    ///
    /// Fails with `Conflict` on a version mismatch and with `NotFound` when
    /// the instance is gone; a deleted instance is never recreated.
    pub fn put_instance_if(
        &self,
        instance: &SandboxInstance,
        expected_version: u64,
    ) -> StateResult<SandboxInstance> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let written;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let current = match table.get(instance.name.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode::<SandboxInstance>(guard.value())?.resource_version,
                None => return Err(StateError::NotFound(instance.name.clone())),
            };
            check_version(&instance.name, expected_version, current)?;
            written = SandboxInstance {
                resource_version: current + 1,
                ..instance.clone()
            };
            let value = serde_json::to_vec(&written).map_err(map_err!(Serialize))?;
            table
                .insert(written.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(written)
    }

    /// Delete an instance only if its stored version is still `expected_version`.
    pub fn delete_instance_if(&self, name: &str, expected_version: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let current = match table.get(name).map_err(map_err!(Read))? {
                Some(guard) => decode::<SandboxInstance>(guard.value())?.resource_version,
                None => return Err(StateError::NotFound(name.to_string())),
            };
            check_version(name, expected_version, current)?;
            table.remove(name).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance = %name, version = expected_version, "instance deleted");
        Ok(())
    }

    // ── Pools ──────────────────────────────────────────────────────

    /// Insert or overwrite a pool unconditionally, bumping its version.
    pub fn put_pool(&self, pool: &DialectPool) -> StateResult<DialectPool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut written = pool.clone();
        {
            let mut table = txn.open_table(POOLS).map_err(map_err!(Table))?;
            let stored_version = match table.get(pool.name.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode::<DialectPool>(guard.value())?.resource_version,
                None => 0,
            };
            written.resource_version = stored_version.max(pool.resource_version) + 1;
            let value = serde_json::to_vec(&written).map_err(map_err!(Serialize))?;
            table
                .insert(written.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pool = %written.name, replicas = written.replicas, "pool stored");
        Ok(written)
    }

    /// Create a pool with `replicas` unless one with that name exists.
    ///
    /// Returns the pool as stored, which keeps its existing replica count.
    pub fn ensure_pool(&self, name: &str, dialect: Dialect, replicas: u32) -> StateResult<DialectPool> {
        if let Some(existing) = self.get_pool(name)? {
            return Ok(existing);
        }
        self.put_pool(&DialectPool {
            name: name.to_string(),
            dialect,
            replicas,
            resource_version: 0,
        })
    }

    /// Get a pool by name.
    pub fn get_pool(&self, name: &str) -> StateResult<Option<DialectPool>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all pools.
    pub fn list_pools(&self) -> StateResult<Vec<DialectPool>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Write a pool's replica count if its version still matches `scale.resource_version`.
    pub fn update_scale(&self, name: &str, scale: &PoolScale) -> StateResult<PoolScale> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated;
        {
            let mut table = txn.open_table(POOLS).map_err(map_err!(Table))?;
            let current: DialectPool = match table.get(name).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(name.to_string())),
            };
            check_version(name, scale.resource_version, current.resource_version)?;
            updated = DialectPool {
                replicas: scale.replicas,
                resource_version: current.resource_version + 1,
                ..current
            };
            let value = serde_json::to_vec(&updated).map_err(map_err!(Serialize))?;
            table
                .insert(name, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pool = %name, replicas = updated.replicas, "pool scale updated");
        Ok(updated.scale())
    }
}

fn check_version(name: &str, expected: u64, actual: u64) -> StateResult<()> {
    if expected != actual {
        return Err(StateError::Conflict {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
