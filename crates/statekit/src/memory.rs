//! In-process reference implementation of the storage contract.
//!
//! Every write bumps a per-key version; a transaction records the
//! version of each key it reads and commits only if those versions are
//! still current. That gives the exactly-one-winner behavior the lock
//! protocol depends on without needing an external engine.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::store::{KvStore, KvTransaction};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    version: u64,
}

/// An in-memory, thread-safe key/value store with snapshot-validated
/// transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Vec<u8>, Entry>,
    next_version: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys. Test helper.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_version += 1;
        let version = inner.next_version;
        inner.entries.insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                version,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.remove(key);
        Ok(())
    }

    fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .range(start.to_vec()..end.to_vec())
            .take(limit)
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }

    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }))
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    /// Key -> version observed at read time (`None` when absent).
    reads: BTreeMap<Vec<u8>, Option<u64>>,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvTransaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(buffered) = self.writes.get(key) {
            return Ok(Some(buffered.clone()));
        }
        let inner = self.store.inner.lock().unwrap();
        let entry = inner.entries.get(key);
        self.reads
            .insert(key.to_vec(), entry.map(|e| e.version));
        Ok(entry.map(|e| e.value.clone()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.writes.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().unwrap();
        for (key, observed) in &self.reads {
            let current = inner.entries.get(key).map(|e| e.version);
            if current != *observed {
                return Err(StoreError::Conflict(format!(
                    "key {} changed since read",
                    String::from_utf8_lossy(key)
                )));
            }
        }
        for (key, value) in self.writes {
            inner.next_version += 1;
            let version = inner.next_version;
            inner.entries.insert(key, Entry { value, version });
        }
        Ok(())
    }
}
