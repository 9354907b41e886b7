//! Remote client for one state key.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::{LockError, Result, StateError, StoreError};
use crate::lock::LockInfo;
use crate::store::KvStore;

/// Lock metadata lives beside the state key under this suffix.
pub const LOCK_INFO_SUFFIX: &str = ".lockinfo";

/// How long lock acquisition keeps retrying transactional conflicts
/// before giving up with a conflict error.
pub const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// State bytes plus the 128-bit digest recomputed on read. Callers
/// compare the digest to detect payload corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,
    pub checksum: [u8; 16],
}

/// The 128-bit content digest used for payload integrity.
pub fn digest128(bytes: &[u8]) -> [u8; 16] {
    md5::compute(bytes).0
}

/// Render a digest for error messages.
pub fn digest_hex(digest: &[u8; 16]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A client for one state key in one store.
///
/// All operations serialize on an internal mutex, so a single client is
/// safe to share among threads. Two clients pointing at the same key are
/// isolated only through the advisory lock.
pub struct RemoteClient {
    store: Arc<dyn KvStore>,
    key: String,
    do_lock: bool,
    inner: Mutex<ClientInner>,
}

#[derive(Debug, Default)]
struct ClientInner {
    /// Lock info for the lock this client currently holds, if any.
    info: Option<LockInfo>,
}

impl RemoteClient {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>, do_lock: bool) -> Self {
        Self {
            store,
            key: key.into(),
            do_lock,
            inner: Mutex::new(ClientInner::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the state payload. `None` when the key is absent.
    pub fn get(&self) -> Result<Option<Payload>> {
        let _guard = self.inner.lock().unwrap();
        let Some(data) = self.store.get(self.key.as_bytes())? else {
            return Ok(None);
        };
        let checksum = digest128(&data);
        Ok(Some(Payload { data, checksum }))
    }

    /// Unconditionally overwrite the state payload.
    pub fn put(&self, data: &[u8]) -> Result<()> {
        let _guard = self.inner.lock().unwrap();
        self.store.put(self.key.as_bytes(), data)?;
        Ok(())
    }

    /// Remove the state payload.
    pub fn delete(&self) -> Result<()> {
        let _guard = self.inner.lock().unwrap();
        self.store.delete(self.key.as_bytes())?;
        Ok(())
    }

    /// Acquire the advisory lock for this key.
    ///
    /// Returns the lock id on success. When another operator holds the
    /// lock the error carries their [`LockInfo`] verbatim. Transactional
    /// commit races are retried until [`LOCK_ACQUIRE_TIMEOUT`] expires,
    /// after which they surface as a conflict.
    pub fn lock(&self, info: LockInfo) -> Result<String> {
        let mut guard = self.inner.lock().unwrap();
        if !self.do_lock {
            return Ok(String::new());
        }

        let mut info = info;
        let deadline = Instant::now() + LOCK_ACQUIRE_TIMEOUT;
        loop {
            match self.try_lock(&mut info) {
                Ok(id) => {
                    log::debug!("acquired state lock {id} on {}", self.key);
                    guard.info = Some(info);
                    return Ok(id);
                }
                Err(StateError::Store(StoreError::Conflict(message))) => {
                    if Instant::now() >= deadline {
                        return Err(StateError::Lock(LockError {
                            info: None,
                            message: format!(
                                "timed out acquiring state lock on {}: {message}",
                                self.key
                            ),
                        }));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_lock(&self, info: &mut LockInfo) -> Result<String> {
        let lock_key = self.lock_key();
        let mut tx = self.store.begin()?;

        if let Some(bytes) = tx.get(&lock_key)? {
            let holder = LockInfo::unmarshal(&bytes)
                .map_err(|e| StateError::CorruptLockInfo(e.to_string()))?;
            return Err(StateError::Lock(LockError {
                message: format!(
                    "state is locked by {} for {:?} (lock id {})",
                    holder.who, holder.operation, holder.id
                ),
                info: Some(holder),
            }));
        }

        info.created = Some(Utc::now());
        info.path = String::from_utf8_lossy(&lock_key).into_owned();
        let bytes = info
            .marshal()
            .map_err(|e| StateError::CorruptLockInfo(e.to_string()))?;
        tx.set(&lock_key, &bytes)?;
        tx.commit()?;
        Ok(info.id.clone())
    }

    /// Release the advisory lock.
    ///
    /// The given id must match the stored holder's id; a mismatch is an
    /// error and leaves the lock in place (the caller decides whether to
    /// force-unlock with the holder's id). Releasing an absent lock
    /// succeeds, with a trace-level note.
    pub fn unlock(&self, id: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        if !self.do_lock {
            return Ok(());
        }

        let lock_key = self.lock_key();
        match self.store.get(&lock_key)? {
            None => {
                log::trace!("unlock: no lock info present at {}", self.key);
            }
            Some(bytes) => {
                let holder = LockInfo::unmarshal(&bytes)
                    .map_err(|e| StateError::CorruptLockInfo(e.to_string()))?;
                if holder.id != id {
                    return Err(StateError::Unlock {
                        id: id.to_string(),
                        message: format!(
                            "lock id mismatch: state is locked by {} (lock id {})",
                            holder.who, holder.id
                        ),
                    });
                }
                self.store.delete(&lock_key)?;
                log::debug!("released state lock {id} on {}", self.key);
            }
        }
        guard.info = None;
        Ok(())
    }

    /// Lock info for the lock this client holds, if any.
    pub fn held_lock(&self) -> Option<LockInfo> {
        self.inner.lock().unwrap().info.clone()
    }

    fn lock_key(&self) -> Vec<u8> {
        format!("{}{}", self.key, LOCK_INFO_SUFFIX).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn client(store: &Arc<MemoryStore>, do_lock: bool) -> RemoteClient {
        RemoteClient::new(store.clone(), "plans/prod", do_lock)
    }

    #[test]
    fn test_get_put_delete_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let c = client(&store, true);

        assert!(c.get().unwrap().is_none());
        c.put(b"payload").unwrap();
        let payload = c.get().unwrap().unwrap();
        assert_eq!(payload.data, b"payload");
        assert_eq!(payload.checksum, digest128(b"payload"));
        c.delete().unwrap();
        assert!(c.get().unwrap().is_none());
    }

    #[test]
    fn test_lock_then_unlock_leaves_no_sidecar() {
        let store = Arc::new(MemoryStore::new());
        let c = client(&store, true);

        let id = c.lock(LockInfo::new()).unwrap();
        assert!(!id.is_empty());
        assert!(store.get(b"plans/prod.lockinfo").unwrap().is_some());

        c.unlock(&id).unwrap();
        assert!(store.get(b"plans/prod.lockinfo").unwrap().is_none());
    }

    #[test]
    fn test_lock_conflict_carries_holder() {
        let store = Arc::new(MemoryStore::new());
        let first = client(&store, true);
        let second = client(&store, true);

        let mut info_x = LockInfo::new();
        info_x.operation = "plan".to_string();
        let id_x = first.lock(info_x.clone()).unwrap();

        let err = second.lock(LockInfo::new()).unwrap_err();
        match err {
            StateError::Lock(LockError { info: Some(holder), .. }) => {
                assert_eq!(holder.id, id_x);
                assert_eq!(holder.operation, "plan");
            }
            other => panic!("expected lock conflict with holder, got {other:?}"),
        }

        // After X unlocks, Y succeeds.
        first.unlock(&id_x).unwrap();
        let id_y = second.lock(LockInfo::new()).unwrap();
        assert_ne!(id_y, id_x);
    }

    #[test]
    fn test_concurrent_lock_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let clients: Vec<_> = (0..4).map(|_| Arc::new(client(&store, true))).collect();

        let handles: Vec<_> = clients
            .iter()
            .map(|c| {
                let c = c.clone();
                std::thread::spawn(move || c.lock(LockInfo::new()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one lock attempt may win");
        for r in results.iter().filter(|r| r.is_err()) {
            match r.as_ref().unwrap_err() {
                StateError::Lock(e) => assert!(e.info.is_some() || !e.message.is_empty()),
                other => panic!("loser got unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_lock_disabled_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let c = client(&store, false);
        let id = c.lock(LockInfo::new()).unwrap();
        assert!(id.is_empty());
        assert!(store.get(b"plans/prod.lockinfo").unwrap().is_none());
        c.unlock(&id).unwrap();
    }

    #[test]
    fn test_unlock_id_mismatch_errors() {
        let store = Arc::new(MemoryStore::new());
        let c = client(&store, true);
        let id = c.lock(LockInfo::new()).unwrap();

        let err = c.unlock("not-the-id").unwrap_err();
        assert!(matches!(err, StateError::Unlock { .. }));
        // Lock survives the failed release.
        assert!(store.get(b"plans/prod.lockinfo").unwrap().is_some());
        c.unlock(&id).unwrap();
    }

    #[test]
    fn test_unlock_absent_lock_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let c = client(&store, true);
        c.unlock("whatever").unwrap();
    }

    #[test]
    fn test_force_unlock_with_holder_id() {
        let store = Arc::new(MemoryStore::new());
        let holder = client(&store, true);
        let other = client(&store, true);

        let id = holder.lock(LockInfo::new()).unwrap();
        // A different client can release using the holder's id.
        other.unlock(&id).unwrap();
        assert!(store.get(b"plans/prod.lockinfo").unwrap().is_none());
    }
}
