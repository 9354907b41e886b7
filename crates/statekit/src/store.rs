//! The key/value storage contract consumed by the remote state client.

use std::sync::Arc;

use crate::error::StoreError;

/// A key/value storage engine.
///
/// Point reads return `None` for missing keys; writes and deletes are
/// unconditional. `scan` is a ranged read with an exclusive upper bound
/// and a result limit. `begin` opens a transaction whose commit must
/// fail with [`StoreError::Conflict`] when it loses a race, so callers
/// can distinguish contention from transport failures.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Key/value pairs with keys in `[start, end)`, at most `limit` of
    /// them, in key order.
    fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>, StoreError>;
}

/// An open transaction. Reads are tracked for conflict detection and
/// writes are buffered until [`KvTransaction::commit`].
pub trait KvTransaction {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        (**self).scan(start, end, limit)
    }

    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>, StoreError> {
        (**self).begin()
    }
}
