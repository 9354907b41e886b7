//! State manager layered over the remote client.
//!
//! Holds the current state object as opaque bytes between a refresh and
//! a persist, and verifies on refresh that what the store returns
//! matches the digest of what was last persisted.

use crate::client::{Payload, RemoteClient, digest_hex, digest128};
use crate::error::{Result, StateError};
use crate::lock::LockInfo;

/// Refresh / write / persist lifecycle for one workspace's state.
pub struct RemoteState {
    client: RemoteClient,
    state: Option<Vec<u8>>,
    /// Digest of the last payload this manager persisted.
    persisted: Option<[u8; 16]>,
}

impl RemoteState {
    pub fn new(client: RemoteClient) -> Self {
        Self {
            client,
            state: None,
            persisted: None,
        }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// Load the remote payload into the manager. Detects corruption by
    /// comparing against the digest recorded by the last persist.
    pub fn refresh(&mut self) -> Result<()> {
        match self.client.get()? {
            None => {
                self.state = None;
                Ok(())
            }
            Some(Payload { data, checksum }) => {
                if let Some(expected) = self.persisted {
                    if expected != checksum {
                        return Err(StateError::ChecksumMismatch {
                            expected: digest_hex(&expected),
                            actual: digest_hex(&checksum),
                        });
                    }
                }
                self.state = Some(data);
                Ok(())
            }
        }
    }

    /// The state loaded by the last refresh or staged by `write`.
    pub fn state(&self) -> Option<&[u8]> {
        self.state.as_deref()
    }

    /// Stage a new state object. Nothing reaches the store until
    /// `persist`.
    pub fn write(&mut self, bytes: Vec<u8>) {
        self.state = Some(bytes);
    }

    /// Push the staged state to the store and record its digest.
    pub fn persist(&mut self) -> Result<()> {
        let Some(data) = self.state.as_deref() else {
            return Ok(());
        };
        self.client.put(data)?;
        self.persisted = Some(digest128(data));
        Ok(())
    }

    pub fn lock(&self, info: LockInfo) -> Result<String> {
        self.client.lock(info)
    }

    pub fn unlock(&self, id: &str) -> Result<()> {
        self.client.unlock(id)
    }
}
