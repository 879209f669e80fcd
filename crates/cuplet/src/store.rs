//! Shared state store for the device record.
//!
//! The store is the seam the optimistic lock protocol runs over: reads return
//! a version alongside the record, and conditional writes commit only if the
//! version is unchanged since the read. Conflicts are detected at write time
//! rather than prevented by holding a lock across the whole attempt.

use std::sync::Mutex as StdMutex;

use crate::device::CupRecord;

pub type Version = u64;

/// A record together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord {
    pub version: Version,
    pub record: CupRecord,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The record changed since it was read. Retryable.
    #[error("record changed since it was read")]
    VersionConflict,

    #[error("no record present")]
    Missing,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait CupStore: Send + Sync {
    async fn read(&self) -> Result<VersionedRecord, StoreError>;

    /// Commit `record` only if the stored version still equals `expected`.
    async fn write_if_unchanged(
        &self,
        expected: Version,
        record: CupRecord,
    ) -> Result<(), StoreError>;

    /// Commit `record` unconditionally. Reserved for startup and for the
    /// lock holder, where no concurrent writer is possible.
    async fn write(&self, record: CupRecord) -> Result<(), StoreError>;

    async fn delete(&self) -> Result<(), StoreError>;
}

/// In-memory store. One mutex guards the record and its version together;
/// the version bumps on every committed write.
#[derive(Default)]
pub struct MemoryStore {
    inner: StdMutex<Slot>,
}

#[derive(Default)]
struct Slot {
    version: Version,
    record: Option<CupRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Slot>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CupStore for MemoryStore {
    async fn read(&self) -> Result<VersionedRecord, StoreError> {
        let slot = self.lock()?;
        let record = slot.record.clone().ok_or(StoreError::Missing)?;
        Ok(VersionedRecord {
            version: slot.version,
            record,
        })
    }

    async fn write_if_unchanged(
        &self,
        expected: Version,
        record: CupRecord,
    ) -> Result<(), StoreError> {
        let mut slot = self.lock()?;
        if slot.version != expected {
            return Err(StoreError::VersionConflict);
        }
        slot.version += 1;
        slot.record = Some(record);
        Ok(())
    }

    async fn write(&self, record: CupRecord) -> Result<(), StoreError> {
        let mut slot = self.lock()?;
        slot.version += 1;
        slot.record = Some(record);
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        let mut slot = self.lock()?;
        slot.version += 1;
        slot.record = None;
        Ok(())
    }
}
