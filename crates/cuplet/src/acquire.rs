//! Optimistic acquisition of the exclusive heating lock.
//!
//! Read the record; if the device is idle and stock remains, conditionally
//! write `Busy`. A version conflict means another caller raced us in the
//! tiny read-then-write window: re-read and try again within the attempt
//! budget. A re-read that now shows `Busy` is a real conflict and rejects
//! immediately instead of retrying forever.

use crate::device::CupStatus;
use crate::stock::CupStock;
use crate::store::{CupStore, StoreError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum AcquireError {
    /// The device is already heating. Not retried: this is a current, real
    /// conflict, not a race.
    #[error("cup is busy (in-use)")]
    AlreadyInUse,

    /// Stock exhausted. Rejected before any write is attempted.
    #[error("no more cups")]
    OutOfStock,

    /// Conditional writes kept racing with another caller past the attempt
    /// budget. Whether to try again is the caller's decision.
    #[error("lock contention exceeded {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Try to transition the record `Idle -> Busy`, which grants the exclusive
/// right to run one heating operation.
///
/// `attempts` is the total conditional-write budget, not a count of extra
/// retries. The holder releases the lock by writing the record back to
/// `Idle`.
pub async fn acquire_heating_lock(
    store: &dyn CupStore,
    stock: &CupStock,
    attempts: u32,
) -> Result<(), AcquireError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let current = store.read().await?;

        if current.record.status.is_busy() {
            tracing::debug!("cup already busy - rejecting");
            return Err(AcquireError::AlreadyInUse);
        }

        if stock.is_empty() {
            tracing::debug!("no more cups - rejecting");
            return Err(AcquireError::OutOfStock);
        }

        let busy = current.record.with_status(CupStatus::Busy);
        match store.write_if_unchanged(current.version, busy).await {
            Ok(()) => {
                tracing::debug!(attempt, "heating lock acquired");
                return Ok(());
            }
            Err(StoreError::VersionConflict) if attempt < attempts => {
                tracing::debug!(attempt, "conditional write conflicted - retrying");
            }
            Err(StoreError::VersionConflict) => {
                return Err(AcquireError::ConflictExhausted { attempts });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AcquireError::ConflictExhausted { attempts })
}
