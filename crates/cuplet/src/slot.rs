//! Single-slot holder for the in-flight heating task.
//!
//! This is the one piece of truly shared mutable state in the service, so it
//! lives behind a single mutex instead of ad hoc shared fields. Cancellation
//! swaps the slot to empty and fires the token; a finishing task clears only
//! its own registration.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Opaque handle to the current heating task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[derive(Default)]
pub struct ActiveTaskSlot {
    current: StdMutex<Option<TaskHandle>>,
    next_id: AtomicU64,
}

impl ActiveTaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mint a handle with a fresh id and register it as the current task.
    pub fn register(&self) -> TaskHandle {
        let handle = TaskHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
        };
        *self.lock() = Some(handle.clone());
        handle
    }

    /// Cancel whatever task is current, emptying the slot.
    ///
    /// Returns whether a task was actually in flight; with an empty slot
    /// this is a no-op, which keeps cancellation idempotent.
    pub fn cancel_current(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                tracing::debug!(task = handle.id, "cancelling in-flight heating task");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear the slot only if `id` is still the registered task.
    ///
    /// A finishing task must never unregister a newer one, and a cancel may
    /// already have emptied the slot.
    pub fn clear_if_current(&self, id: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|h| h.id == id) {
            *current = None;
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_with_empty_slot_is_a_noop() {
        let slot = ActiveTaskSlot::new();
        assert!(!slot.cancel_current());
        assert!(!slot.is_occupied());
    }

    #[test]
    fn cancel_fires_the_token_and_empties_the_slot() {
        let slot = ActiveTaskSlot::new();
        let handle = slot.register();
        let token = handle.cancel_token();

        assert!(slot.is_occupied());
        assert!(slot.cancel_current());

        assert!(token.is_cancelled());
        assert!(!slot.is_occupied());
        // Idempotent: nothing left to cancel.
        assert!(!slot.cancel_current());
    }

    #[test]
    fn clear_if_current_only_clears_its_own_registration() {
        let slot = ActiveTaskSlot::new();
        let old = slot.register();
        let new = slot.register();

        // The superseded task must not unregister the newer one.
        slot.clear_if_current(old.id());
        assert!(slot.is_occupied());

        slot.clear_if_current(new.id());
        assert!(!slot.is_occupied());
    }

    #[test]
    fn clear_after_cancel_is_a_noop() {
        let slot = ActiveTaskSlot::new();
        let handle = slot.register();

        assert!(slot.cancel_current());
        slot.clear_if_current(handle.id());
        assert!(!slot.is_occupied());
    }

    #[test]
    fn register_supersedes_previous_handle() {
        let slot = ActiveTaskSlot::new();
        let old = slot.register();
        let _new = slot.register();

        assert!(slot.cancel_current());
        // Only the newest task's token fires.
        assert!(!old.cancel_token().is_cancelled());
    }
}
