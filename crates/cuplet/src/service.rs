//! `CupService` - the composition root.
//!
//! Wires the lock acquisition protocol, the heater worker, the cancellation
//! slot and the external collaborators together, and is the only surface
//! callers see. It owns the store, the stock and the slot for the life of
//! the process.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::acquire::{self, AcquireError};
use crate::config::DeviceConfig;
use crate::device::{CupRecord, CupStatus, HeatReceipt, HeatRequest};
use crate::sink::{LogSink, NotificationSink};
use crate::slot::ActiveTaskSlot;
use crate::stock::CupStock;
use crate::store::{CupStore, MemoryStore, StoreError};
use crate::worker::{HeatJob, HeaterWorker};

/// Kind attached to every caller-visible rejection. Everything the facade
/// surfaces is an application-level condition; raw internal errors never
/// cross this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Application,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("cup is busy (in-use)")]
    InUse,

    #[error("no more cups")]
    OutOfStock,

    #[error("could not acquire the heating lock: too many concurrent updates")]
    ConflictExhausted,

    #[error("device store error: {0}")]
    Store(#[from] StoreError),

    #[error("service is shutting down")]
    ShuttingDown,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Application
    }

    /// Short machine-readable tag, mirroring the device's RPC error codes.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InUse => "in-use",
            Self::OutOfStock => "resource-denied",
            Self::ConflictExhausted => "conflict-exhausted",
            Self::Store(_) => "store-error",
            Self::ShuttingDown => "shutting-down",
        }
    }
}

impl From<AcquireError> for ServiceError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::AlreadyInUse => Self::InUse,
            AcquireError::OutOfStock => Self::OutOfStock,
            AcquireError::ConflictExhausted { .. } => Self::ConflictExhausted,
            AcquireError::Store(e) => Self::Store(e),
        }
    }
}

pub struct CupService {
    config: DeviceConfig,
    store: Arc<dyn CupStore>,
    stock: Arc<CupStock>,
    slot: Arc<ActiveTaskSlot>,
    /// Taken on shutdown; closing the channel ends the worker loop.
    jobs: StdMutex<Option<mpsc::Sender<HeatJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepting: AtomicBool,
}

impl CupService {
    /// Build the service: seed the store with an idle record and spawn the
    /// heater worker.
    pub async fn new(
        config: DeviceConfig,
        store: Arc<dyn CupStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ServiceError> {
        // Startup write: no other component is updating the record yet, so
        // this does not need the optimistic check.
        let idle = CupRecord::new(&config.manufacturer, &config.model, CupStatus::Idle);
        store.write(idle).await?;

        let stock = Arc::new(CupStock::new(config.stock));
        let slot = Arc::new(ActiveTaskSlot::new());

        let (tx, rx) = mpsc::channel(1);
        let worker = HeaterWorker::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&stock),
            Arc::clone(&slot),
            sink,
        );
        let handle = tokio::spawn(worker.run(rx));

        Ok(Self {
            config,
            store,
            stock,
            slot,
            jobs: StdMutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            accepting: AtomicBool::new(true),
        })
    }

    /// Convenience constructor with the in-memory store and log sink.
    pub async fn with_defaults(config: DeviceConfig) -> Result<Self, ServiceError> {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(LogSink)).await
    }

    pub fn cups_remaining(&self) -> u64 {
        self.stock.remaining()
    }

    pub fn cups_made(&self) -> u64 {
        self.stock.cups_made()
    }

    /// Heat one cup.
    ///
    /// Resolves when the operation completes. Concurrent callers race for
    /// the heating lock and losers observe `InUse`; a cancelled operation
    /// still resolves `Ok`, with `interrupted` set on the receipt.
    pub async fn heat_cup(&self, request: HeatRequest) -> Result<HeatReceipt, ServiceError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(ServiceError::ShuttingDown);
        }

        acquire::acquire_heating_lock(
            self.store.as_ref(),
            &self.stock,
            self.config.lock_attempts,
        )
        .await?;

        // Lock held from here on. Register the cancellation handle before
        // the job is queued so a cancel can never miss a running operation.
        let handle = self.slot.register();
        let (result_tx, result_rx) = oneshot::channel();
        let job = HeatJob {
            request,
            task_id: handle.id(),
            cancel: handle.cancel_token(),
            responder: result_tx,
        };

        let submitted = match self.job_sender() {
            Some(tx) => tx.send(job).await.is_ok(),
            None => false,
        };
        if !submitted {
            // Shutdown raced us past the accepting check: the worker will
            // never run this job, so release the lock ourselves.
            self.release_unsubmitted_lock(handle.id()).await;
            return Err(ServiceError::ShuttingDown);
        }

        result_rx.await.map_err(|_| ServiceError::ShuttingDown)
    }

    /// Best-effort cancel of the in-flight heating operation.
    ///
    /// Always succeeds. Returns whether an operation was actually in
    /// flight; with nothing running this is a no-op. The cancelled
    /// operation still runs its cleanup and resolves its caller.
    pub fn cancel_heating(&self) -> bool {
        self.slot.cancel_current()
    }

    /// Shut down: stop accepting new operations, let any in-flight worker
    /// finish its cleanup path, then delete the shared record. Idempotent.
    pub async fn close(&self) -> Result<(), ServiceError> {
        self.accepting.store(false, Ordering::Release);

        let sender = match self.jobs.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "heater worker task failed");
            }
            self.store.delete().await?;
            tracing::debug!("cup record deleted");
        }
        Ok(())
    }

    fn job_sender(&self) -> Option<mpsc::Sender<HeatJob>> {
        match self.jobs.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn release_unsubmitted_lock(&self, task_id: u64) {
        self.slot.clear_if_current(task_id);
        let idle = CupRecord::new(&self.config.manufacturer, &self.config.model, CupStatus::Idle);
        if let Err(e) = self.store.write(idle).await {
            tracing::error!(error = %e, "failed to release heating lock after submit failure");
        }
    }
}
