//! Single-worker executor for heating operations.
//!
//! One task drains the job channel, so operations run strictly serially. The
//! lock protocol already guarantees one logical operation at a time; the
//! dedicated worker is the safety net behind it, not the primary mutual
//! exclusion.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::DeviceConfig;
use crate::device::{CupRecord, CupStatus, HeatReceipt, HeatRequest};
use crate::sink::{NotificationSink, OutOfCupsEvent};
use crate::slot::ActiveTaskSlot;
use crate::stock::CupStock;
use crate::store::CupStore;

/// One accepted heating operation, queued for the worker.
///
/// The responder is the single-assignment result slot for this operation;
/// the worker resolves it exactly once, on every completion path.
pub(crate) struct HeatJob {
    pub request: HeatRequest,
    pub task_id: u64,
    pub cancel: CancellationToken,
    pub responder: oneshot::Sender<HeatReceipt>,
}

pub(crate) struct HeaterWorker {
    config: DeviceConfig,
    store: Arc<dyn CupStore>,
    stock: Arc<CupStock>,
    slot: Arc<ActiveTaskSlot>,
    sink: Arc<dyn NotificationSink>,
}

impl HeaterWorker {
    pub(crate) fn new(
        config: DeviceConfig,
        store: Arc<dyn CupStore>,
        stock: Arc<CupStock>,
        slot: Arc<ActiveTaskSlot>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            store,
            stock,
            slot,
            sink,
        }
    }

    /// Run until the job channel closes.
    pub(crate) async fn run(self, mut jobs: mpsc::Receiver<HeatJob>) {
        while let Some(job) = jobs.recv().await {
            self.heat(job).await;
        }
        tracing::debug!("heater worker shutting down");
    }

    /// Heat one cup, then run the cleanup path unconditionally: consume
    /// stock, notify on exhaustion, restore the record to idle, clear the
    /// slot, resolve the caller.
    async fn heat(&self, job: HeatJob) {
        let duration = self.config.heating_duration(job.request.level);
        tracing::debug!(task = job.task_id, ?duration, "heating cup");

        let interrupted = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = job.cancel.cancelled() => {
                tracing::info!(task = job.task_id, "interrupted while heating the cup");
                true
            }
        };

        // Cancellation only skips the remaining wait; the cup is still
        // consumed and the device still returns to idle.
        if self.stock.consume() {
            self.sink
                .publish(OutOfCupsEvent {
                    cups_made: self.stock.cups_made(),
                })
                .await;
        }

        // Sole authorized writer while the lock is held, so the idle write
        // is unconditional. There is no further remedial action if it fails:
        // log and resolve the caller anyway.
        let idle = CupRecord::new(
            &self.config.manufacturer,
            &self.config.model,
            CupStatus::Idle,
        );
        if let Err(e) = self.store.write(idle).await {
            tracing::error!(error = %e, "failed to restore cup status to idle");
        }

        self.slot.clear_if_current(job.task_id);

        let receipt = HeatReceipt {
            interrupted,
            cups_remaining: self.stock.remaining(),
            cups_made: self.stock.cups_made(),
        };
        if job.responder.send(receipt).is_err() {
            tracing::debug!(task = job.task_id, "caller gone before the cup was ready");
        }
        tracing::debug!(task = job.task_id, "cup ready");
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use super::*;
    use crate::sink::test_sinks::RecordingSink;
    use crate::store::MemoryStore;
    use crate::store::test_stores::FailingWriteStore;

    struct Fixture {
        config: DeviceConfig,
        store: Arc<dyn CupStore>,
        stock: Arc<CupStock>,
        slot: Arc<ActiveTaskSlot>,
        sink: Arc<RecordingSink>,
    }

    impl Fixture {
        fn new(store: Arc<dyn CupStore>, stock: u64) -> Self {
            let config = DeviceConfig {
                stock,
                temperature: 1,
                ..DeviceConfig::default()
            };
            Self {
                config: config.clone(),
                store,
                stock: Arc::new(CupStock::new(stock)),
                slot: Arc::new(ActiveTaskSlot::new()),
                sink: Arc::new(RecordingSink::new()),
            }
        }

        /// Seed a busy record (as the lock protocol would) and spawn the
        /// worker on a fresh job channel.
        async fn spawn(&self) -> mpsc::Sender<HeatJob> {
            let busy = CupRecord::new(
                &self.config.manufacturer,
                &self.config.model,
                CupStatus::Busy,
            );
            self.store.write(busy).await.unwrap();

            let worker = HeaterWorker::new(
                self.config.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.stock),
                Arc::clone(&self.slot),
                Arc::clone(&self.sink) as Arc<dyn NotificationSink>,
            );
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(worker.run(rx));
            tx
        }

        fn job(&self) -> (HeatJob, oneshot::Receiver<HeatReceipt>) {
            let handle = self.slot.register();
            let (result_tx, result_rx) = oneshot::channel();
            let job = HeatJob {
                request: HeatRequest::new(NonZeroU32::MIN),
                task_id: handle.id(),
                cancel: handle.cancel_token(),
                responder: result_tx,
            };
            (job, result_rx)
        }
    }

    async fn receive(rx: oneshot::Receiver<HeatReceipt>) -> HeatReceipt {
        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("heat did not resolve in time")
            .expect("responder dropped")
    }

    #[tokio::test]
    async fn heat_restores_idle_and_consumes_one_cup() {
        let fixture = Fixture::new(Arc::new(MemoryStore::new()), 3);
        let tx = fixture.spawn().await;

        let (job, rx) = fixture.job();
        tx.send(job).await.unwrap();
        let receipt = receive(rx).await;

        assert!(!receipt.interrupted);
        assert_eq!(receipt.cups_remaining, 2);
        assert_eq!(receipt.cups_made, 1);
        assert_eq!(
            fixture.store.read().await.unwrap().record.status,
            CupStatus::Idle
        );
        assert!(!fixture.slot.is_occupied());
        assert!(fixture.sink.events().is_empty());
    }

    #[tokio::test]
    async fn cancelled_job_resolves_early_and_still_cleans_up() {
        let fixture = Fixture::new(Arc::new(MemoryStore::new()), 3);
        let tx = fixture.spawn().await;

        let (job, rx) = fixture.job();
        // Cancel before the worker even starts the wait.
        job.cancel.cancel();
        tx.send(job).await.unwrap();
        let receipt = receive(rx).await;

        assert!(receipt.interrupted);
        assert_eq!(receipt.cups_remaining, 2);
        assert_eq!(
            fixture.store.read().await.unwrap().record.status,
            CupStatus::Idle
        );
    }

    #[tokio::test]
    async fn exhaustion_publishes_a_single_notification() {
        let fixture = Fixture::new(Arc::new(MemoryStore::new()), 1);
        let tx = fixture.spawn().await;

        let (job, rx) = fixture.job();
        tx.send(job).await.unwrap();
        let receipt = receive(rx).await;

        assert_eq!(receipt.cups_remaining, 0);
        assert_eq!(fixture.sink.events(), vec![OutOfCupsEvent { cups_made: 1 }]);
    }

    #[tokio::test]
    async fn failed_idle_write_still_resolves_the_caller() {
        let store = Arc::new(FailingWriteStore::new());
        let fixture = Fixture::new(Arc::clone(&store) as Arc<dyn CupStore>, 3);
        let tx = fixture.spawn().await;
        store.fail_writes();

        let (job, rx) = fixture.job();
        tx.send(job).await.unwrap();
        let receipt = receive(rx).await;

        // Best-effort boundary: the record stays busy, but the result still
        // resolves and the slot is cleared.
        assert_eq!(receipt.cups_remaining, 2);
        assert_eq!(store.status().await, Some(CupStatus::Busy));
        assert!(!fixture.slot.is_occupied());
    }
}
