//! Out-of-stock notification seam.
//!
//! Delivery transports live behind the trait; the service only needs
//! `publish`.

use serde::Serialize;

/// Published once, when the last cup in stock is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutOfCupsEvent {
    pub cups_made: u64,
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: OutOfCupsEvent);
}

/// Default sink: records the event in the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, event: OutOfCupsEvent) {
        tracing::warn!(cups_made = event.cups_made, "no more cups in stock");
    }
}
