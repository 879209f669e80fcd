//! cuplet: exclusive-operation service for a shared cup-heater device.
//!
//! One device record, guarded by an optimistic read-then-conditional-write
//! lock; a single worker runs the long heating task while the lock is held
//! and always returns the device to idle, whether the task completed, was
//! cancelled, or failed.

mod acquire;
mod config;
mod device;
mod sink;
mod slot;
mod stock;
mod worker;

pub mod service;
pub mod store;

pub use acquire::{AcquireError, acquire_heating_lock};
pub use config::DeviceConfig;
pub use device::{CupRecord, CupStatus, HeatReceipt, HeatRequest};
pub use service::{CupService, ErrorKind, ServiceError};
pub use sink::{LogSink, NotificationSink, OutOfCupsEvent};
pub use slot::{ActiveTaskSlot, TaskHandle};
pub use stock::CupStock;
pub use store::{CupStore, MemoryStore, StoreError, Version, VersionedRecord};
