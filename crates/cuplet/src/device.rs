//! Cup device data model.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Status of the shared cup device.
///
/// `Busy` doubles as the exclusive heating lock: whoever transitions the
/// record `Idle -> Busy` through the conditional write owns the device until
/// they write it back to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CupStatus {
    #[default]
    Idle,
    Busy,
}

impl CupStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
        }
    }
}

/// The shared device record.
///
/// Manufacturer and model are fixed at construction - we simulate a device
/// whose identity is embedded in the hardware. Only the status ever changes,
/// and only through the store protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CupRecord {
    pub manufacturer: String,
    pub model: String,
    pub status: CupStatus,
}

impl CupRecord {
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        status: CupStatus,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            status,
        }
    }

    /// Same device identity with a different status.
    pub fn with_status(&self, status: CupStatus) -> Self {
        Self {
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            status,
        }
    }
}

/// Caller-supplied parameters for one heating operation.
///
/// Immutable once accepted. The level must be positive, which the type
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatRequest {
    /// Requested heating level. Scales the simulated heating duration.
    pub level: NonZeroU32,
}

impl HeatRequest {
    pub fn new(level: NonZeroU32) -> Self {
        Self { level }
    }
}

/// Resolution of one accepted heating operation.
///
/// Delivered exactly once per accepted request, on success and after
/// cancellation alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatReceipt {
    /// True when cancellation interrupted the simulated wait. The cup was
    /// still consumed and the device still returned to idle.
    pub interrupted: bool,
    /// Cups left in stock after this operation.
    pub cups_remaining: u64,
    /// Total cups made so far.
    pub cups_made: u64,
}
