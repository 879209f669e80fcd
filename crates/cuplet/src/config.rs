//! Device configuration.

use std::num::NonZeroU32;
use std::time::Duration;

use serde::Deserialize;

/// Milliseconds of simulated heating per temperature unit per level.
const HEAT_SCALE_MS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub manufacturer: String,
    pub model: String,
    /// Cups in stock at startup.
    pub stock: u64,
    /// Simulated device temperature; scales the heating duration.
    pub temperature: u64,
    /// Conditional-write attempts before giving up on a contended lock.
    pub lock_attempts: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            manufacturer: "Opendaylight".to_string(),
            model: "Model 1 - Binding Aware".to_string(),
            stock: 100,
            temperature: 1000,
            lock_attempts: 2,
        }
    }
}

impl DeviceConfig {
    /// Simulated heating duration: temperature x 10ms x requested level.
    pub fn heating_duration(&self, level: NonZeroU32) -> Duration {
        Duration::from_millis(self.temperature * HEAT_SCALE_MS * u64::from(level.get()))
    }
}
