//! Sweeper configuration

use serde::{Deserialize, Serialize};

/// Sweep schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,

    /// Enable the loop (a disabled sweeper only logs)
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            enabled: true,
        }
    }
}

impl SweepConfig {
    /// Validate the schedule.
    pub fn validate(&self) -> crate::Result<()> {
        if self.interval_secs == 0 {
            return Err(crate::Error::Config(
                "interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
