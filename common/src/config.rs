use serde::{Deserialize, Serialize};

use crate::types::{ClimateState, MAX_TEMP_C, MIN_TEMP_C};

/// Tuning knobs for a controller instance. Values outside the supported
/// ranges are clamped by [`ControllerConfig::sanitize`] at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Decode tolerance applied to every pulse duration, in percent.
    pub tolerance_pct: u8,
    /// Minimum gap enforced between consecutive transmissions.
    pub min_send_interval_ms: u64,
    /// State assumed at startup, before the first frame is seen.
    pub initial: ClimateState,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tolerance_pct: 25,
            min_send_interval_ms: 300,
            initial: ClimateState::default(),
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        // Above ~45% the one/zero space windows (1000us/400us) overlap and
        // every decode becomes ambiguous.
        self.tolerance_pct = self.tolerance_pct.clamp(1, 45);
        self.initial.target_temp_c = self.initial.target_temp_c.clamp(MIN_TEMP_C, MAX_TEMP_C);
    }
}
