use serde::{Deserialize, Serialize};

/// Valid setpoint range for the AC128 protocol (degrees Celsius).
pub const MIN_TEMP_C: u8 = 16;
pub const MAX_TEMP_C: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Cool,
    Heat,
    Fan,
    Dry,
    Auto,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cool => "COOL",
            Self::Heat => "HEAT",
            Self::Fan => "FAN",
            Self::Dry => "DRY",
            Self::Auto => "AUTO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanSpeed {
    Auto,
    Low,
    Medium,
    High,
}

impl FanSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Preset {
    None,
    Eco,
    Sleep,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Eco => "ECO",
            Self::Sleep => "SLEEP",
        }
    }
}

/// Logical state of the unit. The operating mode is kept while the unit is
/// powered off so that power-on restores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimateState {
    pub power: bool,
    pub mode: Mode,
    #[serde(rename = "targetTempC")]
    pub target_temp_c: u8,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: FanSpeed,
    pub swing: bool,
    pub preset: Preset,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            power: false,
            mode: Mode::Auto,
            target_temp_c: 24,
            fan_speed: FanSpeed::Auto,
            swing: false,
            preset: Preset::None,
        }
    }
}

/// Wall-clock stamp packed into the frame's BCD clock bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub power: bool,
    pub mode: &'static str,
    #[serde(rename = "targetTempC")]
    pub target_temp_c: u8,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: &'static str,
    pub swing: bool,
    pub preset: &'static str,
    #[serde(rename = "sentFrames")]
    pub sent_frames: u64,
    #[serde(rename = "rejectedCaptures")]
    pub rejected_captures: u64,
    #[serde(rename = "lastTxEpoch")]
    pub last_tx_epoch: Option<i64>,
    #[serde(rename = "timeBound")]
    pub time_bound: bool,
    #[serde(rename = "deferredAtEpoch")]
    pub deferred_at_epoch: Option<i64>,
}
