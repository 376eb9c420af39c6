//! Carrier AC128 infrared protocol support: the timing table, the pulse
//! codec, frame assembly/parsing and the shared climate types. Everything in
//! this crate is pure; hardware and clocks live in the controller crate.

pub mod codec;
pub mod config;
pub mod frame;
pub mod timing;
pub mod types;

pub use codec::{DecodeError, PulseCodec, PULSES_PER_FRAME};
pub use config::ControllerConfig;
pub use frame::{Frame, ParseError, FRAME_LEN};
pub use timing::{Pulse, PulseTrain, TimingTable, CARRIER_AC128};
pub use types::{
    ClimateState, ControllerStatus, FanSpeed, Mode, Preset, WallClock, MAX_TEMP_C, MIN_TEMP_C,
};
