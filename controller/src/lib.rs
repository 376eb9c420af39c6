//! Climate state controller for an AC128 infrared head unit.
//!
//! [`ClimateController`] owns the logical climate state, turns validated
//! requests into pulse trains through [`climate_ir_common`], and mirrors
//! captured remote keypresses back into local state. [`IrChannel`] guards
//! the half-duplex medium and an optional [`Clock`] enables deferred
//! requests.

pub mod clock;
pub mod controller;
pub mod ir;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ClimateController, ControllerError, Request, ValidationError};
pub use ir::{ChannelError, ChannelState, IrChannel, IrDiagnostics, TransmitSink};
pub use scheduler::{DeferredRequest, DeferredSlot};
