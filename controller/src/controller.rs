use chrono::{DateTime, Timelike, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use climate_ir_common::{
    ClimateState, ControllerConfig, ControllerStatus, FanSpeed, Frame, Mode, Preset, PulseCodec,
    PulseTrain, TimingTable, WallClock, MAX_TEMP_C, MIN_TEMP_C,
};

use crate::clock::Clock;
use crate::ir::{ChannelError, IrChannel, IrDiagnostics, TransmitSink};
use crate::scheduler::DeferredSlot;

/// A state-change request from the owning shell. Typed enums make most
/// fields valid by construction; the temperature carries its own range
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    SetPower(bool),
    SetMode(Mode),
    SetTemperature(u8),
    SetFanSpeed(FanSpeed),
    SetSwing(bool),
    SetPreset(Preset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("target temperature {got}C outside {min}..={max}C")]
    TemperatureOutOfRange { got: u8, min: u8, max: u8 },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("no time source bound; deferred requests are unavailable")]
    NoTimeSource,
}

enum TimeSource {
    Unbound,
    Bound(Box<dyn Clock>),
}

impl TimeSource {
    fn now(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unbound => None,
            Self::Bound(clock) => Some(clock.now()),
        }
    }
}

type StateObserver = Box<dyn FnMut(&ClimateState)>;

/// Owns the logical climate state for one physical unit and the IR channel
/// that mirrors it onto the device. Requests flow state -> frame -> pulses;
/// captured pulses from a physical remote flow the other way and overwrite
/// local state.
pub struct ClimateController {
    state: ClimateState,
    codec: PulseCodec,
    channel: IrChannel,
    time: TimeSource,
    deferred: DeferredSlot,
    observer: Option<StateObserver>,
    last_tx_epoch: Option<i64>,
    rejected_captures: u64,
}

impl ClimateController {
    pub fn new(table: TimingTable, config: ControllerConfig, sink: Box<dyn TransmitSink>) -> Self {
        Self::build(table, config, sink, TimeSource::Unbound)
    }

    /// Binds a time source. Transmissions get stamped (log line, status
    /// epoch and the frame's clock-sync bytes) and `apply_at` becomes
    /// available.
    pub fn with_clock(
        table: TimingTable,
        config: ControllerConfig,
        sink: Box<dyn TransmitSink>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self::build(table, config, sink, TimeSource::Bound(clock))
    }

    fn build(
        table: TimingTable,
        mut config: ControllerConfig,
        sink: Box<dyn TransmitSink>,
        time: TimeSource,
    ) -> Self {
        config.sanitize();
        Self {
            state: config.initial,
            codec: PulseCodec::new(table, config.tolerance_pct),
            channel: IrChannel::new(sink, config.min_send_interval_ms),
            time,
            deferred: DeferredSlot::new(),
            observer: None,
            last_tx_epoch: None,
            rejected_captures: 0,
        }
    }

    /// Registers the state-changed callback for the owning shell; fired when
    /// a capture from a physical remote overwrites local state.
    pub fn set_observer(&mut self, observer: impl FnMut(&ClimateState) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> ClimateState {
        self.state
    }

    /// Validates and applies a request immediately. An applied request
    /// cancels any pending deferred one; a rejected or failed one leaves it
    /// scheduled.
    pub fn apply(&mut self, request: Request) -> Result<(), ControllerError> {
        validate(request)?;

        let next = apply_request(self.state, request);
        self.transmit(next)?;

        if let Some(cancelled) = self.deferred.cancel() {
            debug!("immediate request cancels deferred {:?}", cancelled.request);
        }
        Ok(())
    }

    /// Holds a request until the bound clock reaches `apply_at`; `tick`
    /// forwards it. Fails when no time source was bound at construction.
    pub fn apply_at(
        &mut self,
        request: Request,
        apply_at: DateTime<Utc>,
    ) -> Result<(), ControllerError> {
        if matches!(self.time, TimeSource::Unbound) {
            return Err(ControllerError::NoTimeSource);
        }
        validate(request)?;

        if let Some(replaced) = self.deferred.schedule(request, apply_at) {
            debug!("deferred {:?} replaced by {request:?}", replaced.request);
        }
        Ok(())
    }

    /// Drives the deferred queue; call this periodically from the control
    /// loop. Returns true when a deferred request was applied.
    pub fn tick(&mut self) -> Result<bool, ControllerError> {
        let Some(now) = self.time.now() else {
            return Ok(false);
        };
        let Some(request) = self.deferred.peek_due(now) else {
            return Ok(false);
        };

        info!("applying deferred {request:?}");
        let next = apply_request(self.state, request);
        // The slot empties only once the train is on the wire; a busy or
        // failing channel leaves the request pending for the next tick.
        self.transmit(next)?;
        self.deferred.cancel();
        Ok(true)
    }

    /// Locks the channel while the receiver hardware captures an inbound
    /// signal; transmissions are rejected until the capture is handed over.
    pub fn begin_capture(&mut self) -> Result<(), ControllerError> {
        self.channel.begin_capture()?;
        Ok(())
    }

    /// Feeds a completed capture through the codec and parser. A decoded
    /// frame mirrors a keypress on a physical remote: local state is
    /// overwritten and the observer notified. Noise and malformed frames are
    /// discarded without touching state; the channel is never left locked.
    pub fn handle_capture(&mut self, train: &PulseTrain) -> Option<ClimateState> {
        self.channel.finish_capture();

        let frame = match self.codec.decode(train) {
            Ok(frame) => frame,
            Err(err) => {
                self.rejected_captures = self.rejected_captures.saturating_add(1);
                debug!("discarding capture: {err}");
                return None;
            }
        };

        match frame.parse() {
            Ok(state) => {
                debug!("received frame {:02x?}", frame.bytes());
                self.state = state;
                if let Some(observer) = self.observer.as_mut() {
                    observer(&state);
                }
                Some(state)
            }
            Err(err) => {
                self.rejected_captures = self.rejected_captures.saturating_add(1);
                warn!("discarding decoded frame: {err}");
                None
            }
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            power: self.state.power,
            mode: self.state.mode.as_str(),
            target_temp_c: self.state.target_temp_c,
            fan_speed: self.state.fan_speed.as_str(),
            swing: self.state.swing,
            preset: self.state.preset.as_str(),
            sent_frames: self.channel.sent_frames(),
            rejected_captures: self.rejected_captures,
            last_tx_epoch: self.last_tx_epoch,
            time_bound: matches!(self.time, TimeSource::Bound(_)),
            deferred_at_epoch: self.deferred.pending().map(|entry| entry.apply_at.timestamp()),
        }
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        self.channel.diagnostics()
    }

    /// Assembles, encodes and sends `next`, committing it as the current
    /// state only once the train is on the wire. A rejected or failed send
    /// leaves state untouched, so it always matches what the unit last saw.
    fn transmit(&mut self, next: ClimateState) -> Result<(), ControllerError> {
        let now = self.time.now();
        let stamp = now.map(|now| WallClock {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        });

        let frame = Frame::assemble(&next, stamp);
        debug!("sending frame {:02x?}", frame.bytes());

        let train = self.codec.encode(&frame);
        self.channel.send(&train, self.codec.carrier_hz())?;

        self.state = next;
        if let Some(now) = now {
            self.last_tx_epoch = Some(now.timestamp());
            info!("transmitted at {now}");
        }
        Ok(())
    }
}

fn validate(request: Request) -> Result<(), ValidationError> {
    if let Request::SetTemperature(temp) = request {
        if !(MIN_TEMP_C..=MAX_TEMP_C).contains(&temp) {
            return Err(ValidationError::TemperatureOutOfRange {
                got: temp,
                min: MIN_TEMP_C,
                max: MAX_TEMP_C,
            });
        }
    }
    Ok(())
}

fn apply_request(mut state: ClimateState, request: Request) -> ClimateState {
    match request {
        Request::SetPower(on) => state.power = on,
        // Picking an operating mode turns the unit on, like the vendor
        // remote does.
        Request::SetMode(mode) => {
            state.mode = mode;
            state.power = true;
        }
        Request::SetTemperature(temp) => state.target_temp_c = temp,
        Request::SetFanSpeed(fan) => state.fan_speed = fan,
        Request::SetSwing(swing) => state.swing = swing,
        Request::SetPreset(preset) => state.preset = preset,
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use climate_ir_common::CARRIER_AC128;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Rc<RefCell<Vec<PulseTrain>>>,
    }

    impl TransmitSink for RecordingSink {
        fn transmit(&mut self, train: &PulseTrain, _carrier_hz: u32) -> anyhow::Result<()> {
            self.sent.borrow_mut().push(train.clone());
            Ok(())
        }
    }

    fn test_config() -> ControllerConfig {
        ControllerConfig {
            min_send_interval_ms: 0,
            ..ControllerConfig::default()
        }
    }

    fn controller() -> (ClimateController, Rc<RefCell<Vec<PulseTrain>>>) {
        let sink = RecordingSink::default();
        let sent = sink.sent.clone();
        let controller = ClimateController::new(CARRIER_AC128, test_config(), Box::new(sink));
        (controller, sent)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
    }

    fn timed_controller() -> (ClimateController, Rc<RefCell<Vec<PulseTrain>>>, ManualClock) {
        let sink = RecordingSink::default();
        let sent = sink.sent.clone();
        let clock = ManualClock::starting_at(t0());
        let controller = ClimateController::with_clock(
            CARRIER_AC128,
            test_config(),
            Box::new(sink),
            Box::new(clock.clone()),
        );
        (controller, sent, clock)
    }

    #[test]
    fn valid_temperature_updates_state_and_transmits_once() {
        let (mut controller, sent) = controller();

        controller.apply(Request::SetTemperature(22)).unwrap();

        assert_eq!(controller.state().target_temp_c, 22);
        assert_eq!(sent.borrow().len(), 1);
    }

    #[test]
    fn out_of_range_temperature_is_rejected_without_transmit() {
        let (mut controller, sent) = controller();
        let before = controller.state();

        for temp in [MIN_TEMP_C - 1, MAX_TEMP_C + 1] {
            let err = controller.apply(Request::SetTemperature(temp)).unwrap_err();
            assert!(matches!(
                err,
                ControllerError::Validation(ValidationError::TemperatureOutOfRange { .. })
            ));
        }

        assert_eq!(controller.state(), before);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn transmitted_train_round_trips_to_the_applied_state() {
        let (mut controller, sent) = controller();

        controller.apply(Request::SetMode(Mode::Heat)).unwrap();
        controller.apply(Request::SetFanSpeed(FanSpeed::Low)).unwrap();

        let codec = PulseCodec::new(CARRIER_AC128, 25);
        let last = sent.borrow().last().cloned().unwrap();
        let decoded = codec.decode(&last).unwrap().parse().unwrap();

        assert_eq!(decoded, controller.state());
        assert!(decoded.power);
        assert_eq!(decoded.mode, Mode::Heat);
        assert_eq!(decoded.fan_speed, FanSpeed::Low);
    }

    #[test]
    fn power_off_keeps_the_operating_mode_for_restore() {
        let (mut controller, _sent) = controller();

        controller.apply(Request::SetMode(Mode::Dry)).unwrap();
        controller.apply(Request::SetPower(false)).unwrap();

        assert!(!controller.state().power);
        assert_eq!(controller.state().mode, Mode::Dry);

        controller.apply(Request::SetPower(true)).unwrap();
        assert_eq!(controller.state().mode, Mode::Dry);
    }

    #[test]
    fn transmit_during_capture_is_rejected_and_state_kept() {
        let (mut controller, sent) = controller();
        let before = controller.state();

        controller.begin_capture().unwrap();
        let err = controller.apply(Request::SetTemperature(20)).unwrap_err();

        assert!(matches!(err, ControllerError::Channel(ChannelError::Busy(_))));
        assert_eq!(controller.state(), before);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn capture_overwrites_state_and_notifies_observer() {
        let (mut controller, _sent) = controller();
        let seen: Rc<RefCell<Vec<ClimateState>>> = Rc::default();
        let seen_handle = seen.clone();
        controller.set_observer(move |state| seen_handle.borrow_mut().push(*state));

        let remote_state = ClimateState {
            power: true,
            mode: Mode::Cool,
            target_temp_c: 18,
            fan_speed: FanSpeed::High,
            swing: true,
            preset: Preset::None,
        };
        let train = PulseCodec::new(CARRIER_AC128, 25).encode(&Frame::assemble(&remote_state, None));

        controller.begin_capture().unwrap();
        let result = controller.handle_capture(&train);

        assert_eq!(result, Some(remote_state));
        assert_eq!(controller.state(), remote_state);
        assert_eq!(seen.borrow().as_slice(), &[remote_state]);

        // Channel unlocked again.
        controller.apply(Request::SetTemperature(21)).unwrap();
    }

    #[test]
    fn noisy_capture_is_discarded_without_state_change() {
        let (mut controller, _sent) = controller();
        let before = controller.state();

        let mut noise = PulseTrain::new();
        noise.push(true, 500);
        noise.push(false, 700);

        controller.begin_capture().unwrap();
        assert_eq!(controller.handle_capture(&noise), None);
        assert_eq!(controller.state(), before);
        assert_eq!(controller.status().rejected_captures, 1);
    }

    #[test]
    fn apply_at_requires_a_bound_clock() {
        let (mut controller, _sent) = controller();

        let err = controller
            .apply_at(Request::SetPower(false), t0())
            .unwrap_err();
        assert!(matches!(err, ControllerError::NoTimeSource));
    }

    #[test]
    fn deferred_request_fires_exactly_once_when_due() {
        let (mut controller, sent, clock) = timed_controller();

        controller
            .apply_at(Request::SetMode(Mode::Cool), t0() + Duration::seconds(60))
            .unwrap();

        assert!(!controller.tick().unwrap());
        clock.advance(Duration::seconds(59));
        assert!(!controller.tick().unwrap());
        assert!(sent.borrow().is_empty());

        clock.advance(Duration::seconds(1));
        assert!(controller.tick().unwrap());
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(controller.state().mode, Mode::Cool);
        assert!(controller.state().power);

        assert!(!controller.tick().unwrap());
        assert_eq!(sent.borrow().len(), 1);
    }

    #[test]
    fn immediate_request_cancels_the_deferred_one() {
        let (mut controller, sent, clock) = timed_controller();

        controller
            .apply_at(Request::SetMode(Mode::Cool), t0() + Duration::seconds(60))
            .unwrap();
        controller.apply(Request::SetPower(false)).unwrap();

        assert_eq!(sent.borrow().len(), 1);
        assert!(controller.status().deferred_at_epoch.is_none());

        clock.advance(Duration::seconds(120));
        assert!(!controller.tick().unwrap());
        assert_eq!(sent.borrow().len(), 1);
        assert!(!controller.state().power);
    }

    #[test]
    fn deferred_request_survives_a_busy_channel_at_its_due_time() {
        let (mut controller, sent, clock) = timed_controller();

        controller
            .apply_at(Request::SetMode(Mode::Cool), t0() + Duration::seconds(60))
            .unwrap();
        controller.begin_capture().unwrap();
        clock.advance(Duration::seconds(60));

        let err = controller.tick().unwrap_err();
        assert!(matches!(err, ControllerError::Channel(ChannelError::Busy(_))));
        assert!(controller.status().deferred_at_epoch.is_some());
        assert!(sent.borrow().is_empty());

        let mut noise = PulseTrain::new();
        noise.push(true, 500);
        assert_eq!(controller.handle_capture(&noise), None);

        assert!(controller.tick().unwrap());
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(controller.state().mode, Mode::Cool);
        assert!(!controller.tick().unwrap());
    }

    #[test]
    fn rejected_immediate_request_keeps_the_deferred_one() {
        let (mut controller, sent, clock) = timed_controller();

        controller
            .apply_at(Request::SetMode(Mode::Cool), t0() + Duration::seconds(60))
            .unwrap();
        controller.begin_capture().unwrap();

        let err = controller.apply(Request::SetPower(false)).unwrap_err();
        assert!(matches!(err, ControllerError::Channel(ChannelError::Busy(_))));
        assert!(controller.status().deferred_at_epoch.is_some());

        let mut noise = PulseTrain::new();
        noise.push(true, 500);
        controller.handle_capture(&noise);

        clock.advance(Duration::seconds(60));
        assert!(controller.tick().unwrap());
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(controller.state().mode, Mode::Cool);
    }

    #[test]
    fn bound_clock_stamps_transmissions() {
        let (mut controller, sent, _clock) = timed_controller();

        controller.apply(Request::SetTemperature(25)).unwrap();

        assert_eq!(controller.status().last_tx_epoch, Some(t0().timestamp()));

        // 12:00:00 lands in the frame's BCD clock bytes.
        let codec = PulseCodec::new(CARRIER_AC128, 25);
        let frame = codec.decode(&sent.borrow()[0]).unwrap();
        assert_eq!(frame.bytes()[3], 0x12);
        assert_eq!(frame.bytes()[2], 0x00);
    }

    #[test]
    fn unbound_controller_sends_zero_clock_bytes() {
        let (mut controller, sent) = controller();

        controller.apply(Request::SetTemperature(25)).unwrap();

        let codec = PulseCodec::new(CARRIER_AC128, 25);
        let frame = codec.decode(&sent.borrow()[0]).unwrap();
        assert_eq!(frame.bytes()[2], 0x00);
        assert_eq!(frame.bytes()[3], 0x00);
        assert_eq!(controller.status().last_tx_epoch, None);
    }
}
