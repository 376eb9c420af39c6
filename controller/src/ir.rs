use std::{
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use climate_ir_common::PulseTrain;

/// Hardware boundary: drives the physical emitter with a pulse train at the
/// given carrier frequency. Implementations block until the train is fully
/// on the wire (bounded by `PulseTrain::total_micros`).
pub trait TransmitSink {
    fn transmit(&mut self, train: &PulseTrain, carrier_hz: u32) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelState {
    Idle,
    Transmitting,
    Receiving,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Transmitting => "TRANSMITTING",
            Self::Receiving => "RECEIVING",
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("IR channel busy ({0:?})")]
    Busy(ChannelState),
    #[error("IR transmit failed: {0}")]
    Transmit(anyhow::Error),
}

/// Single-flight guard around the half-duplex IR medium. Exactly one
/// operation may be in flight; a transmit during an active capture (or the
/// other way around) is rejected rather than interleaved.
pub struct IrChannel {
    sink: Box<dyn TransmitSink>,
    state: ChannelState,
    min_send_interval_ms: u64,
    last_send_ms: Option<u64>,
    sent_frames: u64,
    failed_sends: u64,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrDiagnostics {
    pub state: &'static str,
    #[serde(rename = "minSendIntervalMs")]
    pub min_send_interval_ms: u64,
    #[serde(rename = "lastSendMs")]
    pub last_send_ms: Option<u64>,
    #[serde(rename = "sentFrames")]
    pub sent_frames: u64,
    #[serde(rename = "failedSends")]
    pub failed_sends: u64,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

impl IrChannel {
    pub fn new(sink: Box<dyn TransmitSink>, min_send_interval_ms: u64) -> Self {
        Self {
            sink,
            state: ChannelState::Idle,
            min_send_interval_ms,
            last_send_ms: None,
            sent_frames: 0,
            failed_sends: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn sent_frames(&self) -> u64 {
        self.sent_frames
    }

    pub fn send(&mut self, train: &PulseTrain, carrier_hz: u32) -> Result<(), ChannelError> {
        if self.state != ChannelState::Idle {
            return Err(ChannelError::Busy(self.state));
        }

        self.rate_limit();

        self.state = ChannelState::Transmitting;
        let result = self.sink.transmit(train, carrier_hz);
        self.state = ChannelState::Idle;

        match result {
            Ok(()) => {
                self.last_send_ms = Some(monotonic_ms());
                self.sent_frames = self.sent_frames.saturating_add(1);
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.failed_sends = self.failed_sends.saturating_add(1);
                self.last_error = Some(format!("{err:#}"));
                Err(ChannelError::Transmit(err))
            }
        }
    }

    /// Marks the channel as receiving; transmissions are rejected until the
    /// capture is finished.
    pub fn begin_capture(&mut self) -> Result<(), ChannelError> {
        if self.state != ChannelState::Idle {
            return Err(ChannelError::Busy(self.state));
        }
        debug!("capture started, channel locked");
        self.state = ChannelState::Receiving;
        Ok(())
    }

    pub fn finish_capture(&mut self) {
        if self.state == ChannelState::Receiving {
            self.state = ChannelState::Idle;
        }
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        IrDiagnostics {
            state: self.state.as_str(),
            min_send_interval_ms: self.min_send_interval_ms,
            last_send_ms: self.last_send_ms,
            sent_frames: self.sent_frames,
            failed_sends: self.failed_sends,
            last_error: self.last_error.clone(),
        }
    }

    fn rate_limit(&mut self) {
        let now = monotonic_ms();
        if let Some(last) = self.last_send_ms {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.min_send_interval_ms {
                thread::sleep(Duration::from_millis(self.min_send_interval_ms - elapsed));
            }
        }
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    u64::try_from(START.get_or_init(Instant::now).elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct CountingSink {
        sent: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl TransmitSink for CountingSink {
        fn transmit(&mut self, _train: &PulseTrain, _carrier_hz: u32) -> anyhow::Result<()> {
            self.sent.set(self.sent.get() + 1);
            Ok(())
        }
    }

    struct FailingSink;

    impl TransmitSink for FailingSink {
        fn transmit(&mut self, _train: &PulseTrain, _carrier_hz: u32) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    fn short_train() -> PulseTrain {
        let mut train = PulseTrain::new();
        train.push(true, 4600);
        train.push(false, 2600);
        train
    }

    #[test]
    fn send_counts_frames() {
        let sink = CountingSink::default();
        let sent = sink.sent.clone();
        let mut channel = IrChannel::new(Box::new(sink), 0);

        channel.send(&short_train(), 38_000).unwrap();
        channel.send(&short_train(), 38_000).unwrap();

        assert_eq!(sent.get(), 2);
        assert_eq!(channel.sent_frames(), 2);
        assert!(channel.diagnostics().last_error.is_none());
    }

    #[test]
    fn rate_limit_spaces_consecutive_sends() {
        let sink = CountingSink::default();
        let sent = sink.sent.clone();
        let mut channel = IrChannel::new(Box::new(sink), 25);

        let started = Instant::now();
        channel.send(&short_train(), 38_000).unwrap();
        channel.send(&short_train(), 38_000).unwrap();

        // The monotonic counter truncates to whole milliseconds, so the
        // enforced gap can fall short of the interval by a fraction.
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(sent.get(), 2);
    }

    #[test]
    fn send_during_capture_is_rejected() {
        let sink = CountingSink::default();
        let sent = sink.sent.clone();
        let mut channel = IrChannel::new(Box::new(sink), 0);

        channel.begin_capture().unwrap();
        let err = channel.send(&short_train(), 38_000).unwrap_err();

        assert!(matches!(err, ChannelError::Busy(ChannelState::Receiving)));
        assert_eq!(sent.get(), 0);

        channel.finish_capture();
        channel.send(&short_train(), 38_000).unwrap();
        assert_eq!(sent.get(), 1);
    }

    #[test]
    fn capture_during_capture_is_rejected() {
        let mut channel = IrChannel::new(Box::new(CountingSink::default()), 0);

        channel.begin_capture().unwrap();
        assert!(matches!(
            channel.begin_capture(),
            Err(ChannelError::Busy(ChannelState::Receiving))
        ));
    }

    #[test]
    fn sink_failure_is_recorded() {
        let mut channel = IrChannel::new(Box::new(FailingSink), 0);

        let err = channel.send(&short_train(), 38_000).unwrap_err();

        assert!(matches!(err, ChannelError::Transmit(_)));
        assert_eq!(channel.sent_frames(), 0);
        let diagnostics = channel.diagnostics();
        assert_eq!(diagnostics.failed_sends, 1);
        assert!(diagnostics.last_error.unwrap().contains("sink offline"));
        // The channel recovers; it is not stuck in Transmitting.
        assert_eq!(channel.state(), ChannelState::Idle);
    }
}
