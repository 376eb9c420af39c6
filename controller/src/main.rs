use std::{thread, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use climate_ir_common::{ControllerConfig, FanSpeed, Mode, PulseTrain, CARRIER_AC128};
use climate_ir_controller::{ClimateController, Request, SystemClock, TransmitSink};

/// Stand-in emitter for running on a host without IR hardware.
struct ConsoleSink;

impl TransmitSink for ConsoleSink {
    fn transmit(&mut self, train: &PulseTrain, carrier_hz: u32) -> anyhow::Result<()> {
        info!(
            pulses = train.len(),
            micros = train.total_micros(),
            carrier_hz,
            "pulse train on the wire"
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut controller = ClimateController::with_clock(
        CARRIER_AC128,
        ControllerConfig::default(),
        Box::new(ConsoleSink),
        Box::new(SystemClock),
    );
    controller.set_observer(|state| info!(?state, "state changed by remote"));

    controller.apply(Request::SetMode(Mode::Cool))?;
    controller.apply(Request::SetTemperature(22))?;
    controller.apply(Request::SetFanSpeed(FanSpeed::High))?;

    let off_at = Utc::now() + Duration::seconds(3);
    controller.apply_at(Request::SetPower(false), off_at)?;
    info!("power-off deferred to {off_at}");

    while !controller.tick()? {
        thread::sleep(StdDuration::from_millis(250));
    }

    println!("{}", serde_json::to_string_pretty(&controller.status())?);
    Ok(())
}
