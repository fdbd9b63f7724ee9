//! Temperature-driven duty cycles for the two fan channels.

use std::time::Duration;

use log::{error, info};
use tokio::time::Instant;

use crate::{
    app_context::SharedState,
    config::Config,
    drivers::fan_pwm::FanOutput,
    fan_curve::{FanChannel, FanCurve},
    sensors::{TemperatureReading, TemperatureSource},
};

/// How often the run flag and cached targets are looked at.
pub const FAN_TICK: Duration = Duration::from_millis(100);
/// How often temperatures are sampled and targets recomputed.
pub const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-channel duty cycle state.
///
/// A channel's output is written only when its target differs from the value
/// last applied to it.
pub struct FanController {
    curves: [FanCurve; 2],
    enabled: [bool; 2],
    target: [f32; 2],
    applied: [Option<f32>; 2],
    last_compute: Option<Instant>,
    was_running: bool,
    write_failed: [bool; 2],
}

impl FanController {
    pub fn from_config(config: &Config) -> Self {
        let curve = |channel| FanCurve::new(config.fan.levels(channel), config.fan.policy());
        Self {
            curves: [curve(FanChannel::Cpu), curve(FanChannel::Disk)],
            enabled: [config.fan.cpu_channel, true],
            target: [0.0; 2],
            applied: [None; 2],
            last_compute: None,
            was_running: false,
            write_failed: [false; 2],
        }
    }

    /// Duty targets for a reading: the cpu fan follows the system
    /// temperature, the top-board fan the disk temperature.
    pub fn targets_for(&self, reading: TemperatureReading) -> [f32; 2] {
        [
            self.curves[FanChannel::Cpu.index()].duty_for(reading.system),
            self.curves[FanChannel::Disk.index()].duty_for(reading.disk),
        ]
    }

    /// One control step.
    ///
    /// While the run flag is off every channel is held at zero. Targets are
    /// recomputed every [`RECOMPUTE_INTERVAL`] and right after the flag comes
    /// back on.
    pub async fn tick(
        &mut self,
        source: &dyn TemperatureSource,
        state: &SharedState,
        output: &dyn FanOutput,
        now: Instant,
    ) {
        if !state.is_running() {
            if self.was_running {
                info!("Fans switched off");
            }
            self.was_running = false;
            for channel in FanChannel::ALL {
                self.apply(channel, 0.0, state, output);
            }
            return;
        }

        let due = !self.was_running
            || self
                .last_compute
                .is_none_or(|at| now.duration_since(at) >= RECOMPUTE_INTERVAL);
        if due {
            let reading = source.read().await;
            self.target = self.targets_for(reading);
            self.last_compute = Some(now);
            log::debug!(
                "Temperatures {:.1}/{:.1}, duty cpu {:.0}% disk {:.0}%",
                reading.system,
                reading.disk,
                self.target[0],
                self.target[1]
            );
        }
        self.was_running = true;

        for channel in FanChannel::ALL {
            self.apply(channel, self.target[channel.index()], state, output);
        }
    }

    fn apply(&mut self, channel: FanChannel, pct: f32, state: &SharedState, output: &dyn FanOutput) {
        let idx = channel.index();
        if !self.enabled[idx] || self.applied[idx] == Some(pct) {
            return;
        }

        match output.set_duty(channel, pct) {
            Ok(()) => {
                self.applied[idx] = Some(pct);
                self.write_failed[idx] = false;
                state.set_duty(channel, pct);
            }
            Err(e) => {
                if !self.write_failed[idx] {
                    error!("Failed to set {} fan to {pct:.0}%: {e:#}", channel.name());
                }
                self.write_failed[idx] = true;
            }
        }
    }

    pub fn applied(&self, channel: FanChannel) -> Option<f32> {
        self.applied[channel.index()]
    }
}

/// Clears the run flag and forces both outputs to zero.
pub fn turn_off(state: &SharedState, output: &dyn FanOutput) {
    state.set_running(false);
    for channel in FanChannel::ALL {
        if let Err(e) = output.set_duty(channel, 0.0) {
            error!("Failed to stop {} fan: {e:#}", channel.name());
        }
        state.set_duty(channel, 0.0);
    }
}
