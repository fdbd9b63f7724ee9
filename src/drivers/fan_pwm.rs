//! Fan outputs: 25 kHz hardware PWM with an on/off fallback.

use std::sync::Arc;

use anyhow::Result;
use log::warn;

use super::gpio::{CPU_FAN_PIN, DISK_FAN_PIN, GpioPort};
use crate::fan_curve::FanChannel;

/// PWM carrier frequency recommended for 4-pin fans.
pub const PWM_FREQUENCY_HZ: f64 = 25_000.0;

/// Writes a duty cycle to a fan channel.
pub trait FanOutput: Send + Sync {
    /// `pct` is in `[0, 100]`.
    fn set_duty(&self, channel: FanChannel, pct: f32) -> Result<()>;

    fn describe(&self) -> &'static str;
}

pub fn channel_pin(channel: FanChannel) -> u8 {
    match channel {
        FanChannel::Cpu => CPU_FAN_PIN,
        FanChannel::Disk => DISK_FAN_PIN,
    }
}

/// Drives the fan pins fully on or off.
///
/// Any non-zero duty turns the fan on.
pub struct OnOffFanOutput {
    gpio: Arc<dyn GpioPort>,
}

impl OnOffFanOutput {
    pub fn new(gpio: Arc<dyn GpioPort>) -> Self {
        Self { gpio }
    }
}

impl FanOutput for OnOffFanOutput {
    fn set_duty(&self, channel: FanChannel, pct: f32) -> Result<()> {
        self.gpio.write(channel_pin(channel), pct > 0.0)
    }

    fn describe(&self) -> &'static str {
        "on/off"
    }
}

#[cfg(feature = "gpio")]
mod hardware {
    use super::*;
    use anyhow::{Context, anyhow};
    use rppal::pwm::{Channel, Polarity, Pwm};

    /// Both fans on the SoC PWM block (PWM0 on GPIO 12, PWM1 on GPIO 13).
    pub struct HardwarePwmOutput {
        cpu: Pwm,
        disk: Pwm,
    }

    impl HardwarePwmOutput {
        pub fn new() -> Result<Self> {
            let open = |channel: Channel| {
                Pwm::with_frequency(channel, PWM_FREQUENCY_HZ, 0.0, Polarity::Normal, true)
                    .with_context(|| format!("Failed to open PWM channel {channel:?}"))
            };
            Ok(Self {
                cpu: open(Channel::Pwm0)?,
                disk: open(Channel::Pwm1)?,
            })
        }
    }

    impl FanOutput for HardwarePwmOutput {
        fn set_duty(&self, channel: FanChannel, pct: f32) -> Result<()> {
            let pwm = match channel {
                FanChannel::Cpu => &self.cpu,
                FanChannel::Disk => &self.disk,
            };
            pwm.set_duty_cycle(f64::from(pct.clamp(0.0, 100.0)) / 100.0)
                .map_err(|e| anyhow!("PWM write on {} channel failed: {e}", channel.name()))
        }

        fn describe(&self) -> &'static str {
            "hardware PWM"
        }
    }
}

#[cfg(feature = "gpio")]
pub use hardware::HardwarePwmOutput;

/// Opens the best available fan output.
///
/// Falls back to on/off control when hardware PWM cannot be opened.
pub fn open_fan_output(gpio: Arc<dyn GpioPort>) -> Arc<dyn FanOutput> {
    #[cfg(feature = "gpio")]
    {
        match HardwarePwmOutput::new() {
            Ok(pwm) => return Arc::new(pwm),
            Err(e) => warn!("{e:#}"),
        }
    }

    warn!("Hardware PWM is not available, using on/off fan control");
    Arc::new(OnOffFanOutput::new(gpio))
}
