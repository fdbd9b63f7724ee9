//! Digital pin access for the SATA HAT.
//!
//! With the `gpio` feature the pins are driven through `rppal`; otherwise an
//! in-memory port is used so the daemon runs on a development host.

use anyhow::Result;

/// Top-board push button. High while released.
pub const BUTTON_PIN: u8 = 17;
/// OLED reset line.
pub const OLED_RESET_PIN: u8 = 23;
/// Power for SATA controllers 0 and 1.
pub const DISK_POWER_PINS: [u8; 2] = [26, 25];
/// Hardware PWM outputs: cpu fan and top-board fan.
pub const CPU_FAN_PIN: u8 = 12;
pub const DISK_FAN_PIN: u8 = 13;

/// Reads and drives single digital pins.
pub trait GpioPort: Send + Sync {
    /// Returns `true` when the pin reads high.
    fn read(&self, pin: u8) -> Result<bool>;

    /// Drives the pin as an output.
    fn write(&self, pin: u8, high: bool) -> Result<()>;
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use anyhow::{Context, anyhow};
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use std::{collections::HashMap, sync::Mutex};

    enum PinHandle {
        Input(InputPin),
        Output(OutputPin),
    }

    /// Raspberry Pi pins through `/dev/gpiomem`.
    ///
    /// A pin is claimed on first use and switched between input and output as
    /// the caller requires. Outputs keep their level when the daemon exits.
    pub struct RaspberryPiGpio {
        gpio: Gpio,
        pins: Mutex<HashMap<u8, PinHandle>>,
    }

    impl RaspberryPiGpio {
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().context("Failed to initialize GPIO")?;
            Ok(Self {
                gpio,
                pins: Mutex::new(HashMap::new()),
            })
        }

        fn claim(&self, pin: u8) -> Result<rppal::gpio::Pin> {
            self.gpio
                .get(pin)
                .with_context(|| format!("Failed to access pin {pin}"))
        }
    }

    impl GpioPort for RaspberryPiGpio {
        fn read(&self, pin: u8) -> Result<bool> {
            let mut pins = self
                .pins
                .lock()
                .map_err(|_| anyhow!("GPIO pin table poisoned"))?;

            if !matches!(pins.get(&pin), Some(PinHandle::Input(_))) {
                pins.remove(&pin);
                let input = self.claim(pin)?.into_input_pullup();
                pins.insert(pin, PinHandle::Input(input));
            }

            match pins.get(&pin) {
                Some(PinHandle::Input(input)) => Ok(input.is_high()),
                _ => Err(anyhow!("Pin {pin} is not configured as input")),
            }
        }

        fn write(&self, pin: u8, high: bool) -> Result<()> {
            let mut pins = self
                .pins
                .lock()
                .map_err(|_| anyhow!("GPIO pin table poisoned"))?;

            if !matches!(pins.get(&pin), Some(PinHandle::Output(_))) {
                pins.remove(&pin);
                let mut output = self.claim(pin)?.into_output();
                output.set_reset_on_drop(false);
                pins.insert(pin, PinHandle::Output(output));
            }

            match pins.get_mut(&pin) {
                Some(PinHandle::Output(output)) => {
                    if high {
                        output.set_high();
                    } else {
                        output.set_low();
                    }
                    Ok(())
                }
                _ => Err(anyhow!("Pin {pin} is not configured as output")),
            }
        }
    }
}

mod memory {
    use super::*;
    use anyhow::anyhow;
    use std::{collections::HashMap, sync::Mutex};

    /// In-memory pin levels.
    ///
    /// Unwritten pins read high, which is the released state of the button.
    #[derive(Debug, Default)]
    pub struct MemoryGpio {
        levels: Mutex<HashMap<u8, bool>>,
    }

    impl MemoryGpio {
        pub fn new() -> Result<Self> {
            Ok(Self::default())
        }

        /// Last level written to `pin`, if any.
        pub fn level(&self, pin: u8) -> Option<bool> {
            self.levels.lock().ok()?.get(&pin).copied()
        }
    }

    impl GpioPort for MemoryGpio {
        fn read(&self, pin: u8) -> Result<bool> {
            let levels = self
                .levels
                .lock()
                .map_err(|_| anyhow!("pin table poisoned"))?;
            Ok(levels.get(&pin).copied().unwrap_or(true))
        }

        fn write(&self, pin: u8, high: bool) -> Result<()> {
            self.levels
                .lock()
                .map_err(|_| anyhow!("pin table poisoned"))?
                .insert(pin, high);
            Ok(())
        }
    }
}

pub use memory::MemoryGpio;
#[cfg(feature = "gpio")]
pub use raspberry_pi::RaspberryPiGpio;

/// Port used by the daemon for this build.
#[cfg(feature = "gpio")]
pub type DefaultGpio = RaspberryPiGpio;
#[cfg(not(feature = "gpio"))]
pub type DefaultGpio = MemoryGpio;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_port_reads_released_by_default() {
        let gpio = MemoryGpio::new().unwrap();
        assert!(gpio.read(BUTTON_PIN).unwrap());
        assert_eq!(gpio.level(BUTTON_PIN), None);
    }

    #[test]
    fn memory_port_reads_back_written_level() {
        let gpio = MemoryGpio::new().unwrap();
        gpio.write(DISK_POWER_PINS[0], true).unwrap();
        gpio.write(BUTTON_PIN, false).unwrap();

        assert_eq!(gpio.level(DISK_POWER_PINS[0]), Some(true));
        assert!(!gpio.read(BUTTON_PIN).unwrap());
    }
}
