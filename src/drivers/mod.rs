//! Hardware seams of the SATA HAT and their host implementations.

pub mod fan_pwm;
pub mod gpio;
pub mod panel;
pub mod shell;
pub mod sysfs;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use fan_pwm::{FanOutput, open_fan_output};
use gpio::{DefaultGpio, GpioPort};
use panel::{HeadlessPanel, Panel};
use shell::{Shell, SystemShell};
use sysfs::Sysfs;

/// Everything the daemon talks to outside the process.
pub struct Hardware {
    pub gpio: Arc<dyn GpioPort>,
    pub fans: Arc<dyn FanOutput>,
    pub shell: Arc<dyn Shell>,
    pub sysfs: Sysfs,
    /// Taken by the display subsystem; `None` on boards without a display.
    pub panel: Option<Box<dyn Panel>>,
}

impl Hardware {
    /// Opens the board's pins, fan outputs and display.
    pub fn detect(config: &Config) -> Result<Self> {
        let gpio: Arc<dyn GpioPort> =
            Arc::new(DefaultGpio::new().context("Failed to open GPIO")?);
        let fans = open_fan_output(Arc::clone(&gpio));
        let panel: Option<Box<dyn Panel>> = if config.oled.enabled {
            Some(Box::new(HeadlessPanel::new()))
        } else {
            None
        };

        Ok(Self {
            gpio,
            fans,
            shell: Arc::new(SystemShell),
            sysfs: Sysfs::default(),
            panel,
        })
    }
}
