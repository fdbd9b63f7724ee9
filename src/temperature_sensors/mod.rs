//! Temperature probes of the board and the sampler the fans read from.

pub mod smart_disks;
pub mod thermal_zone;
pub mod w1_slave;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use log::warn;

use crate::{
    config::Config,
    sensors::{TemperatureReading, TemperatureSensor, TemperatureSource},
};
use smart_disks::DiskTemperatures;

/// Reading used when the board's one-wire sensor is absent.
pub const W1_FALLBACK_CELSIUS: f32 = 0.0;
/// Reading used when the processor zone cannot be read.
pub const CPU_FALLBACK_CELSIUS: f32 = 42.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_config(config: &Config) -> Self {
        if config.oled.f_temp {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    pub fn convert(self, celsius: f32) -> f32 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 1.8 + 32.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    /// `35°C` / `95°F`.
    pub fn format_whole(self, celsius: f32) -> String {
        format!("{:.0}{}", self.convert(celsius), self.symbol())
    }
}

/// Sensor whose failures turn into a fixed reading, warned about once.
pub struct WithFallback<S> {
    sensor: S,
    fallback: f32,
    warned: AtomicBool,
}

impl<S: TemperatureSensor> WithFallback<S> {
    pub fn new(sensor: S, fallback: f32) -> Self {
        Self {
            sensor,
            fallback,
            warned: AtomicBool::new(false),
        }
    }

    pub async fn read(&self) -> f32 {
        match self.sensor.read_temperature().await {
            Ok(temp) => temp,
            Err(e) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "{} sensor unavailable ({e:#}), using {:.1}°C",
                        self.sensor.sensor_name(),
                        self.fallback
                    );
                }
                self.fallback
            }
        }
    }
}

/// Board and disk temperatures for the fan loop.
pub struct TemperatureSampler<B, C> {
    board: WithFallback<B>,
    cpu: WithFallback<C>,
    disks: Option<Arc<DiskTemperatures>>,
    disk_poll_delay: Duration,
    unit: TemperatureUnit,
}

impl<B: TemperatureSensor, C: TemperatureSensor> TemperatureSampler<B, C> {
    /// `disks` is only consulted when `fan.temp_disks` is set.
    pub fn new(config: &Config, board: B, cpu: C, disks: Arc<DiskTemperatures>) -> Self {
        Self {
            board: WithFallback::new(board, W1_FALLBACK_CELSIUS),
            cpu: WithFallback::new(cpu, CPU_FALLBACK_CELSIUS),
            disks: config.fan.temp_disks.then_some(disks),
            disk_poll_delay: config.disk_poll_delay(),
            unit: TemperatureUnit::from_config(config),
        }
    }

    /// Hottest of the board sensor and the processor, in the configured unit.
    pub async fn system(&self) -> f32 {
        let board = self.board.read().await;
        let cpu = self.cpu.read().await;
        self.unit.convert(board.max(cpu))
    }
}

#[async_trait]
impl<B: TemperatureSensor, C: TemperatureSensor> TemperatureSource for TemperatureSampler<B, C> {
    async fn read(&self) -> TemperatureReading {
        let system = self.system().await;
        let disk = match &self.disks {
            Some(disks) => disks.average_throttled(self.disk_poll_delay).await,
            None => system,
        };
        TemperatureReading { system, disk }
    }
}
