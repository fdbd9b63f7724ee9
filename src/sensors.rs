use anyhow::Result;
use async_trait::async_trait;

/// One temperature probe, in degrees Celsius.
#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    async fn read_temperature(&self) -> Result<f32>;

    fn sensor_name(&self) -> &'static str;
}

/// Temperatures the fans are driven by, in the configured unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    /// Hottest of the board sensor and the processor.
    pub system: f32,
    /// Disk average, or `system` when disk aggregation is off.
    pub disk: f32,
}

/// Produces a fresh [`TemperatureReading`]; never fails, fallbacks included.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn read(&self) -> TemperatureReading;
}
