use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::{drivers::sysfs::Sysfs, sensors::TemperatureSensor};

/// SoC temperature from `thermal_zone0`.
pub struct ThermalZoneSensor {
    sysfs: Sysfs,
}

impl ThermalZoneSensor {
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }
}

#[async_trait]
impl TemperatureSensor for ThermalZoneSensor {
    async fn read_temperature(&self) -> Result<f32> {
        let path = self.sysfs.thermal_zone();
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let milli: i64 = content
            .trim()
            .parse()
            .with_context(|| format!("Unexpected content in {}", path.display()))?;
        Ok(milli as f32 / 1000.0)
    }

    fn sensor_name(&self) -> &'static str {
        "cpu"
    }
}
