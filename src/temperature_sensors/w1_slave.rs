use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::info;
use tokio::sync::OnceCell;

use crate::{drivers::sysfs::Sysfs, sensors::TemperatureSensor};

/// DS18B20 on the one-wire bus of the top board.
///
/// The slave file is looked up once; the result, found or not, is kept for
/// the lifetime of the process.
pub struct W1SlaveSensor {
    sysfs: Sysfs,
    path: OnceCell<Option<PathBuf>>,
}

impl W1SlaveSensor {
    pub fn new(sysfs: Sysfs) -> Self {
        Self {
            sysfs,
            path: OnceCell::new(),
        }
    }

    async fn resolve(&self) -> Option<&PathBuf> {
        self.path
            .get_or_init(|| async {
                let found = find_slave(&self.sysfs).await;
                if let Some(path) = &found {
                    info!("Using one-wire sensor {}", path.display());
                }
                found
            })
            .await
            .as_ref()
    }
}

/// First `28*/w1_slave` under the one-wire device directory.
async fn find_slave(sysfs: &Sysfs) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(sysfs.w1_devices()).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with("28") {
            let slave = entry.path().join("w1_slave");
            if tokio::fs::try_exists(&slave).await.unwrap_or(false) {
                candidates.push(slave);
            }
        }
    }
    candidates.sort();
    candidates.into_iter().next()
}

/// Extracts the `t=<millidegrees>` value ending the slave file.
pub fn parse_w1_slave(content: &str) -> Result<f32> {
    let (_, raw) = content
        .trim_end()
        .rsplit_once("t=")
        .ok_or_else(|| anyhow!("no t= field in w1_slave"))?;
    let milli: i64 = raw
        .parse()
        .with_context(|| format!("bad w1_slave temperature {raw:?}"))?;
    Ok(milli as f32 / 1000.0)
}

#[async_trait]
impl TemperatureSensor for W1SlaveSensor {
    async fn read_temperature(&self) -> Result<f32> {
        let path = self
            .resolve()
            .await
            .ok_or_else(|| anyhow!("no one-wire sensor found"))?;
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_w1_slave(&content)
    }

    fn sensor_name(&self) -> &'static str {
        "w1"
    }
}
