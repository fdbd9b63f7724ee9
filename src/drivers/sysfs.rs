//! Kernel file locations, rooted so tests can point them at a fixture tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Sysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn w1_devices(&self) -> PathBuf {
        self.root.join("sys/bus/w1/devices")
    }

    pub fn thermal_zone(&self) -> PathBuf {
        self.root.join("sys/class/thermal/thermal_zone0/temp")
    }

    pub fn net_statistic(&self, interface: &str, counter: &str) -> PathBuf {
        self.root
            .join("sys/class/net")
            .join(interface)
            .join("statistics")
            .join(counter)
    }

    pub fn block_stat(&self, disk: &str) -> PathBuf {
        self.root.join("sys/block").join(disk).join("stat")
    }

    pub fn sector_size(&self, disk: &str) -> PathBuf {
        self.root
            .join("sys/block")
            .join(disk)
            .join("queue/hw_sector_size")
    }

    pub fn boot_config(&self) -> PathBuf {
        self.root.join("boot/config.txt")
    }

    /// Reads a file holding a single integer.
    pub async fn read_u64(&self, path: &Path) -> Result<u64> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        text.trim()
            .parse()
            .with_context(|| format!("Unexpected content in {}", path.display()))
    }
}
