//! OLED status display: pages, their rotation and the fixed screens shown at
//! start and exit.

pub mod frame;
pub mod pages;
pub mod raster;
pub mod scheduler;

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::AsyncWriteExt;

use crate::drivers::{panel::Panel, shell::Shell, sysfs::Sysfs};
use frame::{DisplayLock, DrawRecord};

/// Lines the display and the board sensor need in the boot configuration.
pub const BOOT_CONFIG_LINES: [&str; 2] = ["dtoverlay=w1-gpio", "dtparam=i2c1=on"];
/// Kernel modules loaded before retrying the display.
pub const KERNEL_MODULES: [&str; 3] = ["w1-gpio", "w1-therm", "i2c-dev"];

const MODULE_SETTLE: Duration = Duration::from_millis(200);
const GOODBYE_HOLD: Duration = Duration::from_secs(2);

pub fn welcome_screen() -> Vec<DrawRecord> {
    vec![
        DrawRecord::new((0, 0), "ROCKPi SATA HAT", 14),
        DrawRecord::new((32, 16), "Loading...", 12),
    ]
}

pub fn goodbye_screen() -> Vec<DrawRecord> {
    vec![DrawRecord::new((32, 8), "Good Bye ~", 14)]
}

/// Shows the splash screen.
pub async fn welcome(lock: &DisplayLock) -> Result<()> {
    lock.lock().await.show(welcome_screen())
}

/// Shows the farewell screen, holds it, then blanks the panel.
pub async fn goodbye(lock: &DisplayLock) -> Result<()> {
    let mut renderer = lock.lock().await;
    renderer.show(goodbye_screen())?;
    tokio::time::sleep(GOODBYE_HOLD).await;
    renderer.blank()
}

/// Enables the w1 and i2c interfaces in the boot configuration and loads
/// their modules.
///
/// Appends only the lines that are missing. Module loading failures are
/// logged; the caller finds out on the retry.
pub async fn recover_kernel_interfaces(sysfs: &Sysfs, shell: &dyn Shell) -> Result<()> {
    let path = sysfs.boot_config();
    let current = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let missing: Vec<&str> = BOOT_CONFIG_LINES
        .iter()
        .copied()
        .filter(|line| !current.lines().any(|l| l.trim() == *line))
        .collect();

    if !missing.is_empty() {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut addition = String::new();
        if !current.is_empty() && !current.ends_with('\n') {
            addition.push('\n');
        }
        for line in &missing {
            addition.push_str(line);
            addition.push('\n');
        }
        file.write_all(addition.as_bytes())
            .await
            .with_context(|| format!("Failed to update {}", path.display()))?;
        info!("Added {} to {}", missing.join(", "), path.display());
    }

    for module in KERNEL_MODULES {
        if let Err(e) = shell.call(&format!("modprobe {module}")).await {
            warn!("Failed to load {module}: {e:#}");
        }
    }
    tokio::time::sleep(MODULE_SETTLE).await;
    Ok(())
}

/// Initializes the panel, repairing the kernel interfaces and retrying once
/// on failure.
pub async fn init_panel_with_recovery(
    panel: &mut dyn Panel,
    sysfs: &Sysfs,
    shell: &dyn Shell,
) -> Result<()> {
    let Err(first) = panel.begin() else {
        return Ok(());
    };
    warn!("Display init failed: {first:#}; enabling kernel interfaces");

    recover_kernel_interfaces(sysfs, shell).await?;
    panel
        .begin()
        .context("Display init failed after enabling kernel interfaces")?;
    panel.clear()
}
