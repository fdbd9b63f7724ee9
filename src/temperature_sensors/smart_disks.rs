use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use log::{debug, warn};
use tokio::{sync::Mutex, time::Instant};

use super::TemperatureUnit;
use crate::{app_context::SharedState, drivers::shell::Shell};

/// Shown for a disk whose temperature cannot be read.
pub const UNREADABLE: &str = "----";

const LIST_DISKS: &str = "lsblk -d | grep -E '^sd' | awk '{print $1}'";

/// Temperature of one disk as shown on the display.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskTemperature {
    pub disk: String,
    /// Formatted reading, or [`UNREADABLE`].
    pub text: String,
}

/// SMART temperatures of the `sd*` disks and their running average.
///
/// The fan loop and the disk temperature page share one instance so both
/// see the same poll and the same average.
pub struct DiskTemperatures {
    shell: Arc<dyn Shell>,
    state: Arc<SharedState>,
    unit: TemperatureUnit,
    last_poll: Mutex<Option<Instant>>,
}

impl DiskTemperatures {
    pub fn new(shell: Arc<dyn Shell>, state: Arc<SharedState>, unit: TemperatureUnit) -> Self {
        Self {
            shell,
            state,
            unit,
            last_poll: Mutex::new(None),
        }
    }

    /// Reads every disk and stores the new average in the shared state.
    ///
    /// Unreadable disks still count in the divisor.
    pub async fn poll(&self) -> Vec<DiskTemperature> {
        let mut last_poll = self.last_poll.lock().await;

        let disks = match self.shell.output(LIST_DISKS).await {
            Ok(out) => {
                let mut disks: Vec<String> = out
                    .lines()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect();
                disks.sort();
                disks
            }
            Err(e) => {
                warn!("Cannot list disks: {e:#}");
                Vec::new()
            }
        };

        let readings = join_all(disks.iter().map(|disk| self.read_celsius(disk))).await;

        let mut sum = 0.0f32;
        let mut temps = Vec::with_capacity(disks.len());
        for (disk, reading) in disks.into_iter().zip(readings) {
            let text = match reading {
                Some(celsius) => {
                    sum += celsius;
                    self.unit.format_whole(celsius)
                }
                None => UNREADABLE.to_string(),
            };
            temps.push(DiskTemperature { disk, text });
        }

        let average = if temps.is_empty() {
            0.0
        } else {
            sum / temps.len() as f32
        };
        let average = self.unit.convert(average);
        debug!("Disk temperature average {average:.1} over {} disks", temps.len());

        self.state.set_disk_temp_average(average);
        *last_poll = Some(Instant::now());
        temps
    }

    /// Returns the average, polling first when the last poll is older than `delay`.
    pub async fn average_throttled(&self, delay: Duration) -> f32 {
        let stale = match *self.last_poll.lock().await {
            Some(at) => at.elapsed() > delay,
            None => true,
        };
        if stale {
            self.poll().await;
        }
        self.state.disk_temp_average()
    }

    async fn read_celsius(&self, disk: &str) -> Option<f32> {
        let cmd = format!("smartctl -A /dev/{disk} | grep -E '^194' | awk '{{print $10}}'");
        match self.shell.output(&cmd).await {
            Ok(out) => out.trim().parse().ok(),
            Err(e) => {
                debug!("smartctl failed for {disk}: {e:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, drivers::shell::MockShell};
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    fn shared() -> Arc<SharedState> {
        Arc::new(SharedState::new(Arc::new(Config::default())))
    }

    fn shell_with_disks() -> MockShell {
        let mut shell = MockShell::new();
        shell.expect_output().returning(|cmd| {
            if cmd.starts_with("lsblk") {
                Ok("sdb\nsda\nsdc".to_string())
            } else if cmd.contains("/dev/sda ") {
                Ok("34".to_string())
            } else if cmd.contains("/dev/sdb ") {
                Ok("40".to_string())
            } else {
                Ok(String::new())
            }
        });
        shell
    }

    #[tokio::test]
    async fn unreadable_disk_counts_in_divisor() {
        let state = shared();
        let disks = DiskTemperatures::new(
            Arc::new(shell_with_disks()),
            state.clone(),
            TemperatureUnit::Celsius,
        );

        let temps = disks.poll().await;

        assert_eq!(
            temps,
            vec![
                DiskTemperature { disk: "sda".into(), text: "34°C".into() },
                DiskTemperature { disk: "sdb".into(), text: "40°C".into() },
                DiskTemperature { disk: "sdc".into(), text: UNREADABLE.into() },
            ]
        );
        assert_eq!(state.disk_temp_average(), 74.0 / 3.0);
    }

    #[tokio::test]
    async fn fahrenheit_applies_after_average() {
        let state = shared();
        let disks = DiskTemperatures::new(
            Arc::new(shell_with_disks()),
            state.clone(),
            TemperatureUnit::Fahrenheit,
        );

        let temps = disks.poll().await;

        assert_eq!(temps[0].text, "93°F");
        let expected = (74.0f32 / 3.0) * 1.8 + 32.0;
        assert!((state.disk_temp_average() - expected).abs() < 1e-3);
    }

    #[tokio::test]
    async fn no_disks_gives_zero_average() {
        let state = shared();
        state.set_disk_temp_average(50.0);
        let mut shell = MockShell::new();
        shell
            .expect_output()
            .returning(|_| Err(anyhow!("lsblk: not found")));
        let disks = DiskTemperatures::new(Arc::new(shell), state.clone(), TemperatureUnit::Celsius);

        assert!(disks.poll().await.is_empty());
        assert_eq!(state.disk_temp_average(), 0.0);
    }

    #[tokio::test]
    async fn throttled_average_polls_once_per_delay() {
        let state = shared();
        let mut shell = MockShell::new();
        shell
            .expect_output()
            .withf(|cmd| cmd.starts_with("lsblk"))
            .times(1)
            .returning(|_| Ok("sda".to_string()));
        shell
            .expect_output()
            .withf(|cmd| cmd.starts_with("smartctl"))
            .times(1)
            .returning(|_| Ok("36".to_string()));
        let disks = DiskTemperatures::new(Arc::new(shell), state, TemperatureUnit::Celsius);

        assert_eq!(disks.average_throttled(Duration::from_secs(60)).await, 36.0);
        assert_eq!(disks.average_throttled(Duration::from_secs(60)).await, 36.0);
    }
}
