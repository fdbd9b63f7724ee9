//! Human-readable host statistics for the status pages.
//!
//! Most values come pre-formatted from shell one-liners; throughput is
//! computed here by differencing kernel counters between two samples.

use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use log::debug;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    config::Config,
    drivers::{shell::Shell, sysfs::Sysfs},
};

const UPTIME: &str = "echo Up: $(uptime -p | sed 's/ years,/y/g;s/ year,/y/g;s/ months,/m/g;s/ month,/m/g;s/ weeks,/w/g;s/ week,/w/g;s/ days,/d/g;s/ day,/d/g;s/ hours,/h/g;s/ hour,/h/g;s/ minutes/m/g;s/ minute/m/g' | cut -d ' ' -f2-)";
const IP: &str = "hostname -I | awk '{printf \"IP %s\", $1}'";
const CPU_LOAD: &str = "uptime | tr , . | awk '{printf \"CPU Load: %.2f%%\", $(NF-2)}'";
const MEMORY: &str = "free -m | awk 'NR==2{printf \"Mem: %s/%s MB\", $3,$2}'";
const ROOT_USAGE: &str = "df -h | awk '$NF==\"/\"{printf \"%s\", $5}'";
const LINKS: &str = "ip -o link show | awk '{print $2,$3}'";

/// How long disk usage figures are reused.
pub const DISK_USAGE_TTL: Duration = Duration::from_secs(30);

const MIB: f64 = 1024.0 * 1024.0;

/// Transfer rate in MB/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rate {
    pub rx: f64,
    pub tx: f64,
}

/// Raw counter sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub rx: u64,
    pub tx: u64,
    pub at: Instant,
}

/// Rate between two samples; `unit` is the size of one counted item in bytes.
pub fn rate(prev: &Sample, cur: &Sample, unit: u64) -> Rate {
    let secs = cur.at.duration_since(prev.at).as_secs_f64();
    if secs <= 0.0 {
        return Rate::default();
    }
    let per_sec = |a: u64, b: u64| b.saturating_sub(a) as f64 * unit as f64 / secs / MIB;
    Rate {
        rx: per_sec(prev.rx, cur.rx),
        tx: per_sec(prev.tx, cur.tx),
    }
}

/// Removes the partition number from an `sd*` device name.
pub fn strip_partition(device: &str) -> &str {
    if device.contains("sd") {
        device.trim_end_matches(|c: char| c.is_ascii_digit())
    } else {
        device
    }
}

#[derive(Default)]
struct Counters {
    interfaces: HashMap<String, Sample>,
    disks: HashMap<String, Sample>,
    sector_sizes: HashMap<String, u64>,
}

pub struct SystemInfo {
    shell: Arc<dyn Shell>,
    sysfs: Sysfs,
    config: Arc<Config>,
    usage_cache: Mutex<Option<(Instant, Vec<(String, String)>)>>,
    counters: Mutex<Counters>,
}

impl SystemInfo {
    pub fn new(shell: Arc<dyn Shell>, sysfs: Sysfs, config: Arc<Config>) -> Self {
        Self {
            shell,
            sysfs,
            config,
            usage_cache: Mutex::new(None),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub async fn uptime(&self) -> Result<String> {
        self.shell.output(UPTIME).await
    }

    pub async fn ip(&self) -> Result<String> {
        self.shell.output(IP).await
    }

    pub async fn cpu_load(&self) -> Result<String> {
        self.shell.output(CPU_LOAD).await
    }

    pub async fn memory(&self) -> Result<String> {
        self.shell.output(MEMORY).await
    }

    /// Interfaces to show throughput for.
    ///
    /// `auto` expands to every interface the kernel reports as up.
    pub async fn interfaces(&self) -> Result<Vec<String>> {
        let configured = &self.config.network.interfaces;
        if !(configured.len() == 1 && configured[0] == "auto") {
            return Ok(configured.clone());
        }

        let links = self.shell.output(LINKS).await?;
        let mut up: Vec<String> = links
            .lines()
            .filter_map(|line| line.split_once(": "))
            .filter(|(_, flags)| flags.contains("UP"))
            .map(|(name, _)| name.trim().to_string())
            .collect();
        up.sort();
        Ok(up)
    }

    /// Devices mounted at `mount_points`, sorted.
    pub async fn disks_for(&self, mount_points: &[String]) -> Vec<String> {
        let mut disks = Vec::new();
        for mount in mount_points {
            let cmd = format!("df -Bg | awk '$6==\"{mount}\" {{printf \"%s\", $1}}'");
            match self.shell.output(&cmd).await {
                Ok(out) => {
                    let device = out.rsplit('/').next().unwrap_or_default();
                    if !device.is_empty() {
                        disks.push(device.to_string());
                    }
                }
                Err(e) => debug!("No device for {mount}: {e:#}"),
            }
        }
        disks.sort();
        disks
    }

    /// Whole disks whose throughput is shown.
    pub async fn io_disks(&self) -> Vec<String> {
        let mut disks: Vec<String> = self
            .disks_for(&self.config.disk.io_usage_mnt_points)
            .await
            .iter()
            .map(|d| strip_partition(d).to_string())
            .collect();
        disks.dedup();
        disks
    }

    /// `("root", "23%")` followed by each configured mount's device.
    pub async fn disk_usage(&self) -> Result<Vec<(String, String)>> {
        let mut cache = self.usage_cache.lock().await;
        if let Some((at, usage)) = cache.as_ref() {
            if at.elapsed() <= DISK_USAGE_TTL {
                return Ok(usage.clone());
            }
        }

        let mut usage = vec![("root".to_string(), self.shell.output(ROOT_USAGE).await?)];
        for device in self.disks_for(&self.config.disk.space_usage_mnt_points).await {
            let cmd = format!("df -Bg | awk '$1==\"/dev/{device}\" {{printf \"%s\", $5}}'");
            let used = self.shell.output(&cmd).await.unwrap_or_default();
            usage.push((device, used));
        }

        *cache = Some((Instant::now(), usage.clone()));
        Ok(usage)
    }

    async fn interface_sample(&self, interface: &str) -> Result<Sample> {
        let rx = self
            .sysfs
            .read_u64(&self.sysfs.net_statistic(interface, "rx_bytes"))
            .await?;
        let tx = self
            .sysfs
            .read_u64(&self.sysfs.net_statistic(interface, "tx_bytes"))
            .await?;
        Ok(Sample {
            rx,
            tx,
            at: Instant::now(),
        })
    }

    async fn disk_sample(&self, disk: &str) -> Result<Sample> {
        let path = self.sysfs.block_stat(disk);
        let stat = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let columns: Vec<&str> = stat.split_whitespace().collect();
        let column = |i: usize| -> Result<u64> {
            columns
                .get(i)
                .with_context(|| format!("short stat line for {disk}"))?
                .parse()
                .with_context(|| format!("bad stat column {i} for {disk}"))
        };
        Ok(Sample {
            rx: column(2)?,
            tx: column(6)?,
            at: Instant::now(),
        })
    }

    /// Rate since this interface's previous sample; zero on the first one.
    pub async fn interface_rate(&self, interface: &str) -> Result<Rate> {
        let sample = self.interface_sample(interface).await?;
        let mut counters = self.counters.lock().await;
        let rate = counters
            .interfaces
            .get(interface)
            .map(|prev| rate(prev, &sample, 1))
            .unwrap_or_default();
        counters.interfaces.insert(interface.to_string(), sample);
        Ok(rate)
    }

    /// Rate since this disk's previous sample, scaled by its sector size.
    pub async fn disk_rate(&self, disk: &str) -> Result<Rate> {
        let disk = strip_partition(disk);
        let known = self.counters.lock().await.sector_sizes.get(disk).copied();
        let sector = match known {
            Some(size) => size,
            None => {
                let size = self.sysfs.read_u64(&self.sysfs.sector_size(disk)).await?;
                self.counters
                    .lock()
                    .await
                    .sector_sizes
                    .insert(disk.to_string(), size);
                size
            }
        };

        let sample = self.disk_sample(disk).await?;
        let mut counters = self.counters.lock().await;
        let rate = counters
            .disks
            .get(disk)
            .map(|prev| rate(prev, &sample, sector))
            .unwrap_or_default();
        counters.disks.insert(disk.to_string(), sample);
        Ok(rate)
    }

    /// Takes a first sample of every monitored interface and disk.
    pub async fn prime_rates(&self) {
        match self.interfaces().await {
            Ok(interfaces) => {
                for interface in interfaces {
                    if let Err(e) = self.interface_rate(&interface).await {
                        debug!("Cannot sample {interface}: {e:#}");
                    }
                }
            }
            Err(e) => debug!("Cannot list interfaces: {e:#}"),
        }
        for disk in self.io_disks().await {
            if let Err(e) = self.disk_rate(&disk).await {
                debug!("Cannot sample {disk}: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::shell::MockShell;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn info_with(shell: MockShell, config: Config, root: &std::path::Path) -> SystemInfo {
        SystemInfo::new(Arc::new(shell), Sysfs::new(root), Arc::new(config))
    }

    #[test]
    fn rate_scales_by_unit_and_time() {
        let at = Instant::now();
        let prev = Sample { rx: 0, tx: 1000, at };
        let cur = Sample {
            rx: 2 * 1024 * 1024,
            tx: 1000,
            at: at + Duration::from_secs(2),
        };
        assert_eq!(rate(&prev, &cur, 1), Rate { rx: 1.0, tx: 0.0 });
        assert_eq!(rate(&prev, &cur, 512).rx, 512.0);
        assert_eq!(rate(&cur, &cur, 1), Rate::default());
    }

    #[test]
    fn partition_numbers_are_stripped_for_sd_only() {
        assert_eq!(strip_partition("sda1"), "sda");
        assert_eq!(strip_partition("sdb12"), "sdb");
        assert_eq!(strip_partition("sdc"), "sdc");
        assert_eq!(strip_partition("mmcblk0p1"), "mmcblk0p1");
    }

    #[tokio::test]
    async fn auto_interfaces_are_the_up_links() {
        let mut shell = MockShell::new();
        shell.expect_output().returning(|_| {
            Ok("lo: <LOOPBACK,UP,LOWER_UP>\n\
                wlan0: <BROADCAST,MULTICAST>\n\
                eth0: <BROADCAST,MULTICAST,UP,LOWER_UP>"
                .to_string())
        });
        let mut config = Config::default();
        config.network.interfaces = vec!["auto".into()];
        let dir = TempDir::new().unwrap();

        let info = info_with(shell, config, dir.path());
        assert_eq!(info.interfaces().await.unwrap(), vec!["eth0", "lo"]);
    }

    #[tokio::test]
    async fn explicit_interfaces_skip_the_shell() {
        let mut config = Config::default();
        config.network.interfaces = vec!["eth0".into(), "wlan0".into()];
        let dir = TempDir::new().unwrap();

        let info = info_with(MockShell::new(), config, dir.path());
        assert_eq!(info.interfaces().await.unwrap(), vec!["eth0", "wlan0"]);
    }

    #[tokio::test]
    async fn disk_usage_is_cached() {
        let mut shell = MockShell::new();
        shell
            .expect_output()
            .withf(|cmd| cmd.starts_with("df -h"))
            .times(1)
            .returning(|_| Ok("41%".to_string()));
        shell
            .expect_output()
            .withf(|cmd| cmd.contains("$6==\"/mnt/data\""))
            .times(1)
            .returning(|_| Ok("/dev/sda1".to_string()));
        shell
            .expect_output()
            .withf(|cmd| cmd.contains("/dev/sda1"))
            .times(1)
            .returning(|_| Ok("7%".to_string()));
        let mut config = Config::default();
        config.disk.space_usage_mnt_points = vec!["/mnt/data".into()];
        let dir = TempDir::new().unwrap();
        let info = info_with(shell, config, dir.path());

        let expected = vec![
            ("root".to_string(), "41%".to_string()),
            ("sda1".to_string(), "7%".to_string()),
        ];
        assert_eq!(info.disk_usage().await.unwrap(), expected);
        assert_eq!(info.disk_usage().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn interface_rate_needs_two_samples() {
        let dir = TempDir::new().unwrap();
        let sysfs = Sysfs::new(dir.path());
        let rx = sysfs.net_statistic("eth0", "rx_bytes");
        std::fs::create_dir_all(rx.parent().unwrap()).unwrap();
        std::fs::write(&rx, "1000\n").unwrap();
        std::fs::write(sysfs.net_statistic("eth0", "tx_bytes"), "5000\n").unwrap();

        let info = info_with(MockShell::new(), Config::default(), dir.path());
        assert_eq!(info.interface_rate("eth0").await.unwrap(), Rate::default());

        std::fs::write(&rx, "999999999\n").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = info.interface_rate("eth0").await.unwrap();
        assert!(second.rx > 0.0);
        assert_eq!(second.tx, 0.0);
    }

    #[tokio::test]
    async fn disk_rate_reads_block_stat() {
        let dir = TempDir::new().unwrap();
        let sysfs = Sysfs::new(dir.path());
        let queue = sysfs.sector_size("sda");
        std::fs::create_dir_all(queue.parent().unwrap()).unwrap();
        std::fs::write(&queue, "512\n").unwrap();
        let stat = sysfs.block_stat("sda");
        std::fs::write(&stat, "  100 0 2000 0 50 0 4000 0 0 0 0\n").unwrap();

        let info = info_with(MockShell::new(), Config::default(), dir.path());
        assert_eq!(info.disk_rate("sda1").await.unwrap(), Rate::default());

        std::fs::write(&stat, "  100 0 4048 0 50 0 4000 0 0 0 0\n").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = info.disk_rate("sda").await.unwrap();
        assert!(second.rx > 0.0);
        assert_eq!(second.tx, 0.0);
    }

    #[tokio::test]
    async fn missing_counters_are_errors() {
        let dir = TempDir::new().unwrap();
        let info = info_with(MockShell::new(), Config::default(), dir.path());
        assert!(info.interface_rate("eth9").await.is_err());
        assert!(info.disk_rate("sdz").await.is_err());
    }
}
