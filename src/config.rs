//! Configuration management for the rockpi-sata daemon.
//!
//! The configuration is a YAML document split into sections (`fan`, `key`,
//! `time`, `slider`, `oled`, `disk`, `network`). It is loaded once at startup
//! and handed to every worker as an immutable [`Arc<Config>`] snapshot.
//!
//! Loading is lenient: a missing file or broken YAML yields the defaults, and
//! a bad value for a single key falls back to that key's default without
//! discarding the rest of its section.

use crate::fan_curve::{CurvePolicy, FanChannel, FanLevels};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_yaml::{Mapping, Value};
use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "ROCKPI_SATA_CONFIG";

/// System-wide configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rockpi-sata/config.yml";

/// Main configuration structure.
///
/// # Example
///
/// ```yaml
/// fan:
///   lv0: 35
///   lv1: 40
///   lv2: 45
///   lv3: 50
///   linear: true
/// key:
///   click: slider
///   twice: switch
///   press: none
/// slider:
///   auto: true
///   time: 10
///   refresh: 2
/// disk:
///   io_usage_mnt_points: /mnt/data | /mnt/backup
///   disks_temp: true
/// network:
///   interfaces: [eth0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fan: FanCfg,
    pub key: KeyCfg,
    pub time: TimeCfg,
    pub slider: SliderCfg,
    pub oled: OledCfg,
    pub disk: DiskCfg,
    pub network: NetworkCfg,
}

/// Fan thresholds and policy.
///
/// `lv0..lv3` are shared by both channels; the `c` (cpu fan) and `f`
/// (top-board fan) suffixed keys override them per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanCfg {
    pub lv0: f32,
    pub lv1: f32,
    pub lv2: f32,
    pub lv3: f32,
    pub lv0c: Option<f32>,
    pub lv1c: Option<f32>,
    pub lv2c: Option<f32>,
    pub lv3c: Option<f32>,
    pub lv0f: Option<f32>,
    pub lv1f: Option<f32>,
    pub lv2f: Option<f32>,
    pub lv3f: Option<f32>,
    /// Interpolate inside a bucket instead of using its fixed percentage.
    pub linear: bool,
    /// Drive the top-board fan from the disk temperature average.
    pub temp_disks: bool,
    /// Whether a cpu fan is wired to PWM channel 0.
    pub cpu_channel: bool,
}

/// Gesture to action names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCfg {
    pub click: String,
    pub twice: String,
    pub press: String,
}

/// Button timing windows in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeCfg {
    pub twice: f64,
    pub press: f64,
}

/// Page rotation settings, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderCfg {
    pub auto: bool,
    pub time: f64,
    pub refresh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OledCfg {
    pub enabled: bool,
    pub rotate: bool,
    #[serde(rename = "f-temp")]
    pub f_temp: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskCfg {
    #[serde(deserialize_with = "string_list::deserialize")]
    pub space_usage_mnt_points: Vec<String>,
    #[serde(deserialize_with = "string_list::deserialize")]
    pub io_usage_mnt_points: Vec<String>,
    pub disks_temp: bool,
    pub disable_drives_on_exit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkCfg {
    /// Interface names, or the single entry `auto` for every interface that is up.
    #[serde(deserialize_with = "string_list::deserialize")]
    pub interfaces: Vec<String>,
}

impl Default for FanCfg {
    fn default() -> Self {
        Self {
            lv0: 35.0,
            lv1: 40.0,
            lv2: 45.0,
            lv3: 50.0,
            lv0c: None,
            lv1c: None,
            lv2c: None,
            lv3c: None,
            lv0f: None,
            lv1f: None,
            lv2f: None,
            lv3f: None,
            linear: false,
            temp_disks: false,
            cpu_channel: true,
        }
    }
}

impl Default for KeyCfg {
    fn default() -> Self {
        Self {
            click: "slider".to_string(),
            twice: "switch".to_string(),
            press: "none".to_string(),
        }
    }
}

impl Default for TimeCfg {
    fn default() -> Self {
        Self {
            twice: 0.7,
            press: 1.8,
        }
    }
}

impl Default for SliderCfg {
    fn default() -> Self {
        Self {
            auto: true,
            time: 10.0,
            refresh: 0.0,
        }
    }
}

impl Default for OledCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate: false,
            f_temp: false,
        }
    }
}

impl FanCfg {
    /// Thresholds for a channel, with the per-channel overrides applied.
    pub fn levels(&self, channel: FanChannel) -> FanLevels {
        let overrides = match channel {
            FanChannel::Cpu => [self.lv0c, self.lv1c, self.lv2c, self.lv3c],
            FanChannel::Disk => [self.lv0f, self.lv1f, self.lv2f, self.lv3f],
        };
        let common = [self.lv0, self.lv1, self.lv2, self.lv3];
        let mut thresholds = common;
        for (slot, value) in thresholds.iter_mut().zip(overrides) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        FanLevels { thresholds }
    }

    pub fn policy(&self) -> CurvePolicy {
        if self.linear {
            CurvePolicy::Linear
        } else {
            CurvePolicy::Quantized
        }
    }
}

impl SliderCfg {
    /// Auto-advance interval; zero means the timer idles.
    pub fn interval(&self) -> Duration {
        secs(self.time)
    }

    /// Redraw period; zero disables the refresh timer.
    pub fn refresh_period(&self) -> Duration {
        secs(self.refresh)
    }
}

impl Config {
    /// Parses a YAML document, falling back to defaults key by key.
    pub fn from_yaml_str(content: &str) -> Self {
        let root = match serde_yaml::from_str::<Value>(content) {
            Ok(Value::Mapping(root)) => root,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                warn!("Config root is not a mapping, using defaults");
                Mapping::new()
            }
            Err(e) => {
                warn!("Config is not valid YAML ({e}), using defaults");
                Mapping::new()
            }
        };

        let section = |name: &str| root.get(Value::String(name.to_string()));

        Self {
            fan: lenient_section("fan", section("fan")),
            key: lenient_section("key", section("key")),
            time: lenient_section("time", section("time")),
            slider: lenient_section("slider", section("slider")),
            oled: lenient_section("oled", section("oled")),
            disk: lenient_section("disk", section("disk")),
            network: lenient_section("network", section("network")),
        }
    }

    /// Checks values that parse fine but make no sense together.
    pub fn validate(&self) -> Result<()> {
        for channel in FanChannel::ALL {
            let t = self.fan.levels(channel).thresholds;
            if t.windows(2).any(|w| w[0] >= w[1]) {
                anyhow::bail!(
                    "Fan thresholds for the {} channel are not ascending: {:?}",
                    channel.name(),
                    t
                );
            }
        }
        if self.time.twice <= 0.0 || self.time.press <= 0.0 {
            anyhow::bail!(
                "Button timings must be positive (twice={}, press={})",
                self.time.twice,
                self.time.press
            );
        }
        if self.slider.time < 0.0 || self.slider.refresh < 0.0 {
            anyhow::bail!("Slider durations cannot be negative");
        }
        Ok(())
    }

    /// How long a disk temperature poll stays fresh.
    ///
    /// With the disk temperature page enabled this is stretched to cover a
    /// full rotation of many pages.
    pub fn disk_poll_delay(&self) -> Duration {
        if self.disk.disks_temp {
            secs(self.slider.time * 16.0)
        } else {
            Duration::from_secs(10)
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Deserializes one section, keeping every key that parses on its own.
fn lenient_section<T>(name: &str, raw: Option<&Value>) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let user = match raw {
        None | Some(Value::Null) => return T::default(),
        Some(Value::Mapping(user)) => user,
        Some(_) => {
            warn!("Config section '{name}' is not a mapping, using defaults");
            return T::default();
        }
    };

    let mut merged = match serde_yaml::to_value(T::default()) {
        Ok(Value::Mapping(defaults)) => defaults,
        _ => return T::default(),
    };

    for (key, value) in user {
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_yaml::from_value::<T>(Value::Mapping(candidate.clone())) {
            Ok(_) => merged = candidate,
            Err(e) => warn!(
                "Config key '{name}.{}' ignored, using default: {e}",
                key.as_str().unwrap_or("?")
            ),
        }
    }

    serde_yaml::from_value(Value::Mapping(merged)).unwrap_or_default()
}

/// Accepts either a YAML list or a `|` separated string.
mod string_list {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
        Empty(()),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = match Raw::deserialize(deserializer)? {
            Raw::List(items) => items,
            Raw::Joined(joined) => joined.split('|').map(str::to_string).collect(),
            Raw::Empty(()) => Vec::new(),
        };
        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let etc = Path::new(DEFAULT_CONFIG_PATH);
    etc.exists().then(|| etc.to_path_buf())
}

/// Owns the configuration snapshot shared by all workers.
///
/// There is no reload: workers keep the snapshot they were started with.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<Config>,
    path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            path,
        }
    }

    /// Loads configuration from file or the standard locations.
    ///
    /// Searches in order:
    /// 1. Provided path parameter (must exist)
    /// 2. `ROCKPI_SATA_CONFIG` environment variable
    /// 3. `/etc/rockpi-sata/config.yml`
    ///
    /// Without any file the defaults are used.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.is_some();
        let Some(config_path) = path.or_else(locate_config) else {
            info!("No configuration file found, using defaults");
            return Ok(Self::new(Config::default(), None));
        };

        let content = match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => content,
            Err(e) if explicit => {
                return Err(e).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                });
            }
            Err(e) => {
                warn!(
                    "Cannot read {} ({e}), using defaults",
                    config_path.display()
                );
                return Ok(Self::new(Config::default(), Some(config_path)));
            }
        };

        info!("Loading config from: {}", config_path.display());
        let config = Config::from_yaml_str(&content);
        if let Err(e) = config.validate() {
            warn!("Suspicious configuration in {}: {e}", config_path.display());
        }

        Ok(Self::new(config, Some(config_path)))
    }

    /// Returns the shared snapshot.
    pub fn get(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Config::from_yaml_str(""), Config::default());
    }

    #[test]
    fn broken_yaml_gives_defaults() {
        assert_eq!(Config::from_yaml_str("fan: [unclosed"), Config::default());
    }

    #[test]
    fn full_document_is_parsed() {
        let config = Config::from_yaml_str(
            r#"
fan:
  lv0: 30
  lv1: 38
  lv2: 46
  lv3: 54
  lv3f: 60
  linear: true
  temp_disks: true
key:
  click: none
  twice: slider
  press: poweroff
time:
  twice: 0.5
  press: 2.0
slider:
  auto: false
  time: 15
  refresh: 2.5
oled:
  rotate: true
  f-temp: true
disk:
  space_usage_mnt_points: /mnt/a | /mnt/b
  io_usage_mnt_points: [/mnt/a]
  disks_temp: true
  disable_drives_on_exit: true
network:
  interfaces: auto
"#,
        );

        assert_eq!(config.fan.lv0, 30.0);
        assert!(config.fan.linear);
        assert!(config.fan.temp_disks);
        assert_eq!(config.key.press, "poweroff");
        assert_eq!(config.time.twice, 0.5);
        assert!(!config.slider.auto);
        assert_eq!(config.slider.refresh_period(), Duration::from_millis(2500));
        assert!(config.oled.rotate);
        assert!(config.oled.f_temp);
        assert_eq!(config.disk.space_usage_mnt_points, vec!["/mnt/a", "/mnt/b"]);
        assert_eq!(config.disk.io_usage_mnt_points, vec!["/mnt/a"]);
        assert!(config.disk.disable_drives_on_exit);
        assert_eq!(config.network.interfaces, vec!["auto"]);
        assert_eq!(
            config.fan.levels(FanChannel::Disk).thresholds,
            [30.0, 38.0, 46.0, 60.0]
        );
        assert_eq!(
            config.fan.levels(FanChannel::Cpu).thresholds,
            [30.0, 38.0, 46.0, 54.0]
        );
    }

    #[test]
    fn bad_key_falls_back_without_losing_its_section() {
        let config = Config::from_yaml_str(
            r#"
fan:
  lv0: hot
  lv1: 41
slider:
  time: "soon"
  refresh: 3
"#,
        );

        assert_eq!(config.fan.lv0, 35.0);
        assert_eq!(config.fan.lv1, 41.0);
        assert_eq!(config.slider.time, 10.0);
        assert_eq!(config.slider.refresh, 3.0);
    }

    #[test]
    fn section_of_wrong_shape_falls_back() {
        let config = Config::from_yaml_str("time: 5\nkey:\n  click: reboot\n");
        assert_eq!(config.time, TimeCfg::default());
        assert_eq!(config.key.click, "reboot");
    }

    #[test]
    fn empty_refresh_means_disabled() {
        let config = Config::from_yaml_str("slider:\n  refresh:\n");
        assert_eq!(config.slider.refresh_period(), Duration::ZERO);
    }

    #[test]
    fn validate_rejects_descending_thresholds() {
        let config = Config::from_yaml_str("fan:\n  lv2: 60\n");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not ascending"));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn disk_poll_delay_follows_slider_when_temps_shown() {
        let mut config = Config::default();
        assert_eq!(config.disk_poll_delay(), Duration::from_secs(10));
        config.disk.disks_temp = true;
        assert_eq!(config.disk_poll_delay(), Duration::from_secs(160));
    }

    #[tokio::test]
    async fn manager_loads_explicit_file() {
        let temp_file = create_temp_config("fan:\n  linear: true\n");
        let manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        assert!(manager.get().fan.linear);
        assert_eq!(manager.path(), Some(temp_file.path()));
    }

    #[tokio::test]
    async fn manager_fails_on_missing_explicit_file() {
        let result = ConfigManager::load(Some(PathBuf::from("/nonexistent/rockpi.yml"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn snapshots_share_one_config() {
        let manager = ConfigManager::new(Config::default(), None);
        let a = manager.get();
        let b = manager.get();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
