//! Status pages and the factories that produce them.
//!
//! Factories run when the page list is regenerated; a page's text is produced
//! only when it is shown, so the figures are current at display time.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::frame::{DrawRecord, lines};
use crate::{
    app_context::SharedState,
    config::Config,
    fan_curve::FanChannel,
    sensors::TemperatureSensor,
    system_info::SystemInfo,
    temperature_sensors::{
        TemperatureUnit, smart_disks::DiskTemperatures, thermal_zone::ThermalZoneSensor,
    },
};

/// One screenful of content.
#[async_trait]
pub trait Page: Send + Sync {
    async fn render(&self) -> Vec<DrawRecord>;

    fn title(&self) -> String;
}

/// Produces zero or more pages of one category.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn pages(&self) -> Vec<Box<dyn Page>>;
}

/// Data sources shared by all pages.
pub struct PageContext {
    pub config: Arc<Config>,
    pub state: Arc<SharedState>,
    pub info: Arc<SystemInfo>,
    pub disks: Arc<DiskTemperatures>,
    pub cpu: ThermalZoneSensor,
    pub unit: TemperatureUnit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageKind {
    SystemInfo,
    FanStatus,
    DiskUsage,
    Interface(String),
    DiskIo(String),
    DiskTemps,
}

struct StatusPage {
    kind: PageKind,
    ctx: Arc<PageContext>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    SystemInfo,
    FanStatus,
    DiskUsage,
    Interfaces,
    DiskIo,
    DiskTemps,
}

struct CategoryFactory {
    category: Category,
    ctx: Arc<PageContext>,
}

/// Factories of every page category, in display order.
pub fn standard_factories(ctx: Arc<PageContext>) -> Vec<Box<dyn PageFactory>> {
    [
        Category::SystemInfo,
        Category::FanStatus,
        Category::DiskUsage,
        Category::Interfaces,
        Category::DiskIo,
        Category::DiskTemps,
    ]
    .into_iter()
    .map(|category| {
        Box::new(CategoryFactory {
            category,
            ctx: Arc::clone(&ctx),
        }) as Box<dyn PageFactory>
    })
    .collect()
}

#[async_trait]
impl PageFactory for CategoryFactory {
    async fn pages(&self) -> Vec<Box<dyn Page>> {
        let ctx = &self.ctx;
        let kinds = match self.category {
            Category::SystemInfo => vec![PageKind::SystemInfo],
            Category::FanStatus => vec![PageKind::FanStatus],
            Category::DiskUsage => vec![PageKind::DiskUsage],
            Category::Interfaces => {
                let interfaces = ctx.info.interfaces().await.unwrap_or_else(|e| {
                    debug!("Cannot list interfaces: {e:#}");
                    Vec::new()
                });
                for interface in &interfaces {
                    if let Err(e) = ctx.info.interface_rate(interface).await {
                        debug!("Cannot sample {interface}: {e:#}");
                    }
                }
                interfaces.into_iter().map(PageKind::Interface).collect()
            }
            Category::DiskIo => {
                let disks = ctx.info.io_disks().await;
                for disk in &disks {
                    if let Err(e) = ctx.info.disk_rate(disk).await {
                        debug!("Cannot sample {disk}: {e:#}");
                    }
                }
                disks.into_iter().map(PageKind::DiskIo).collect()
            }
            Category::DiskTemps if ctx.config.disk.disks_temp => vec![PageKind::DiskTemps],
            Category::DiskTemps => Vec::new(),
        };

        kinds
            .into_iter()
            .map(|kind| {
                Box::new(StatusPage {
                    kind,
                    ctx: Arc::clone(ctx),
                }) as Box<dyn Page>
            })
            .collect()
    }
}

fn or_blank(what: &str, value: anyhow::Result<String>) -> String {
    value.unwrap_or_else(|e| {
        debug!("{what} unavailable: {e:#}");
        String::new()
    })
}

/// Lays out up to four `name value` entries over two lines.
fn pair_lines<S: AsRef<str>>(entries: &[(S, S)]) -> [String; 2] {
    let cell = |(k, v): &(S, S)| format!("{} {}", k.as_ref(), v.as_ref());
    let row = |chunk: &[(S, S)]| chunk.iter().map(cell).collect::<Vec<_>>().join("  ");
    let shown = &entries[..entries.len().min(4)];
    let mut rows = shown.chunks(2).map(row);
    [
        rows.next().unwrap_or_default(),
        rows.next().unwrap_or_default(),
    ]
}

impl StatusPage {
    async fn cpu_temp(&self) -> String {
        let unit = self.ctx.unit;
        match self.ctx.cpu.read_temperature().await {
            Ok(c) => match unit {
                TemperatureUnit::Celsius => format!("CPU Temp: {c:.1}{}", unit.symbol()),
                TemperatureUnit::Fahrenheit => {
                    format!("CPU Temp: {:.0}{}", unit.convert(c), unit.symbol())
                }
            },
            Err(e) => {
                debug!("CPU temperature unavailable: {e:#}");
                "CPU Temp: --".to_string()
            }
        }
    }

    fn fan_speeds(&self) -> String {
        let state = &self.ctx.state;
        if !state.is_running() {
            return "Fan: off".to_string();
        }
        format!(
            "Fan C-{:2.0}%, D-{:2.0}%",
            state.duty(FanChannel::Cpu),
            state.duty(FanChannel::Disk)
        )
    }
}

#[async_trait]
impl Page for StatusPage {
    async fn render(&self) -> Vec<DrawRecord> {
        let info = &self.ctx.info;
        let texts = match &self.kind {
            PageKind::SystemInfo => [
                or_blank("uptime", info.uptime().await),
                self.cpu_temp().await,
                or_blank("ip", info.ip().await),
            ],
            PageKind::FanStatus => [
                self.fan_speeds(),
                or_blank("cpu load", info.cpu_load().await),
                or_blank("memory", info.memory().await),
            ],
            PageKind::DiskUsage => {
                let usage = info.disk_usage().await.unwrap_or_else(|e| {
                    debug!("Disk usage unavailable: {e:#}");
                    Vec::new()
                });
                let first = usage
                    .first()
                    .map(|(k, v)| format!("Disk: {k} {v}"))
                    .unwrap_or_else(|| "Disk:".to_string());
                let [second, third] = pair_lines(usage.get(1..).unwrap_or_default());
                [first, second, third]
            }
            PageKind::Interface(name) => {
                let rate = info.interface_rate(name).await.unwrap_or_else(|e| {
                    debug!("Cannot sample {name}: {e:#}");
                    Default::default()
                });
                [
                    format!("Network ({name}):"),
                    format!("Rx:{:10.6} MB/s", rate.rx),
                    format!("Tx:{:10.6} MB/s", rate.tx),
                ]
            }
            PageKind::DiskIo(name) => {
                let rate = info.disk_rate(name).await.unwrap_or_else(|e| {
                    debug!("Cannot sample {name}: {e:#}");
                    Default::default()
                });
                [
                    format!("Disk ({name}):"),
                    format!("R:{:11.6} MB/s", rate.rx),
                    format!("W:{:11.6} MB/s", rate.tx),
                ]
            }
            PageKind::DiskTemps => {
                let temps: Vec<(String, String)> = self
                    .ctx
                    .disks
                    .poll()
                    .await
                    .into_iter()
                    .map(|t| (t.disk, t.text))
                    .collect();
                let [second, third] = pair_lines(&temps);
                ["Disk Temps:".to_string(), second, third]
            }
        };
        lines(texts)
    }

    fn title(&self) -> String {
        match &self.kind {
            PageKind::SystemInfo => "system".to_string(),
            PageKind::FanStatus => "fan".to_string(),
            PageKind::DiskUsage => "disk usage".to_string(),
            PageKind::Interface(name) => format!("network {name}"),
            PageKind::DiskIo(name) => format!("disk io {name}"),
            PageKind::DiskTemps => "disk temperatures".to_string(),
        }
    }
}
