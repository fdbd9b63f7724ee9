//! Board bring-up, worker wiring and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    actions::{ActionDispatcher, ActionTable},
    app_context::SharedState,
    button::GestureTiming,
    config::{Config, ConfigManager},
    display::{
        self,
        frame::{DisplayLock, Renderer, display_lock},
        pages::{PageContext, standard_factories},
        scheduler::{DisplayClock, DisplayScheduler},
    },
    drivers::{
        Hardware,
        gpio::{DISK_POWER_PINS, OLED_RESET_PIN},
        panel::Panel,
    },
    event,
    fan_controller::turn_off,
    providers::{
        ActionDispatchService, AutoSliderService, ButtonWatchService, DisplayService, FanService,
        RefreshService, ServiceProvider,
    },
    system_info::SystemInfo,
    task_manager::TaskManager,
    temperature_sensors::{
        TemperatureSampler, TemperatureUnit, smart_disks::DiskTemperatures,
        thermal_zone::ThermalZoneSensor, w1_slave::W1SlaveSensor,
    },
};

const RESET_PULSE: Duration = Duration::from_millis(200);
const DISK_POWER_STAGGER: Duration = Duration::from_millis(500);

/// Owns the hardware and every worker for one daemon run.
///
/// Providers start in descending priority: the fan service is critical,
/// everything display related degrades to a warning.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    config: Arc<Config>,
    state: Arc<SharedState>,
    hardware: Hardware,
    display: Option<DisplayLock>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl SystemCoordinator {
    pub fn new(config_manager: &ConfigManager, hardware: Hardware) -> Self {
        let config = config_manager.get();
        Self {
            task_manager: TaskManager::new(),
            state: Arc::new(SharedState::new(config.clone())),
            config,
            hardware,
            display: None,
            service_providers: Vec::new(),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    /// Powers the board up and registers the workers.
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing SATA HAT...");

        if let Some(panel) = self.hardware.panel.take() {
            self.display = self.bring_up_display(panel).await;
        }
        if let Some(lock) = &self.display {
            if let Err(e) = display::welcome(lock).await {
                warn!("Failed to show welcome screen: {e:#}");
            }
        }

        self.disk_power(true)
            .await
            .context("Failed to power the disks")?;

        self.register_service_providers().await;
        info!("SATA HAT initialized");
        Ok(())
    }

    async fn bring_up_display(&self, mut panel: Box<dyn Panel>) -> Option<DisplayLock> {
        let gpio = &self.hardware.gpio;
        let pulse = async {
            gpio.write(OLED_RESET_PIN, false)?;
            tokio::time::sleep(RESET_PULSE).await;
            gpio.write(OLED_RESET_PIN, true)
        };
        if let Err(e) = pulse.await {
            warn!("Display reset failed: {e:#}");
        }

        match display::init_panel_with_recovery(
            panel.as_mut(),
            &self.hardware.sysfs,
            self.hardware.shell.as_ref(),
        )
        .await
        {
            Ok(()) => Some(display_lock(Renderer::new(panel, self.config.oled.rotate))),
            Err(e) => {
                warn!("Display unavailable, running fans only: {e:#}");
                None
            }
        }
    }

    async fn disk_power(&self, on: bool) -> Result<()> {
        let [first, second] = DISK_POWER_PINS;
        self.hardware.gpio.write(first, on)?;
        tokio::time::sleep(DISK_POWER_STAGGER).await;
        self.hardware.gpio.write(second, on)?;
        info!("Disk power {}", if on { "on" } else { "off" });
        Ok(())
    }

    async fn register_service_providers(&mut self) {
        let config = &self.config;
        let hw = &self.hardware;
        let unit = TemperatureUnit::from_config(config);
        let disks = Arc::new(DiskTemperatures::new(hw.shell.clone(), self.state.clone(), unit));

        let sampler = TemperatureSampler::new(
            config,
            W1SlaveSensor::new(hw.sysfs.clone()),
            ThermalZoneSensor::new(hw.sysfs.clone()),
            disks.clone(),
        );
        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![Box::new(FanService::new(
            self.state.clone(),
            Arc::new(sampler),
            hw.fans.clone(),
        ))];

        if let Some(lock) = &self.display {
            let info = Arc::new(SystemInfo::new(hw.shell.clone(), hw.sysfs.clone(), config.clone()));
            info.prime_rates().await;

            let ctx = Arc::new(PageContext {
                config: config.clone(),
                state: self.state.clone(),
                info,
                disks,
                cpu: ThermalZoneSensor::new(hw.sysfs.clone()),
                unit,
            });
            let (display_queue, display_rx) = event::channel();
            let (gesture_queue, gesture_rx) = event::channel();
            let clock = Arc::new(DisplayClock::new());

            let scheduler = DisplayScheduler::new(
                standard_factories(ctx),
                lock.clone(),
                clock.clone(),
                self.state.clone(),
            );
            let dispatcher = ActionDispatcher::new(
                ActionTable::from_config(&config.key),
                self.state.clone(),
                Some(display_queue.clone()),
                hw.shell.clone(),
            );

            providers.push(Box::new(DisplayService::new(scheduler, display_rx)));
            providers.push(Box::new(ActionDispatchService::new(dispatcher, gesture_rx)));
            providers.push(Box::new(ButtonWatchService::new(
                hw.gpio.clone(),
                GestureTiming::from_config(&config.time),
                gesture_queue,
            )));
            providers.push(Box::new(AutoSliderService::new(
                display_queue.clone(),
                clock.clone(),
                config.slider.clone(),
            )));
            providers.push(Box::new(RefreshService::new(
                display_queue,
                clock,
                config.slider.clone(),
            )));
        }

        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        self.service_providers = providers;
        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Starts every registered provider.
    pub async fn start_all_services(&mut self) -> Result<()> {
        for provider in &self.service_providers {
            match provider.start(&mut self.task_manager).await {
                Ok(()) => info!(
                    "Service '{}' started (priority: {}, critical: {})",
                    provider.name(),
                    provider.priority(),
                    provider.is_critical()
                ),
                Err(e) if provider.is_critical() => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => warn!("Service '{}' failed to start: {e:#}", provider.name()),
            }
        }
        Ok(())
    }

    /// Waits for SIGINT or SIGTERM, then stops the workers.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to listen for SIGTERM")?;

        #[cfg(unix)]
        let stop = async {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
                _ = terminate.recv() => Ok("SIGTERM"),
            }
        };
        #[cfg(not(unix))]
        let stop = async { tokio::signal::ctrl_c().await.map(|()| "Ctrl+C") };

        match stop.await {
            Ok(signal) => info!("Received {signal}, shutting down"),
            Err(e) => bail!("Failed to listen for shutdown signal: {e}"),
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.task_manager.shutdown_all().await {
            warn!("Error during shutdown: {e:#}");
        }
        info!("Shutdown complete");
    }

    /// Stops the fans, says goodbye on the display and, when configured,
    /// cuts disk power.
    pub async fn power_off(&mut self) -> Result<()> {
        turn_off(&self.state, self.hardware.fans.as_ref());
        info!("Fans stopped");

        if let Some(mut panel) = self.hardware.panel.take() {
            match panel.begin() {
                Ok(()) => {
                    let lock = display_lock(Renderer::new(panel, self.config.oled.rotate));
                    if let Err(e) = display::goodbye(&lock).await {
                        warn!("Failed to show goodbye screen: {e:#}");
                    }
                }
                Err(e) => warn!("Display unavailable: {e:#}"),
            }
        }

        if self.config.disk.disable_drives_on_exit {
            self.disk_power(false)
                .await
                .context("Failed to cut disk power")?;
        }
        Ok(())
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DiskCfg,
        drivers::{
            fan_pwm::OnOffFanOutput,
            gpio::{CPU_FAN_PIN, DISK_FAN_PIN, GpioPort, MemoryGpio},
            panel::HeadlessPanel,
            shell::MockShell,
            sysfs::Sysfs,
        },
        fan_curve::FanChannel,
    };
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn hardware(root: &std::path::Path, gpio: Arc<MemoryGpio>, with_panel: bool) -> Hardware {
        let mut shell = MockShell::new();
        shell.expect_output().returning(|_| Ok(String::new()));
        shell.expect_call().returning(|_| Ok(()));
        let port: Arc<dyn GpioPort> = gpio;
        Hardware {
            fans: Arc::new(OnOffFanOutput::new(port.clone())),
            gpio: port,
            shell: Arc::new(shell),
            sysfs: Sysfs::new(root),
            panel: with_panel.then(|| Box::new(HeadlessPanel::new()) as Box<dyn Panel>),
        }
    }

    fn coordinator(config: Config, hardware: Hardware) -> SystemCoordinator {
        SystemCoordinator::new(&ConfigManager::new(config, None), hardware)
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_with_display_registers_every_worker() {
        let dir = TempDir::new().unwrap();
        let gpio = Arc::new(MemoryGpio::new().unwrap());
        let mut coordinator = coordinator(Config::default(), hardware(dir.path(), gpio.clone(), true));

        coordinator.initialize().await.unwrap();

        assert!(coordinator.has_display());
        assert_eq!(gpio.level(DISK_POWER_PINS[0]), Some(true));
        assert_eq!(gpio.level(DISK_POWER_PINS[1]), Some(true));
        assert_eq!(gpio.level(OLED_RESET_PIN), Some(true));
        assert_eq!(
            coordinator.running_services(),
            vec![
                "FanService",
                "DisplayService",
                "ActionDispatchService",
                "ButtonWatchService",
                "AutoSliderService",
                "RefreshService",
            ]
        );

        coordinator.start_all_services().await.unwrap();
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_without_display_runs_fans_only() {
        let dir = TempDir::new().unwrap();
        let gpio = Arc::new(MemoryGpio::new().unwrap());
        let mut coordinator = coordinator(Config::default(), hardware(dir.path(), gpio, false));

        coordinator.initialize().await.unwrap();

        assert!(!coordinator.has_display());
        assert_eq!(coordinator.running_services(), vec!["FanService"]);
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_keeps_disks_powered_by_default() {
        let dir = TempDir::new().unwrap();
        let gpio = Arc::new(MemoryGpio::new().unwrap());
        gpio.write(DISK_POWER_PINS[0], true).unwrap();
        gpio.write(DISK_POWER_PINS[1], true).unwrap();
        let mut coordinator = coordinator(Config::default(), hardware(dir.path(), gpio.clone(), true));

        coordinator.power_off().await.unwrap();

        assert!(!coordinator.state().is_running());
        assert_eq!(coordinator.state().duty(FanChannel::Cpu), 0.0);
        assert_eq!(gpio.level(CPU_FAN_PIN), Some(false));
        assert_eq!(gpio.level(DISK_FAN_PIN), Some(false));
        assert_eq!(gpio.level(DISK_POWER_PINS[0]), Some(true));
        assert_eq!(gpio.level(DISK_POWER_PINS[1]), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_cuts_disks_when_configured() {
        let dir = TempDir::new().unwrap();
        let gpio = Arc::new(MemoryGpio::new().unwrap());
        let config = Config {
            disk: DiskCfg {
                disable_drives_on_exit: true,
                ..DiskCfg::default()
            },
            ..Config::default()
        };
        let mut coordinator = coordinator(config, hardware(dir.path(), gpio.clone(), false));

        coordinator.power_off().await.unwrap();

        assert_eq!(gpio.level(DISK_POWER_PINS[0]), Some(false));
        assert_eq!(gpio.level(DISK_POWER_PINS[1]), Some(false));
    }
}
