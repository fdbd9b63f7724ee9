//! Application entry point and builder.

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    cli::Command, config::ConfigManager, coordinator::SystemCoordinator, drivers::Hardware,
};

/// One invocation of the daemon: `on` runs until a signal, `off` powers the
/// board down and returns.
///
/// # Example
///
/// ```no_run
/// use rockpi_sata::{application::Application, cli::Command, config::ConfigManager};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(None).await?;
/// Application::builder()
///     .with_config_manager(config_manager)
///     .build()?
///     .run(Command::On)
///     .await
/// # }
/// ```
pub struct Application {
    coordinator: SystemCoordinator,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        match command {
            Command::On => {
                self.coordinator.initialize().await?;
                self.coordinator.start_all_services().await?;
                self.coordinator.run_main_loop().await
            }
            Command::Off => {
                self.coordinator.power_off().await?;
                info!("SATA HAT powered off");
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct ApplicationBuilder {
    config_manager: Option<ConfigManager>,
    hardware: Option<Hardware>,
}

impl ApplicationBuilder {
    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    /// Uses `hardware` instead of opening the board's devices.
    pub fn with_hardware(mut self, hardware: Hardware) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn build(self) -> Result<Application> {
        let config_manager = self
            .config_manager
            .ok_or_else(|| anyhow!("Configuration manager is required"))?;
        let hardware = match self.hardware {
            Some(hardware) => hardware,
            None => Hardware::detect(&config_manager.get()).context("Failed to open the board")?,
        };

        Ok(Application {
            coordinator: SystemCoordinator::new(&config_manager, hardware),
        })
    }
}
