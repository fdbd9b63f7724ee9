//! Workers started by the coordinator.
//!
//! Each provider owns what its worker needs and spawns it through the
//! [`TaskManager`](crate::task_manager::TaskManager).

pub mod button;
pub mod display;
pub mod fan;
pub mod traits;

pub use button::{ActionDispatchService, ButtonWatchService};
pub use display::{AutoSliderService, DisplayService, RefreshService};
pub use fan::FanService;
pub use traits::ServiceProvider;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::{
        actions::{ActionDispatcher, ActionTable},
        app_context::SharedState,
        button::GestureTiming,
        config::Config,
        display::{
            frame::{Renderer, display_lock},
            pages::{PageContext, standard_factories},
            scheduler::{DisplayClock, DisplayScheduler},
        },
        drivers::{
            fan_pwm::OnOffFanOutput,
            gpio::{GpioPort, MemoryGpio},
            panel::HeadlessPanel,
            shell::{MockShell, Shell},
            sysfs::Sysfs,
        },
        event,
        system_info::SystemInfo,
        task_manager::TaskManager,
        temperature_sensors::{
            TemperatureSampler, TemperatureUnit, smart_disks::DiskTemperatures,
            thermal_zone::ThermalZoneSensor, w1_slave::W1SlaveSensor,
        },
    };
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;

    fn quiet_shell() -> MockShell {
        let mut shell = MockShell::new();
        shell.expect_output().returning(|_| Ok(String::new()));
        shell.expect_call().returning(|_| Ok(()));
        shell
    }

    fn all_services(root: &std::path::Path) -> (Vec<Box<dyn ServiceProvider>>, Arc<SharedState>) {
        let config = Arc::new(Config::default());
        let state = Arc::new(SharedState::new(config.clone()));
        let shell: Arc<dyn Shell> = Arc::new(quiet_shell());
        let gpio: Arc<dyn GpioPort> = Arc::new(MemoryGpio::new().unwrap());
        let sysfs = Sysfs::new(root);
        let unit = TemperatureUnit::from_config(&config);
        let disks = Arc::new(DiskTemperatures::new(shell.clone(), state.clone(), unit));

        let sampler = TemperatureSampler::new(
            &config,
            W1SlaveSensor::new(sysfs.clone()),
            ThermalZoneSensor::new(sysfs.clone()),
            disks.clone(),
        );
        let ctx = Arc::new(PageContext {
            config: config.clone(),
            state: state.clone(),
            info: Arc::new(SystemInfo::new(shell.clone(), sysfs.clone(), config.clone())),
            disks,
            cpu: ThermalZoneSensor::new(sysfs),
            unit,
        });

        let (display_queue, display_rx) = event::channel();
        let (gesture_queue, gesture_rx) = event::channel();
        let clock = Arc::new(DisplayClock::new());
        let scheduler = DisplayScheduler::new(
            standard_factories(ctx),
            display_lock(Renderer::new(Box::new(HeadlessPanel::new()), false)),
            clock.clone(),
            state.clone(),
        );
        let dispatcher = ActionDispatcher::new(
            ActionTable::from_config(&config.key),
            state.clone(),
            Some(display_queue.clone()),
            shell,
        );

        let services: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(FanService::new(
                state.clone(),
                Arc::new(sampler),
                Arc::new(OnOffFanOutput::new(gpio.clone())),
            )),
            Box::new(DisplayService::new(scheduler, display_rx)),
            Box::new(ActionDispatchService::new(dispatcher, gesture_rx)),
            Box::new(ButtonWatchService::new(
                gpio,
                GestureTiming::from_config(&config.time),
                gesture_queue,
            )),
            Box::new(AutoSliderService::new(
                display_queue.clone(),
                clock.clone(),
                config.slider.clone(),
            )),
            Box::new(RefreshService::new(display_queue, clock, config.slider.clone())),
        ];
        (services, state)
    }

    #[tokio::test]
    async fn priorities_order_fan_first() {
        let dir = TempDir::new().unwrap();
        let (mut services, _) = all_services(dir.path());
        services.sort_by_key(|s| std::cmp::Reverse(s.priority()));

        let names: Vec<_> = services.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "FanService",
                "DisplayService",
                "ActionDispatchService",
                "ButtonWatchService",
                "AutoSliderService",
                "RefreshService",
            ]
        );
        assert!(services[0].is_critical());
        assert!(services[1..].iter().all(|s| !s.is_critical()));
    }

    #[tokio::test(start_paused = true)]
    async fn full_service_set_starts_and_stops() {
        let dir = TempDir::new().unwrap();
        let (services, state) = all_services(dir.path());
        let mut tasks = TaskManager::new();

        for service in &services {
            service.start(&mut tasks).await.unwrap();
        }
        assert_eq!(tasks.len(), 6);

        tokio::time::sleep(Duration::from_secs(1)).await;
        // The first advance landed on the system page.
        assert_eq!(state.page_index(), 0);
        assert!(state.is_running());

        tasks.shutdown_all().await.unwrap();
        assert!(tasks.is_empty());
    }
}
