use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::SharedState,
    drivers::fan_pwm::FanOutput,
    fan_controller::{FAN_TICK, FanController},
    providers::traits::ServiceProvider,
    sensors::TemperatureSource,
    task_manager::TaskManager,
};

/// Drives both fan channels from the sampled temperatures.
///
/// - **Priority**: 10
/// - **Critical**: yes
pub struct FanService {
    state: Arc<SharedState>,
    source: Arc<dyn TemperatureSource>,
    output: Arc<dyn FanOutput>,
}

impl FanService {
    pub fn new(
        state: Arc<SharedState>,
        source: Arc<dyn TemperatureSource>,
        output: Arc<dyn FanOutput>,
    ) -> Self {
        Self {
            state,
            source,
            output,
        }
    }
}

#[async_trait]
impl ServiceProvider for FanService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let source = self.source.clone();
        let output = self.output.clone();
        info!("Fan output: {}", output.describe());

        task_manager.spawn_task(self.name(), |token| async move {
            run_fan_loop(state, source, output, token).await
        })
    }

    fn name(&self) -> &'static str {
        "FanService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_fan_loop(
    state: Arc<SharedState>,
    source: Arc<dyn TemperatureSource>,
    output: Arc<dyn FanOutput>,
    token: CancellationToken,
) -> Result<()> {
    let mut controller = FanController::from_config(state.config());
    let mut ticker = interval(FAN_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(ticker);

    loop {
        tokio::select! {
            () = token.cancelled() => {
                info!("Fan service cancelled");
                break;
            }
            Some(_) = ticks.next() => {
                controller
                    .tick(source.as_ref(), &state, output.as_ref(), Instant::now())
                    .await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        fan_curve::FanChannel,
        sensors::TemperatureReading,
    };
    use pretty_assertions::assert_eq;
    use std::{sync::Mutex, time::Duration};

    struct FixedSource(TemperatureReading);

    #[async_trait]
    impl TemperatureSource for FixedSource {
        async fn read(&self) -> TemperatureReading {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingOutput(Mutex<Vec<(FanChannel, f32)>>);

    impl FanOutput for RecordingOutput {
        fn set_duty(&self, channel: FanChannel, pct: f32) -> Result<()> {
            self.0.lock().unwrap().push((channel, pct));
            Ok(())
        }

        fn describe(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn service_applies_curve_and_stops() {
        let state = Arc::new(SharedState::new(Arc::new(Config::default())));
        let output = Arc::new(RecordingOutput::default());
        let service = FanService::new(
            state.clone(),
            Arc::new(FixedSource(TemperatureReading {
                system: 47.0,
                disk: 30.0,
            })),
            output.clone(),
        );

        let mut tasks = TaskManager::new();
        service.start(&mut tasks).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        tasks.shutdown_all().await.unwrap();

        assert_eq!(state.duty(FanChannel::Cpu), 75.0);
        assert_eq!(state.duty(FanChannel::Disk), 25.0);
        // Unchanged targets are written once.
        assert_eq!(output.0.lock().unwrap().len(), 2);
    }
}
