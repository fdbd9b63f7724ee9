use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc::UnboundedReceiver};

use crate::{
    config::SliderCfg,
    display::scheduler::{DisplayClock, DisplayScheduler, run_auto_slider, run_refresh},
    event::{DisplayQueue, DisplayToken},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Renders pages as display tokens arrive.
///
/// - **Priority**: 8
/// - **Critical**: no
pub struct DisplayService {
    consumer: Mutex<Option<(DisplayScheduler, UnboundedReceiver<DisplayToken>)>>,
}

impl DisplayService {
    pub fn new(scheduler: DisplayScheduler, tokens: UnboundedReceiver<DisplayToken>) -> Self {
        Self {
            consumer: Mutex::new(Some((scheduler, tokens))),
        }
    }
}

#[async_trait]
impl ServiceProvider for DisplayService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let (scheduler, tokens) = self
            .consumer
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("{} already started", self.name()))?;

        task_manager.spawn_task(self.name(), move |token| scheduler.run(tokens, token))
    }

    fn name(&self) -> &'static str {
        "DisplayService"
    }

    fn priority(&self) -> i32 {
        8
    }
}

/// Advances the page on the configured interval.
///
/// - **Priority**: 5
/// - **Critical**: no
pub struct AutoSliderService {
    queue: DisplayQueue,
    clock: Arc<DisplayClock>,
    slider: SliderCfg,
}

impl AutoSliderService {
    pub fn new(queue: DisplayQueue, clock: Arc<DisplayClock>, slider: SliderCfg) -> Self {
        Self {
            queue,
            clock,
            slider,
        }
    }
}

#[async_trait]
impl ServiceProvider for AutoSliderService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let queue = self.queue.clone();
        let clock = self.clock.clone();
        let slider = self.slider.clone();

        task_manager.spawn_task(self.name(), move |token| {
            run_auto_slider(queue, clock, slider, token)
        })
    }

    fn name(&self) -> &'static str {
        "AutoSliderService"
    }

    fn priority(&self) -> i32 {
        5
    }
}

/// Redraws the current page every `slider.refresh` seconds.
///
/// - **Priority**: 4
/// - **Critical**: no
pub struct RefreshService {
    queue: DisplayQueue,
    clock: Arc<DisplayClock>,
    slider: SliderCfg,
}

impl RefreshService {
    pub fn new(queue: DisplayQueue, clock: Arc<DisplayClock>, slider: SliderCfg) -> Self {
        Self {
            queue,
            clock,
            slider,
        }
    }
}

#[async_trait]
impl ServiceProvider for RefreshService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let queue = self.queue.clone();
        let clock = self.clock.clone();
        let slider = self.slider.clone();

        task_manager.spawn_task(self.name(), move |token| {
            run_refresh(queue, clock, slider, token)
        })
    }

    fn name(&self) -> &'static str {
        "RefreshService"
    }

    fn priority(&self) -> i32 {
        4
    }
}
