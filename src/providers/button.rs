use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::{Mutex, mpsc::UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::{
    actions::{Action, ActionDispatcher, DISPATCH_PAUSE},
    button::{GestureDecoder, GestureTiming, next_gesture},
    drivers::gpio::GpioPort,
    event::{Gesture, GestureQueue},
    providers::traits::ServiceProvider,
    task_manager::{TaskManager, sleep_or_cancel},
};

/// Samples the button and queues each decoded gesture.
///
/// - **Priority**: 6
/// - **Critical**: no
pub struct ButtonWatchService {
    gpio: Arc<dyn GpioPort>,
    timing: GestureTiming,
    gestures: GestureQueue,
}

impl ButtonWatchService {
    pub fn new(gpio: Arc<dyn GpioPort>, timing: GestureTiming, gestures: GestureQueue) -> Self {
        Self {
            gpio,
            timing,
            gestures,
        }
    }
}

#[async_trait]
impl ServiceProvider for ButtonWatchService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let gpio = self.gpio.clone();
        let timing = self.timing;
        let gestures = self.gestures.clone();

        task_manager.spawn_task(self.name(), move |token| async move {
            run_button_watch(gpio, timing, gestures, token).await
        })
    }

    fn name(&self) -> &'static str {
        "ButtonWatchService"
    }

    fn priority(&self) -> i32 {
        6
    }
}

async fn run_button_watch(
    gpio: Arc<dyn GpioPort>,
    timing: GestureTiming,
    gestures: GestureQueue,
    token: CancellationToken,
) -> Result<()> {
    let mut decoder = GestureDecoder::new(timing);
    while let Some(gesture) = next_gesture(&gpio, &mut decoder, &token).await {
        debug!("Button: {}", gesture.name());
        gestures.push(gesture)?;
    }
    info!("Button watch cancelled");
    Ok(())
}

/// Runs the action bound to each queued gesture.
///
/// - **Priority**: 7
/// - **Critical**: no
pub struct ActionDispatchService {
    dispatcher: Arc<ActionDispatcher>,
    gestures: Mutex<Option<UnboundedReceiver<Gesture>>>,
}

impl ActionDispatchService {
    pub fn new(dispatcher: ActionDispatcher, gestures: UnboundedReceiver<Gesture>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            gestures: Mutex::new(Some(gestures)),
        }
    }
}

#[async_trait]
impl ServiceProvider for ActionDispatchService {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let gestures = self
            .gestures
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("{} already started", self.name()))?;
        let dispatcher = self.dispatcher.clone();

        task_manager.spawn_task(self.name(), move |token| async move {
            run_dispatch(dispatcher, gestures, token).await
        })
    }

    fn name(&self) -> &'static str {
        "ActionDispatchService"
    }

    fn priority(&self) -> i32 {
        7
    }
}

async fn run_dispatch(
    dispatcher: Arc<ActionDispatcher>,
    mut gestures: UnboundedReceiver<Gesture>,
    token: CancellationToken,
) -> Result<()> {
    loop {
        let gesture = tokio::select! {
            () = token.cancelled() => break,
            gesture = gestures.recv() => match gesture {
                Some(gesture) => gesture,
                None => break,
            },
        };

        match dispatcher.dispatch(gesture).await {
            Ok(Action::None) => {}
            Ok(action) => debug!("{} -> {action:?}", gesture.name()),
            Err(e) => error!("Action for {} failed: {e:#}", gesture.name()),
        }

        if !sleep_or_cancel(&token, DISPATCH_PAUSE).await {
            break;
        }
    }
    info!("Action dispatch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::ActionTable,
        app_context::SharedState,
        config::{Config, KeyCfg, TimeCfg},
        drivers::{
            gpio::{BUTTON_PIN, MemoryGpio},
            shell::MockShell,
        },
        event::{self, DisplayToken},
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn held_button_queues_press() {
        let gpio = Arc::new(MemoryGpio::new().unwrap());
        let (queue, mut rx) = event::channel();
        let service = ButtonWatchService::new(
            gpio.clone(),
            GestureTiming::from_config(&TimeCfg::default()),
            queue,
        );

        let mut tasks = TaskManager::new();
        service.start(&mut tasks).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        gpio.write(BUTTON_PIN, false).unwrap();

        assert_eq!(rx.recv().await, Some(Gesture::Press));
        tasks.shutdown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn queued_gestures_are_dispatched_in_order() {
        let state = Arc::new(SharedState::new(Arc::new(Config::default())));
        let (display, mut tokens) = event::channel();
        let dispatcher = ActionDispatcher::new(
            ActionTable::from_config(&KeyCfg::default()),
            state.clone(),
            Some(display),
            Arc::new(MockShell::new()),
        );
        let (gestures, rx) = event::channel();
        let service = ActionDispatchService::new(dispatcher, rx);

        let mut tasks = TaskManager::new();
        service.start(&mut tasks).await.unwrap();
        assert!(service.start(&mut tasks).await.is_err());

        gestures.push(Gesture::Click).unwrap();
        gestures.push(Gesture::Twice).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(tokens.recv().await, Some(DisplayToken::Advance));
        assert!(!state.is_running());
        tasks.shutdown_all().await.unwrap();
    }
}
