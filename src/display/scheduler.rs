//! Page rotation: one consumer fed by the auto-advance timer, the button and
//! the refresh timer.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use log::{debug, error, info};
use tokio::{sync::mpsc::UnboundedReceiver, time::Instant};
use tokio_util::sync::CancellationToken;

use super::{
    frame::DisplayLock,
    pages::{Page, PageFactory},
};
use crate::{
    app_context::SharedState,
    config::SliderCfg,
    event::{DisplayQueue, DisplayToken},
    task_manager::sleep_or_cancel,
};

/// Polling granularity of the timers.
pub const TIMER_TICK: Duration = Duration::from_millis(100);

/// Advance and refresh deadlines shared between the timers and the consumer.
#[derive(Debug)]
pub struct DisplayClock {
    origin: Instant,
    next_advance: AtomicU64,
    next_refresh: AtomicU64,
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_advance: AtomicU64::new(0),
            next_refresh: AtomicU64::new(0),
        }
    }

    fn encode(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.origin).as_millis() as u64
    }

    fn decode(&self, millis: u64) -> Instant {
        self.origin + Duration::from_millis(millis)
    }

    pub fn next_advance(&self) -> Instant {
        self.decode(self.next_advance.load(Ordering::SeqCst))
    }

    pub fn set_next_advance(&self, at: Instant) {
        self.next_advance.store(self.encode(at), Ordering::SeqCst);
    }

    pub fn next_refresh(&self) -> Instant {
        self.decode(self.next_refresh.load(Ordering::SeqCst))
    }

    pub fn set_next_refresh(&self, at: Instant) {
        self.next_refresh.store(self.encode(at), Ordering::SeqCst);
    }
}

/// Consumer side of the display queue.
///
/// Holds the page list and the page currently on screen. Every render runs
/// with the display lock held, from content generation to the blit.
pub struct DisplayScheduler {
    factories: Vec<Box<dyn PageFactory>>,
    pages: VecDeque<Box<dyn Page>>,
    current: Option<Box<dyn Page>>,
    position: usize,
    lock: DisplayLock,
    clock: Arc<DisplayClock>,
    state: Arc<SharedState>,
    interval: Duration,
    refresh: Duration,
}

impl DisplayScheduler {
    pub fn new(
        factories: Vec<Box<dyn PageFactory>>,
        lock: DisplayLock,
        clock: Arc<DisplayClock>,
        state: Arc<SharedState>,
    ) -> Self {
        let slider = &state.config().slider;
        let (interval, refresh) = (slider.interval(), slider.refresh_period());
        Self {
            factories,
            pages: VecDeque::new(),
            current: None,
            position: 0,
            lock,
            clock,
            state,
            interval,
            refresh,
        }
    }

    /// Pages left before the list is regenerated.
    pub fn remaining(&self) -> usize {
        self.pages.len()
    }

    /// Title of the page on screen.
    pub fn current_title(&self) -> Option<String> {
        self.current.as_ref().map(|page| page.title())
    }

    async fn regenerate(&mut self) {
        for factory in &self.factories {
            self.pages.extend(factory.pages().await);
        }
        self.position = 0;
        debug!("Generated {} display pages", self.pages.len());
    }

    pub async fn handle(&mut self, token: DisplayToken) {
        let lock = Arc::clone(&self.lock);
        let mut renderer = lock.lock().await;
        let now = Instant::now();

        match token {
            DisplayToken::Advance => {
                if self.pages.is_empty() {
                    self.regenerate().await;
                }
                self.clock.set_next_advance(now + self.interval);
                self.clock.set_next_refresh(now + self.refresh);

                let Some(page) = self.pages.pop_front() else {
                    debug!("No pages to display");
                    self.current = None;
                    return;
                };
                let records = page.render().await;
                if let Err(e) = renderer.show(records) {
                    error!("Failed to display page '{}': {e:#}", page.title());
                }
                self.state.set_page_index(self.position);
                self.position += 1;
                self.current = Some(page);
            }
            DisplayToken::Redraw => {
                self.clock.set_next_refresh(now + self.refresh);
                if let Some(page) = &self.current {
                    let records = page.render().await;
                    if let Err(e) = renderer.show(records) {
                        error!("Failed to redraw page '{}': {e:#}", page.title());
                    }
                }
            }
        }
    }

    /// Consumes display tokens until cancelled or every producer is gone.
    pub async fn run(
        mut self,
        mut tokens: UnboundedReceiver<DisplayToken>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Display consumer cancelled");
                    break;
                }
                token = tokens.recv() => match token {
                    Some(token) => self.handle(token).await,
                    None => break,
                }
            }
        }
        Ok(())
    }
}

/// Requests an advance whenever the advance deadline passes.
///
/// Starts with one immediate advance, whose handling sets the first
/// deadline. A zero interval leaves the timer idle.
pub async fn run_auto_slider(
    queue: DisplayQueue,
    clock: Arc<DisplayClock>,
    slider: SliderCfg,
    cancel: CancellationToken,
) -> Result<()> {
    queue.push(DisplayToken::Advance)?;

    if !slider.auto {
        return Ok(());
    }

    let interval = slider.interval();
    loop {
        if interval.is_zero() {
            if !sleep_or_cancel(&cancel, TIMER_TICK).await {
                return Ok(());
            }
            continue;
        }

        clock.set_next_advance(Instant::now() + interval);
        while Instant::now() < clock.next_advance() {
            if !sleep_or_cancel(&cancel, TIMER_TICK).await {
                return Ok(());
            }
        }
        queue.push(DisplayToken::Advance)?;
    }
}

/// Requests a redraw whenever the refresh deadline passes.
pub async fn run_refresh(
    queue: DisplayQueue,
    clock: Arc<DisplayClock>,
    slider: SliderCfg,
    cancel: CancellationToken,
) -> Result<()> {
    let period = slider.refresh_period();
    if period.is_zero() {
        return Ok(());
    }

    loop {
        let now = Instant::now();
        if now > clock.next_refresh() {
            clock.set_next_refresh(now + period);
            queue.push(DisplayToken::Redraw)?;
        }
        if !sleep_or_cancel(&cancel, TIMER_TICK).await {
            return Ok(());
        }
    }
}
