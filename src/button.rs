//! Gesture decoding for the top-board button.
//!
//! The pin is sampled every [`SAMPLE_TICK`]; high means released. The last
//! `press + 1` samples form a window that is matched, anchored at its oldest
//! sample, against three patterns tested in this order:
//!
//! | gesture | pattern              |
//! |---------|----------------------|
//! | click   | `1+ 0+ 1{wait,}`     |
//! | twice   | `1+ 0+ 1+ 0+ 1{3,}`  |
//! | press   | `1+ 0{press,}`       |
//!
//! where `wait` and `press` are the configured durations in ticks. The window
//! is stored as runs of equal samples, so matching looks at a handful of
//! counters instead of the raw history.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::Result;
use log::warn;
use tokio_util::sync::CancellationToken;

use crate::{
    config::TimeCfg,
    drivers::gpio::{BUTTON_PIN, GpioPort},
    event::Gesture,
};

pub const SAMPLE_TICK: Duration = Duration::from_millis(100);

/// Minimum trailing released run of a double click.
const TWICE_SETTLE_TICKS: usize = 3;

/// Gesture thresholds expressed in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTiming {
    /// Released run that completes a click.
    pub wait_ticks: usize,
    /// Held run that completes a press.
    pub press_ticks: usize,
}

impl GestureTiming {
    pub fn from_config(time: &TimeCfg) -> Self {
        let ticks = |secs: f64| ((secs * 10.0).floor().max(1.0)) as usize;
        Self {
            wait_ticks: ticks(time.twice),
            press_ticks: ticks(time.press),
        }
    }

    pub fn window_len(&self) -> usize {
        self.press_ticks + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    high: bool,
    len: usize,
}

/// Sliding run-length window over button samples.
#[derive(Debug, Clone)]
pub struct GestureDecoder {
    timing: GestureTiming,
    runs: VecDeque<Run>,
    samples: usize,
}

impl GestureDecoder {
    pub fn new(timing: GestureTiming) -> Self {
        Self {
            timing,
            runs: VecDeque::new(),
            samples: 0,
        }
    }

    /// Adds a sample and returns the gesture it completes, if any.
    ///
    /// After a gesture the window starts over.
    pub fn push(&mut self, high: bool) -> Option<Gesture> {
        match self.runs.back_mut() {
            Some(run) if run.high == high => run.len += 1,
            _ => self.runs.push_back(Run { high, len: 1 }),
        }
        self.samples += 1;

        if self.samples > self.timing.window_len() {
            if let Some(oldest) = self.runs.front_mut() {
                oldest.len -= 1;
                if oldest.len == 0 {
                    self.runs.pop_front();
                }
            }
            self.samples -= 1;
        }

        let gesture = self.classify();
        if gesture.is_some() {
            self.reset();
        }
        gesture
    }

    pub fn reset(&mut self) {
        self.runs.clear();
        self.samples = 0;
    }

    fn classify(&self) -> Option<Gesture> {
        let run = |i: usize, high: bool| self.runs.get(i).filter(|r| r.high == high);

        // Every pattern starts with released samples.
        run(0, true)?;

        if run(1, false).is_some()
            && run(2, true).is_some_and(|r| r.len >= self.timing.wait_ticks)
        {
            return Some(Gesture::Click);
        }

        if run(1, false).is_some()
            && run(2, true).is_some()
            && run(3, false).is_some()
            && run(4, true).is_some_and(|r| r.len >= TWICE_SETTLE_TICKS)
        {
            return Some(Gesture::Twice);
        }

        if run(1, false).is_some_and(|r| r.len >= self.timing.press_ticks) {
            return Some(Gesture::Press);
        }

        None
    }
}

/// Samples the button until a gesture completes.
///
/// Returns `None` once `token` is cancelled. Read failures count as
/// released samples and are logged once per streak.
pub async fn next_gesture(
    gpio: &Arc<dyn GpioPort>,
    decoder: &mut GestureDecoder,
    token: &CancellationToken,
) -> Option<Gesture> {
    let mut interval = tokio::time::interval(SAMPLE_TICK);
    let mut failing = false;
    loop {
        tokio::select! {
            () = token.cancelled() => return None,
            _ = interval.tick() => {}
        }

        let high = match read_button(gpio) {
            Ok(level) => {
                failing = false;
                level
            }
            Err(e) => {
                if !failing {
                    warn!("Cannot read button: {e:#}");
                }
                failing = true;
                true
            }
        };

        if let Some(gesture) = decoder.push(high) {
            return Some(gesture);
        }
    }
}

fn read_button(gpio: &Arc<dyn GpioPort>) -> Result<bool> {
    gpio.read(BUTTON_PIN)
}
