//! Shared runtime state and the configuration snapshot.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
};

use crate::{config::Config, fan_curve::FanChannel};

/// State shared by every worker.
///
/// Each mutable scalar is an explicit atomic cell; nothing else is mutated
/// across workers. The configuration is an immutable snapshot.
#[derive(Debug)]
pub struct SharedState {
    config: Arc<Config>,
    run: AtomicBool,
    page_index: AtomicUsize,
    /// `f32` bits.
    disk_temp_average: AtomicU32,
    /// Last applied duty per [`FanChannel`], `f32` bits.
    duty: [AtomicU32; 2],
}

impl SharedState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            run: AtomicBool::new(true),
            page_index: AtomicUsize::new(0),
            disk_temp_average: AtomicU32::new(0f32.to_bits()),
            duty: [AtomicU32::new(0f32.to_bits()), AtomicU32::new(0f32.to_bits())],
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Whether the fans are allowed to run.
    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.run.store(running, Ordering::SeqCst);
    }

    /// Flips the run flag and returns the new value.
    pub fn toggle_running(&self) -> bool {
        !self.run.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn page_index(&self) -> usize {
        self.page_index.load(Ordering::SeqCst)
    }

    pub fn set_page_index(&self, index: usize) {
        self.page_index.store(index, Ordering::SeqCst);
    }

    pub fn disk_temp_average(&self) -> f32 {
        f32::from_bits(self.disk_temp_average.load(Ordering::SeqCst))
    }

    pub fn set_disk_temp_average(&self, value: f32) {
        self.disk_temp_average
            .store(value.to_bits(), Ordering::SeqCst);
    }

    pub fn duty(&self, channel: FanChannel) -> f32 {
        f32::from_bits(self.duty[channel.index()].load(Ordering::SeqCst))
    }

    pub fn set_duty(&self, channel: FanChannel, pct: f32) {
        self.duty[channel.index()].store(pct.to_bits(), Ordering::SeqCst);
    }
}
