//! Fan curve calculations for temperature-based speed control.
//!
//! Four ascending thresholds split the temperature axis into buckets, each
//! tied to a fixed duty percentage. The curve either returns the bucket's
//! percentage or interpolates towards the next one.

use serde::{Deserialize, Serialize};

/// Duty percentages tied to `lv0..lv3`.
pub const LEVEL_PERCENTS: [f32; 4] = [25.0, 50.0, 75.0, 100.0];

/// PWM output channel of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanChannel {
    /// Fan on the processor heatsink (GPIO 12).
    Cpu,
    /// Fan on the top board blowing over the disks (GPIO 13).
    Disk,
}

impl FanChannel {
    pub const ALL: [FanChannel; 2] = [FanChannel::Cpu, FanChannel::Disk];

    pub fn index(self) -> usize {
        match self {
            FanChannel::Cpu => 0,
            FanChannel::Disk => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FanChannel::Cpu => "cpu",
            FanChannel::Disk => "disk",
        }
    }
}

/// Thresholds `lv0..lv3` for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanLevels {
    pub thresholds: [f32; 4],
}

/// How a temperature inside a bucket maps to a duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurvePolicy {
    /// The bucket's lower-bound percentage.
    Quantized,
    /// Interpolated between the bucket's bounds.
    Linear,
}

/// Temperature to duty-cycle curve for one channel.
///
/// # Example
///
/// ```
/// use rockpi_sata::fan_curve::{CurvePolicy, FanCurve, FanLevels};
///
/// let curve = FanCurve::new(
///     FanLevels { thresholds: [35.0, 40.0, 45.0, 50.0] },
///     CurvePolicy::Quantized,
/// );
/// assert_eq!(curve.duty_for(47.0), 75.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FanCurve {
    levels: FanLevels,
    policy: CurvePolicy,
}

impl FanCurve {
    pub fn new(levels: FanLevels, policy: CurvePolicy) -> Self {
        Self { levels, policy }
    }

    /// Duty cycle in percent for `temp`.
    ///
    /// A temperature exceeds a threshold only when strictly greater than it.
    pub fn duty_for(&self, temp: f32) -> f32 {
        let t = &self.levels.thresholds;
        if temp > t[3] {
            return LEVEL_PERCENTS[3];
        }

        for lvl in (0..3).rev() {
            if temp > t[lvl] {
                let pct = match self.policy {
                    CurvePolicy::Quantized => LEVEL_PERCENTS[lvl],
                    CurvePolicy::Linear => {
                        let span = t[lvl + 1] - t[lvl];
                        let rise = LEVEL_PERCENTS[lvl + 1] - LEVEL_PERCENTS[lvl];
                        (temp - t[lvl]) * rise / span + LEVEL_PERCENTS[lvl]
                    }
                };
                return pct.clamp(0.0, 100.0);
            }
        }

        LEVEL_PERCENTS[0]
    }
}
