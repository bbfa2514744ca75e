//! RMS loudness estimation over byte time-domain windows.
//!
//! All estimation happens in raw dBFS (0 dB = full scale, quieter is more negative).
//! [`DecibelScale`] maps the raw value onto one of the two presentation scales.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::sample_buffer::{SampleBuffer, MIDPOINT};

/// RMS at or below this is treated as silence, which also keeps `log10` away from zero.
pub const SILENCE_RMS: f32 = 1e-4;

/// Lowest raw level either scale can show. Maps to 0 on the positive gauge.
pub const DB_FLOOR: f32 = -60.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DecibelScale {
    /// `raw + 60` clamped at 0. Silence reads 0, louder is higher.
    #[default]
    PositiveGauge,
    /// Raw dBFS clamped at -60. Silence reads -60, full scale reads 0.
    NegativeDbfs,
}

impl DecibelScale {
    /// The reading emitted when the window is below the silence floor.
    pub fn silence(self) -> f32 {
        match self {
            DecibelScale::PositiveGauge => 0.0,
            DecibelScale::NegativeDbfs => DB_FLOOR,
        }
    }

    /// Rescale a raw dBFS value and round it for display.
    pub fn present(self, raw_db: f32) -> f32 {
        let scaled = match self {
            DecibelScale::PositiveGauge => (raw_db - DB_FLOOR).max(0.0),
            DecibelScale::NegativeDbfs => raw_db.max(DB_FLOOR),
        };
        round_to_tenth(scaled)
    }

    /// Convert a positive gauge reading into this scale.
    pub fn from_gauge(self, gauge: f32) -> f32 {
        match self {
            DecibelScale::PositiveGauge => gauge,
            DecibelScale::NegativeDbfs => round_to_tenth(gauge + DB_FLOOR),
        }
    }

    /// Convert a reading in this scale back onto the positive gauge.
    pub fn to_gauge(self, value: f32) -> f32 {
        match self {
            DecibelScale::PositiveGauge => value,
            DecibelScale::NegativeDbfs => round_to_tenth((value - DB_FLOOR).max(0.0)),
        }
    }
}

/// Map a byte sample onto [-1.0, 1.0) around the midpoint.
pub fn normalize(sample: u8) -> f32 {
    sample as f32 / MIDPOINT as f32 - 1.0
}

pub fn rms(buffer: &SampleBuffer) -> f32 {
    let samples = buffer.as_ref();
    let sum_squares: f32 = samples.iter()
        .map(|&s| {
            let v = normalize(s);
            v * v
        })
        .sum();

    (sum_squares / samples.len() as f32).sqrt()
}

/// Raw dBFS level of the window, or `None` if it is below the silence floor.
pub fn raw_decibels(buffer: &SampleBuffer) -> Option<f32> {
    let rms = rms(buffer);
    if rms > SILENCE_RMS {
        Some(20.0 * rms.log10())
    } else {
        None
    }
}

/// The rounded reading for one tick. Always finite.
pub fn estimate(buffer: &SampleBuffer, scale: DecibelScale) -> f32 {
    match raw_decibels(buffer) {
        Some(raw_db) => scale.present(raw_db),
        None => scale.silence(),
    }
}

/// Round to one decimal place, halves away from zero.
pub fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Colour band of a positive gauge reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoudnessBand {
    Quiet,
    Moderate,
    Loud,
}

impl LoudnessBand {
    pub fn from_gauge(gauge: f32) -> Self {
        if gauge > 50.0 {
            LoudnessBand::Loud
        } else if gauge > 40.0 {
            LoudnessBand::Moderate
        } else {
            LoudnessBand::Quiet
        }
    }
}

/// Exponential smoothing of a displayed level towards the latest reading.
#[derive(Clone, Debug)]
pub struct LevelSmoother {
    current: f32,
    smoothing_factor: f32,
}

impl LevelSmoother {
    pub fn new(update_interval: Duration, initial: f32) -> Self {
        Self {
            current: initial,
            smoothing_factor: Self::compute_smoothing_factor(update_interval),
        }
    }

    fn compute_smoothing_factor(update_interval: Duration) -> f32 {
        let tau = 0.3;
        let dt = update_interval.as_secs_f32();
        (1.0 - (-dt / tau).exp()).clamp(0.0, 1.0)
    }

    pub fn push(&mut self, target: f32) -> f32 {
        self.current += self.smoothing_factor * (target - self.current);
        self.current
    }

    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }
}
