/// Gauge reading the peak must exceed before the celebration fires.
pub const DEFAULT_CELEBRATION_THRESHOLD: f32 = 50.0;

/// Value the running maximum starts from and returns to on reset.
pub const PEAK_FLOOR: f32 = 0.0;

/// Running maximum of a session plus the one-shot threshold latch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakState {
    pub max_decibel: f32,
    pub threshold_crossed: bool,
}

impl Default for PeakState {
    fn default() -> Self {
        Self {
            max_decibel: PEAK_FLOOR,
            threshold_crossed: false,
        }
    }
}

/// Emitted once, on the tick the running peak first exceeds the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Celebration {
    pub peak: f32,
}

#[derive(Debug, Clone)]
pub struct PeakTracker {
    state: PeakState,
    threshold: f32,
}

impl Default for PeakTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CELEBRATION_THRESHOLD)
    }
}

impl PeakTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            state: PeakState::default(),
            threshold,
        }
    }

    pub fn state(&self) -> PeakState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Fold in a positive gauge reading. Never lowers the maximum and never clears the latch.
    pub fn update(&mut self, reading: f32) -> Option<Celebration> {
        self.state.max_decibel = self.state.max_decibel.max(reading);

        if self.state.max_decibel > self.threshold && !self.state.threshold_crossed {
            self.state.threshold_crossed = true;
            tracing::info!("Peak {} dB crossed the celebration threshold of {} dB", self.state.max_decibel, self.threshold);
            return Some(Celebration { peak: self.state.max_decibel });
        }

        None
    }

    pub fn reset(&mut self) {
        self.state = PeakState::default();
    }
}
