//! One recording: capture handle, sample window, latest reading and peak state.

use crate::capture::{CaptureError, CaptureHandle, CaptureSource};
use crate::loudness::{self, DecibelScale};
use crate::peak::{Celebration, PeakState, PeakTracker, DEFAULT_CELEBRATION_THRESHOLD};
use crate::sample_buffer::{SampleBuffer, MIDPOINT};
use crate::DEFAULT_BUFFER_SIZE_EXP;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    /// Samples per window. Must be a power of two.
    pub buffer_len: usize,
    pub scale: DecibelScale,
    /// In positive gauge units, whatever the display scale.
    pub celebration_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_len: 1 << DEFAULT_BUFFER_SIZE_EXP,
            scale: DecibelScale::default(),
            celebration_threshold: DEFAULT_CELEBRATION_THRESHOLD,
        }
    }
}

/// Everything the presentation side needs for one tick.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub buffer: &'a SampleBuffer,
    pub scale: DecibelScale,
    pub decibel: f32,
    pub max_decibel: f32,
    pub celebration_visible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutcome {
    /// Reading in the session's display scale.
    pub decibel: f32,
    /// The same reading on the positive gauge, as fed to the peak tracker.
    pub gauge: f32,
    pub celebration: Option<Celebration>,
}

pub struct Session<S: CaptureSource> {
    source: S,
    handle: Option<S::Handle>,
    buffer: SampleBuffer,
    tracker: PeakTracker,
    scale: DecibelScale,
    decibel: f32,
    celebration_visible: bool,
    permission_denied: bool,
}

impl<S: CaptureSource> Session<S> {
    pub fn new(source: S, config: SessionConfig) -> Self {
        Self {
            source,
            handle: None,
            buffer: SampleBuffer::new(config.buffer_len),
            tracker: PeakTracker::new(config.celebration_threshold),
            scale: config.scale,
            decibel: config.scale.silence(),
            celebration_visible: false,
            permission_denied: false,
        }
    }

    /// Begin a recording with a fresh peak. A running capture is released first.
    ///
    /// On failure the permission denied flag is raised and stays up until a later start succeeds.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            tracing::debug!("Start requested while recording, restarting capture");
            self.stop();
        }

        match self.source.open(self.buffer.len()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.buffer.fill(MIDPOINT);
                self.tracker.reset();
                self.decibel = self.scale.silence();
                self.celebration_visible = false;
                self.permission_denied = false;
                tracing::info!("Recording started");
                Ok(())
            },
            Err(e) => {
                tracing::warn!("Failed to start capture: {}", e);
                self.permission_denied = true;
                Err(e)
            }
        }
    }

    /// Release the capture. Returns false if nothing was recording.
    pub fn stop(&mut self) -> bool {
        self.celebration_visible = false;

        match self.handle.take() {
            Some(handle) => {
                handle.release();
                tracing::info!("Recording stopped");
                true
            },
            None => false
        }
    }

    /// Return the peak to its floor and re-arm the celebration.
    pub fn reset_peak(&mut self) {
        self.tracker.reset();
        self.celebration_visible = false;
    }

    /// Refresh the window from the capture and fold it into the reading and peak.
    /// Does nothing once stopped.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        let handle = self.handle.as_mut()?;
        handle.poll(&mut self.buffer);

        self.decibel = loudness::estimate(&self.buffer, self.scale);
        // Taken from the rounded reading so the reported max is always a value that was shown
        let gauge = self.scale.to_gauge(self.decibel);

        let celebration = self.tracker.update(gauge);
        if celebration.is_some() {
            self.celebration_visible = true;
        }

        Some(TickOutcome {
            decibel: self.decibel,
            gauge,
            celebration,
        })
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            buffer: &self.buffer,
            scale: self.scale,
            decibel: self.decibel,
            max_decibel: self.max_decibel(),
            celebration_visible: self.celebration_visible,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.handle.is_some()
    }

    pub fn permission_denied(&self) -> bool {
        self.permission_denied
    }

    /// Peak state in positive gauge units.
    pub fn peak(&self) -> PeakState {
        self.tracker.state()
    }

    pub fn decibel(&self) -> f32 {
        self.decibel
    }

    /// Running maximum in the display scale.
    pub fn max_decibel(&self) -> f32 {
        self.scale.from_gauge(self.tracker.state().max_decibel)
    }

    pub fn celebration_visible(&self) -> bool {
        self.celebration_visible
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

impl<S: CaptureSource> Drop for Session<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::capture::testing::{square_wave, ScriptedCapture};

    const LEN: usize = 64;

    fn config(scale: DecibelScale) -> SessionConfig {
        SessionConfig {
            buffer_len: LEN,
            scale,
            celebration_threshold: DEFAULT_CELEBRATION_THRESHOLD,
        }
    }

    #[test]
    fn idle_session_does_not_tick() {
        let capture = ScriptedCapture::constant(64, LEN);
        let probe = capture.probe.clone();
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));

        assert!(!session.is_recording());
        assert_eq!(session.tick(), None);
        assert_eq!(probe.polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn loud_tick_updates_reading_peak_and_celebration() {
        // Gauge readings: silence, 41.9, 54.0, 41.9
        let capture = ScriptedCapture::new(vec![
            vec![MIDPOINT; LEN],
            square_wave(16, LEN),
            square_wave(64, LEN),
            square_wave(16, LEN),
        ]);
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));
        session.start().unwrap();

        assert_eq!(session.tick().unwrap().decibel, 0.0);
        assert_eq!(session.tick().unwrap().decibel, 41.9);
        assert!(!session.celebration_visible());

        let loud = session.tick().unwrap();
        assert_eq!(loud.decibel, 54.0);
        assert_eq!(loud.celebration, Some(Celebration { peak: 54.0 }));
        assert!(session.celebration_visible());

        let quieter = session.tick().unwrap();
        assert_eq!(quieter.celebration, None);
        assert_eq!(session.decibel(), 41.9);
        assert_eq!(session.peak(), PeakState { max_decibel: 54.0, threshold_crossed: true });
        assert!(session.frame().celebration_visible);
    }

    #[test]
    fn dbfs_scale_reports_reading_and_max_in_dbfs() {
        let capture = ScriptedCapture::new(vec![square_wave(64, LEN), vec![MIDPOINT; LEN]]);
        let mut session = Session::new(capture, config(DecibelScale::NegativeDbfs));
        session.start().unwrap();

        let loud = session.tick().unwrap();
        assert_eq!(loud.decibel, -6.0);
        assert_eq!(loud.gauge, 54.0);
        // The latch runs on the gauge, so -6 dBFS still counts as loud
        assert!(loud.celebration.is_some());

        let silent = session.tick().unwrap();
        assert_eq!(silent.decibel, -60.0);
        assert_eq!(session.max_decibel(), -6.0);

        let frame = session.frame();
        assert_eq!(frame.decibel, -60.0);
        assert_eq!(frame.max_decibel, -6.0);
        assert_eq!(frame.scale, DecibelScale::NegativeDbfs);
    }

    /// `active` samples swinging `depth` either side of the midpoint, the rest silent.
    fn partial_wave(depth: u8, active: usize) -> Vec<u8> {
        let mut window = square_wave(depth, LEN);
        window[active..].fill(MIDPOINT);
        window
    }

    #[test]
    fn max_after_one_tick_is_the_reading_in_either_scale() {
        for scale in [DecibelScale::PositiveGauge, DecibelScale::NegativeDbfs] {
            for depth in 1..=127u8 {
                for active in 1..=LEN {
                    let capture = ScriptedCapture::new(vec![partial_wave(depth, active)]);
                    let mut session = Session::new(capture, config(scale));
                    session.start().unwrap();

                    let outcome = session.tick().unwrap();
                    assert_eq!(
                        session.max_decibel(), outcome.decibel,
                        "{:?} depth {} active {}", scale, depth, active
                    );
                }
            }
        }
    }

    #[test]
    fn stop_is_idempotent_and_releases_once() {
        let capture = ScriptedCapture::constant(64, LEN);
        let probe = capture.probe.clone();
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));

        session.start().unwrap();
        session.tick();
        assert!(session.celebration_visible());

        assert!(session.stop());
        assert!(!session.stop());
        assert!(!session.celebration_visible());
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);

        // No polling after release
        let polls = probe.polls.load(Ordering::SeqCst);
        assert_eq!(session.tick(), None);
        assert_eq!(probe.polls.load(Ordering::SeqCst), polls);
    }

    #[test]
    fn restart_gives_a_fresh_peak() {
        let capture = ScriptedCapture::new(vec![square_wave(64, LEN), vec![MIDPOINT; LEN]]);
        let probe = capture.probe.clone();
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));

        session.start().unwrap();
        session.tick();
        assert_eq!(session.peak(), PeakState { max_decibel: 54.0, threshold_crossed: true });

        session.stop();
        session.start().unwrap();
        assert_eq!(session.peak(), PeakState::default());
        assert!(!session.celebration_visible());

        // New handle replays from the start of the script
        assert!(session.tick().unwrap().celebration.is_some());
        assert_eq!(probe.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_while_recording_releases_the_old_handle() {
        let capture = ScriptedCapture::constant(64, LEN);
        let probe = capture.probe.clone();
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));

        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(probe.opened.load(Ordering::SeqCst), 2);
        assert_eq!(probe.live_handles(), 1);
    }

    #[test]
    fn reset_peak_twice_matches_once() {
        let capture = ScriptedCapture::constant(64, LEN);
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));
        session.start().unwrap();
        session.tick();

        session.reset_peak();
        assert_eq!(session.peak(), PeakState { max_decibel: 0.0, threshold_crossed: false });
        assert!(!session.celebration_visible());
        session.reset_peak();
        assert_eq!(session.peak(), PeakState { max_decibel: 0.0, threshold_crossed: false });

        // Still recording, and the latch is armed again
        assert!(session.is_recording());
        assert!(session.tick().unwrap().celebration.is_some());
    }

    #[test]
    fn denied_start_raises_flag_until_a_successful_start() {
        let capture = ScriptedCapture::constant(64, LEN);
        let probe = capture.probe.clone();
        probe.deny.store(true, Ordering::SeqCst);
        let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));

        let err = session.start().unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(session.permission_denied());
        assert!(!session.is_recording());
        assert_eq!(session.tick(), None);

        probe.deny.store(false, Ordering::SeqCst);
        session.start().unwrap();
        assert!(!session.permission_denied());
        assert!(session.is_recording());
    }

    #[test]
    fn dropping_a_recording_session_releases_capture() {
        let capture = ScriptedCapture::constant(64, LEN);
        let probe = capture.probe.clone();
        {
            let mut session = Session::new(capture, config(DecibelScale::PositiveGauge));
            session.start().unwrap();
            session.tick();
        }
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
        assert_eq!(probe.live_handles(), 0);
    }
}
