use crate::capture::CaptureError;
use crate::peak::Celebration;
use crate::sample_buffer::{SampleBuffer, MIDPOINT};
use crate::session::Frame;

/// Receives the meter's output. Called from the meter thread only.
pub trait Presenter {
    /// Once per tick while recording.
    fn present(&mut self, frame: &Frame<'_>);

    /// The running peak crossed the celebration threshold.
    fn celebrate(&mut self, _celebration: &Celebration) {}

    /// A start attempt failed. The meter will not retry on its own.
    fn capture_failed(&mut self, _error: &CaptureError) {}

    /// Recording stopped, either on request or because the loop is exiting.
    fn stopped(&mut self) {}
}

/// Polyline for drawing the window on a `width` x `height` surface.
///
/// One point per sample spread evenly across the width, `y = (sample / 128) * height / 2`,
/// closed with a final point at the right edge on the centre line.
pub fn waveform_points(buffer: &SampleBuffer, width: f32, height: f32) -> Vec<(f32, f32)> {
    let samples = buffer.as_ref();
    let slice_width = width / samples.len() as f32;

    let mut points: Vec<(f32, f32)> = samples.iter()
        .enumerate()
        .map(|(i, &s)| {
            let v = s as f32 / MIDPOINT as f32;
            (i as f32 * slice_width, v * height / 2.0)
        })
        .collect();

    points.push((width, height / 2.0));
    points
}
