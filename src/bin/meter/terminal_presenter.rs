use std::io::{self, Write};
use std::time::Duration;

use rs_loudness_meter::capture::CaptureError;
use rs_loudness_meter::loudness::{LevelSmoother, LoudnessBand, DB_FLOOR};
use rs_loudness_meter::peak::Celebration;
use rs_loudness_meter::presenter::{waveform_points, Presenter};
use rs_loudness_meter::session::Frame;

const BAR_WIDTH: usize = 30;
const SPARKLINE_WIDTH: usize = 24;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Redraws a single status line on stdout every tick.
pub struct TerminalPresenter {
    smoother: LevelSmoother,
}

impl TerminalPresenter {
    pub fn new(refresh: Duration) -> Self {
        Self {
            smoother: LevelSmoother::new(refresh, 0.0),
        }
    }

    fn render(&mut self, frame: &Frame<'_>) -> String {
        let gauge = frame.scale.to_gauge(frame.decibel);
        let level = self.smoother.push(gauge);
        let band = LoudnessBand::from_gauge(gauge);

        let mut line = format!(
            "[{}] {} {:>6.1} dB  max {:>6.1}  {:<8}",
            level_bar(level),
            sparkline(frame),
            frame.decibel,
            frame.max_decibel,
            band
        );
        if frame.celebration_visible {
            line.push_str(" LOUD!");
        }
        line
    }
}

impl Presenter for TerminalPresenter {
    fn present(&mut self, frame: &Frame<'_>) {
        let line = self.render(frame);
        let mut stdout = io::stdout().lock();
        // Trailing spaces clear what is left of a longer previous line
        let _ = write!(stdout, "\r{}      ", line);
        let _ = stdout.flush();
    }

    fn celebrate(&mut self, celebration: &Celebration) {
        println!();
        tracing::info!("Peak of {:.1} crossed the celebration threshold", celebration.peak);
    }

    fn capture_failed(&mut self, error: &CaptureError) {
        println!();
        tracing::error!("Could not access the microphone: {}", error);
    }

    fn stopped(&mut self) {
        println!();
        self.smoother.reset(0.0);
        tracing::info!("Meter stopped");
    }
}

fn level_bar(gauge: f32) -> String {
    let filled = ((gauge / -DB_FLOOR) * BAR_WIDTH as f32).round().clamp(0.0, BAR_WIDTH as f32) as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Coarse waveform: the sample furthest from the centre line in each column.
fn sparkline(frame: &Frame<'_>) -> String {
    let height = (SPARK_LEVELS.len() * 2) as f32;
    let centre = height / 2.0;
    let points = waveform_points(frame.buffer, SPARKLINE_WIDTH as f32, height);
    // Last point only closes the polyline
    let samples = &points[..points.len() - 1];
    let per_column = (samples.len() / SPARKLINE_WIDTH).max(1);

    samples.chunks(per_column)
        .take(SPARKLINE_WIDTH)
        .map(|column| {
            let deviation = column.iter()
                .map(|&(_, y)| (y - centre).abs())
                .fold(0.0_f32, f32::max);
            let index = (deviation / centre * SPARK_LEVELS.len() as f32) as usize;
            SPARK_LEVELS[index.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}
