use std::time::Duration;

pub mod sample_buffer;
pub mod loudness;
pub mod peak;
pub mod capture;
pub mod session;
pub mod scheduler;
pub mod presenter;
pub mod meter_settings;

pub const SAVE_DIR: &str = "rs_loudness_meter";

// Roughly one display refresh at 60 FPS
pub const DEFAULT_REFRESH_DURATION: Duration = Duration::from_millis(16);

// Samples per analysis window, as a power of two exponent (2^10 = 1024)
pub const DEFAULT_BUFFER_SIZE_EXP: usize = 10;

#[cfg(test)]
pub(crate) fn unique_time_id() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now();
    let duration = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    duration.subsec_nanos()
}

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

pub struct TimeOnlyFormat;
impl FormatTime for TimeOnlyFormat {
    fn format_time(&self, w: &mut Writer) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.format("%H:%M:%S"))
    }
}
