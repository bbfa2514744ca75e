use std::time::Duration;

use clap::Parser;
use rs_loudness_meter::loudness::DecibelScale;
use rs_loudness_meter::meter_settings::{buffer_size_samples, checked_buffer_size_exp, MeterSettingsSave};
use rs_loudness_meter::session::SessionConfig;

#[derive(Parser, Clone, Debug, Default)]
#[command(name = "Loudness Meter")]
pub struct MeterArguments {
    #[arg(short, long, help="Buffer size as a power of two, e.g. 10 for 1024 samples (default: 10)")]
    pub buffer_size: Option<usize>,
    #[arg(short, long, help="Milliseconds between meter updates (default: 16)")]
    pub refresh_ms: Option<u64>,
    #[arg(short, long, help="Decibel scale to display: positive-gauge (default) or negative-dbfs")]
    pub scale: Option<DecibelScale>,
    #[arg(short, long, help="Gauge level the peak must exceed to celebrate (default: 50)")]
    pub celebration_threshold: Option<f32>,
    #[arg(short, long)]
    pub input_device: Option<String>,
    #[arg(long, default_value_t=false, help="Ignore saved settings - use command line arguments/default")]
    pub ignore_save: bool,
    #[arg(long, default_value_t=false, help="Save the resulting settings as the new defaults")]
    pub save_settings: bool,
    #[arg(long, default_value_t=false, help="List input devices and exit")]
    pub list_devices: bool,
}

/// All meter settings, compiled from args, save file and default values.
#[derive(Clone, Debug, PartialEq)]
pub struct MeterSettings {
    pub buffer_size: usize,
    pub refresh_ms: u64,
    pub scale: DecibelScale,
    pub celebration_threshold: f32,
    pub input_device: Option<String>,
}

impl MeterSettings {
    pub fn new(args: MeterArguments, mut saved: Option<MeterSettingsSave>) -> Self {
        if args.ignore_save {
            saved = None;
        }
        let saved = saved.unwrap_or_default();

        MeterSettings {
            buffer_size: checked_buffer_size_exp(args.buffer_size.unwrap_or(saved.buffer_size)),
            refresh_ms: args.refresh_ms.unwrap_or(saved.refresh_ms),
            scale: args.scale.unwrap_or(saved.scale),
            celebration_threshold: args.celebration_threshold.unwrap_or(saved.celebration_threshold),
            input_device: args.input_device.or(saved.input_device),
        }
    }

    pub fn refresh_duration(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_len: buffer_size_samples(self.buffer_size),
            scale: self.scale,
            celebration_threshold: self.celebration_threshold,
        }
    }
}

impl From<MeterSettings> for MeterSettingsSave {
    fn from(value: MeterSettings) -> Self {
        Self {
            buffer_size: value.buffer_size,
            refresh_ms: value.refresh_ms,
            scale: value.scale,
            celebration_threshold: value.celebration_threshold,
            input_device: value.input_device,
        }
    }
}
