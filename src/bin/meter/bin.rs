mod settings;
mod terminal_presenter;

use std::fs::File;
use std::io::{self, BufRead};

use clap::Parser;
use rs_loudness_meter::capture::{get_input_devices, CpalCapture};
use rs_loudness_meter::meter_settings::MeterSettingsSave;
use rs_loudness_meter::scheduler::{spawn_meter_thread, FrameClock};
use settings::{MeterArguments, MeterSettings};
use terminal_presenter::TerminalPresenter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, filter::EnvFilter};

const LOG_FILE: &str = "loudness-meter.log";

pub fn init_tracing() {
    // Console layer
    let console_filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_timer(rs_loudness_meter::TimeOnlyFormat)
        .with_filter(console_filter_layer);

    // File layer, skipped if the log file can't be created
    let file_layer = match File::create(LOG_FILE) {
        Ok(file) => {
            let file_filter_layer = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug"));

            Some(fmt::layer()
                .with_writer(file)
                .with_thread_names(true)
                .with_ansi(false)
                .with_target(true)
                .with_filter(file_filter_layer))
        },
        Err(e) => {
            eprintln!("Failed to create log file {}: {}", LOG_FILE, e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

pub fn init_panic_logging() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("panic: {info:?}");
        default_hook(info);
    }));
}

fn list_devices() {
    match get_input_devices(&cpal::default_host()) {
        Ok(devices) if devices.is_empty() => tracing::info!("No input devices found"),
        Ok(devices) => {
            for device in devices {
                println!("{}", device);
            }
        },
        Err(e) => {
            tracing::error!("Failed to list input devices: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    init_tracing();
    tracing::info!("Started logging...");
    init_panic_logging();

    let args = MeterArguments::parse();
    if args.list_devices {
        list_devices();
        return;
    }

    let save_settings = args.save_settings;
    let settings = MeterSettings::new(args, Some(MeterSettingsSave::load_or_default()));
    tracing::info!("Meter settings: {:?}", settings);

    if save_settings {
        match MeterSettingsSave::from(settings.clone()).save() {
            Ok(()) => tracing::info!("Saved settings"),
            Err(e) => tracing::error!("Failed to save settings: {}", e),
        }
    }

    let refresh = settings.refresh_duration();
    let meter = match spawn_meter_thread(
        CpalCapture::new(settings.input_device.clone()),
        settings.session_config(),
        FrameClock::new(refresh),
        TerminalPresenter::new(refresh)
    ) {
        Ok(meter) => meter,
        Err(e) => {
            tracing::error!("Failed to start meter thread: {}", e);
            std::process::exit(1);
        }
    };

    meter.start();
    tracing::info!("Commands: start, stop, reset, quit");

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match line.trim() {
            "start" => meter.start(),
            "s" | "stop" => meter.stop(),
            "r" | "reset" => meter.reset_peak(),
            "q" | "quit" => break,
            "" => {},
            other => tracing::warn!("Unknown command '{}'", other),
        }
    }

    meter.shutdown();
}
