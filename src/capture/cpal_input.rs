use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, InputCallbackInfo, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::time::{Duration, Instant};

use super::devices::find_input_device;
use super::{CaptureError, CaptureHandle, CaptureSource};
use crate::sample_buffer::SampleBuffer;

// Audio the ring holds beyond two windows, so a late tick does not lose samples
const RING_BUFFER_LATENCY_MS: f32 = 250.0;

pub fn ring_buffer_size(buffer_size: usize, latency: f32, sample_rate: f32) -> usize {
    let latency_frames = (latency / 1000.0) * sample_rate;
    buffer_size * 2 + latency_frames as usize
}

/// Microphone capture through the default cpal host.
#[derive(Clone, Debug, Default)]
pub struct CpalCapture {
    /// Device name to open. `None` uses the host's default input.
    pub input_device: Option<String>,
}

impl CpalCapture {
    pub fn new(input_device: Option<String>) -> Self {
        Self { input_device }
    }

    fn device(&self, host: &Host) -> Result<Device, CaptureError> {
        match &self.input_device {
            Some(name) => find_input_device(host, name)?
                .ok_or_else(|| CaptureError::DeviceNotFound(name.clone())),
            None => host.default_input_device().ok_or(CaptureError::NoInputDevice),
        }
    }
}

impl CaptureSource for CpalCapture {
    type Handle = CpalCaptureHandle;

    #[tracing::instrument(level = "debug", skip(self))]
    fn open(&mut self, buffer_len: usize) -> Result<CpalCaptureHandle, CaptureError> {
        let host = cpal::default_host();
        let device = self.device(&host)?;
        tracing::info!("Opening input device: {}", device.name().unwrap_or_else(|_| "<unnamed>".to_string()));

        let supported = device.default_input_config()?;
        tracing::debug!("Input config: {:?}", supported);

        let config: StreamConfig = supported.config();
        let ring_size = ring_buffer_size(buffer_len, RING_BUFFER_LATENCY_MS, config.sample_rate.0 as f32);
        tracing::debug!("Ring buffer size: {}", ring_size);
        let (producer, consumer) = HeapRb::<f32>::new(ring_size).split();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_input_stream::<f32>(&device, &config, producer),
            SampleFormat::F64 => build_mono_input_stream::<f64>(&device, &config, producer),
            SampleFormat::I8 => build_mono_input_stream::<i8>(&device, &config, producer),
            SampleFormat::I16 => build_mono_input_stream::<i16>(&device, &config, producer),
            SampleFormat::I32 => build_mono_input_stream::<i32>(&device, &config, producer),
            SampleFormat::I64 => build_mono_input_stream::<i64>(&device, &config, producer),
            SampleFormat::U8 => build_mono_input_stream::<u8>(&device, &config, producer),
            SampleFormat::U16 => build_mono_input_stream::<u16>(&device, &config, producer),
            SampleFormat::U32 => build_mono_input_stream::<u32>(&device, &config, producer),
            SampleFormat::U64 => build_mono_input_stream::<u64>(&device, &config, producer),
            other => return Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream.play()?;
        tracing::info!("Input stream started");

        Ok(CpalCaptureHandle {
            stream,
            consumer,
            window: RollingWindow::new(buffer_len, stale_input_timeout(RING_BUFFER_LATENCY_MS), Instant::now()),
            scratch: Vec::with_capacity(ring_size),
        })
    }
}

/// Downmix every frame to mono and push it into the ring.
fn build_mono_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: HeapProd<f32>,
) -> Result<Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = (config.channels as usize).max(1);
    let err_fn = |err: cpal::StreamError| {
        tracing::error!("An error occurred on the input stream: {}", err);
    };

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                // A full ring means the meter fell behind; drop instead of blocking the audio thread
                let _ = producer.try_push(sum / frame.len() as f32);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

pub struct CpalCaptureHandle {
    stream: Stream,
    consumer: HeapCons<f32>,
    window: RollingWindow,
    scratch: Vec<f32>,
}

impl CaptureHandle for CpalCaptureHandle {
    fn poll(&mut self, buffer: &mut SampleBuffer) {
        self.scratch.resize(self.consumer.occupied_len(), 0.0);
        let read = self.consumer.pop_slice(&mut self.scratch);
        self.window.update(&self.scratch[..read], Instant::now());
        buffer.fill_from_f32(&self.window.samples);
    }

    fn release(self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("Failed to pause input stream: {}", e);
        }
        drop(self.stream);
        tracing::info!("Input stream released");
    }
}

fn stale_input_timeout(latency_ms: f32) -> Duration {
    Duration::from_secs_f32(latency_ms / 1000.0)
}

/// Most recent mono samples, oldest first. Falls back to silence when the stream stops
/// delivering, e.g. after the device is unplugged.
struct RollingWindow {
    samples: Vec<f32>,
    last_input: Instant,
    stale_after: Duration,
    stale: bool,
}

impl RollingWindow {
    fn new(len: usize, stale_after: Duration, now: Instant) -> Self {
        Self {
            samples: vec![0.0; len],
            last_input: now,
            stale_after,
            stale: false,
        }
    }

    fn update(&mut self, incoming: &[f32], now: Instant) {
        if incoming.is_empty() {
            if !self.stale && now.saturating_duration_since(self.last_input) > self.stale_after {
                tracing::warn!("No input received for {:?}, showing silence", self.stale_after);
                self.samples.fill(0.0);
                self.stale = true;
            }
            return;
        }

        if self.stale {
            tracing::info!("Input resumed");
            self.stale = false;
        }
        self.last_input = now;
        slide_window(&mut self.samples, incoming);
    }
}

/// Append `incoming` to a fixed size window, discarding the oldest samples.
fn slide_window(window: &mut [f32], incoming: &[f32]) {
    let len = window.len();
    if incoming.len() >= len {
        window.copy_from_slice(&incoming[incoming.len() - len..]);
    } else {
        window.copy_within(incoming.len().., 0);
        window[len - incoming.len()..].copy_from_slice(incoming);
    }
}
