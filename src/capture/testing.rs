//! Scripted capture doubles for driving sessions and loops without an audio device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CaptureError, CaptureHandle, CaptureSource};
use crate::sample_buffer::{SampleBuffer, MIDPOINT};

/// Shared counters the test keeps after the source has moved into a session.
#[derive(Default, Debug)]
pub struct CaptureProbe {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub polls: AtomicUsize,
    pub deny: AtomicBool,
}

impl CaptureProbe {
    pub fn live_handles(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

/// Hands out handles that replay a fixed list of windows, repeating the last one.
pub struct ScriptedCapture {
    windows: Vec<Vec<u8>>,
    pub probe: Arc<CaptureProbe>,
}

impl ScriptedCapture {
    pub fn new(windows: Vec<Vec<u8>>) -> Self {
        assert!(!windows.is_empty(), "A script needs at least one window");
        Self {
            windows,
            probe: Arc::new(CaptureProbe::default()),
        }
    }

    /// Every window is the same square wave `depth` either side of the midpoint.
    pub fn constant(depth: u8, len: usize) -> Self {
        Self::new(vec![square_wave(depth, len)])
    }
}

pub fn square_wave(depth: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| if i % 2 == 0 { MIDPOINT + depth } else { MIDPOINT - depth }).collect()
}

impl CaptureSource for ScriptedCapture {
    type Handle = ScriptedHandle;

    fn open(&mut self, buffer_len: usize) -> Result<ScriptedHandle, CaptureError> {
        if self.probe.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("scripted denial".to_string()));
        }
        assert!(self.windows.iter().all(|w| w.len() == buffer_len), "Scripted windows must match the buffer length");

        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            windows: self.windows.clone(),
            next: 0,
            probe: self.probe.clone(),
        })
    }
}

pub struct ScriptedHandle {
    windows: Vec<Vec<u8>>,
    next: usize,
    probe: Arc<CaptureProbe>,
}

impl CaptureHandle for ScriptedHandle {
    fn poll(&mut self, buffer: &mut SampleBuffer) {
        let index = self.next.min(self.windows.len() - 1);
        buffer.as_mut().copy_from_slice(&self.windows[index]);
        self.next += 1;
        self.probe.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn release(self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}
