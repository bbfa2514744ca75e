/// Byte value of a zero crossing in the unsigned 8-bit time domain.
pub const MIDPOINT: u8 = 128;

/// A fixed-length window of unsigned 8-bit time-domain samples.
///
/// The length is always a power of two and never changes after creation. The capture
/// side refreshes the contents in place once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Box<[u8]>,
}

impl SampleBuffer {
    /// A buffer of `len` samples, all at the midpoint (silence).
    ///
    /// # Panics
    /// If `len` is not a power of two.
    pub fn new(len: usize) -> Self {
        assert!(len.is_power_of_two(), "Sample buffer length must be a power of two, got {}", len);
        Self {
            samples: vec![MIDPOINT; len].into_boxed_slice(),
        }
    }

    /// # Panics
    /// If the number of samples is not a power of two.
    pub fn from_samples(samples: Vec<u8>) -> Self {
        assert!(samples.len().is_power_of_two(), "Sample buffer length must be a power of two, got {}", samples.len());
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    // Power of two lengths are never zero
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn fill(&mut self, value: u8) {
        self.samples.fill(value);
    }

    /// Overwrite the buffer with floating point samples in [-1.0, 1.0].
    ///
    /// # Panics
    /// If `input` is not exactly the buffer's length.
    pub fn fill_from_f32(&mut self, input: &[f32]) {
        assert_eq!(input.len(), self.samples.len(), "Capture window does not match the sample buffer length");
        convert_f32_to_u8(input, &mut self.samples);
    }
}

impl AsRef<[u8]> for SampleBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.samples
    }
}

impl AsMut<[u8]> for SampleBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.samples
    }
}

/// Same mapping an analyser node uses for byte time-domain data: `128 * (1 + x)`, floored and clamped.
pub fn convert_f32_to_u8(input: &[f32], output: &mut [u8]) {
    for (o, &sample) in output.iter_mut().zip(input) {
        *o = (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_silent() {
        let buffer = SampleBuffer::new(16);
        assert_eq!(buffer.len(), 16);
        assert!(buffer.as_ref().iter().all(|&s| s == MIDPOINT));
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two() {
        SampleBuffer::new(1000);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_samples() {
        SampleBuffer::from_samples(vec![MIDPOINT; 3]);
    }

    #[test]
    fn float_conversion_matches_byte_domain() {
        let mut buffer = SampleBuffer::new(8);
        buffer.fill_from_f32(&[0.0, 1.0, -1.0, 0.5, -0.5, 2.0, -2.0, 0.999]);
        assert_eq!(buffer.as_ref(), &[128, 255, 0, 192, 64, 255, 0, 255]);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn wrong_window_length_is_a_bug() {
        let mut buffer = SampleBuffer::new(8);
        buffer.fill_from_f32(&[0.0; 4]);
    }
}
