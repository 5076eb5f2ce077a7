//! Audio sample buffering

use crate::config::MAX_AUDIO_SAMPLES;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// Receives blocks of audio samples. Called synchronously from inside the
/// tick loop, so it must not block.
pub trait AudioSink {
    fn push(&mut self, samples: &[f32]);
}

impl<F: FnMut(&[f32])> AudioSink for F {
    fn push(&mut self, samples: &[f32]) {
        self(samples)
    }
}

/// Fixed-capacity sample buffer flushed to a sink whenever it fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    pos: usize,
}

impl AudioBuffer {
    pub fn new(num_samples: usize) -> Self {
        let num_samples = num_samples.clamp(1, MAX_AUDIO_SAMPLES);
        Self {
            samples: vec![0.0; num_samples],
            pos: 0,
        }
    }

    /// Samples per flush
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Samples waiting for the next flush
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Non-empty, within the maximum size and with the write position inside
    pub fn is_consistent(&self) -> bool {
        let capacity = self.samples.len();
        capacity > 0 && capacity <= MAX_AUDIO_SAMPLES && self.pos < capacity
    }

    /// Store one sample. When the buffer fills, the whole block goes to the
    /// sink and collection starts again at position 0.
    pub fn push(&mut self, sample: f32, sink: &mut dyn AudioSink) {
        self.samples[self.pos] = sample;
        self.pos += 1;
        if self.pos == self.samples.len() {
            log(LogCategory::Audio, LogLevel::Trace, || {
                format!("Audio: flushing {} samples", self.samples.len())
            });
            sink.push(&self.samples);
            self.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_on_full() {
        let mut flushed: Vec<Vec<f32>> = Vec::new();
        let mut sink = |s: &[f32]| flushed.push(s.to_vec());
        let mut buf = AudioBuffer::new(4);

        for i in 0..3 {
            buf.push(i as f32, &mut sink);
        }
        assert_eq!(buf.pos(), 3);

        buf.push(3.0, &mut sink);
        assert_eq!(buf.pos(), 0);
        buf.push(4.0, &mut sink);
        drop(sink);

        assert_eq!(flushed, vec![vec![0.0, 1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_flush_count() {
        let mut calls = 0;
        let mut sink = |s: &[f32]| {
            assert_eq!(s.len(), 128);
            calls += 1;
        };
        let mut buf = AudioBuffer::new(128);
        for _ in 0..128 * 5 + 7 {
            buf.push(0.5, &mut sink);
        }
        assert_eq!(calls, 5);
        assert_eq!(buf.pos(), 7);
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(AudioBuffer::new(0).capacity(), 1);
        assert_eq!(AudioBuffer::new(5000).capacity(), MAX_AUDIO_SAMPLES);
    }

    #[test]
    fn test_consistency() {
        let mut buf = AudioBuffer::new(4);
        assert!(buf.is_consistent());
        buf.pos = 4;
        assert!(!buf.is_consistent());

        let oversized = AudioBuffer {
            samples: vec![0.0; MAX_AUDIO_SAMPLES + 1],
            pos: 0,
        };
        assert!(!oversized.is_consistent());
        assert!(!AudioBuffer { samples: Vec::new(), pos: 0 }.is_consistent());
    }
}
