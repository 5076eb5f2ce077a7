//! 6561 sound generator.
//!
//! Three square-wave voices (bass, alto, soprano) and one noise voice, each
//! enabled by bit 7 of its register ($A-$D) with a 7-bit frequency value in
//! bits 0-6. The master volume is the low nibble of $E.
//!
//! Each voice toggles its output once every `prescale * (128 - freq)` clock
//! ticks; the noise voice steps a 16-bit LFSR instead. The mixed level is
//! averaged over the ticks between output samples.

use serde::{Deserialize, Serialize};

/// Clock ticks per frequency step for bass, alto, soprano and noise.
const PRESCALE: [u32; 4] = [128, 64, 32, 16];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Voice {
    countdown: u32,
    output: bool,
}

impl Voice {
    fn new() -> Self {
        Self {
            countdown: 1,
            output: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    voices: [Voice; 4],
    lfsr: u16,

    tick_hz: u32,
    sample_hz: u32,
    /// Bresenham accumulator deciding when the next sample is due
    phase: u32,
    accumulator: f32,
    accumulated_ticks: u32,

    magnitude: f32,
    sample: f32,
}

impl Sound {
    pub fn new(tick_hz: u32, sample_hz: u32, magnitude: f32) -> Self {
        Self {
            voices: [Voice::new(), Voice::new(), Voice::new(), Voice::new()],
            lfsr: 0xACE1,
            tick_hz,
            sample_hz,
            phase: 0,
            accumulator: 0.0,
            accumulated_ticks: 0,
            magnitude,
            sample: 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.tick_hz, self.sample_hz, self.magnitude);
    }

    /// Latest output sample
    pub fn sample(&self) -> f32 {
        self.sample
    }

    fn step_lfsr(&mut self) -> bool {
        let bit = (self.lfsr ^ (self.lfsr >> 2) ^ (self.lfsr >> 3) ^ (self.lfsr >> 5)) & 1;
        self.lfsr = (self.lfsr >> 1) | (bit << 15);
        self.lfsr & 1 != 0
    }

    /// Advance one clock tick. Returns true when a new sample is ready.
    pub fn tick(&mut self, regs: &[u8; 16]) -> bool {
        let mut level = 0.0f32;
        for i in 0..4 {
            let reg = regs[0x0A + i];
            let voice = &mut self.voices[i];
            voice.countdown = voice.countdown.saturating_sub(1);
            if voice.countdown == 0 {
                voice.countdown = PRESCALE[i] * (128 - (reg & 0x7F) as u32);
                if i == 3 {
                    let bit = self.step_lfsr();
                    self.voices[3].output = bit;
                } else {
                    voice.output = !voice.output;
                }
            }
            if reg & 0x80 != 0 && self.voices[i].output {
                level += 1.0;
            }
        }

        let volume = (regs[0x0E] & 0x0F) as f32 / 15.0;
        self.accumulator += level / 4.0 * volume;
        self.accumulated_ticks += 1;

        self.phase += self.sample_hz;
        if self.phase < self.tick_hz {
            return false;
        }
        self.phase -= self.tick_hz;
        self.sample = self.magnitude * self.accumulator / self.accumulated_ticks as f32;
        self.accumulator = 0.0;
        self.accumulated_ticks = 0;
        true
    }
}
