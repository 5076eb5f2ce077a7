//! Construction-time configuration

use crate::audio::AudioSink;
use crate::debug::DebugHook;
use crate::memory::{BASIC_ROM_SIZE, CHAR_ROM_SIZE, KERNAL_ROM_SIZE};
use crate::X65Error;
use serde::{Deserialize, Serialize};

/// System clock (PAL)
pub const X65_FREQUENCY: u64 = 1_108_404;

pub const DEFAULT_AUDIO_SAMPLES: usize = 128;
pub const MAX_AUDIO_SAMPLES: usize = 1024;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoystickType {
    #[default]
    None,
    /// Digital joystick on the VIA control port lines
    Digital,
}

/// RAM expansion fitted to the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryConfig {
    #[default]
    Standard,
    /// Block 1 at $2000
    Exp8K,
    /// Blocks 1-2 at $2000-$5FFF
    Exp16K,
    /// Blocks 1-3 at $2000-$7FFF
    Exp24K,
    /// Blocks 1-3 and block 5 at $A000
    Exp32K,
    /// Everything including the 3K block at $0400
    Max,
}

impl MemoryConfig {
    /// Number of 8K blocks mapped
    pub fn expansion_blocks(self) -> usize {
        match self {
            MemoryConfig::Standard => 0,
            MemoryConfig::Exp8K => 1,
            MemoryConfig::Exp16K => 2,
            MemoryConfig::Exp24K => 3,
            MemoryConfig::Exp32K | MemoryConfig::Max => 4,
        }
    }

    pub fn has_3k_block(self) -> bool {
        self == MemoryConfig::Max
    }
}

/// Audio output settings. Zero values select the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output scale, 1.0 is full range
    pub volume: f32,
    /// Samples collected before the sink is called
    pub num_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            volume: DEFAULT_VOLUME,
            num_samples: DEFAULT_AUDIO_SAMPLES,
        }
    }
}

impl AudioConfig {
    /// Replace zero values with defaults and check limits.
    pub fn resolved(self) -> Result<Self, X65Error> {
        let num_samples = if self.num_samples == 0 {
            DEFAULT_AUDIO_SAMPLES
        } else {
            self.num_samples
        };
        if num_samples > MAX_AUDIO_SAMPLES {
            return Err(X65Error::AudioBufferTooLarge(num_samples));
        }
        Ok(Self {
            sample_rate: if self.sample_rate == 0 {
                DEFAULT_SAMPLE_RATE
            } else {
                self.sample_rate
            },
            volume: if self.volume == 0.0 {
                DEFAULT_VOLUME
            } else {
                self.volume
            },
            num_samples,
        })
    }
}

/// ROM images the board cannot run without
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomImages {
    /// 4K character generator
    pub chars: Vec<u8>,
    /// 8K BASIC
    pub basic: Vec<u8>,
    /// 8K KERNAL
    pub kernal: Vec<u8>,
}

impl RomImages {
    pub fn validate(&self) -> Result<(), X65Error> {
        let check = |name: &'static str, data: &[u8], expected: usize| {
            if data.len() == expected {
                Ok(())
            } else {
                Err(X65Error::RomSize {
                    name,
                    expected,
                    actual: data.len(),
                })
            }
        };
        check("character", &self.chars, CHAR_ROM_SIZE)?;
        check("BASIC", &self.basic, BASIC_ROM_SIZE)?;
        check("KERNAL", &self.kernal, KERNAL_ROM_SIZE)
    }
}

/// Everything needed to build an [`crate::X65System`]
#[derive(Default)]
pub struct X65Config {
    pub roms: RomImages,
    pub audio: AudioConfig,
    pub joystick_type: JoystickType,
    pub mem_config: MemoryConfig,
    /// Receives audio samples in blocks of `audio.num_samples`
    pub audio_sink: Option<Box<dyn AudioSink>>,
    /// Switches `exec` into per-tick instrumented stepping
    pub debug: Option<Box<dyn DebugHook>>,
}

impl X65Config {
    pub fn new(roms: RomImages) -> Self {
        Self {
            roms,
            ..Self::default()
        }
    }

    pub fn with_audio_sink(mut self, sink: impl AudioSink + 'static) -> Self {
        self.audio_sink = Some(Box::new(sink));
        self
    }

    pub fn with_debug_hook(mut self, hook: impl DebugHook + 'static) -> Self {
        self.debug = Some(Box::new(hook));
        self
    }
}
