//! MOS 6561 Video Interface Chip (VIC), PAL
//!
//! The 6561 generates the character display, border and background of the
//! VIC-20 family and contains a simple four-voice sound generator. It has 16
//! registers and its own 14-bit address space; it has no chip-select input
//! and instead decodes A8-A13 itself (see [`selected_addr`]).
//!
//! # Timing (PAL)
//!
//! - 71 clock ticks per raster line, 4 pixels per tick
//! - 312 raster lines per frame
//! - 22,152 ticks per frame
//!
//! # Registers ($0-$F)
//!
//! | Reg | Bits                                                     |
//! |-----|----------------------------------------------------------|
//! | $0  | 7: interlace, 0-6: screen origin X (4-pixel units)       |
//! | $1  | screen origin Y (2-line units)                           |
//! | $2  | 7: video address bit 9, 0-6: number of columns           |
//! | $3  | 7: raster bit 0 (read), 1-6: number of rows, 0: 8x16 chars |
//! | $4  | raster bits 1-8 (read)                                   |
//! | $5  | 4-7: video matrix address, 0-3: character address        |
//! | $6/$7 | light pen X/Y                                          |
//! | $8/$9 | paddle X/Y                                             |
//! | $A-$D | bass, alto, soprano, noise voice                       |
//! | $E  | 4-7: auxiliary color, 0-3: volume                        |
//! | $F  | 4-7: background, 3: normal (1) / reverse (0), 0-2: border |
//!
//! Rendering happens one tick at a time straight into a palette-index
//! framebuffer, fetching screen codes, color nibbles and character rows
//! through a [`VideoFetch`] capability handed in on each tick. Fetch timing
//! and memory access cycles are not reproduced exactly.

mod palette;
mod sound;

pub use palette::{color, PALETTE};
pub use sound::Sound;

use crate::chip::pins;
use serde::{Deserialize, Serialize};

pub const TICKS_PER_LINE: u16 = 71;
pub const LINES_PER_FRAME: u16 = 312;
pub const TICKS_PER_FRAME: u32 = TICKS_PER_LINE as u32 * LINES_PER_FRAME as u32;

pub const FRAMEBUFFER_WIDTH: usize = TICKS_PER_LINE as usize * 4;
pub const FRAMEBUFFER_HEIGHT: usize = LINES_PER_FRAME as usize;

/// Portion of the framebuffer a PAL display actually shows.
pub const SCREEN_X: usize = 32;
pub const SCREEN_Y: usize = 8;
pub const SCREEN_WIDTH: usize = 232;
pub const SCREEN_HEIGHT: usize = 272;

/// Memory access from the VIC's point of view.
pub trait VideoFetch {
    /// Fetch from the 14-bit video address space. Bits 0-7 hold the data
    /// byte, bits 8-11 the color RAM nibble at the same position.
    fn fetch(&self, addr: u16) -> u16;
}

/// The 6561 responds to any access where A8-A11 and A13 are low and A12 is
/// high. The board must only let this through inside its I/O window.
#[inline]
pub fn selected_addr(addr: u16) -> bool {
    addr & 0x3F00 == 0x1000
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VicConfig {
    /// Clock frequency the chip is ticked at
    pub tick_hz: u32,
    /// Audio samples generated per second
    pub sound_hz: u32,
    /// Output sample scale, 1.0 is full range
    pub sound_magnitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vic6561 {
    regs: [u8; 16],
    /// Beam position: tick within the line and raster line
    h_count: u16,
    v_count: u16,
    frames: u64,
    framebuffer: Vec<u8>,
    sound: Sound,
}

impl Vic6561 {
    pub fn new(config: &VicConfig) -> Self {
        Self {
            regs: [0; 16],
            h_count: 0,
            v_count: 0,
            frames: 0,
            framebuffer: vec![0; FRAMEBUFFER_WIDTH * FRAMEBUFFER_HEIGHT],
            sound: Sound::new(config.tick_hz, config.sound_hz, config.sound_magnitude),
        }
    }

    pub fn reset(&mut self) {
        self.regs = [0; 16];
        self.h_count = 0;
        self.v_count = 0;
        self.sound.reset();
    }

    /// Beam inside the frame and a full-size framebuffer
    pub fn is_consistent(&self) -> bool {
        self.framebuffer.len() == FRAMEBUFFER_WIDTH * FRAMEBUFFER_HEIGHT
            && self.h_count < TICKS_PER_LINE
            && self.v_count < LINES_PER_FRAME
    }

    /// Palette indices, `FRAMEBUFFER_WIDTH` per line
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Latest audio sample, valid when a tick returned `VIC_SAMPLE`
    pub fn sample(&self) -> f32 {
        self.sound.sample()
    }

    pub fn raster_line(&self) -> u16 {
        self.v_count
    }

    /// Completed frames since power-on
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Raw register value as last written
    pub fn register(&self, reg: u8) -> u8 {
        self.regs[(reg & 0x0F) as usize]
    }

    /// 14-bit address of the video matrix (screen codes)
    fn video_matrix_addr(&self) -> u16 {
        (((self.regs[5] & 0xF0) as u16) << 6) | (((self.regs[2] & 0x80) as u16) << 2)
    }

    /// 14-bit address of the character generator
    fn char_addr(&self) -> u16 {
        ((self.regs[5] & 0x0F) as u16) << 10
    }

    fn read(&self, reg: usize) -> u8 {
        match reg {
            0x3 => (self.regs[3] & 0x7F) | (((self.v_count & 1) as u8) << 7),
            0x4 => (self.v_count >> 1) as u8,
            0x8 | 0x9 => 0xFF,
            _ => self.regs[reg],
        }
    }

    /// Advance one clock tick. Performs a register access when `VIC_CS` is
    /// set and raises `VIC_SAMPLE` when a new audio sample is ready.
    pub fn tick(&mut self, pins: u64, mem: &dyn VideoFetch) -> u64 {
        let mut pins = pins & !pins::VIC_SAMPLE;

        if pins & pins::VIC_CS != 0 {
            let reg = (pins & 0x0F) as usize;
            if pins & pins::RW != 0 {
                pins = pins::set_data(pins, self.read(reg));
            } else {
                self.regs[reg] = pins::data(pins);
            }
        }

        self.render_tick(mem);
        self.advance_beam();

        if self.sound.tick(&self.regs) {
            pins |= pins::VIC_SAMPLE;
        }
        pins
    }

    fn advance_beam(&mut self) {
        self.h_count += 1;
        if self.h_count == TICKS_PER_LINE {
            self.h_count = 0;
            self.v_count += 1;
            if self.v_count == LINES_PER_FRAME {
                self.v_count = 0;
                self.frames += 1;
            }
        }
    }

    /// Produce the 4 pixels under the beam.
    fn render_tick(&mut self, mem: &dyn VideoFetch) {
        let h = self.h_count;
        let v = self.v_count;
        let start = v as usize * FRAMEBUFFER_WIDTH + h as usize * 4;
        let pixels = self.pixels_at(h, v, mem);
        self.framebuffer[start..start + 4].copy_from_slice(&pixels);
    }

    fn pixels_at(&self, h: u16, v: u16, mem: &dyn VideoFetch) -> [u8; 4] {
        let r = &self.regs;
        let border = r[0xF] & 0x07;
        let background = r[0xF] >> 4;
        let auxiliary = r[0xE] >> 4;

        let origin_x = (r[0] & 0x7F) as u16;
        let origin_y = r[1] as u16 * 2;
        let columns = (r[2] & 0x7F) as u16;
        let rows = ((r[3] >> 1) & 0x3F) as u16;
        let char_height: u16 = if r[3] & 0x01 != 0 { 16 } else { 8 };

        // Two ticks per 8-pixel character column
        let inside = h >= origin_x
            && h < origin_x + columns * 2
            && v >= origin_y
            && v < origin_y + rows * char_height;
        if !inside {
            return [border; 4];
        }

        let dx = h - origin_x;
        let dy = v - origin_y;
        let cell = (dy / char_height) * columns + dx / 2;
        let matrix = mem.fetch((self.video_matrix_addr() + cell) & 0x3FFF);
        let code = matrix & 0xFF;
        let color = ((matrix >> 8) & 0x0F) as u8;

        let row_addr = self.char_addr() + code * char_height + dy % char_height;
        let bitmap = mem.fetch(row_addr & 0x3FFF) as u8;
        let bits = if dx & 1 == 0 { bitmap >> 4 } else { bitmap & 0x0F };

        let foreground = color & 0x07;
        let mut out = [background; 4];
        if color & 0x08 == 0 {
            let reverse = r[0xF] & 0x08 == 0;
            for (i, px) in out.iter_mut().enumerate() {
                let set = bits & (0x08 >> i) != 0;
                *px = if set != reverse { foreground } else { background };
            }
        } else {
            // Multicolor: 2 bits per double-width pixel
            for pair in 0..2 {
                let value = (bits >> (2 - pair * 2)) & 0x03;
                let c = match value {
                    0 => background,
                    1 => border,
                    2 => foreground,
                    _ => auxiliary,
                };
                out[pair * 2] = c;
                out[pair * 2 + 1] = c;
            }
        }
        out
    }
}
