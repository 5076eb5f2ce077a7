//! 6561 color palette.
//!
//! The chip produces 16 fixed colors. Values are ARGB (0xAARRGGBB) and follow
//! commonly used PAL measurements; the first eight are the only ones usable
//! as character foreground colors.

pub const PALETTE: [u32; 16] = [
    0xFF000000, // black
    0xFFFFFFFF, // white
    0xFFB61F21, // red
    0xFF4DF0FF, // cyan
    0xFFB43FFF, // purple
    0xFF44E237, // green
    0xFF1A34FF, // blue
    0xFFDCD71B, // yellow
    0xFFCA5400, // orange
    0xFFE9B072, // light orange
    0xFFE79293, // pink
    0xFF9AF7FD, // light cyan
    0xFFE09FFF, // light purple
    0xFF8FE493, // light green
    0xFF8290FF, // light blue
    0xFFE5DE85, // light yellow
];

/// Look up the ARGB value of a palette index. Only the low nibble is used.
#[inline]
pub fn color(index: u8) -> u32 {
    PALETTE[(index & 0x0F) as usize]
}
