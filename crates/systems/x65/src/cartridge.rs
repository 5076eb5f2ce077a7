//! ROM cartridge images
//!
//! Two image layouts are accepted:
//! - Raw: 4K or 8K of ROM, mapped at $A000 (expansion block 5)
//! - Headered: a two-byte little-endian load address followed by the ROM,
//!   as written by most cartridge dumpers (`.a0`, `.prg`)

use thiserror::Error;

/// Default cartridge location
pub const CARTRIDGE_ADDR: u16 = 0xA000;
/// Largest ROM image that can be mapped
pub const MAX_CARTRIDGE_SIZE: usize = 0x8000;

const ROM_BLOCK: usize = 0x1000;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("Invalid ROM size: {0} bytes")]
    InvalidSize(usize),
    #[error("ROM too large: {0} bytes")]
    TooLarge(usize),
    #[error("ROM of {len} bytes at ${addr:04X} does not fit in the address space")]
    DoesNotFit { addr: u16, len: usize },
}

/// A parsed cartridge: where it goes and what it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomCartridge {
    load_addr: u16,
    rom: Vec<u8>,
}

impl RomCartridge {
    pub fn new(data: &[u8]) -> Result<Self, CartridgeError> {
        let len = data.len();
        if len > 0 && len % ROM_BLOCK == 0 {
            if len > 2 * ROM_BLOCK {
                return Err(CartridgeError::TooLarge(len));
            }
            return Ok(Self {
                load_addr: CARTRIDGE_ADDR,
                rom: data.to_vec(),
            });
        }

        if len % ROM_BLOCK != 2 || len == 2 {
            return Err(CartridgeError::InvalidSize(len));
        }
        let load_addr = u16::from_le_bytes([data[0], data[1]]);
        let rom = &data[2..];
        if rom.len() > MAX_CARTRIDGE_SIZE {
            return Err(CartridgeError::TooLarge(rom.len()));
        }
        if load_addr as usize + rom.len() > 0x1_0000 {
            return Err(CartridgeError::DoesNotFit {
                addr: load_addr,
                len: rom.len(),
            });
        }
        Ok(Self {
            load_addr,
            rom: rom.to_vec(),
        })
    }

    pub fn load_addr(&self) -> u16 {
        self.load_addr
    }

    pub fn size(&self) -> usize {
        self.rom.len()
    }

    pub fn into_rom(self) -> Vec<u8> {
        self.rom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headered(addr: u16, len: usize) -> Vec<u8> {
        let mut data = addr.to_le_bytes().to_vec();
        data.extend(std::iter::repeat(0xEA).take(len));
        data
    }

    #[test]
    fn test_raw_images_map_at_a000() {
        for len in [0x1000, 0x2000] {
            let cart = RomCartridge::new(&vec![0; len]).unwrap();
            assert_eq!(cart.load_addr(), CARTRIDGE_ADDR);
            assert_eq!(cart.size(), len);
        }
    }

    #[test]
    fn test_raw_image_too_large() {
        assert!(matches!(
            RomCartridge::new(&[0; 0x3000]),
            Err(CartridgeError::TooLarge(0x3000))
        ));
    }

    #[test]
    fn test_headered_image() {
        let cart = RomCartridge::new(&headered(0x6000, 0x4000)).unwrap();
        assert_eq!(cart.load_addr(), 0x6000);
        assert_eq!(cart.size(), 0x4000);
        assert!(cart.into_rom().iter().all(|&b| b == 0xEA));
    }

    #[test]
    fn test_headered_image_must_fit() {
        assert!(matches!(
            RomCartridge::new(&headered(0xF000, 0x2000)),
            Err(CartridgeError::DoesNotFit { addr: 0xF000, len: 0x2000 })
        ));
        assert!(RomCartridge::new(&headered(0xE000, 0x2000)).is_ok());
    }

    #[test]
    fn test_headered_image_limit() {
        assert!(RomCartridge::new(&headered(0x2000, MAX_CARTRIDGE_SIZE)).is_ok());
        assert!(matches!(
            RomCartridge::new(&headered(0x0000, MAX_CARTRIDGE_SIZE + ROM_BLOCK)),
            Err(CartridgeError::TooLarge(_))
        ));
    }

    #[test]
    fn test_invalid_sizes() {
        for len in [0, 1, 2, 100, 0x1001] {
            assert!(
                matches!(RomCartridge::new(&vec![0; len]), Err(CartridgeError::InvalidSize(n)) if n == len),
                "len {len}"
            );
        }
    }
}
