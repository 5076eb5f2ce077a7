//! Layered memory maps
//!
//! The board has two independent views of the same memory banks: the CPU's
//! 64K address space and the VIC's 14-bit address space. Each view is a list
//! of regions, each mapping an address range onto a slice of one bank.
//! Regions live on one of two layers. Layer 0 (cartridge) wins over layer 1
//! (system) wherever they overlap.
//!
//! Reads return the byte from the topmost covering region, or `0xFF` (open
//! bus) when nothing covers the address. Writes only go to the topmost
//! covering region and are dropped if that region is read-only; they never
//! fall through to a lower layer.

use crate::cartridge::MAX_CARTRIDGE_SIZE;
use crate::config::MemoryConfig;
use serde::{Deserialize, Serialize};

/// Value seen on the data bus when nothing drives it
pub const OPEN_BUS: u8 = 0xFF;

pub const RAM0_SIZE: usize = 0x0400;
pub const RAM3K_SIZE: usize = 0x0C00;
pub const RAM1_SIZE: usize = 0x1000;
pub const COLOR_RAM_SIZE: usize = 0x0400;
pub const EXPANSION_BLOCK_SIZE: usize = 0x2000;
pub const EXPANSION_BLOCKS: usize = 4;

pub const CHAR_ROM_SIZE: usize = 0x1000;
pub const BASIC_ROM_SIZE: usize = 0x2000;
pub const KERNAL_ROM_SIZE: usize = 0x2000;

/// CPU address of each expansion block
const EXPANSION_ADDR: [u16; EXPANSION_BLOCKS] = [0x2000, 0x4000, 0x6000, 0xA000];

/// Identifies a memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
    /// Zero page, stack, system variables
    Ram0,
    /// 3K expansion at $0400
    Ram3k,
    /// Main RAM
    Ram1,
    CharRom,
    BasicRom,
    KernalRom,
    /// 4-bit color RAM
    ColorRam,
    /// 8K expansion block 0-3
    Expansion(u8),
    Cartridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Priority tier of a region. Lower value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Cartridge = 0,
    System = 1,
}

/// Backing storage for every bank on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBanks {
    pub ram0: Vec<u8>,
    pub ram3k: Vec<u8>,
    pub ram1: Vec<u8>,
    pub char_rom: Vec<u8>,
    pub basic_rom: Vec<u8>,
    pub kernal_rom: Vec<u8>,
    pub color_ram: Vec<u8>,
    pub expansion: Vec<Vec<u8>>,
    pub cartridge: Vec<u8>,
}

impl MemoryBanks {
    /// Zeroed RAM and the given ROM images. ROM sizes are checked by the caller.
    pub fn new(char_rom: &[u8], basic_rom: &[u8], kernal_rom: &[u8]) -> Self {
        Self {
            ram0: vec![0; RAM0_SIZE],
            ram3k: vec![0; RAM3K_SIZE],
            ram1: vec![0; RAM1_SIZE],
            char_rom: char_rom.to_vec(),
            basic_rom: basic_rom.to_vec(),
            kernal_rom: kernal_rom.to_vec(),
            color_ram: vec![0; COLOR_RAM_SIZE],
            expansion: vec![vec![0; EXPANSION_BLOCK_SIZE]; EXPANSION_BLOCKS],
            cartridge: Vec::new(),
        }
    }

    /// Every bank has its board size and the cartridge fits its slot
    pub fn has_board_sizes(&self) -> bool {
        self.ram0.len() == RAM0_SIZE
            && self.ram3k.len() == RAM3K_SIZE
            && self.ram1.len() == RAM1_SIZE
            && self.char_rom.len() == CHAR_ROM_SIZE
            && self.basic_rom.len() == BASIC_ROM_SIZE
            && self.kernal_rom.len() == KERNAL_ROM_SIZE
            && self.color_ram.len() == COLOR_RAM_SIZE
            && self.expansion.len() == EXPANSION_BLOCKS
            && self.expansion.iter().all(|b| b.len() == EXPANSION_BLOCK_SIZE)
            && self.cartridge.len() <= MAX_CARTRIDGE_SIZE
    }

    pub fn bank(&self, bank: Bank) -> &[u8] {
        match bank {
            Bank::Ram0 => &self.ram0,
            Bank::Ram3k => &self.ram3k,
            Bank::Ram1 => &self.ram1,
            Bank::CharRom => &self.char_rom,
            Bank::BasicRom => &self.basic_rom,
            Bank::KernalRom => &self.kernal_rom,
            Bank::ColorRam => &self.color_ram,
            Bank::Expansion(i) => self
                .expansion
                .get(i as usize)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            Bank::Cartridge => &self.cartridge,
        }
    }

    pub fn bank_mut(&mut self, bank: Bank) -> &mut [u8] {
        match bank {
            Bank::Ram0 => &mut self.ram0,
            Bank::Ram3k => &mut self.ram3k,
            Bank::Ram1 => &mut self.ram1,
            Bank::CharRom => &mut self.char_rom,
            Bank::BasicRom => &mut self.basic_rom,
            Bank::KernalRom => &mut self.kernal_rom,
            Bank::ColorRam => &mut self.color_ram,
            Bank::Expansion(i) => match self.expansion.get_mut(i as usize) {
                Some(block) => block.as_mut_slice(),
                None => &mut [],
            },
            Bank::Cartridge => &mut self.cartridge,
        }
    }
}

/// One mapping of an address range onto a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: u16,
    /// Length in bytes, up to 0x10000
    pub len: u32,
    pub bank: Bank,
    /// Offset into the bank of the byte at `start`
    pub offset: usize,
    pub access: Access,
    pub layer: Layer,
}

impl Region {
    #[inline]
    fn covers(&self, addr: u16) -> bool {
        (addr.wrapping_sub(self.start) as u32) < self.len
    }

    #[inline]
    fn index(&self, addr: u16) -> usize {
        self.offset + addr.wrapping_sub(self.start) as usize
    }
}

/// A 64K address space built from layered regions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMap {
    /// Kept sorted by layer so the first covering region is the topmost
    regions: Vec<Region>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region. A later region on the same layer does not replace
    /// an earlier overlapping one; the first registered wins.
    pub fn map(
        &mut self,
        layer: Layer,
        start: u16,
        len: usize,
        bank: Bank,
        offset: usize,
        access: Access,
    ) {
        let len = len.min(0x1_0000 - start as usize) as u32;
        let region = Region {
            start,
            len,
            bank,
            offset,
            access,
            layer,
        };
        let pos = self.regions.partition_point(|r| r.layer <= layer);
        self.regions.insert(pos, region);
    }

    /// Drop every region on `layer`
    pub fn unmap_layer(&mut self, layer: Layer) {
        self.regions.retain(|r| r.layer != layer);
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// True when every region lies inside its bank
    pub fn fits(&self, banks: &MemoryBanks) -> bool {
        self.regions.iter().all(|r| {
            r.offset
                .checked_add(r.len as usize)
                .is_some_and(|end| end <= banks.bank(r.bank).len())
        })
    }

    /// Topmost region covering `addr`
    #[inline]
    pub fn resolve(&self, addr: u16) -> Option<&Region> {
        self.regions.iter().find(|r| r.covers(addr))
    }

    #[inline]
    pub fn read(&self, banks: &MemoryBanks, addr: u16) -> u8 {
        self.resolve(addr)
            .and_then(|r| banks.bank(r.bank).get(r.index(addr)).copied())
            .unwrap_or(OPEN_BUS)
    }

    #[inline]
    pub fn write(&self, banks: &mut MemoryBanks, addr: u16, value: u8) {
        if let Some(r) = self.resolve(addr) {
            if r.access == Access::ReadWrite {
                if let Some(byte) = banks.bank_mut(r.bank).get_mut(r.index(addr)) {
                    *byte = value;
                }
            }
        }
    }
}

/// CPU-visible layout for a memory configuration
pub fn cpu_layout(config: MemoryConfig) -> MemoryMap {
    use Access::*;
    use Bank::*;

    let mut map = MemoryMap::new();
    let sys = Layer::System;
    map.map(sys, 0x0000, RAM0_SIZE, Ram0, 0, ReadWrite);
    map.map(sys, 0x1000, RAM1_SIZE, Ram1, 0, ReadWrite);
    map.map(sys, 0x8000, CHAR_ROM_SIZE, CharRom, 0, ReadOnly);
    map.map(sys, 0x9400, COLOR_RAM_SIZE, ColorRam, 0, ReadWrite);
    map.map(sys, 0xC000, BASIC_ROM_SIZE, BasicRom, 0, ReadOnly);
    map.map(sys, 0xE000, KERNAL_ROM_SIZE, KernalRom, 0, ReadOnly);

    if config.has_3k_block() {
        map.map(sys, 0x0400, RAM3K_SIZE, Ram3k, 0, ReadWrite);
    }
    for (i, &addr) in EXPANSION_ADDR
        .iter()
        .enumerate()
        .take(config.expansion_blocks())
    {
        map.map(sys, addr, EXPANSION_BLOCK_SIZE, Expansion(i as u8), 0, ReadWrite);
    }
    map
}

/// VIC-visible layout. The VIC sees the character ROM at $0000 and the
/// internal RAM at $2000, all read-only.
pub fn vic_layout() -> MemoryMap {
    let mut map = MemoryMap::new();
    let layer = Layer::Cartridge;
    map.map(layer, 0x0000, CHAR_ROM_SIZE, Bank::CharRom, 0, Access::ReadOnly);
    map.map(layer, 0x2000, RAM0_SIZE, Bank::Ram0, 0, Access::ReadOnly);
    map.map(layer, 0x3000, RAM1_SIZE, Bank::Ram1, 0, Access::ReadOnly);
    map
}
