#![allow(dead_code)]

use emu_core::chip::{pins, Chip, PinCpu};
use emu_x65::config::X65Config;
use emu_x65::memory::{BASIC_ROM_SIZE, CHAR_ROM_SIZE, KERNAL_ROM_SIZE};
use emu_x65::{RomImages, X65System};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A CPU that plays back a list of bus cycles and records every pin word
/// it is handed. Once the script runs out it keeps reading $0000.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedCpu {
    script: VecDeque<u64>,
    /// Pin word seen at the start of each tick; entry n+1 carries the data
    /// bus result of cycle n.
    pub seen: Vec<u64>,
}

impl ScriptedCpu {
    pub fn new(cycles: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: cycles.into_iter().collect(),
            seen: Vec::new(),
        }
    }

    /// Data bus value the CPU received for script cycle `n`
    pub fn data_for(&self, n: usize) -> u8 {
        pins::data(self.seen[n + 1])
    }
}

impl Chip for ScriptedCpu {
    fn tick(&mut self, pins: u64) -> u64 {
        self.seen.push(pins);
        self.script.pop_front().unwrap_or(read(0x0000))
    }

    fn reset(&mut self) {}
}

impl PinCpu for ScriptedCpu {
    fn power_on(&mut self) -> u64 {
        read(0x0000)
    }
}

pub fn read(addr: u16) -> u64 {
    pins::set_addr(pins::RW, addr)
}

pub fn write(addr: u16, data: u8) -> u64 {
    pins::set_data(pins::set_addr(0, addr), data)
}

/// Character ROM filled with its address high byte, BASIC with $BA and
/// KERNAL with $CE.
pub fn roms() -> RomImages {
    RomImages {
        chars: (0..CHAR_ROM_SIZE).map(|i| (i >> 8) as u8).collect(),
        basic: vec![0xBA; BASIC_ROM_SIZE],
        kernal: vec![0xCE; KERNAL_ROM_SIZE],
    }
}

pub fn system_with(config: X65Config, cycles: impl IntoIterator<Item = u64>) -> X65System<ScriptedCpu> {
    X65System::new(ScriptedCpu::new(cycles), config).unwrap()
}

pub fn system(cycles: impl IntoIterator<Item = u64>) -> X65System<ScriptedCpu> {
    system_with(X65Config::new(roms()), cycles)
}

/// Build a system, run the script to completion and return it
pub fn run(cycles: Vec<u64>) -> X65System<ScriptedCpu> {
    let mut sys = system(cycles);
    // 100us is 110 ticks, more than any script here
    sys.exec(100);
    sys
}
