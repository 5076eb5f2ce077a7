//! Pin-level chip contract.
//!
//! Every chip on a pin-driven board exchanges a single 64-bit word per clock
//! cycle. The low 40 bits are the shared CPU bus (address, data, control); the
//! upper bits are chip-specific (chip selects, port lines, handshake lines).
//! A chip reads the word it is handed and returns the word with its outputs
//! applied.

/// A chip advanced one clock cycle at a time over the pin word.
pub trait Chip {
    /// Advance one cycle. Returns the pin word with this chip's outputs applied.
    fn tick(&mut self, pins: u64) -> u64;

    /// Return to the power-on register state.
    fn reset(&mut self);
}

/// A CPU driven through the pin contract.
///
/// The CPU ticks first every cycle; the returned word carries the address,
/// RW and (for writes) data of the bus cycle it wants performed. On the next
/// tick it samples D0-D7, IRQ, NMI, RDY and RES from the word it is given.
pub trait PinCpu: Chip {
    /// Initialize the CPU and return its initial pin word.
    fn power_on(&mut self) -> u64;
}

/// Bit layout of the shared pin word.
pub mod pins {
    pub const A0: u64 = 1 << 0;
    pub const A4: u64 = 1 << 4;
    pub const A5: u64 = 1 << 5;
    pub const A15: u64 = 1 << 15;

    pub const D0: u64 = 1 << 16;
    pub const D7: u64 = 1 << 23;

    /// High for reads, low for writes.
    pub const RW: u64 = 1 << 24;
    pub const SYNC: u64 = 1 << 25;
    pub const IRQ: u64 = 1 << 26;
    pub const NMI: u64 = 1 << 27;
    pub const RDY: u64 = 1 << 28;
    pub const RES: u64 = 1 << 30;

    /// Pins shared by every chip on the CPU bus.
    pub const BUS_MASK: u64 = 0xFF_FFFF_FFFF;

    pub const ADDR_MASK: u64 = 0xFFFF;
    pub const DATA_MASK: u64 = 0xFF << 16;

    // VIA-specific pins
    pub const VIA_CS1: u64 = 1 << 40;
    pub const VIA_CS2: u64 = 1 << 41;
    pub const VIA_CA1: u64 = 1 << 42;
    pub const VIA_CA2: u64 = 1 << 43;
    pub const VIA_CB1: u64 = 1 << 44;
    pub const VIA_CB2: u64 = 1 << 45;
    pub const VIA_PA0: u64 = 1 << 48;
    pub const VIA_PB0: u64 = 1 << 56;
    pub const VIA_PA_MASK: u64 = 0xFF << 48;
    pub const VIA_PB_MASK: u64 = 0xFF << 56;
    /// Register select lines RS0-RS3 are A0-A3.
    pub const VIA_RS_MASK: u64 = 0x0F;

    // VIC-specific pins
    pub const VIC_CS: u64 = 1 << 40;
    /// Raised for one tick whenever a new audio sample is ready.
    pub const VIC_SAMPLE: u64 = 1 << 41;

    #[inline]
    pub fn addr(pins: u64) -> u16 {
        (pins & ADDR_MASK) as u16
    }

    #[inline]
    pub fn set_addr(pins: u64, addr: u16) -> u64 {
        (pins & !ADDR_MASK) | addr as u64
    }

    #[inline]
    pub fn data(pins: u64) -> u8 {
        (pins >> 16) as u8
    }

    #[inline]
    pub fn set_data(pins: u64, data: u8) -> u64 {
        (pins & !DATA_MASK) | ((data as u64) << 16)
    }

    /// Copy the data lines of `from` onto `to`.
    #[inline]
    pub fn copy_data(to: u64, from: u64) -> u64 {
        (to & !DATA_MASK) | (from & DATA_MASK)
    }

    #[inline]
    pub fn port_a(pins: u64) -> u8 {
        (pins >> 48) as u8
    }

    #[inline]
    pub fn set_port_a(pins: u64, value: u8) -> u64 {
        (pins & !VIA_PA_MASK) | ((value as u64) << 48)
    }

    #[inline]
    pub fn port_b(pins: u64) -> u8 {
        (pins >> 56) as u8
    }

    #[inline]
    pub fn set_port_b(pins: u64, value: u8) -> u64 {
        (pins & !VIA_PB_MASK) | ((value as u64) << 56)
    }
}

/// Convert elapsed microseconds into whole clock ticks at `freq_hz`.
#[inline]
pub fn us_to_ticks(freq_hz: u64, micro_seconds: u32) -> u64 {
    freq_hz * micro_seconds as u64 / 1_000_000
}
