//! MOS 6522 Versatile Interface Adapter (VIA), pin-level
//!
//! The 6522 provides two 8-bit I/O ports with per-bit direction control, two
//! 16-bit interval timers, a shift register and an interrupt controller with
//! four handshake lines (CA1/CA2/CB1/CB2).
//!
//! The chip is driven through the pin word: each `tick` samples the port and
//! handshake inputs, counts the timers down, performs a register access when
//! chip-selected (CS1 high, CS2 low) and drives the port outputs and IRQ back
//! onto the returned word. RS0-RS3 are wired to A0-A3.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                              |
//! |-----|------|------------------------------------------|
//! | $0  | ORB  | Port B data (read/write clears CB flags) |
//! | $1  | ORA  | Port A data (read/write clears CA flags) |
//! | $2  | DDRB | Port B direction (1 = output)            |
//! | $3  | DDRA | Port A direction (1 = output)            |
//! | $4  | T1CL | Timer 1 counter low (read clears T1)     |
//! | $5  | T1CH | Timer 1 counter high (write starts T1)   |
//! | $6  | T1LL | Timer 1 latch low                        |
//! | $7  | T1LH | Timer 1 latch high (write clears T1)     |
//! | $8  | T2CL | Timer 2 counter low (read clears T2)     |
//! | $9  | T2CH | Timer 2 counter high (write starts T2)   |
//! | $A  | SR   | Shift register                           |
//! | $B  | ACR  | Auxiliary control                        |
//! | $C  | PCR  | Peripheral control                       |
//! | $D  | IFR  | Interrupt flags                          |
//! | $E  | IER  | Interrupt enable                         |
//! | $F  | ORA  | Port A data, no handshake                |
//!
//! Shift register clocking and timer 2 pulse counting are not modelled; the
//! registers can be read and written but nothing shifts or counts.

use crate::chip::{pins, Chip};
use crate::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

const IFR_CA2: u8 = 0x01;
const IFR_CA1: u8 = 0x02;
const IFR_SR: u8 = 0x04;
const IFR_CB2: u8 = 0x08;
const IFR_CB1: u8 = 0x10;
const IFR_T2: u8 = 0x20;
const IFR_T1: u8 = 0x40;

/// ACR bit 6: timer 1 continuous (free-run) mode
const ACR_T1_CONTINUOUS: u8 = 0x40;
/// ACR bit 7: timer 1 drives PB7
const ACR_T1_PB7: u8 = 0x80;
/// ACR bit 5: timer 2 counts PB6 pulses
const ACR_T2_PULSES: u8 = 0x20;
/// ACR bits 2-4: shift register mode
const ACR_SR_MODE: u8 = 0x1C;

/// MOS 6522 VIA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via6522 {
    /// Output registers
    ora: u8,
    orb: u8,
    /// Data direction registers (1 = output)
    ddra: u8,
    ddrb: u8,
    /// Input levels sampled from the port pins on the last tick
    ina: u8,
    inb: u8,

    /// Timer 1 counter and 16-bit latch
    t1_counter: u16,
    t1_latch: u16,
    /// Cleared after a one-shot underflow until the counter is reloaded
    t1_armed: bool,
    /// PB7 output level when ACR routes timer 1 to PB7
    t1_pb7: bool,

    /// Timer 2 counter and low-byte latch
    t2_counter: u16,
    t2_latch_lo: u8,
    t2_armed: bool,

    sr: u8,
    acr: u8,
    pcr: u8,
    ifr: u8,
    ier: u8,

    /// Handshake input levels from the previous tick, for edge detection
    ca1: bool,
    cb1: bool,
}

impl Default for Via6522 {
    fn default() -> Self {
        Self::new()
    }
}

impl Via6522 {
    pub fn new() -> Self {
        Self {
            ora: 0,
            orb: 0,
            ddra: 0,
            ddrb: 0,
            ina: 0xFF,
            inb: 0xFF,
            t1_counter: 0xFFFF,
            t1_latch: 0xFFFF,
            t1_armed: false,
            t1_pb7: true,
            t2_counter: 0xFFFF,
            t2_latch_lo: 0xFF,
            t2_armed: false,
            sr: 0,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca1: true,
            cb1: true,
        }
    }

    /// True when an enabled interrupt flag is set
    pub fn irq_active(&self) -> bool {
        self.ifr & self.ier & 0x7F != 0
    }

    /// Levels currently driven or seen on port A
    pub fn port_a_pins(&self) -> u8 {
        (self.ora & self.ddra) | (self.ina & !self.ddra)
    }

    /// Levels currently driven or seen on port B
    pub fn port_b_pins(&self) -> u8 {
        let mut value = (self.orb & self.ddrb) | (self.inb & !self.ddrb);
        if self.acr & ACR_T1_PB7 != 0 {
            value = (value & 0x7F) | if self.t1_pb7 { 0x80 } else { 0 };
        }
        value
    }

    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    pub fn ier(&self) -> u8 {
        self.ier
    }

    pub fn timer1(&self) -> u16 {
        self.t1_counter
    }

    pub fn timer2(&self) -> u16 {
        self.t2_counter
    }

    fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x0 => {
                self.ifr &= !(IFR_CB1 | IFR_CB2);
                self.port_b_pins()
            }
            0x1 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.port_a_pins()
            }
            0x2 => self.ddrb,
            0x3 => self.ddra,
            0x4 => {
                self.ifr &= !IFR_T1;
                self.t1_counter as u8
            }
            0x5 => (self.t1_counter >> 8) as u8,
            0x6 => self.t1_latch as u8,
            0x7 => (self.t1_latch >> 8) as u8,
            0x8 => {
                self.ifr &= !IFR_T2;
                self.t2_counter as u8
            }
            0x9 => (self.t2_counter >> 8) as u8,
            0xA => {
                self.ifr &= !IFR_SR;
                self.sr
            }
            0xB => self.acr,
            0xC => self.pcr,
            0xD => {
                let any = if self.irq_active() { 0x80 } else { 0 };
                (self.ifr & 0x7F) | any
            }
            0xE => self.ier | 0x80,
            _ => self.port_a_pins(),
        }
    }

    fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x0 => {
                self.ifr &= !(IFR_CB1 | IFR_CB2);
                self.orb = value;
            }
            0x1 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.ora = value;
            }
            0x2 => self.ddrb = value,
            0x3 => self.ddra = value,
            0x4 | 0x6 => self.t1_latch = (self.t1_latch & 0xFF00) | value as u16,
            0x5 => {
                self.t1_latch = (self.t1_latch & 0x00FF) | ((value as u16) << 8);
                self.t1_counter = self.t1_latch;
                self.t1_armed = true;
                self.t1_pb7 = false;
                self.ifr &= !IFR_T1;
            }
            0x7 => {
                self.t1_latch = (self.t1_latch & 0x00FF) | ((value as u16) << 8);
                self.ifr &= !IFR_T1;
            }
            0x8 => self.t2_latch_lo = value,
            0x9 => {
                self.t2_counter = self.t2_latch_lo as u16 | ((value as u16) << 8);
                self.t2_armed = true;
                self.ifr &= !IFR_T2;
            }
            0xA => {
                self.sr = value;
                self.ifr &= !IFR_SR;
                if self.acr & ACR_SR_MODE != 0 {
                    log(LogCategory::Stubs, LogLevel::Debug, || {
                        format!("VIA: shift register mode {} not emulated", (self.acr >> 2) & 7)
                    });
                }
            }
            0xB => {
                self.acr = value;
                if value & ACR_T2_PULSES != 0 {
                    log(LogCategory::Stubs, LogLevel::Debug, || {
                        "VIA: timer 2 pulse counting not emulated".to_string()
                    });
                }
            }
            0xC => self.pcr = value,
            0xD => self.ifr &= !(value & 0x7F),
            0xE => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
            }
            _ => self.ora = value,
        }
    }

    /// Latch the handshake inputs and raise CA1/CB1 on the edge selected by PCR.
    fn sample_handshake(&mut self, ca1: bool, cb1: bool) {
        let ca1_positive = self.pcr & 0x01 != 0;
        if ca1 != self.ca1 && ca1 == ca1_positive {
            self.ifr |= IFR_CA1;
        }
        self.ca1 = ca1;

        let cb1_positive = self.pcr & 0x10 != 0;
        if cb1 != self.cb1 && cb1 == cb1_positive {
            self.ifr |= IFR_CB1;
        }
        self.cb1 = cb1;
    }

    fn tick_timers(&mut self) {
        let (t1, underflow) = self.t1_counter.overflowing_sub(1);
        self.t1_counter = t1;
        if underflow {
            if self.acr & ACR_T1_CONTINUOUS != 0 {
                self.t1_counter = self.t1_latch;
                self.ifr |= IFR_T1;
                if self.acr & ACR_T1_PB7 != 0 {
                    self.t1_pb7 = !self.t1_pb7;
                }
            } else if self.t1_armed {
                self.ifr |= IFR_T1;
                self.t1_armed = false;
                self.t1_pb7 = true;
            }
        }

        if self.acr & ACR_T2_PULSES == 0 {
            let (t2, underflow) = self.t2_counter.overflowing_sub(1);
            self.t2_counter = t2;
            if underflow && self.t2_armed {
                self.ifr |= IFR_T2;
                self.t2_armed = false;
            }
        }
    }
}

impl Chip for Via6522 {
    fn tick(&mut self, pins: u64) -> u64 {
        let mut pins = pins;
        let irq_before = self.irq_active();

        self.ina = pins::port_a(pins);
        self.inb = pins::port_b(pins);
        self.sample_handshake(pins & pins::VIA_CA1 != 0, pins & pins::VIA_CB1 != 0);
        self.tick_timers();

        if pins & (pins::VIA_CS1 | pins::VIA_CS2) == pins::VIA_CS1 {
            let reg = (pins & pins::VIA_RS_MASK) as u8;
            if pins & pins::RW != 0 {
                let value = self.read(reg);
                pins = pins::set_data(pins, value);
            } else {
                self.write(reg, pins::data(pins));
            }
        }

        pins = pins::set_port_a(pins, self.port_a_pins());
        pins = pins::set_port_b(pins, self.port_b_pins());

        let irq = self.irq_active();
        if irq != irq_before {
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                format!(
                    "VIA: IRQ {} (IFR={:02X} IER={:02X})",
                    if irq { "asserted" } else { "released" },
                    self.ifr,
                    self.ier
                )
            });
        }
        if irq {
            pins |= pins::IRQ;
        } else {
            pins &= !pins::IRQ;
        }
        pins
    }

    fn reset(&mut self) {
        // Timers and latches are not cleared by RES on real hardware
        let (t1_counter, t1_latch, t2_counter) = (self.t1_counter, self.t1_latch, self.t2_counter);
        *self = Self::new();
        self.t1_counter = t1_counter;
        self.t1_latch = t1_latch;
        self.t2_counter = t2_counter;
    }
}
