//! Per-cycle board wiring
//!
//! One call to [`X65State::tick`] runs a full bus cycle: the CPU puts an
//! address on the bus, the I/O window or the CPU memory map answers, then
//! both VIAs and the VIC are clocked with their inputs wired up. Order is
//! fixed as CPU, VIA #1, VIA #2, VIC; when more than one chip is selected for
//! a read, the last one ticked owns the data bus.

use crate::audio::AudioSink;
use crate::memory::{MemoryBanks, MemoryMap};
use crate::{X65State, JOYSTICK_DOWN, JOYSTICK_FIRE, JOYSTICK_LEFT, JOYSTICK_RIGHT, JOYSTICK_UP};
use emu_core::chip::{pins, Chip, PinCpu};
use emu_core::vic_6561::{self, VideoFetch};

/// $9000-$93FF
const IO_WINDOW_MASK: u16 = 0xFC00;
const IO_WINDOW: u16 = 0x9000;

/// The VIC's view of memory: its own map plus the color RAM nibble bus.
pub(crate) struct VicFetch<'a> {
    pub map: &'a MemoryMap,
    pub banks: &'a MemoryBanks,
}

impl VideoFetch for VicFetch<'_> {
    #[inline]
    fn fetch(&self, addr: u16) -> u16 {
        let color = self.banks.color_ram[(addr & 0x03FF) as usize] & 0x0F;
        ((color as u16) << 8) | self.map.read(self.banks, addr & 0x3FFF) as u16
    }
}

#[inline]
fn selected_for_read(chip_pins: u64, cs: u64) -> bool {
    chip_pins & (cs | pins::RW) == cs | pins::RW
}

impl<C: PinCpu> X65State<C> {
    /// Run one bus cycle and return the new pin word.
    pub(crate) fn tick(&mut self, pins: u64, sink: &mut dyn AudioSink) -> u64 {
        let mut pins = self.cpu.tick(pins);

        // The VIAs drive these fresh every cycle
        pins &= !(pins::IRQ | pins::NMI);

        let bus = pins & pins::BUS_MASK;
        let mut via1_pins = bus | pins::VIA_CA1 | pins::VIA_CB1;
        let mut via2_pins = bus | pins::VIA_CA1 | pins::VIA_CB1;
        let mut vic_pins = bus;

        let addr = pins::addr(pins);
        if addr & IO_WINDOW_MASK == IO_WINDOW {
            // The VIC decodes the address itself; it only ever sees the
            // pattern here because the I/O window is checked first.
            if vic_6561::selected_addr(addr) {
                vic_pins |= pins::VIC_CS;
            }
            if pins & pins::A4 != 0 {
                via1_pins |= pins::VIA_CS1;
            }
            if pins & pins::A5 != 0 {
                via2_pins |= pins::VIA_CS1;
            }
        } else if pins & pins::RW != 0 {
            pins = pins::set_data(pins, self.mem_cpu.read(&self.banks, addr));
        } else {
            self.mem_cpu.write(&mut self.banks, addr, pins::data(pins));
        }

        let joy = self.joystick_mask();

        // VIA #1: joystick up/down/left/fire on PA2-PA5, IRQ wired to NMI.
        // Serial and cassette lines on the rest of port A float high.
        {
            let mut pa: u8 = 0xFF;
            for (bit, line) in [
                (JOYSTICK_UP, 2),
                (JOYSTICK_DOWN, 3),
                (JOYSTICK_LEFT, 4),
                (JOYSTICK_FIRE, 5),
            ] {
                if joy & bit != 0 {
                    pa &= !(1 << line);
                }
            }
            via1_pins = pins::set_port_a(via1_pins, pa);
            via1_pins = pins::set_port_b(via1_pins, 0xFF);
            via1_pins = self.via1.tick(via1_pins);
            if via1_pins & pins::IRQ != 0 {
                pins |= pins::NMI;
            }
            if selected_for_read(via1_pins, pins::VIA_CS1) {
                pins = pins::copy_data(pins, via1_pins);
            }
        }

        // VIA #2: keyboard rows on port A, columns and joystick right on port B
        {
            let rows = self.kbd.scan(self.kbd.active_columns());
            let pb = if joy & JOYSTICK_RIGHT != 0 { 0x7F } else { 0xFF };
            via2_pins = pins::set_port_a(via2_pins, rows);
            via2_pins = pins::set_port_b(via2_pins, pb);
            via2_pins = self.via2.tick(via2_pins);
            self.kbd.set_active_columns(!pins::port_b(via2_pins));
            if via2_pins & pins::IRQ != 0 {
                pins |= pins::IRQ;
            }
            if selected_for_read(via2_pins, pins::VIA_CS1) {
                pins = pins::copy_data(pins, via2_pins);
            }
        }

        {
            let fetch = VicFetch {
                map: &self.mem_vic,
                banks: &self.banks,
            };
            vic_pins = self.vic.tick(vic_pins, &fetch);
            if selected_for_read(vic_pins, pins::VIC_CS) {
                pins = pins::copy_data(pins, vic_pins);
            }
            if vic_pins & pins::VIC_SAMPLE != 0 {
                self.audio.push(self.vic.sample(), sink);
            }
        }

        pins
    }
}
