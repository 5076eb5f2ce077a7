//! X65 home computer board
//!
//! The X65 is a VIC-20 compatible machine: a 6502 CPU, two 6522 VIAs, a 6561
//! VIC for video and sound, 5K of built-in RAM and the character, BASIC and
//! KERNAL ROMs. This crate wires the chips together one clock tick at a time
//! over the shared pin word and exposes the board to hosts through
//! [`X65System`] and the workspace [`System`] trait.
//!
//! The CPU is supplied by the host as any [`PinCpu`].

mod bus;

pub mod audio;
pub mod cartridge;
pub mod config;
pub mod debug;
pub mod keyboard;
pub mod keymap;
pub mod memory;
pub mod snapshot;

use audio::{AudioBuffer, AudioSink};
use cartridge::{CartridgeError, RomCartridge};
use config::{JoystickType, MemoryConfig, X65Config, X65_FREQUENCY};
use debug::DebugHook;
use emu_core::chip::{pins, us_to_ticks, Chip, PinCpu};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::via_6522::Via6522;
use emu_core::vic_6561::{self, Vic6561, VicConfig, VideoFetch};
use emu_core::{types::Frame, MountPointInfo, System};
use keyboard::KeyboardMatrix;
use memory::{Access, Bank, Layer, MemoryBanks, MemoryMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snapshot::Snapshot;
use thiserror::Error;

pub use config::{AudioConfig, RomImages};
pub use snapshot::SNAPSHOT_VERSION;

pub const JOYSTICK_UP: u8 = 1 << 0;
pub const JOYSTICK_DOWN: u8 = 1 << 1;
pub const JOYSTICK_LEFT: u8 = 1 << 2;
pub const JOYSTICK_RIGHT: u8 = 1 << 3;
pub const JOYSTICK_FIRE: u8 = 1 << 4;

/// Emulated time covered by one video frame
const FRAME_US: u32 = (vic_6561::TICKS_PER_FRAME as u64 * 1_000_000 / X65_FREQUENCY) as u32;

#[derive(Debug, Error)]
pub enum X65Error {
    #[error("{name} ROM must be {expected} bytes, got {actual}")]
    RomSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Audio buffer of {0} samples exceeds the maximum")]
    AudioBufferTooLarge(usize),
    #[error("Quickload image too short: {0} bytes")]
    QuickloadTooShort(usize),
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("Snapshot version {found} does not match {expected}")]
    SnapshotVersion { expected: u32, found: u32 },
    #[error("Invalid snapshot: bad {0}")]
    SnapshotInvalid(&'static str),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything that makes up the running machine. Cloning it is a complete
/// save state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct X65State<C> {
    pub(crate) cpu: C,
    pub(crate) via1: Via6522,
    pub(crate) via2: Via6522,
    pub(crate) vic: Vic6561,
    pub(crate) pins: u64,
    pub(crate) valid: bool,

    pub(crate) kbd: KeyboardMatrix,
    /// Joystick directions coming from keyboard keys
    pub(crate) kbd_joy_mask: u8,
    /// Joystick directions set by the host
    pub(crate) joy_joy_mask: u8,
    pub(crate) joystick_type: JoystickType,
    pub(crate) mem_config: MemoryConfig,

    pub(crate) banks: MemoryBanks,
    pub(crate) mem_cpu: MemoryMap,
    pub(crate) mem_vic: MemoryMap,

    pub(crate) audio: AudioBuffer,
}

impl<C> X65State<C> {
    #[inline]
    pub(crate) fn joystick_mask(&self) -> u8 {
        self.kbd_joy_mask | self.joy_joy_mask
    }
}

/// Framebuffer geometry and colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub width: usize,
    pub height: usize,
    /// Visible part of the framebuffer: x, y, width, height
    pub screen: (usize, usize, usize, usize),
    pub palette: &'static [u32; 16],
}

/// An X65 board with a host-supplied CPU
pub struct X65System<C> {
    state: X65State<C>,
    audio_sink: Box<dyn AudioSink>,
    debug: Option<Box<dyn DebugHook>>,
}

impl<C: PinCpu> X65System<C> {
    pub fn new(mut cpu: C, config: X65Config) -> Result<Self, X65Error> {
        config.roms.validate()?;
        let audio_config = config.audio.resolved()?;

        let vic = Vic6561::new(&VicConfig {
            tick_hz: X65_FREQUENCY as u32,
            sound_hz: audio_config.sample_rate,
            sound_magnitude: audio_config.volume,
        });
        let banks = MemoryBanks::new(&config.roms.chars, &config.roms.basic, &config.roms.kernal);
        let pins = cpu.power_on();

        log(LogCategory::Bus, LogLevel::Info, || {
            format!(
                "X65: init, memory {:?}, joystick {:?}, {} Hz audio in blocks of {}",
                config.mem_config,
                config.joystick_type,
                audio_config.sample_rate,
                audio_config.num_samples
            )
        });

        Ok(Self {
            state: X65State {
                cpu,
                via1: Via6522::new(),
                via2: Via6522::new(),
                vic,
                pins,
                valid: true,
                kbd: keymap::x65_keyboard(),
                kbd_joy_mask: 0,
                joy_joy_mask: 0,
                joystick_type: config.joystick_type,
                mem_config: config.mem_config,
                banks,
                mem_cpu: memory::cpu_layout(config.mem_config),
                mem_vic: memory::vic_layout(),
                audio: AudioBuffer::new(audio_config.num_samples),
            },
            audio_sink: config
                .audio_sink
                .unwrap_or_else(|| Box::new(|_: &[f32]| {})),
            debug: config.debug,
        })
    }

    /// Reset the chips and pull the CPU's RES line. RAM, ROM and any
    /// inserted cartridge are kept.
    pub fn reset(&mut self) {
        debug_assert!(self.state.valid);
        let state = &mut self.state;
        state.pins |= pins::RES;
        state.via1.reset();
        state.via2.reset();
        state.vic.reset();
        log(LogCategory::Bus, LogLevel::Info, || "X65: reset".to_string());
    }

    /// Mark the system as unusable
    pub fn discard(&mut self) {
        debug_assert!(self.state.valid);
        self.state.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.state.valid
    }

    /// Run for `micro_seconds` of emulated time and return the number of
    /// ticks executed. With a debug hook installed the run stops early as
    /// soon as the hook reports it is stopped. A single call runs at most
    /// `u32::MAX` ticks, so the returned count is always exact.
    pub fn exec(&mut self, micro_seconds: u32) -> u32 {
        debug_assert!(self.state.valid);
        let executed = self.run_ticks(exec_ticks(micro_seconds));
        self.state.kbd.update(micro_seconds);
        u32::try_from(executed).unwrap_or(u32::MAX)
    }

    fn run_ticks(&mut self, num_ticks: u64) -> u64 {
        let Self {
            state,
            audio_sink,
            debug,
        } = self;
        let sink: &mut dyn AudioSink = &mut **audio_sink;
        let mut pins = state.pins;
        let executed = match debug {
            None => {
                for _ in 0..num_ticks {
                    pins = state.tick(pins, sink);
                }
                num_ticks
            }
            Some(hook) => {
                let mut ticks = 0;
                while ticks < num_ticks && !hook.stopped() {
                    pins = state.tick(pins, sink);
                    hook.on_tick(pins);
                    ticks += 1;
                }
                ticks
            }
        };
        state.pins = pins;
        executed
    }

    pub fn key_down(&mut self, key_code: u8) {
        debug_assert!(self.state.valid);
        match self.joystick_key(key_code) {
            Some(bit) => self.state.kbd_joy_mask |= bit,
            None => self.state.kbd.key_down(key_code),
        }
    }

    pub fn key_up(&mut self, key_code: u8) {
        debug_assert!(self.state.valid);
        match self.joystick_key(key_code) {
            Some(bit) => self.state.kbd_joy_mask &= !bit,
            None => self.state.kbd.key_up(key_code),
        }
    }

    /// With a digital joystick attached, space and the cursor keys move the
    /// joystick instead of pressing keys.
    fn joystick_key(&self, key_code: u8) -> Option<u8> {
        if self.state.joystick_type != JoystickType::Digital {
            return None;
        }
        match key_code {
            keymap::KEY_SPACE => Some(JOYSTICK_FIRE),
            keymap::KEY_CURSOR_LEFT => Some(JOYSTICK_LEFT),
            keymap::KEY_CURSOR_RIGHT => Some(JOYSTICK_RIGHT),
            keymap::KEY_CURSOR_DOWN => Some(JOYSTICK_DOWN),
            keymap::KEY_CURSOR_UP => Some(JOYSTICK_UP),
            _ => None,
        }
    }

    /// Set the host joystick state, a combination of the `JOYSTICK_*` bits
    pub fn joystick(&mut self, mask: u8) {
        debug_assert!(self.state.valid);
        self.state.joy_joy_mask = mask;
    }

    /// Directions currently seen by the VIAs, from keys and host combined
    pub fn joystick_mask(&self) -> u8 {
        self.state.joystick_mask()
    }

    /// Copy a program into memory. The first two bytes are the little-endian
    /// load address; bytes running past $FFFF are dropped.
    pub fn quickload(&mut self, data: &[u8]) -> Result<(), X65Error> {
        debug_assert!(self.state.valid);
        if data.len() < 2 {
            return Err(X65Error::QuickloadTooShort(data.len()));
        }
        let start = u16::from_le_bytes([data[0], data[1]]);
        let payload = &data[2..];
        let state = &mut self.state;
        for (addr, &byte) in (start as usize..0x1_0000).zip(payload) {
            state.mem_cpu.write(&mut state.banks, addr as u16, byte);
        }
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("X65: quickloaded {} bytes at ${:04X}", payload.len(), start)
        });
        Ok(())
    }

    /// Map a ROM cartridge over the system memory and reset
    pub fn insert_rom_cartridge(&mut self, data: &[u8]) -> Result<(), X65Error> {
        debug_assert!(self.state.valid);
        let cart = RomCartridge::new(data)?;
        let addr = cart.load_addr();
        let len = cart.size();

        let state = &mut self.state;
        state.mem_cpu.unmap_layer(Layer::Cartridge);
        state.banks.cartridge = cart.into_rom();
        state.mem_cpu.map(
            Layer::Cartridge,
            addr,
            len,
            Bank::Cartridge,
            0,
            Access::ReadOnly,
        );
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("X65: cartridge of {} bytes at ${:04X}", len, addr)
        });
        self.reset();
        Ok(())
    }

    pub fn remove_rom_cartridge(&mut self) {
        debug_assert!(self.state.valid);
        self.state.mem_cpu.unmap_layer(Layer::Cartridge);
        self.state.banks.cartridge.clear();
        log(LogCategory::Bus, LogLevel::Info, || {
            "X65: cartridge removed".to_string()
        });
        self.reset();
    }

    pub fn has_cartridge(&self) -> bool {
        self.state
            .mem_cpu
            .regions()
            .iter()
            .any(|r| r.layer == Layer::Cartridge)
    }

    pub fn display_info(&self) -> DisplayInfo {
        DisplayInfo {
            width: vic_6561::FRAMEBUFFER_WIDTH,
            height: vic_6561::FRAMEBUFFER_HEIGHT,
            screen: (
                vic_6561::SCREEN_X,
                vic_6561::SCREEN_Y,
                vic_6561::SCREEN_WIDTH,
                vic_6561::SCREEN_HEIGHT,
            ),
            palette: &vic_6561::PALETTE,
        }
    }

    /// Palette indices, one byte per pixel
    pub fn framebuffer(&self) -> &[u8] {
        self.state.vic.framebuffer()
    }

    pub fn state(&self) -> &X65State<C> {
        &self.state
    }

    pub fn cpu(&self) -> &C {
        &self.state.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.state.cpu
    }

    /// Pin word after the last tick
    pub fn pins(&self) -> u64 {
        self.state.pins
    }

    pub fn via1(&self) -> &Via6522 {
        &self.state.via1
    }

    pub fn via2(&self) -> &Via6522 {
        &self.state.via2
    }

    pub fn vic(&self) -> &Vic6561 {
        &self.state.vic
    }

    pub fn keyboard(&self) -> &KeyboardMatrix {
        &self.state.kbd
    }

    pub fn audio_buffer(&self) -> &AudioBuffer {
        &self.state.audio
    }

    pub fn mem_config(&self) -> MemoryConfig {
        self.state.mem_config
    }

    /// Read through the CPU memory map without touching any chip
    pub fn peek(&self, addr: u16) -> u8 {
        self.state.mem_cpu.read(&self.state.banks, addr)
    }

    /// Write through the CPU memory map without touching any chip
    pub fn poke(&mut self, addr: u16, value: u8) {
        let state = &mut self.state;
        state.mem_cpu.write(&mut state.banks, addr, value);
    }

    /// Fetch as the VIC would: color nibble in bits 8-11, data in 0-7
    pub fn vic_fetch(&self, addr: u16) -> u16 {
        bus::VicFetch {
            map: &self.state.mem_vic,
            banks: &self.state.banks,
        }
        .fetch(addr)
    }
}

/// Ticks covered by `micro_seconds`, capped to what `exec` can report
fn exec_ticks(micro_seconds: u32) -> u64 {
    us_to_ticks(X65_FREQUENCY, micro_seconds).min(u32::MAX as u64)
}

const MOUNT_CARTRIDGE: &str = "Cartridge";
const MOUNT_PROGRAM: &str = "Program";

impl<C> System for X65System<C>
where
    C: PinCpu + Clone + Serialize + DeserializeOwned,
{
    type Error = X65Error;

    fn reset(&mut self) {
        X65System::reset(self);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.run_ticks(vic_6561::TICKS_PER_FRAME as u64);
        self.state.kbd.update(FRAME_US);

        let mut frame = Frame::new(
            vic_6561::FRAMEBUFFER_WIDTH as u32,
            vic_6561::FRAMEBUFFER_HEIGHT as u32,
        );
        for (pixel, &index) in frame.pixels.iter_mut().zip(self.framebuffer()) {
            *pixel = vic_6561::color(index);
        }
        Ok(frame)
    }

    fn save_state(&self) -> Result<Value, Self::Error> {
        Ok(serde_json::to_value(self.save_snapshot())?)
    }

    fn load_state(&mut self, v: &Value) -> Result<(), Self::Error> {
        let snapshot: Snapshot<C> = serde_json::from_value(v.clone())?;
        self.load_snapshot(&snapshot)
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: MOUNT_CARTRIDGE.to_string(),
                name: "Cartridge Slot".to_string(),
                extensions: vec!["a0".to_string(), "prg".to_string(), "bin".to_string()],
                required: false,
            },
            MountPointInfo {
                id: MOUNT_PROGRAM.to_string(),
                name: "Program (quickload)".to_string(),
                extensions: vec!["prg".to_string()],
                required: false,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        match mount_point_id {
            MOUNT_CARTRIDGE => self.insert_rom_cartridge(data),
            MOUNT_PROGRAM => self.quickload(data),
            _ => Err(X65Error::InvalidMountPoint(mount_point_id.to_string())),
        }
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            MOUNT_CARTRIDGE => {
                self.remove_rom_cartridge();
                Ok(())
            }
            // A quickloaded program is just memory contents
            MOUNT_PROGRAM => Ok(()),
            _ => Err(X65Error::InvalidMountPoint(mount_point_id.to_string())),
        }
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == MOUNT_CARTRIDGE && self.has_cartridge()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_frame_duration() {
        assert_eq!(FRAME_US, 19_985);
    }

    #[test]
    fn test_new_rejects_bad_roms() {
        let mut roms = roms();
        roms.chars.truncate(100);
        let result = X65System::new(IdleCpu::default(), X65Config::new(roms));
        assert!(matches!(
            result,
            Err(X65Error::RomSize { name: "character", .. })
        ));
    }

    #[test]
    fn test_new_rejects_large_audio_buffer() {
        let mut config = X65Config::new(roms());
        config.audio.num_samples = 4096;
        let result = X65System::new(IdleCpu::default(), config);
        assert!(matches!(result, Err(X65Error::AudioBufferTooLarge(4096))));
    }

    #[test]
    fn test_exec_counts_ticks() {
        let mut sys = system();
        assert_eq!(sys.exec(1_000), 1_108);
        assert_eq!(sys.cpu().ticks, 1_108);
        assert_eq!(sys.exec(0), 0);
        assert_eq!(sys.cpu().ticks, 1_108);
    }

    #[test]
    fn test_exec_zero_changes_nothing() {
        let mut sys = system();
        sys.poke(0x1000, 0x12);
        sys.key_down(b'A');
        sys.exec(300);
        let before = sys.save_snapshot();

        assert_eq!(sys.exec(0), 0);
        assert_eq!(sys.save_snapshot(), before);
    }

    #[test]
    fn test_exec_ticks_are_capped() {
        assert_eq!(exec_ticks(0), 0);
        assert_eq!(exec_ticks(1_000), 1_108);
        assert_eq!(exec_ticks(u32::MAX), u32::MAX as u64);
        assert!(us_to_ticks(X65_FREQUENCY, u32::MAX) > u32::MAX as u64);
    }

    #[test]
    fn test_digital_joystick_takes_cursor_keys() {
        let mut config = X65Config::new(roms());
        config.joystick_type = JoystickType::Digital;
        let mut sys = X65System::new(IdleCpu::default(), config).unwrap();

        sys.key_down(keymap::KEY_CURSOR_UP);
        sys.key_down(keymap::KEY_SPACE);
        assert_eq!(sys.joystick_mask(), JOYSTICK_UP | JOYSTICK_FIRE);
        assert!(!sys.keyboard().is_pressed(keymap::KEY_SPACE));

        sys.joystick(JOYSTICK_LEFT);
        assert_eq!(sys.joystick_mask(), JOYSTICK_UP | JOYSTICK_FIRE | JOYSTICK_LEFT);

        sys.key_up(keymap::KEY_CURSOR_UP);
        sys.key_up(keymap::KEY_SPACE);
        assert_eq!(sys.joystick_mask(), JOYSTICK_LEFT);

        // Other keys still reach the matrix
        sys.key_down(b'A');
        assert!(sys.keyboard().is_pressed(b'A'));
    }

    #[test]
    fn test_cursor_keys_without_joystick() {
        let mut sys = system();
        sys.key_down(keymap::KEY_CURSOR_UP);
        assert_eq!(sys.joystick_mask(), 0);
        assert!(sys.keyboard().is_pressed(keymap::KEY_CURSOR_UP));
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut sys = system();
        sys.poke(0x1234, 0x56);
        sys.reset();
        assert_eq!(sys.peek(0x1234), 0x56);
        assert_ne!(sys.pins() & pins::RES, 0);
    }

    #[test]
    fn test_discard() {
        let mut sys = system();
        assert!(sys.is_valid());
        sys.discard();
        assert!(!sys.is_valid());
    }

    #[test]
    fn test_display_info() {
        let info = system().display_info();
        assert_eq!((info.width, info.height), (284, 312));
        assert_eq!(info.screen, (32, 8, 232, 272));
        assert_eq!(info.palette.len(), 16);
    }

    #[test]
    fn test_mount_points() {
        let mut sys = system();
        let ids: Vec<_> = sys.mount_points().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["Cartridge", "Program"]);

        assert!(!sys.is_mounted("Cartridge"));
        sys.mount("Cartridge", &[0xAA; 0x2000]).unwrap();
        assert!(sys.is_mounted("Cartridge"));
        assert_eq!(sys.peek(0xA000), 0xAA);

        sys.mount("Program", &[0x00, 0x10, 0x42]).unwrap();
        assert_eq!(sys.peek(0x1000), 0x42);
        assert!(!sys.is_mounted("Program"));

        assert!(matches!(
            sys.mount("Tape", &[]),
            Err(X65Error::InvalidMountPoint(_))
        ));

        sys.unmount("Cartridge").unwrap();
        assert!(!sys.is_mounted("Cartridge"));
        assert_eq!(sys.peek(0xA000), memory::OPEN_BUS);
    }

    #[test]
    fn test_step_frame() {
        let mut sys = system();
        let frame = sys.step_frame().unwrap();
        assert_eq!(frame.width, 284);
        assert_eq!(frame.height, 312);
        assert_eq!(sys.cpu().ticks, vic_6561::TICKS_PER_FRAME as u64);
        assert_eq!(sys.vic().frame_count(), 1);
        assert!(frame.pixels.iter().all(|p| vic_6561::PALETTE.contains(p)));
    }

    #[test]
    fn test_save_state_value_round_trip() {
        let mut sys = system();
        sys.poke(0x0100, 0x77);
        sys.exec(500);
        let value = sys.save_state().unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);

        let mut other = system();
        other.load_state(&value).unwrap();
        assert_eq!(other.peek(0x0100), 0x77);
        assert_eq!(other.state(), sys.state());
    }

    #[test]
    fn test_load_state_rejects_inconsistent_state() {
        let mut sys = system();
        sys.exec(500);
        let mut value = sys.save_state().unwrap();
        value["state"]["audio"]["pos"] = serde_json::json!(5000);

        let mut other = system();
        other.poke(0x0100, 0x33);
        let before = other.save_snapshot();
        assert!(matches!(
            other.load_state(&value),
            Err(X65Error::SnapshotInvalid("audio buffer"))
        ));
        assert_eq!(other.save_snapshot(), before);
        assert_eq!(other.exec(100_000), 110_840);
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let mut sys = system();
        assert!(matches!(
            sys.load_state(&serde_json::json!({ "version": 1 })),
            Err(X65Error::Serialization(_))
        ));
    }
}
