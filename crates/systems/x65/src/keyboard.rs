//! Keyboard matrix encoder
//!
//! Host key codes are translated into presses on an 8x8 matrix. Each code is
//! registered once with its column, row and the modifier keys (shift, ctrl)
//! that must be held with it. Up to `MAX_PRESSED_KEYS` codes can be down at
//! the same time.
//!
//! Hosts often deliver key down and key up within the same frame, before the
//! emulated machine has scanned the matrix. A press therefore stays visible
//! for at least `KEY_HOLD_US` of emulated time; an early key up only takes
//! effect once that time has passed.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const MAX_PRESSED_KEYS: usize = 4;
pub const MAX_MODIFIERS: usize = 2;

/// Minimum time a key stays pressed in the matrix
pub const KEY_HOLD_US: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct KeyDef {
    column: u8,
    row: u8,
    /// Bit n set: modifier n is held with this key
    modifiers: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PressedKey {
    code: u8,
    pressed_at: u64,
    /// key_up arrived before the hold time passed
    release_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardMatrix {
    /// Indexed by key code
    keys: Vec<Option<KeyDef>>,
    /// (column, row) of each modifier key
    modifiers: [Option<(u8, u8)>; MAX_MODIFIERS],
    pressed: Vec<PressedKey>,
    /// Emulated time advanced by `update`
    time_us: u64,
    /// Columns currently driven by the scanning port, bit n = column n
    active_columns: u8,
}

impl Default for KeyboardMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardMatrix {
    pub fn new() -> Self {
        Self {
            keys: vec![None; 256],
            modifiers: [None; MAX_MODIFIERS],
            pressed: Vec::with_capacity(MAX_PRESSED_KEYS),
            time_us: 0,
            active_columns: 0,
        }
    }

    /// Bind modifier `index` (0 or 1) to a matrix position
    pub fn register_modifier(&mut self, index: usize, column: u8, row: u8) {
        if let Some(slot) = self.modifiers.get_mut(index) {
            *slot = Some((column & 7, row & 7));
        }
    }

    /// Bind a key code to a matrix position and modifier mask. Registering
    /// the same code again replaces the earlier binding.
    pub fn register_key(&mut self, code: u8, column: u8, row: u8, modifiers: u8) {
        self.keys[code as usize] = Some(KeyDef {
            column: column & 7,
            row: row & 7,
            modifiers: modifiers & ((1 << MAX_MODIFIERS) - 1),
        });
    }

    pub fn is_registered(&self, code: u8) -> bool {
        self.keys[code as usize].is_some()
    }

    pub fn key_down(&mut self, code: u8) {
        if !self.is_registered(code) {
            log(LogCategory::Input, LogLevel::Debug, || {
                format!("Keyboard: ignoring unmapped key code ${:02X}", code)
            });
            return;
        }
        let now = self.time_us;
        if let Some(key) = self.pressed.iter_mut().find(|k| k.code == code) {
            key.pressed_at = now;
            key.release_pending = false;
            return;
        }
        if self.pressed.len() == MAX_PRESSED_KEYS {
            log(LogCategory::Input, LogLevel::Debug, || {
                format!("Keyboard: too many keys down, dropping ${:02X}", code)
            });
            return;
        }
        self.pressed.push(PressedKey {
            code,
            pressed_at: now,
            release_pending: false,
        });
    }

    pub fn key_up(&mut self, code: u8) {
        let now = self.time_us;
        if let Some(i) = self.pressed.iter().position(|k| k.code == code) {
            if now - self.pressed[i].pressed_at >= KEY_HOLD_US {
                self.pressed.remove(i);
            } else {
                self.pressed[i].release_pending = true;
            }
        }
    }

    /// Release everything immediately
    pub fn release_all(&mut self) {
        self.pressed.clear();
    }

    /// Advance keyboard time and apply releases whose hold time has passed.
    pub fn update(&mut self, elapsed_us: u32) {
        self.time_us += elapsed_us as u64;
        let now = self.time_us;
        self.pressed
            .retain(|k| !(k.release_pending && now - k.pressed_at >= KEY_HOLD_US));
    }

    pub fn is_pressed(&self, code: u8) -> bool {
        self.pressed.iter().any(|k| k.code == code)
    }

    /// A full key table, no more than `MAX_PRESSED_KEYS` down and no press
    /// stamped after the current time
    pub fn is_consistent(&self) -> bool {
        self.keys.len() == 256
            && self.pressed.len() <= MAX_PRESSED_KEYS
            && self.pressed.iter().all(|k| k.pressed_at <= self.time_us)
    }

    pub fn set_active_columns(&mut self, columns: u8) {
        self.active_columns = columns;
    }

    pub fn active_columns(&self) -> u8 {
        self.active_columns
    }

    /// Rows with a pressed key in one of `columns`, bit n = row n
    pub fn scan_lines(&self, columns: u8) -> u8 {
        let mut rows = 0u8;
        for key in &self.pressed {
            let Some(def) = self.keys[key.code as usize] else {
                continue;
            };
            if columns & (1 << def.column) != 0 {
                rows |= 1 << def.row;
            }
            for (i, modifier) in self.modifiers.iter().enumerate() {
                if def.modifiers & (1 << i) == 0 {
                    continue;
                }
                if let Some((column, row)) = *modifier {
                    if columns & (1 << column) != 0 {
                        rows |= 1 << row;
                    }
                }
            }
        }
        rows
    }

    /// Active-low row lines for `columns`, as read by the scanning port
    pub fn scan(&self, columns: u8) -> u8 {
        !self.scan_lines(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> KeyboardMatrix {
        let mut kbd = KeyboardMatrix::new();
        kbd.register_modifier(0, 3, 1);
        kbd.register_key(b'A', 2, 1, 0);
        kbd.register_key(b'a', 2, 1, 1);
        kbd.register_key(b'Z', 3, 4, 0);
        kbd
    }

    #[test]
    fn test_no_keys_pressed() {
        let kbd = matrix();
        assert_eq!(kbd.scan_lines(0xFF), 0);
        assert_eq!(kbd.scan(0xFF), 0xFF);
    }

    #[test]
    fn test_single_key() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        assert_eq!(kbd.scan_lines(1 << 2), 1 << 1);
        assert_eq!(kbd.scan_lines(!(1 << 2)), 0);
        assert_eq!(kbd.scan(0xFF), !(1 << 1));
    }

    #[test]
    fn test_modifier_is_pressed_with_key() {
        let mut kbd = matrix();
        kbd.key_down(b'a');
        assert_eq!(kbd.scan_lines(1 << 2), 1 << 1);
        // Shift lives at column 3, row 1
        assert_eq!(kbd.scan_lines(1 << 3), 1 << 1);
        assert_eq!(kbd.scan_lines(1 << 0), 0);
    }

    #[test]
    fn test_scan_is_pure() {
        let mut kbd = matrix();
        kbd.key_down(b'Z');
        let a = kbd.scan_lines(0x18);
        let b = kbd.scan_lines(0x18);
        assert_eq!(a, b);
        assert_eq!(a, 1 << 4);
    }

    #[test]
    fn test_unknown_code_ignored() {
        let mut kbd = matrix();
        kbd.key_down(0x7F);
        assert!(!kbd.is_pressed(0x7F));
        assert_eq!(kbd.scan_lines(0xFF), 0);
    }

    #[test]
    fn test_quick_release_held_until_update() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        kbd.key_up(b'A');
        assert!(kbd.is_pressed(b'A'));
        assert_eq!(kbd.scan_lines(0xFF), 1 << 1);

        kbd.update(KEY_HOLD_US as u32);
        assert!(!kbd.is_pressed(b'A'));
    }

    #[test]
    fn test_short_update_keeps_pending_release() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        kbd.key_up(b'A');
        kbd.update(10_000);
        assert!(kbd.is_pressed(b'A'));
        kbd.update(10_000);
        assert!(!kbd.is_pressed(b'A'));
    }

    #[test]
    fn test_release_after_hold_is_immediate() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        kbd.update(KEY_HOLD_US as u32);
        kbd.key_up(b'A');
        assert!(!kbd.is_pressed(b'A'));
    }

    #[test]
    fn test_repress_cancels_pending_release() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        kbd.key_up(b'A');
        kbd.key_down(b'A');
        kbd.update(KEY_HOLD_US as u32 * 2);
        assert!(kbd.is_pressed(b'A'));
    }

    #[test]
    fn test_pressed_key_limit() {
        let mut kbd = KeyboardMatrix::new();
        for code in 0..6u8 {
            kbd.register_key(b'0' + code, code, code, 0);
        }
        for code in 0..6u8 {
            kbd.key_down(b'0' + code);
        }
        assert_eq!(kbd.scan_lines(0xFF), 0x0F);
    }

    #[test]
    fn test_reregister_replaces_binding() {
        let mut kbd = matrix();
        kbd.register_key(b'Z', 0, 0, 0);
        kbd.key_down(b'Z');
        assert_eq!(kbd.scan_lines(1), 1);
        assert_eq!(kbd.scan_lines(1 << 3), 0);
    }

    #[test]
    fn test_consistency() {
        let mut kbd = matrix();
        kbd.key_down(b'A');
        assert!(kbd.is_consistent());

        let mut short = kbd.clone();
        short.keys.truncate(16);
        assert!(!short.is_consistent());

        let mut future = kbd.clone();
        future.pressed[0].pressed_at = future.time_us + 1;
        assert!(!future.is_consistent());

        let mut crowded = kbd.clone();
        crowded.pressed = vec![crowded.pressed[0]; MAX_PRESSED_KEYS + 1];
        assert!(!crowded.is_consistent());
    }
}
