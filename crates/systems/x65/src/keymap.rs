//! X65 key layout
//!
//! Host key codes are ASCII for printable keys plus the control codes below.
//! The matrix is scanned by VIA #2: port B selects columns, port A reads rows.
//! Shift sits at column 3 / row 1 and ctrl at column 2 / row 0.

use crate::keyboard::KeyboardMatrix;

pub const KEY_DELETE: u8 = 0x01;
pub const KEY_STOP: u8 = 0x03;
pub const KEY_CURSOR_LEFT: u8 = 0x08;
pub const KEY_CURSOR_RIGHT: u8 = 0x09;
pub const KEY_CURSOR_DOWN: u8 = 0x0A;
pub const KEY_CURSOR_UP: u8 = 0x0B;
pub const KEY_RETURN: u8 = 0x0D;
pub const KEY_SPACE: u8 = 0x20;
pub const KEY_F1: u8 = 0xF1;
pub const KEY_F8: u8 = 0xF8;

pub const MOD_SHIFT: u8 = 1 << 0;
pub const MOD_CTRL: u8 = 1 << 1;

/// Printable keys, unshifted then shifted, one string per matrix row with
/// one character per column. Spaces are unused positions.
const LAYOUT: [&[u8; 64]; 2] = [
    b"1     Q23WA ZSE45RDXCFT67YGVBHU89IJNMKO0+PL,.:@-~*;/ =          ",
    b"!     q\"#wa zse$%rdxcft^&ygvbhu*(ijnmko) pl<>[  $ ]?            ",
];

/// Non-printable keys: (code, column, row, modifiers)
const SPECIAL_KEYS: [(u8, u8, u8, u8); 16] = [
    (KEY_SPACE, 4, 0, 0),
    (KEY_CURSOR_LEFT, 2, 7, MOD_SHIFT),
    (KEY_CURSOR_RIGHT, 2, 7, 0),
    (KEY_CURSOR_DOWN, 3, 7, 0),
    (KEY_CURSOR_UP, 3, 7, MOD_SHIFT),
    (KEY_DELETE, 0, 7, 0),
    (KEY_RETURN, 1, 7, 0),
    (KEY_STOP, 3, 0, 0),
    (0xF1, 4, 7, 0),
    (0xF2, 4, 7, MOD_SHIFT),
    (0xF3, 5, 7, 0),
    (0xF4, 5, 7, MOD_SHIFT),
    (0xF5, 6, 7, 0),
    (0xF6, 6, 7, MOD_SHIFT),
    (0xF7, 7, 7, 0),
    (KEY_F8, 7, 7, MOD_SHIFT),
];

/// Build the X65 keyboard matrix with every key registered
pub fn x65_keyboard() -> KeyboardMatrix {
    let mut kbd = KeyboardMatrix::new();
    kbd.register_modifier(0, 3, 1);
    kbd.register_modifier(1, 2, 0);

    for (layer, keys) in LAYOUT.iter().enumerate() {
        let modifiers = if layer == 1 { MOD_SHIFT } else { 0 };
        for (i, &code) in keys.iter().enumerate() {
            if code != b' ' {
                kbd.register_key(code, (i % 8) as u8, (i / 8) as u8, modifiers);
            }
        }
    }
    for (code, column, row, modifiers) in SPECIAL_KEYS {
        kbd.register_key(code, column, row, modifiers);
    }
    kbd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KEY_HOLD_US;

    fn pressed(code: u8) -> KeyboardMatrix {
        let mut kbd = x65_keyboard();
        kbd.key_down(code);
        kbd
    }

    #[test]
    fn test_layout_rows() {
        // 'Q' is column 6, row 0
        assert_eq!(pressed(b'Q').scan_lines(1 << 6), 1 << 0);
        // 'W' is column 1, row 1
        assert_eq!(pressed(b'W').scan_lines(1 << 1), 1 << 1);
        // '0' is column 7, row 4
        assert_eq!(pressed(b'0').scan_lines(1 << 7), 1 << 4);
        // '=' is column 5, row 6
        assert_eq!(pressed(b'=').scan_lines(1 << 5), 1 << 6);
    }

    #[test]
    fn test_shifted_key_adds_shift() {
        let kbd = pressed(b'!');
        assert_eq!(kbd.scan_lines(1 << 0), 1 << 0);
        assert_eq!(kbd.scan_lines(1 << 3), 1 << 1);
    }

    #[test]
    fn test_lowercase_is_shifted_letter() {
        let kbd = pressed(b'q');
        assert_eq!(kbd.scan_lines(1 << 6), 1 << 0);
        assert_eq!(kbd.scan_lines(1 << 3), 1 << 1);
    }

    #[test]
    fn test_cursor_keys_share_position() {
        let right = pressed(KEY_CURSOR_RIGHT);
        let left = pressed(KEY_CURSOR_LEFT);
        assert_eq!(right.scan_lines(1 << 2), 1 << 7);
        assert_eq!(left.scan_lines(1 << 2), 1 << 7);
        assert_eq!(right.scan_lines(1 << 3), 0);
        assert_eq!(left.scan_lines(1 << 3), 1 << 1);
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(pressed(KEY_SPACE).scan_lines(1 << 4), 1 << 0);
        assert_eq!(pressed(KEY_RETURN).scan_lines(1 << 1), 1 << 7);
        assert_eq!(pressed(KEY_DELETE).scan_lines(1 << 0), 1 << 7);
        assert_eq!(pressed(KEY_STOP).scan_lines(1 << 3), 1 << 0);
        assert_eq!(pressed(KEY_F1).scan_lines(1 << 4), 1 << 7);
        assert_eq!(pressed(KEY_F8).scan_lines(1 << 7), 1 << 7);
    }

    #[test]
    fn test_return_press_and_release() {
        let mut kbd = x65_keyboard();
        kbd.key_down(KEY_RETURN);
        assert_eq!(kbd.scan(1 << 1), !(1 << 7));
        assert_eq!(kbd.scan(!(1 << 1)), 0xFF);

        // Released before the hold time: still visible until time passes
        kbd.key_up(KEY_RETURN);
        assert_eq!(kbd.scan(1 << 1), !(1 << 7));
        kbd.update(KEY_HOLD_US as u32);
        assert!(!kbd.is_pressed(KEY_RETURN));
        assert_eq!(kbd.scan(0xFF), 0xFF);
    }

    #[test]
    fn test_every_printable_registered() {
        let kbd = x65_keyboard();
        for code in b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz" {
            assert!(kbd.is_registered(*code), "{}", *code as char);
        }
    }
}
