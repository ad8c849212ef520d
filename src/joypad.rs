//! Joypad latch and edge-triggered interrupt.
//!
//! The reference crate's `Joypad` read SDL keycodes directly; this core
//! knows nothing about host input APIs and exposes only the eight logical
//! keys the presenter maps its own input source onto.

/// The eight logical keys the core understands. Mapping a host keyboard or
/// gamepad API onto these is the presenter's job (see `app/input.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

const BIT_A: u8 = 0;
const BIT_B: u8 = 1;
const BIT_SELECT: u8 = 2;
const BIT_START: u8 = 3;
const BIT_RIGHT: u8 = 4;
const BIT_LEFT: u8 = 5;
const BIT_UP: u8 = 6;
const BIT_DOWN: u8 = 7;

fn key_bit(key: Key) -> u8 {
    match key {
        Key::A => BIT_A,
        Key::B => BIT_B,
        Key::Select => BIT_SELECT,
        Key::Start => BIT_START,
        Key::Right => BIT_RIGHT,
        Key::Left => BIT_LEFT,
        Key::Up => BIT_UP,
        Key::Down => BIT_DOWN,
    }
}

fn is_direction(key: Key) -> bool {
    matches!(key, Key::Up | Key::Down | Key::Left | Key::Right)
}

/// Per-key pressed/released snapshot for debug views; not used by the bus
/// dispatch itself, which only ever needs the packed `state` byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoypadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub start: bool,
    pub select: bool,
}

#[derive(Debug, Clone)]
pub struct Joypad {
    /// 0 = pressed, 1 = released, one bit per key (see `key_bit`).
    state: u8,
    /// Select mask as stored by the last write to the P1/JOYP register:
    /// bit 4 = direction group selected when clear, bit 5 = button group.
    select: u8,
    direction_pending: bool,
    button_pending: bool,
}

impl Joypad {
    pub fn new() -> Self {
        Joypad {
            state: 0xFF,
            select: 0x30,
            direction_pending: false,
            button_pending: false,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        let bit = key_bit(key);
        let was_pressed = self.state & (1 << bit) == 0;
        self.state &= !(1 << bit);
        if !was_pressed {
            if is_direction(key) {
                self.direction_pending = true;
            } else {
                self.button_pending = true;
            }
        }
    }

    pub fn key_up(&mut self, _key: Key) {
        self.state = 0xFF;
    }

    pub fn write_select(&mut self, value: u8) {
        self.select = value & 0x30;
    }

    /// Full JOYP register read: select bits plus the combined low nibble.
    pub fn read_p1(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= self.state & 0x0F;
        }
        if self.select & 0x20 == 0 {
            low &= (self.state >> 4) & 0x0F;
        }
        0xC0 | self.select | low
    }

    /// Polled once per machine cycle by the driver; returns true if the
    /// joypad interrupt should be raised this cycle.
    pub fn poll_interrupt(&mut self) -> bool {
        let direction_selected = self.select & 0x10 == 0;
        let button_selected = self.select & 0x20 == 0;
        let mut raise = false;
        if self.direction_pending && direction_selected {
            raise = true;
            self.direction_pending = false;
        }
        if self.button_pending && button_selected {
            raise = true;
            self.button_pending = false;
        }
        raise
    }

    /// Unpacked per-key snapshot for a debug display; `state` bit clear means pressed.
    pub fn state(&self) -> JoypadState {
        let pressed = |bit: u8| self.state & (1 << bit) == 0;
        JoypadState {
            up: pressed(BIT_UP),
            down: pressed(BIT_DOWN),
            left: pressed(BIT_LEFT),
            right: pressed(BIT_RIGHT),
            a: pressed(BIT_A),
            b: pressed(BIT_B),
            start: pressed(BIT_START),
            select: pressed(BIT_SELECT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unselected_group_reads_as_all_released() {
        let mut pad = Joypad::new();
        pad.key_down(Key::A);
        pad.write_select(0x10); // directions selected, buttons not
        assert_eq!(pad.read_p1() & 0x0F, 0x0F);
    }

    #[test]
    fn interrupt_raised_only_when_group_selected() {
        let mut pad = Joypad::new();
        pad.write_select(0x20); // buttons selected (bit 5 clear), directions not
        pad.key_down(Key::Up); // direction press, group not selected
        assert!(!pad.poll_interrupt());
        pad.key_down(Key::A); // button press, group selected
        assert!(pad.poll_interrupt());
        assert!(!pad.poll_interrupt()); // edge flag consumed
    }

    #[test]
    fn any_release_resets_all_keys() {
        let mut pad = Joypad::new();
        pad.key_down(Key::A);
        pad.key_down(Key::Up);
        pad.key_up(Key::A);
        assert_eq!(pad.state, 0xFF);
    }
}
