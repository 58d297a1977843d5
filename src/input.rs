//! Keypad registers and controller-dependent interrupt checks.

use crate::policy::Policies;
use crate::state::{StateStream, SyncState};

/// One port's worth of controller state, sampled once per frame at the
/// vertical-blank edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerInput {
    /// Bit set = button pressed. Bits 0-9: A, B, Select, Start, Right, Left,
    /// Up, Down, R, L.
    pub buttons: u16,
    pub acc_x: u16,
    pub acc_y: u16,
    /// Ambient light level for the solar sensor, 0 = dark.
    pub solar: u8,
    /// Request a hard reset at the frame boundary.
    pub power: bool,
}

pub struct Keypad {
    /// KEYINPUT value: active low, bit clear = pressed.
    raw: u16,
    pub keycnt: u16,
    pub acc_x: u16,
    pub acc_y: u16,
}

impl Keypad {
    pub fn new() -> Self {
        Self {
            raw: 0x03FF,
            keycnt: 0,
            acc_x: 0,
            acc_y: 0,
        }
    }

    pub fn reset(&mut self) {
        self.raw = 0x03FF;
        self.keycnt = 0;
    }

    pub fn set_state(&mut self, input: &ControllerInput) {
        self.raw = !input.buttons & 0x03FF;
        self.acc_x = input.acc_x;
        self.acc_y = input.acc_y;
    }

    pub fn keyinput(&self) -> u16 {
        self.raw
    }

    /// Steady-state keypad interrupt condition, evaluated at the frame edge.
    pub fn irq_check(&self, policies: &Policies) -> bool {
        if self.keycnt & 0x4000 == 0 {
            return false;
        }
        let selected = self.keycnt & 0x03FF;
        let pressed = !self.raw & 0x03FF;
        if self.keycnt & 0x8000 != 0 {
            // AND mode: every selected key held.
            if selected & pressed != selected {
                return false;
            }
            selected != 0 || policies.keypad_and_mode_empty_select_fires
        } else {
            // OR mode: any selected key held.
            if selected & pressed == 0 {
                return false;
            }
            selected != 0x03FF || policies.keypad_or_mode_full_select_fires
        }
    }

    /// Interrupt condition only reachable by writing KEYCNT: AND mode with no
    /// keys selected and no keys pressed.
    pub fn write_glitch_check(&self, policies: &Policies) -> bool {
        policies.keycnt_write_glitch_fires
            && self.keycnt & 0xC3FF == 0xC000
            && self.raw & 0x03FF == 0x03FF
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState for Keypad {
    fn sync_state(&mut self, s: &mut StateStream) {
        s.sync_u16(&mut self.raw);
        s.sync_u16(&mut self.keycnt);
        s.sync_u16(&mut self.acc_x);
        s.sync_u16(&mut self.acc_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_with(buttons: u16, keycnt: u16) -> Keypad {
        let mut pad = Keypad::new();
        pad.set_state(&ControllerInput {
            buttons,
            ..ControllerInput::default()
        });
        pad.keycnt = keycnt;
        pad
    }

    #[test]
    fn or_mode_fires_on_any_selected_key() {
        let pad = pad_with(0x0001, 0x4003);
        assert!(pad.irq_check(&Policies::default()));
        let pad = pad_with(0x0004, 0x4003);
        assert!(!pad.irq_check(&Policies::default()));
    }

    #[test]
    fn and_mode_requires_all_selected_keys() {
        let pad = pad_with(0x0003, 0xC003);
        assert!(pad.irq_check(&Policies::default()));
        let pad = pad_with(0x0001, 0xC003);
        assert!(!pad.irq_check(&Policies::default()));
    }

    #[test]
    fn and_mode_with_no_keys_selected_never_fires() {
        let pad = pad_with(0x0000, 0xC000);
        assert!(!pad.irq_check(&Policies::default()));
    }

    #[test]
    fn or_mode_with_all_keys_selected_never_fires() {
        let pad = pad_with(0x0001, 0x43FF);
        assert!(!pad.irq_check(&Policies::default()));
    }

    #[test]
    fn keycnt_write_glitch_needs_all_keys_released() {
        let pad = pad_with(0x0000, 0xC000);
        assert!(pad.write_glitch_check(&Policies::default()));
        let pad = pad_with(0x0001, 0xC000);
        assert!(!pad.write_glitch_check(&Policies::default()));
    }
}
