//! Cartridge general-purpose I/O port and the peripheral chips behind it.
//!
//! Three registers overlay the ROM space: data at 0xC4, per-line direction at
//! 0xC6 and a read-enable at 0xC8. When read-enable is set the port contents
//! are visible to ROM reads; otherwise reads fall through to the cartridge
//! image (handled by the caller).

use crate::eeprom::{Eeprom, EepromSize};
use crate::policy::Policies;
use crate::rtc::Rtc;
use crate::state::{StateStream, SyncState};

pub const GPIO_DATA: u32 = 0xC4;
pub const GPIO_DIR: u32 = 0xC6;
pub const GPIO_CTRL: u32 = 0xC8;

pub enum Chip {
    None,
    Rtc(Rtc),
    EepromSolar(Eeprom),
}

impl Chip {
    fn kind(&self) -> u8 {
        match self {
            Chip::None => 0,
            Chip::Rtc(_) => 1,
            Chip::EepromSolar(_) => 2,
        }
    }
}

pub struct CartPeripherals {
    pub chip: Chip,
    port_state: u8,
    port_dir: u8,
    port_readable: bool,
    chip_select: bool,
}

impl CartPeripherals {
    pub fn new() -> Self {
        Self {
            chip: Chip::None,
            port_state: 0,
            port_dir: 0,
            port_readable: false,
            chip_select: false,
        }
    }

    pub fn attach_rtc(&mut self) {
        self.chip = Chip::Rtc(Rtc::new());
    }

    pub fn attach_eeprom_solar(&mut self, size: EepromSize) {
        self.chip = Chip::EepromSolar(Eeprom::new(size));
    }

    /// Reset port and protocol state. RTC registers and EEPROM contents are
    /// battery backed and survive.
    pub fn reset(&mut self) {
        self.port_state = 0;
        self.port_dir = 0;
        self.port_readable = false;
        self.chip_select = false;
        match &mut self.chip {
            Chip::None => {}
            Chip::Rtc(rtc) => rtc.reset_protocol(),
            Chip::EepromSolar(eeprom) => eeprom.reset_protocol(),
        }
    }

    pub fn set_solar_level(&mut self, level: u8) {
        if let Chip::EepromSolar(eeprom) = &mut self.chip {
            eeprom.set_solar_level(level);
        }
    }

    /// Per-cycle maintenance: lets busy-until timestamps expire.
    pub fn serial_tick(&mut self, cycle: u64) {
        if let Chip::EepromSolar(eeprom) = &mut self.chip {
            eeprom.tick(cycle);
        }
    }

    /// Overlay for ROM reads in the GPIO window. `None` falls through to the
    /// cartridge image.
    pub fn read_rom8(&self, offset: u32) -> Option<u8> {
        if !self.port_readable {
            return None;
        }
        match offset {
            GPIO_DATA => Some(self.port_state),
            GPIO_DIR => Some(self.port_dir),
            GPIO_CTRL => Some(u8::from(self.port_readable)),
            0xC5 | 0xC7 | 0xC9 => Some(0),
            _ => None,
        }
    }

    pub fn write_rom8(&mut self, offset: u32, value: u8, cycle: u64, policies: &Policies) {
        match offset {
            GPIO_DATA => self.data_write(value, cycle, policies),
            GPIO_DIR => {
                self.port_dir = value & 0x0F;
                self.port_state &= !self.port_dir & 0x0F;
            }
            GPIO_CTRL => self.port_readable = value & 1 != 0,
            _ => {}
        }
    }

    pub fn write_rom16(&mut self, offset: u32, value: u16, cycle: u64, policies: &Policies) {
        self.write_rom8(offset, value as u8, cycle, policies);
        self.write_rom8(offset + 1, (value >> 8) as u8, cycle, policies);
    }

    pub fn write_rom32(&mut self, offset: u32, value: u32, cycle: u64, policies: &Policies) {
        self.write_rom16(offset, value as u16, cycle, policies);
        self.write_rom16(offset + 2, (value >> 16) as u16, cycle, policies);
    }

    fn data_write(&mut self, value: u8, cycle: u64, policies: &Policies) {
        match &mut self.chip {
            Chip::None => {
                self.port_state = 0;
            }
            Chip::Rtc(rtc) => {
                // A chip-select toggle consumes the write; other lines are
                // ignored on that cycle.
                let cs_toggle =
                    self.port_dir & 4 != 0 && (value & 4 != 0) != self.chip_select;
                if cs_toggle {
                    self.chip_select = value & 4 != 0;
                } else if self.chip_select {
                    rtc.port_write(value, self.port_dir, cycle, policies);
                }
                self.port_state = if self.chip_select {
                    rtc.line_state(self.port_dir)
                } else {
                    0
                };
            }
            Chip::EepromSolar(eeprom) => {
                eeprom.solar_write(value & self.port_dir);
                self.port_state = if self.port_dir & 8 == 0 && eeprom.solar_flag(policies) {
                    8
                } else {
                    0
                };
            }
        }
    }

    /// Serial read from the EEPROM bus region.
    pub fn eeprom_read(&mut self, cycle: u64, policies: &Policies) -> u8 {
        match &mut self.chip {
            Chip::EepromSolar(eeprom) => eeprom.read(cycle, policies),
            _ => 1,
        }
    }

    /// Serial write to the EEPROM bus region.
    pub fn eeprom_write(&mut self, value: u8, cycle: u64, policies: &Policies) {
        if let Chip::EepromSolar(eeprom) = &mut self.chip {
            eeprom.write(value, cycle, policies);
        }
    }
}

impl Default for CartPeripherals {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState for CartPeripherals {
    fn sync_state(&mut self, s: &mut StateStream) {
        let mut kind = self.chip.kind();
        s.sync_u8(&mut kind);
        if s.is_reader() && kind != self.chip.kind() {
            log::warn!("cart: save state was taken with a different peripheral chip");
        }
        s.sync_u8(&mut self.port_state);
        s.sync_u8(&mut self.port_dir);
        s.sync_bool(&mut self.port_readable);
        s.sync_bool(&mut self.chip_select);
        match &mut self.chip {
            Chip::None => {}
            Chip::Rtc(rtc) => rtc.sync_state(s),
            Chip::EepromSolar(eeprom) => eeprom.sync_state(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpio_registers_read_back_when_enabled() {
        let mut cart = CartPeripherals::new();
        cart.attach_rtc();
        let p = Policies::default();

        assert_eq!(cart.read_rom8(GPIO_DATA), None);
        cart.write_rom8(GPIO_CTRL, 1, 0, &p);
        cart.write_rom8(GPIO_DIR, 0x07, 0, &p);
        assert_eq!(cart.read_rom8(GPIO_DIR), Some(0x07));
        assert_eq!(cart.read_rom8(GPIO_CTRL), Some(1));
        assert_eq!(cart.read_rom8(GPIO_DATA), Some(0));
    }

    #[test]
    fn chip_select_toggle_consumes_the_write() {
        let mut cart = CartPeripherals::new();
        cart.attach_rtc();
        let p = Policies::default();

        cart.write_rom8(GPIO_DIR, 0x07, 0, &p);
        // Raising chip select must not clock a bit into the RTC.
        cart.write_rom8(GPIO_DATA, 0x04, 0, &p);
        let Chip::Rtc(rtc) = &cart.chip else {
            unreachable!()
        };
        assert!(rtc.is_command_mode());
    }

    #[test]
    fn solar_flag_appears_on_port_bit_3() {
        let mut cart = CartPeripherals::new();
        cart.attach_eeprom_solar(EepromSize::B512);
        let p = Policies::default();

        cart.set_solar_level(0xE7);
        cart.write_rom8(GPIO_CTRL, 1, 0, &p);
        cart.write_rom8(GPIO_DIR, 0x07, 0, &p);
        cart.write_rom8(GPIO_DATA, 0x02, 0, &p); // reset ramp
        cart.write_rom8(GPIO_DATA, 0x00, 0, &p);
        cart.write_rom8(GPIO_DATA, 0x01, 0, &p); // one rising edge
        assert_eq!(cart.read_rom8(GPIO_DATA), Some(0x08));
    }
}
