/// Behaviors the real hardware leaves undocumented or that have not been
/// verified on a console. Each one is a named, overridable policy rather than
/// an inline guess, so a host can flip an assumption without touching the
/// emulation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policies {
    /// Whether enabling a DISPSTAT interrupt source mid-frame retroactively
    /// fires the interrupt when its condition is already met. Assumed no.
    pub stat_enable_mid_frame_irq: bool,

    /// Whether a keypad interrupt in AND mode fires when no keys are selected
    /// in KEYCNT. Assumed no (joypad.gba test ROM).
    pub keypad_and_mode_empty_select_fires: bool,

    /// Whether a keypad interrupt in OR mode fires when every key is selected
    /// and at least one is pressed. Assumed no (Megaman & Bass relies on it).
    pub keypad_or_mode_full_select_fires: bool,

    /// Whether a KEYCNT write in AND mode with no keys selected and no keys
    /// pressed triggers the write-time interrupt glitch. Observed yes.
    pub keycnt_write_glitch_fires: bool,

    /// Value returned on the EEPROM data line while a write transfer is in
    /// progress. Unknown on hardware; assumed 0.
    pub eeprom_busy_read_value: u8,

    /// Cycles the EEPROM reports not-ready after a write's stop bit.
    pub eeprom_write_busy_cycles: u64,

    /// Level the RTC drives on SIO when the host samples the line during a
    /// write-direction register access. Unknown; assumed high.
    pub rtc_sio_high_during_write: bool,

    /// Solar sensor ramp threshold for a fully dark ambient level. The flag
    /// asserts once the ramp counter reaches `threshold - solar_level`.
    pub solar_dark_threshold: u8,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            stat_enable_mid_frame_irq: false,
            keypad_and_mode_empty_select_fires: false,
            keypad_or_mode_full_select_fires: false,
            keycnt_write_glitch_fires: true,
            eeprom_busy_read_value: 0,
            eeprom_write_busy_cycles: 0x1A750,
            rtc_sio_high_during_write: true,
            solar_dark_threshold: 0xE8,
        }
    }
}
