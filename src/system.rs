//! Machine facade wiring the video pipeline, interrupt fabric and cartridge
//! peripherals into a single cycle-stepped core.
//!
//! One [`Agb::tick`] advances every subsystem by exactly one hardware cycle
//! in a fixed order: interrupt-flag merge, delay-pipeline processing, sound,
//! pixel pipeline, cartridge serial, timers, prefetch, DMA, processor. The
//! order is an observable property of the hardware, not an implementation
//! detail. Sound, timers, prefetch, the DMA engine and the processor are
//! external collaborators driven through the [`ExternalUnits`] seam.

use crate::cart::CartPeripherals;
use crate::dma::DmaUnit;
use crate::eeprom::EepromSize;
use crate::events::{DmaPhase, IrqSource, Trigger, TriggerQueue};
use crate::input::{ControllerInput, Keypad};
use crate::irq::{IrqPipeline, MiscDelays};
use crate::mem::{VideoMem, OBJ_VRAM_BASE};
use crate::policy::Policies;
use crate::ppu::{Ppu, FRAME_FILL, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::state::{StateError, StateStream, SyncState};

/// Mutable view of the core handed to external units during their tick.
pub struct Bus<'a> {
    pub mem: &'a mut VideoMem,
    pub irq: &'a mut IrqPipeline,
    pub dma: &'a mut DmaUnit,
    pub events: &'a mut TriggerQueue,
    pub cycle_count: u64,
}

/// External collaborators stepped once per cycle, in the documented order.
/// The default implementations do nothing, so hosts implement only the units
/// they provide.
pub trait ExternalUnits: Send {
    fn sound_tick(&mut self, _bus: &mut Bus<'_>) {}
    fn timer_tick(&mut self, _bus: &mut Bus<'_>) {}
    fn prefetch_tick(&mut self, _bus: &mut Bus<'_>) {}
    fn dma_tick(&mut self, _bus: &mut Bus<'_>) {}
    fn cpu_tick(&mut self, _bus: &mut Bus<'_>) {}

    /// Whether the processor is halted; a halted core samples input
    /// immediately instead of waiting for the vertical-blank edge.
    fn halted(&self) -> bool {
        false
    }
}

/// Stand-in used when no external units are attached.
pub struct NullExternalUnits;

impl ExternalUnits for NullExternalUnits {}

type ScanlineCallback = Box<dyn FnMut(u8) + Send>;
type TraceCallback = Box<dyn FnMut(&str) + Send>;

pub struct Agb {
    pub ppu: Ppu,
    pub irq: IrqPipeline,
    pub misc: MiscDelays,
    pub dma: DmaUnit,
    pub keypad: Keypad,
    pub cart: CartPeripherals,
    pub mem: VideoMem,
    pub policies: Policies,

    events: TriggerQueue,
    event_scratch: Vec<Trigger>,
    delays_to_process: bool,

    cycle_count: u64,
    frame_count: u64,
    lag_count: u64,
    lag_frame: bool,
    vblank_edge: bool,

    external: Option<Box<dyn ExternalUnits>>,
    scanline_cb: Option<(u8, ScanlineCallback)>,
    trace_cb: Option<TraceCallback>,
}

impl Agb {
    pub fn new() -> Self {
        Self::with_policies(Policies::default())
    }

    pub fn with_policies(policies: Policies) -> Self {
        let mem = VideoMem::new();
        let mut ppu = Ppu::new();
        ppu.recompute_all_sprites(&mem);
        Self {
            ppu,
            irq: IrqPipeline::new(),
            misc: MiscDelays::new(),
            dma: DmaUnit::new(),
            keypad: Keypad::new(),
            cart: CartPeripherals::new(),
            mem,
            policies,
            events: TriggerQueue::default(),
            event_scratch: Vec::new(),
            delays_to_process: false,
            cycle_count: 0,
            frame_count: 0,
            lag_count: 0,
            lag_frame: false,
            vblank_edge: false,
            external: None,
            scanline_cb: None,
            trace_cb: None,
        }
    }

    pub fn attach_rtc(&mut self) {
        self.cart.attach_rtc();
    }

    pub fn attach_eeprom_solar(&mut self, size: EepromSize) {
        self.cart.attach_eeprom_solar(size);
    }

    pub fn set_external_units(&mut self, units: Box<dyn ExternalUnits>) {
        self.external = Some(units);
    }

    /// Invoke `cb` whenever the given line is about to be displayed.
    pub fn set_scanline_callback(&mut self, line: u8, cb: impl FnMut(u8) + Send + 'static) {
        self.scanline_cb = Some((line, Box::new(cb)));
    }

    pub fn clear_scanline_callback(&mut self) {
        self.scanline_cb = None;
    }

    pub fn set_trace_callback(&mut self, cb: impl FnMut(&str) + Send + 'static) {
        self.trace_cb = Some(Box::new(cb));
    }

    /// Pass-through text trace emission.
    pub fn trace(&mut self, message: &str) {
        if let Some(cb) = self.trace_cb.as_mut() {
            cb(message);
        }
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn lag_count(&self) -> u64 {
        self.lag_count
    }

    /// True when no input read or keypad interrupt happened last frame.
    pub fn lag_frame(&self) -> bool {
        self.lag_frame
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.ppu.framebuffer
    }

    // ------------------------------------------------------------------
    // Cycle stepping
    // ------------------------------------------------------------------

    /// Advance the whole machine by exactly one hardware cycle.
    pub fn tick(&mut self) {
        self.irq.begin_cycle();
        if self.delays_to_process {
            self.process_delays();
        }

        let mut ext = self.external.take();

        if let Some(e) = ext.as_mut() {
            e.sound_tick(&mut self.bus());
        }

        let report = self.ppu.tick(&self.mem, &mut self.events, &self.policies);
        if let Some(old_line) = report.line_transition {
            if let Some((line, cb)) = self.scanline_cb.as_mut() {
                if old_line.wrapping_add(1) == *line {
                    cb(*line);
                }
            }
        }
        if report.vblank_rise {
            self.vblank_edge = true;
        }
        if self.ppu.delays_pending() {
            self.delays_to_process = true;
        }
        self.drain_events();

        self.cart.serial_tick(self.cycle_count);

        if let Some(e) = ext.as_mut() {
            e.timer_tick(&mut self.bus());
            e.prefetch_tick(&mut self.bus());
            e.dma_tick(&mut self.bus());
            e.cpu_tick(&mut self.bus());
        }
        self.external = ext;
        self.drain_events();

        self.cycle_count += 1;
    }

    /// Run until a vertical-blank rising edge, sampling controller input at
    /// the frame boundary, and return the completed frame.
    pub fn advance_frame(&mut self, input: &ControllerInput) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.ppu.framebuffer.fill(FRAME_FILL);

        if input.power {
            self.hard_reset();
        }

        self.keypad.set_state(input);
        self.cart.set_solar_level(input.solar);

        // As long as the core is not halted, a vblank edge preceded this call
        // and the freshly sampled input may raise the keypad interrupt.
        let halted = self.external.as_ref().is_some_and(|e| e.halted());
        if (self.vblank_edge || halted) && self.keypad.irq_check(&self.policies) {
            self.raise_irq(IrqSource::Keypad);
        }

        self.lag_frame = true;
        self.vblank_edge = false;

        while !self.vblank_edge {
            self.tick();
        }

        if self.lag_frame {
            self.lag_count += 1;
        }
        self.frame_count += 1;

        &self.ppu.framebuffer
    }

    /// Reset to power-up state. Battery-backed peripheral contents (RTC time,
    /// EEPROM data) survive; counters keep running. Meant to be applied at a
    /// frame boundary.
    pub fn hard_reset(&mut self) {
        self.ppu = Ppu::new();
        self.irq.reset();
        self.misc.reset();
        self.dma.reset();
        self.keypad.reset();
        self.cart.reset();
        self.mem = VideoMem::new();
        self.events = TriggerQueue::default();
        self.event_scratch.clear();
        self.delays_to_process = false;
        self.vblank_edge = false;
        self.ppu.recompute_all_sprites(&self.mem);
    }

    fn bus(&mut self) -> Bus<'_> {
        Bus {
            mem: &mut self.mem,
            irq: &mut self.irq,
            dma: &mut self.dma,
            events: &mut self.events,
            cycle_count: self.cycle_count,
        }
    }

    fn process_delays(&mut self) {
        let mut pending = false;
        if self.irq.pending() {
            pending |= self.irq.process();
        }
        if self.misc.pending() {
            pending |= self.misc.process(
                &mut self.mem,
                self.ppu.vram_busy(),
                self.ppu.palram_busy(),
                &mut self.dma,
            );
        }
        if self.ppu.delays_pending() {
            pending |= self.ppu.process_delays(&mut self.events, &self.policies);
        }
        self.delays_to_process = pending;
        self.drain_events();
    }

    fn drain_events(&mut self) {
        if self.events.is_empty() {
            return;
        }
        let mut scratch = std::mem::take(&mut self.event_scratch);
        self.events.drain_into(&mut scratch);
        for trigger in scratch.drain(..) {
            match trigger {
                Trigger::Irq(source) => self.raise_irq(source),
                Trigger::Dma { channel, phase } => {
                    self.dma.trigger(channel, phase, self.ppu.vcount);
                }
            }
        }
        self.event_scratch = scratch;
    }

    /// Raise an interrupt request. Also available to external units through
    /// their bus view's event queue.
    pub fn raise_irq(&mut self, source: IrqSource) {
        if source == IrqSource::Keypad {
            self.lag_frame = false;
        }
        self.irq.raise(source.bit());
        self.delays_to_process = true;
    }

    /// Arm a DMA channel on a start condition (register decoding happens in
    /// the external DMA engine).
    pub fn configure_dma(&mut self, channel: usize, armed: bool, start: DmaPhase) {
        self.dma.configure(channel, armed, start);
    }

    /// Schedule a FIFO DMA start countdown for channel 1 (`a`) or channel 2.
    pub fn schedule_fifo_dma(&mut self, a: bool, countdown: u16) {
        self.misc.schedule_fifo_dma(a, countdown);
        self.delays_to_process = true;
    }

    // ------------------------------------------------------------------
    // I/O register space
    // ------------------------------------------------------------------

    pub fn read_io8(&mut self, addr: u32) -> u8 {
        let addr = addr & 0x3FF;
        match addr {
            0x000..=0x057 => self.ppu.read_reg8(addr, self.mem.last_bus_value),
            0x130 => {
                self.lag_frame = false;
                self.keypad.keyinput() as u8
            }
            0x131 => {
                self.lag_frame = false;
                (self.keypad.keyinput() >> 8) as u8
            }
            0x132 => self.keypad.keycnt as u8,
            0x133 => (self.keypad.keycnt >> 8) as u8,
            0x200 => self.irq.enable as u8,
            0x201 => (self.irq.enable >> 8) as u8,
            0x202 => self.irq.flags as u8,
            0x203 => (self.irq.flags >> 8) as u8,
            0x208 => u8::from(self.irq.master_enable),
            0x209..=0x20B => 0,
            _ => (self.mem.last_bus_value >> (8 * (addr & 3))) as u8,
        }
    }

    pub fn read_io16(&mut self, addr: u32) -> u16 {
        let addr = addr & 0x3FE;
        let value = match addr {
            0x000..=0x056 => self.ppu.read_reg16(addr, self.mem.last_bus_value),
            0x130 => {
                self.lag_frame = false;
                self.keypad.keyinput()
            }
            0x132 => self.keypad.keycnt,
            0x200 => self.irq.enable,
            0x202 => self.irq.flags,
            0x208 => u16::from(self.irq.master_enable),
            0x20A => 0,
            _ => self.mem.last_bus_value as u16,
        };
        self.mem.last_bus_value = u32::from(value);
        value
    }

    pub fn read_io32(&mut self, addr: u32) -> u32 {
        let addr = addr & 0x3FC;
        let value = u32::from(self.read_io16(addr)) | (u32::from(self.read_io16(addr + 2)) << 16);
        self.mem.last_bus_value = value;
        value
    }

    pub fn write_io8(&mut self, addr: u32, value: u8) {
        let addr = addr & 0x3FF;
        match addr {
            0x000..=0x057 => self.ppu.write_reg8(addr, value),
            0x132 => self.write_keycnt((self.keypad.keycnt & 0xFF00) | u16::from(value)),
            0x133 => self.write_keycnt((self.keypad.keycnt & 0x00FF) | (u16::from(value) << 8)),
            0x200 => {
                self.irq
                    .write_enable((self.irq.enable & 0xFF00) | u16::from(value));
                self.delays_to_process = true;
            }
            0x201 => {
                self.irq
                    .write_enable((self.irq.enable & 0x00FF) | (u16::from(value) << 8));
                self.delays_to_process = true;
            }
            0x202 => {
                self.irq.acknowledge(u16::from(value));
                self.delays_to_process = true;
            }
            0x203 => {
                self.irq.acknowledge(u16::from(value) << 8);
                self.delays_to_process = true;
            }
            0x208 => {
                self.irq.write_master(value & 1 != 0);
                self.delays_to_process = true;
            }
            _ => {}
        }
    }

    pub fn write_io16(&mut self, addr: u32, value: u16) {
        let addr = addr & 0x3FE;
        match addr {
            0x000..=0x056 => self.ppu.write_reg16(addr, value),
            0x132 => self.write_keycnt(value),
            0x200 => {
                self.irq.write_enable(value);
                self.delays_to_process = true;
            }
            0x202 => {
                self.irq.acknowledge(value);
                self.delays_to_process = true;
            }
            0x208 => {
                self.irq.write_master(value & 1 != 0);
                self.delays_to_process = true;
            }
            _ => {}
        }
        self.mem.last_bus_value = u32::from(value);
    }

    pub fn write_io32(&mut self, addr: u32, value: u32) {
        let addr = addr & 0x3FC;
        match addr {
            0x000..=0x054 => self.ppu.write_reg32(addr, value),
            _ => {
                self.write_io16(addr, value as u16);
                self.write_io16(addr + 2, (value >> 16) as u16);
            }
        }
        self.mem.last_bus_value = value;
    }

    fn write_keycnt(&mut self, value: u16) {
        self.keypad.keycnt = value;
        if self.keypad.write_glitch_check(&self.policies) {
            self.raise_irq(IrqSource::Keypad);
        }
    }

    // ------------------------------------------------------------------
    // Video memory
    // ------------------------------------------------------------------

    pub fn read_vram8(&self, addr: u32) -> u8 {
        self.mem.vram[VideoMem::vram_index(addr)]
    }

    pub fn read_vram16(&self, addr: u32) -> u16 {
        let idx = VideoMem::vram_index(addr & !1);
        u16::from_le_bytes([self.mem.vram[idx], self.mem.vram[idx + 1]])
    }

    pub fn read_vram32(&self, addr: u32) -> u32 {
        u32::from(self.read_vram16(addr & !3)) | (u32::from(self.read_vram16((addr & !3) + 2)) << 16)
    }

    /// Byte writes to background VRAM land on both bytes of the halfword;
    /// byte writes to object VRAM are dropped.
    pub fn write_vram8(&mut self, addr: u32, value: u8) {
        let idx = VideoMem::vram_index(addr & !1);
        if idx < OBJ_VRAM_BASE {
            self.mem.vram[idx] = value;
            self.mem.vram[idx + 1] = value;
        }
    }

    pub fn write_vram16(&mut self, addr: u32, value: u16) {
        let idx = VideoMem::vram_index(addr & !1);
        self.mem.vram[idx] = value as u8;
        self.mem.vram[idx + 1] = (value >> 8) as u8;
    }

    /// A 32-bit store is two 16-bit bus writes: the lower half lands now, the
    /// upper half goes through the delay pipeline next cycle.
    pub fn write_vram32(&mut self, addr: u32, value: u32) {
        self.write_vram16(addr & !3, value as u16);
        self.misc.schedule_vram_upper(addr & !3, (value >> 16) as u16);
        self.delays_to_process = true;
    }

    pub fn read_palram8(&self, addr: u32) -> u8 {
        self.mem.palram[(addr & 0x3FF) as usize]
    }

    pub fn read_palram16(&self, addr: u32) -> u16 {
        self.mem.palette16((addr & 0x3FE) as usize)
    }

    pub fn write_palram8(&mut self, addr: u32, value: u8) {
        let idx = (addr & 0x3FE) as usize;
        self.mem.palram[idx] = value;
        self.mem.palram[idx + 1] = value;
    }

    pub fn write_palram16(&mut self, addr: u32, value: u16) {
        let idx = (addr & 0x3FE) as usize;
        self.mem.palram[idx] = value as u8;
        self.mem.palram[idx + 1] = (value >> 8) as u8;
    }

    pub fn write_palram32(&mut self, addr: u32, value: u32) {
        self.write_palram16(addr & 0x3FC, value as u16);
        self.misc.schedule_palram_upper(addr & 0x3FC, (value >> 16) as u16);
        self.delays_to_process = true;
    }

    pub fn read_oam8(&self, addr: u32) -> u8 {
        self.mem.oam[(addr & 0x3FF) as usize]
    }

    pub fn read_oam16(&self, addr: u32) -> u16 {
        let idx = (addr & 0x3FE) as usize;
        u16::from_le_bytes([self.mem.oam[idx], self.mem.oam[idx + 1]])
    }

    /// Byte writes to OAM are ignored by the hardware.
    pub fn write_oam8(&mut self, _addr: u32, _value: u8) {}

    pub fn write_oam16(&mut self, addr: u32, value: u16) {
        let idx = (addr & 0x3FE) as usize;
        self.mem.oam[idx] = value as u8;
        self.mem.oam[idx + 1] = (value >> 8) as u8;
        self.ppu.oam_written(&self.mem, addr & 0x3FE);
    }

    pub fn write_oam32(&mut self, addr: u32, value: u32) {
        self.write_oam16(addr & 0x3FC, value as u16);
        self.write_oam16((addr & 0x3FC) + 2, (value >> 16) as u16);
    }

    // ------------------------------------------------------------------
    // Cartridge peripherals
    // ------------------------------------------------------------------

    /// ROM-space write, offset relative to the cartridge base. Drives the
    /// GPIO-mapped peripheral chips.
    pub fn write_rom16(&mut self, offset: u32, value: u16) {
        self.cart
            .write_rom16(offset, value, self.cycle_count, &self.policies);
    }

    pub fn write_rom8(&mut self, offset: u32, value: u8) {
        self.cart
            .write_rom8(offset, value, self.cycle_count, &self.policies);
    }

    /// GPIO overlay for ROM reads; `None` falls through to the cartridge
    /// image owned by the loader.
    pub fn read_rom8(&self, offset: u32) -> Option<u8> {
        self.cart.read_rom8(offset)
    }

    /// Serial EEPROM bus access, used by the external DMA engine.
    pub fn eeprom_read(&mut self) -> u8 {
        self.cart.eeprom_read(self.cycle_count, &self.policies)
    }

    pub fn eeprom_write(&mut self, value: u8) {
        self.cart.eeprom_write(value, self.cycle_count, &self.policies);
    }

    // ------------------------------------------------------------------
    // Save states
    // ------------------------------------------------------------------

    fn sync_all(&mut self, s: &mut StateStream) {
        s.sync_u64(&mut self.cycle_count);
        s.sync_u64(&mut self.frame_count);
        s.sync_u64(&mut self.lag_count);
        s.sync_bool(&mut self.lag_frame);
        s.sync_bool(&mut self.vblank_edge);
        s.sync_bool(&mut self.delays_to_process);
        self.mem.sync_state(s);
        self.ppu.sync_state(s);
        self.irq.sync_state(s);
        self.misc.sync_state(s);
        self.dma.sync_state(s);
        self.keypad.sync_state(s);
        self.cart.sync_state(s);
    }

    pub fn save_state(&mut self) -> Vec<u8> {
        let mut s = StateStream::saver();
        self.sync_all(&mut s);
        s.into_bytes()
    }

    /// Restore a state produced by [`Agb::save_state`]. On error the core is
    /// left partially restored; hard reset before continuing.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let mut s = StateStream::loader(bytes);
        self.sync_all(&mut s);
        s.finish_load()?;
        self.ppu.rebuild_derived(&self.mem);
        Ok(())
    }

    /// True while the current line is inside the vertical blanking interval.
    pub fn in_vblank(&self) -> bool {
        self.ppu.vcount >= SCREEN_HEIGHT as u8
    }
}

impl Default for Agb {
    fn default() -> Self {
        Self::new()
    }
}
