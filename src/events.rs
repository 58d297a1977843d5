//! Typed per-cycle triggers raised by the video pipeline and keypad, consumed
//! by the interrupt delay pipeline and the DMA unit at the end of the cycle.

/// Interrupt sources, one per IF/IE register bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    VBlank,
    HBlank,
    VCount,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Serial,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Keypad,
    GamePak,
}

impl IrqSource {
    /// IF/IE register bit for this source.
    pub const fn bit(self) -> u16 {
        1 << match self {
            IrqSource::VBlank => 0,
            IrqSource::HBlank => 1,
            IrqSource::VCount => 2,
            IrqSource::Timer0 => 3,
            IrqSource::Timer1 => 4,
            IrqSource::Timer2 => 5,
            IrqSource::Timer3 => 6,
            IrqSource::Serial => 7,
            IrqSource::Dma0 => 8,
            IrqSource::Dma1 => 9,
            IrqSource::Dma2 => 10,
            IrqSource::Dma3 => 11,
            IrqSource::Keypad => 12,
            IrqSource::GamePak => 13,
        }
    }
}

/// DMA start conditions a channel can be armed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaPhase {
    Immediate,
    VBlank,
    HBlank,
    /// Video capture, channel 3 only, lines 2..162.
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Irq(IrqSource),
    Dma { channel: usize, phase: DmaPhase },
}

/// Queue of triggers raised during the current cycle.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    items: Vec<Trigger>,
}

impl TriggerQueue {
    pub fn raise_irq(&mut self, source: IrqSource) {
        self.items.push(Trigger::Irq(source));
    }

    pub fn raise_dma(&mut self, channel: usize, phase: DmaPhase) {
        self.items.push(Trigger::Dma { channel, phase });
    }

    /// Raise a DMA phase for every channel at once (VBlank/HBlank edges).
    pub fn raise_dma_all(&mut self, phase: DmaPhase) {
        for channel in 0..4 {
            self.items.push(Trigger::Dma { channel, phase });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move all queued triggers into `out`, preserving order.
    pub fn drain_into(&mut self, out: &mut Vec<Trigger>) {
        out.append(&mut self.items);
    }
}
