//! DMA channel trigger state.
//!
//! The transfer engine itself is external; this unit tracks each channel's
//! armed/start-condition flags and latches the run flag the external DMA tick
//! consumes when a matching trigger arrives.

use crate::events::DmaPhase;
use crate::state::{StateStream, SyncState};

#[derive(Debug, Default)]
pub struct DmaUnit {
    /// Channel armed (enable bit set in its control register).
    pub go: [bool; 4],
    /// Start condition met; cleared by the external DMA tick when it services
    /// the channel.
    pub run: [bool; 4],
    pub start_vblank: [bool; 4],
    pub start_hblank: [bool; 4],
    /// Video-capture start condition; only channel 3 honors it.
    pub start_video: [bool; 4],
}

impl DmaUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Arm or disarm a channel with the given start condition. An armed
    /// immediate channel runs right away.
    pub fn configure(&mut self, channel: usize, armed: bool, start: DmaPhase) {
        let channel = channel & 3;
        self.go[channel] = armed;
        self.start_vblank[channel] = start == DmaPhase::VBlank;
        self.start_hblank[channel] = start == DmaPhase::HBlank;
        self.start_video[channel] = start == DmaPhase::Video;
        if !armed {
            self.run[channel] = false;
        } else if start == DmaPhase::Immediate {
            self.run[channel] = true;
        }
    }

    /// Apply a trigger raised by the pixel pipeline. `line` is the scanline
    /// the trigger was raised on; video capture only runs on lines 2..162.
    pub fn trigger(&mut self, channel: usize, phase: DmaPhase, line: u8) {
        let channel = channel & 3;
        if !self.go[channel] {
            return;
        }
        let start = match phase {
            DmaPhase::Immediate => true,
            DmaPhase::VBlank => self.start_vblank[channel],
            DmaPhase::HBlank => self.start_hblank[channel],
            DmaPhase::Video => {
                channel == 3 && self.start_video[channel] && (2..162).contains(&line)
            }
        };
        if start {
            self.run[channel] = true;
        }
    }
}

impl SyncState for DmaUnit {
    fn sync_state(&mut self, s: &mut StateStream) {
        s.sync_bools(&mut self.go);
        s.sync_bools(&mut self.run);
        s.sync_bools(&mut self.start_vblank);
        s.sync_bools(&mut self.start_hblank);
        s.sync_bools(&mut self.start_video);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hblank_trigger_only_starts_matching_channels() {
        let mut dma = DmaUnit::new();
        dma.configure(0, true, DmaPhase::HBlank);
        dma.configure(1, true, DmaPhase::VBlank);

        dma.trigger(0, DmaPhase::HBlank, 10);
        dma.trigger(1, DmaPhase::HBlank, 10);
        assert!(dma.run[0]);
        assert!(!dma.run[1]);
    }

    #[test]
    fn video_capture_limited_to_active_lines() {
        let mut dma = DmaUnit::new();
        dma.configure(3, true, DmaPhase::Video);

        dma.trigger(3, DmaPhase::Video, 1);
        assert!(!dma.run[3]);
        dma.trigger(3, DmaPhase::Video, 2);
        assert!(dma.run[3]);
        dma.run[3] = false;
        dma.trigger(3, DmaPhase::Video, 162);
        assert!(!dma.run[3]);
    }

    #[test]
    fn immediate_channel_runs_on_configure() {
        let mut dma = DmaUnit::new();
        dma.configure(2, true, DmaPhase::Immediate);
        assert!(dma.run[2]);
        dma.configure(2, false, DmaPhase::Immediate);
        assert!(!dma.run[2]);
    }
}
