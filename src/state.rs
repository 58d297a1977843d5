//! Save-state plumbing.
//!
//! Every stateful unit implements [`SyncState`] with a single `sync_state`
//! method that both saves and loads: each field goes through exactly one
//! `sync_*` call, so read/write symmetry is guaranteed mechanically instead
//! of by keeping two hand-written functions in agreement.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Save,
    Load,
}

/// A byte stream that either records fields (save) or replays them (load).
pub struct StateStream {
    mode: Mode,
    data: Vec<u8>,
    pos: usize,
    overrun: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The buffer ended before every field was restored.
    Truncated,
    /// The buffer contained bytes beyond the last field.
    TrailingBytes,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Truncated => write!(f, "save state truncated"),
            StateError::TrailingBytes => write!(f, "save state has trailing bytes"),
        }
    }
}

impl Error for StateError {}

pub trait SyncState {
    fn sync_state(&mut self, s: &mut StateStream);
}

impl StateStream {
    pub fn saver() -> Self {
        Self {
            mode: Mode::Save,
            data: Vec::new(),
            pos: 0,
            overrun: false,
        }
    }

    pub fn loader(data: &[u8]) -> Self {
        Self {
            mode: Mode::Load,
            data: data.to_vec(),
            pos: 0,
            overrun: false,
        }
    }

    pub fn is_reader(&self) -> bool {
        self.mode == Mode::Load
    }

    /// Consume the stream after a save, yielding the recorded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Validate that a load consumed the whole buffer exactly.
    pub fn finish_load(self) -> Result<(), StateError> {
        if self.overrun {
            Err(StateError::Truncated)
        } else if self.pos != self.data.len() {
            Err(StateError::TrailingBytes)
        } else {
            Ok(())
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn take(&mut self, out: &mut [u8]) {
        let end = self.pos + out.len();
        if end > self.data.len() {
            self.overrun = true;
            out.fill(0);
            self.pos = self.data.len();
            return;
        }
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
    }

    pub fn sync_bool(&mut self, v: &mut bool) {
        let mut b = [*v as u8];
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = b[0] != 0;
            }
        }
    }

    pub fn sync_u8(&mut self, v: &mut u8) {
        let mut b = [*v];
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = b[0];
            }
        }
    }

    pub fn sync_u16(&mut self, v: &mut u16) {
        let mut b = v.to_le_bytes();
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = u16::from_le_bytes(b);
            }
        }
    }

    pub fn sync_u32(&mut self, v: &mut u32) {
        let mut b = v.to_le_bytes();
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = u32::from_le_bytes(b);
            }
        }
    }

    pub fn sync_u64(&mut self, v: &mut u64) {
        let mut b = v.to_le_bytes();
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = u64::from_le_bytes(b);
            }
        }
    }

    pub fn sync_i32(&mut self, v: &mut i32) {
        let mut b = v.to_le_bytes();
        match self.mode {
            Mode::Save => self.put(&b),
            Mode::Load => {
                self.take(&mut b);
                *v = i32::from_le_bytes(b);
            }
        }
    }

    pub fn sync_bytes(&mut self, v: &mut [u8]) {
        match self.mode {
            Mode::Save => self.put(v),
            Mode::Load => self.take(v),
        }
    }

    pub fn sync_bools(&mut self, v: &mut [bool]) {
        for b in v {
            self.sync_bool(b);
        }
    }

    pub fn sync_u8s(&mut self, v: &mut [u8]) {
        self.sync_bytes(v);
    }

    pub fn sync_u16s(&mut self, v: &mut [u16]) {
        for x in v {
            self.sync_u16(x);
        }
    }

    pub fn sync_u32s(&mut self, v: &mut [u32]) {
        for x in v {
            self.sync_u32(x);
        }
    }

    pub fn sync_i32s(&mut self, v: &mut [i32]) {
        for x in v {
            self.sync_i32(x);
        }
    }
}
