use crate::config::Level;
use crate::design_parameters::TOOTH_LOG_SIZE;

/// Primary line level at the sample, composite entries.
pub const COMPOSITE_PRI: u8 = 1 << 0;
/// Secondary line level at the sample.
pub const COMPOSITE_SEC: u8 = 1 << 1;
/// Entry was recorded from a cam edge rather than a crank edge.
pub const COMPOSITE_TRIG: u8 = 1 << 2;
/// Sync was held when the entry was recorded.
pub const COMPOSITE_SYNC: u8 = 1 << 3;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LogMode {
    #[default]
    Off,
    /// Record accepted primary gaps, microseconds.
    Tooth,
    /// Record absolute edge times plus a bit-packed input snapshot.
    Composite,
}

/// Single-fill diagnostic capture of tooth intervals or composite edge
/// snapshots.
///
/// The buffer records until full, then latches `ready` and drops further
/// entries. The telemetry reader copies the slices out and calls
/// [`ToothLog::clear_ready`] to start the next capture. The two modes are
/// mutually exclusive.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ToothLog {
    history: [u32; TOOTH_LOG_SIZE],
    composite: [u8; TOOTH_LOG_SIZE],
    index: u16,
    ready: bool,
    mode: LogMode,
}

impl Default for ToothLog {
    fn default() -> Self {
        Self {
            history: [0; TOOTH_LOG_SIZE],
            composite: [0; TOOTH_LOG_SIZE],
            index: 0,
            ready: false,
            mode: LogMode::Off,
        }
    }
}

impl ToothLog {
    /// Select the capture mode and restart the fill.
    pub fn set_mode(&mut self, mode: LogMode) {
        self.mode = mode;
        self.index = 0;
        self.ready = false;
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// The buffer has filled and recording is paused.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Restart recording after the reader has drained the buffer.
    pub fn clear_ready(&mut self) {
        self.index = 0;
        self.ready = false;
    }

    /// Entries recorded so far: gaps in tooth mode, absolute times in
    /// composite mode.
    pub fn entries(&self) -> &[u32] {
        &self.history[..self.len()]
    }

    /// Bit-packed input snapshots matching [`ToothLog::entries`] in composite
    /// mode.
    pub fn composite_entries(&self) -> &[u8] {
        &self.composite[..self.len()]
    }

    fn len(&self) -> usize {
        if self.ready {
            TOOTH_LOG_SIZE
        } else {
            self.index as usize
        }
    }

    pub(crate) fn push_tooth(&mut self, gap: u32) {
        if self.mode != LogMode::Tooth || self.ready {
            return;
        }
        self.push(gap, 0);
    }

    pub(crate) fn push_composite(
        &mut self,
        now: u32,
        primary: Level,
        secondary: Level,
        cam_edge: bool,
        sync: bool,
    ) {
        if self.mode != LogMode::Composite || self.ready {
            return;
        }
        let mut bits = 0u8;
        if primary == Level::High {
            bits |= COMPOSITE_PRI;
        }
        if secondary == Level::High {
            bits |= COMPOSITE_SEC;
        }
        if cam_edge {
            bits |= COMPOSITE_TRIG;
        }
        if sync {
            bits |= COMPOSITE_SYNC;
        }
        self.push(now, bits);
    }

    fn push(&mut self, word: u32, bits: u8) {
        let i = self.index as usize;
        self.history[i] = word;
        self.composite[i] = bits;
        if i == TOOTH_LOG_SIZE - 1 {
            self.ready = true;
        } else {
            self.index += 1;
        }
    }
}
