use serde::{Deserialize, Serialize};

use crate::design_parameters::IGN_CHANNELS;

/// One-bit decoder status flags, packed the way the telemetry stream expects
/// them.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct DecoderFlags(u8);

impl DecoderFlags {
    /// The last edge handed to a handler advanced the decoder.
    pub const VALID_TRIGGER: u8 = 1 << 0;
    /// The active configuration runs a sequential output.
    pub const IS_SEQUENTIAL: u8 = 1 << 1;
    /// A fixed cranking timing lock is configured or commanded; the
    /// per-tooth patcher stands down while it is set.
    pub const HAS_FIXED_CRANKING: u8 = 1 << 2;
    /// The most recent tooth interval spans exactly one tooth pitch.
    pub const TOOTH_ANG_CORRECT: u8 = 1 << 3;
    /// Gap detection compares second derivatives of the tooth times.
    pub const SECOND_DERIV: u8 = 1 << 4;

    pub fn set(&mut self, mask: u8) {
        self.0 |= mask;
    }

    pub fn clear(&mut self, mask: u8) {
        self.0 &= !mask;
    }

    pub fn check(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Synchronization level, derived from the two sync flags.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Tooth position unknown.
    #[default]
    None,
    /// Position known modulo 360 degrees; enough for wasted spark and batch
    /// injection, not for sequential outputs.
    Half,
    /// Position known within the full cycle.
    Full,
}

/// The decoder's shared working state.
///
/// Interrupt handlers are the sole writers of the tooth timestamps, counters
/// and sync flags. Mainline writes only the configuration-derived constants
/// (`tooth_angle`, `max_stall_time`, end teeth), and only through `setup` or
/// `set_end_teeth` while holding the critical section. Mainline reads of more
/// than one word go through [`crate::SharedDecoder`].
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DecoderState {
    /// Index of the last seen primary tooth within the pattern period.
    /// While synced this stays in `1..=pattern_teeth`.
    pub(crate) tooth_count: u16,
    /// Raw physical primary edge count, for decoders and diagnostics where
    /// logical teeth differ from physical ones.
    pub(crate) system_tooth_count: u8,
    pub(crate) last_tooth_time: u32,
    pub(crate) prev_tooth_time: u32,
    pub(crate) last_sec_tooth_time: u32,
    pub(crate) prev_sec_tooth_time: u32,
    pub(crate) last_third_tooth_time: u32,
    /// Timestamps of the two most recent tooth-one sightings; their distance
    /// is the full-revolution RPM base.
    pub(crate) tooth_one_time: u32,
    pub(crate) tooth_one_prev_time: u32,
    pub(crate) sec_tooth_count: u16,
    /// Which revolution of the 720 degree cycle we are on.
    pub(crate) rev_one: bool,
    pub(crate) has_sync: bool,
    pub(crate) half_sync: bool,
    pub(crate) sync_loss_count: u16,
    /// Cumulative revolutions since boot; saturates.
    pub(crate) start_revolutions: u16,
    /// Minimum accepted gap on the primary input, microseconds. Adaptive.
    pub(crate) filter_time: u32,
    pub(crate) sec_filter_time: u32,
    pub(crate) third_filter_time: u32,
    /// Degrees per logical tooth.
    pub(crate) tooth_angle: u16,
    /// Physical tooth count (pattern positions minus missing).
    pub(crate) actual_teeth: u16,
    /// Logical positions in one pattern period.
    pub(crate) pattern_teeth: u16,
    /// No primary edge for this long means the engine has stalled.
    pub(crate) max_stall_time: u32,
    pub(crate) crank_angle_max: u16,
    /// Time of the last full 360 degree revolution, microseconds. Updated by
    /// the RPM estimators, consumed by angle interpolation.
    pub(crate) revolution_time: u32,
    /// Most recent accepted primary gap, microseconds.
    pub(crate) last_gap: u32,
    /// RPM figure last returned to mainline.
    pub(crate) last_rpm: u16,
    pub(crate) active_channels: u8,
    pub(crate) end_tooth: [u16; IGN_CHANNELS],
    pub(crate) end_angle: [i16; IGN_CHANNELS],
    /// Cam phase angles in half-degree steps.
    pub(crate) vvt1_angle: i16,
    pub(crate) vvt2_angle: i16,
    pub(crate) flags: DecoderFlags,
}

/// Plain-old-data capture of the mainline-visible outputs, taken in one
/// critical section so the words are mutually consistent.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub rpm: u16,
    pub tooth_count: u16,
    pub system_tooth_count: u8,
    pub last_tooth_time: u32,
    pub rev_one: bool,
    pub sync: SyncStatus,
    pub sync_loss_count: u16,
    pub start_revolutions: u16,
    /// Half-degree steps.
    pub vvt1_angle: i16,
    pub vvt2_angle: i16,
    pub flags: DecoderFlags,
}

impl DecoderState {
    pub(crate) fn sync_status(&self) -> SyncStatus {
        if self.has_sync {
            SyncStatus::Full
        } else if self.half_sync {
            SyncStatus::Half
        } else {
            SyncStatus::None
        }
    }

    pub(crate) fn lose_sync(&mut self) {
        self.has_sync = false;
        self.half_sync = false;
        self.sync_loss_count = self.sync_loss_count.saturating_add(1);
    }

    pub(crate) fn gain_sync(&mut self) {
        self.has_sync = true;
        self.half_sync = false;
    }
}
