//! Basic distributor decoder: one tooth per cylinder on a cam-speed wheel.
//!
//! There is no reference mark at all. The first accepted tooth is declared
//! tooth one and sync follows from counting; an overrun means the count and
//! the wheel have drifted apart and sync is dropped. With so few teeth the
//! stall timeout must track engine speed instead of tooth pitch.

use crate::angle::{ignition_limits, interpolate_crank_angle};
use crate::config::TriggerConfig;
use crate::design_parameters::{
    DISTRIBUTOR_STALL_FLOOR_US, MAX_RPM, STALL_US_PER_DEGREE_90RPM, US_IN_MINUTE,
};
use crate::filter::set_filter;
use crate::rpm::{cranking_rpm, std_rpm};
use crate::schedule::{check_per_tooth, IgnitionScheduler};
use crate::state::{DecoderFlags, DecoderState};

/// Below this the sparse wheel makes the full-revolution RPM figure too
/// stale to publish; the two-tooth estimator is used instead.
const LOW_SPEED_RPM: u16 = 1500;

pub(crate) fn setup(cfg: &TriggerConfig, state: &mut DecoderState) {
    state.actual_teeth = (cfg.n_cylinders as u16).max(1);
    state.pattern_teeth = state.actual_teeth;
    state.tooth_angle = 720 / state.actual_teeth;
    // Half a tooth at the RPM ceiling, halved again for margin.
    state.filter_time = US_IN_MINUTE / MAX_RPM as u32 / cfg.n_cylinders as u32 / 2;
    // 90 RPM floor until the first revolution time exists.
    state.max_stall_time = STALL_US_PER_DEGREE_90RPM * state.tooth_angle as u32;
    if cfg.ign_cranklock {
        state.flags.set(DecoderFlags::HAS_FIXED_CRANKING);
    }
}

pub(crate) fn primary(
    cfg: &TriggerConfig,
    state: &mut DecoderState,
    now: u32,
    sched: &mut dyn IgnitionScheduler,
) {
    let cur_gap = now.wrapping_sub(state.last_tooth_time);
    if cur_gap < state.filter_time {
        return;
    }
    if state.has_sync {
        set_filter(state, cfg.filter, cur_gap);
    } else {
        state.filter_time = 0;
    }
    state.last_gap = cur_gap;

    if state.tooth_count == state.actual_teeth || !state.has_sync {
        state.tooth_count = 1;
        state.tooth_one_prev_time = state.tooth_one_time;
        state.tooth_one_time = now;
        state.gain_sync();
        state.start_revolutions = state.start_revolutions.saturating_add(1);
    } else if state.tooth_count < state.actual_teeth {
        state.tooth_count += 1;
    } else {
        // Count ran past the wheel: the signal skipped or gained an edge.
        state.lose_sync();
        state.tooth_count = 0;
    }
    state.flags.set(DecoderFlags::VALID_TRIGGER);

    let cranking = state.last_rpm < cfg.cranking_rpm;
    if cfg.ign_cranklock && cranking {
        // Timing is locked to the mechanical reference while cranking: kill
        // every coil charge on the tooth itself.
        for ch in 0..state.active_channels as usize {
            sched.end_coil_charge(ch);
        }
    }
    if cfg.per_tooth_ign && !cranking {
        let crank_angle = ignition_limits(
            (state.tooth_count as i32 - 1) * state.tooth_angle as i32 + cfg.trigger_angle as i32,
            state.crank_angle_max as i32,
        );
        // Tooth indices fold onto the lower half of the wheel; both halves of
        // the cycle reuse the same end teeth.
        let half = state.actual_teeth / 2;
        let tooth = if half > 0 && state.tooth_count > half {
            state.tooth_count - half
        } else {
            state.tooth_count
        };
        check_per_tooth(state, crank_angle, tooth, sched);
    }
    state.prev_tooth_time = state.last_tooth_time;
    state.last_tooth_time = now;

    state.max_stall_time = (state.revolution_time << 1).max(DISTRIBUTOR_STALL_FLOOR_US);
}

pub(crate) fn get_rpm(cfg: &TriggerConfig, state: &mut DecoderState) -> u16 {
    // With at most one tooth per cylinder the full-revolution figure lags a
    // whole cam turn; stay on the two-tooth estimator until well past
    // cranking speed.
    let rpm = if state.last_rpm < cfg.cranking_rpm || state.last_rpm < LOW_SPEED_RPM {
        cranking_rpm(state, cfg.stage_cycles, state.actual_teeth, 720)
    } else {
        std_rpm(state, cfg.cranking_rpm, 720)
    };
    state.max_stall_time = (state.revolution_time << 1).max(DISTRIBUTOR_STALL_FLOOR_US);
    rpm
}

pub(crate) fn get_crank_angle(cfg: &TriggerConfig, state: &DecoderState, now: u32) -> i32 {
    let base =
        (state.tooth_count as i32 - 1) * state.tooth_angle as i32 + cfg.trigger_angle as i32;
    interpolate_crank_angle(state, now, base)
}

/// Map each channel's end angle onto the folded lower half of the wheel.
pub(crate) fn set_end_teeth(cfg: &TriggerConfig, state: &mut DecoderState) {
    let half = (state.actual_teeth / 2).max(1);
    let tooth_angle = state.tooth_angle.max(1) as i32;
    for ch in 0..state.active_channels as usize {
        let mut angle = state.end_angle[ch] as i32 - cfg.trigger_angle as i32;
        while angle > 360 {
            angle -= 360;
        }
        while angle <= 0 {
            angle += 360;
        }
        let tooth = (angle + tooth_angle - 1) / tooth_angle;
        state.end_tooth[ch] = (tooth.clamp(1, half as i32)) as u16;
    }
}
