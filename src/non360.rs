//! Non-360 dual decoder: a dual-wheel arrangement whose primary wheel spans
//! more or less than one revolution.
//!
//! Tooth pitch is carried pre-multiplied by `angle_multiplier` so it stays an
//! integer; the angle reconstruction divides the multiplier back out. The
//! edge handlers are the dual-wheel ones, shared outright rather than
//! stubbed: only geometry differs.

use crate::angle::interpolate_crank_angle;
use crate::config::TriggerConfig;
use crate::design_parameters::{MAX_RPM, STALL_US_PER_DEGREE_50RPM, US_IN_MINUTE};
use crate::dual_wheel;
use crate::rpm::{cranking_rpm, std_rpm};
use crate::schedule::IgnitionScheduler;
use crate::state::DecoderState;

pub(crate) fn setup(cfg: &TriggerConfig, state: &mut DecoderState) {
    state.tooth_angle =
        ((360u32 * cfg.angle_multiplier as u32) / cfg.trigger_teeth as u32) as u16;
    state.pattern_teeth = cfg.trigger_teeth;
    state.actual_teeth = cfg.trigger_teeth;
    state.filter_time = US_IN_MINUTE / MAX_RPM as u32 / cfg.trigger_teeth as u32;
    state.sec_filter_time = US_IN_MINUTE / MAX_RPM as u32 / 2 / 2;
    state.max_stall_time = STALL_US_PER_DEGREE_50RPM * state.tooth_angle as u32
        / cfg.angle_multiplier.max(1) as u32;
}

pub(crate) fn primary(
    cfg: &TriggerConfig,
    state: &mut DecoderState,
    now: u32,
    sched: &mut dyn IgnitionScheduler,
) {
    dual_wheel::primary(cfg, state, now, sched);
}

pub(crate) fn secondary(cfg: &TriggerConfig, state: &mut DecoderState, now: u32) {
    dual_wheel::secondary(cfg, state, now);
}

pub(crate) fn get_rpm(cfg: &TriggerConfig, state: &mut DecoderState) -> u16 {
    if !state.has_sync || state.tooth_count == 0 {
        return 0;
    }
    if state.last_rpm < cfg.cranking_rpm {
        cranking_rpm(state, cfg.stage_cycles, cfg.trigger_teeth, 360)
    } else {
        std_rpm(state, cfg.cranking_rpm, 360)
    }
}

pub(crate) fn get_crank_angle(cfg: &TriggerConfig, state: &DecoderState, now: u32) -> i32 {
    let base = (state.tooth_count as i32 - 1) * state.tooth_angle as i32
        / cfg.angle_multiplier.max(1) as i32
        + cfg.trigger_angle as i32;
    interpolate_crank_angle(state, now, base)
}

pub(crate) fn set_end_teeth(cfg: &TriggerConfig, state: &mut DecoderState) {
    let period = state.pattern_teeth as i32;
    for ch in 0..state.active_channels as usize {
        let scaled = (state.end_angle[ch] as i32 - cfg.trigger_angle as i32)
            * cfg.angle_multiplier.max(1) as i32;
        let mut tooth = scaled / state.tooth_angle.max(1) as i32 - 1;
        while tooth > period {
            tooth -= period;
        }
        while tooth <= 0 {
            tooth += period;
        }
        state.end_tooth[ch] = tooth as u16;
    }
}
