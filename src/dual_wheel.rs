//! Dual-wheel decoder: an even-spaced crank wheel with no reference mark,
//! plus a cam wheel whose single tooth anchors the cycle.
//!
//! The crank wheel alone gives tooth spacing; only the cam edge says which
//! tooth is which, so sync always arrives through the secondary input. The
//! non-360 pattern shares both edge handlers.

use crate::config::{SparkMode, TriggerConfig, TriggerSpeed};
use crate::design_parameters::{MAX_RPM, STALL_US_PER_DEGREE_50RPM, US_IN_MINUTE};
use crate::filter::set_filter;
use crate::rpm::{cranking_rpm, std_rpm};
use crate::schedule::{per_tooth_dispatch, IgnitionScheduler};
use crate::state::{DecoderFlags, DecoderState};

pub(crate) fn setup(cfg: &TriggerConfig, state: &mut DecoderState) {
    let span: u32 = match cfg.trigger_speed {
        TriggerSpeed::Crank => 360,
        TriggerSpeed::Cam => 720,
    };
    state.tooth_angle = (span / cfg.trigger_teeth as u32) as u16;
    state.pattern_teeth = cfg.trigger_teeth;
    state.actual_teeth = cfg.trigger_teeth;
    state.filter_time = US_IN_MINUTE / MAX_RPM as u32 / cfg.trigger_teeth as u32;
    state.sec_filter_time = US_IN_MINUTE / MAX_RPM as u32 / 2 / 2;
    state.max_stall_time = STALL_US_PER_DEGREE_50RPM * state.tooth_angle as u32;
    // Every interval on this wheel spans exactly one pitch.
    state.flags.set(DecoderFlags::TOOTH_ANG_CORRECT);
}

/// Crank edge handler. Wrapping of the tooth count is gated on sync: until
/// the cam reference has been seen the count just grows and the angle output
/// is meaningless anyway.
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
    // Unsynced, the count just grows; it is pulled back onto the wheel by
    // the cam reference.
    state.tooth_count = state.tooth_count.saturating_add(1);
    state.flags.set(DecoderFlags::VALID_TRIGGER);
    state.last_gap = cur_gap;
    state.prev_tooth_time = state.last_tooth_time;
    state.last_tooth_time = now;

    if state.has_sync {
        if state.tooth_count == 1 || state.tooth_count > cfg.trigger_teeth {
            state.tooth_count = 1;
            state.rev_one = !state.rev_one;
            state.tooth_one_prev_time = state.tooth_one_time;
            state.tooth_one_time = now;
            state.start_revolutions =
                state
                    .start_revolutions
                    .saturating_add(match cfg.trigger_speed {
                        TriggerSpeed::Crank => 1,
                        TriggerSpeed::Cam => 2,
                    });
        }
    }
    set_filter(state, cfg.filter, cur_gap);

    per_tooth_dispatch(cfg, state, sched);
}

/// Cam edge handler: the cycle reference.
///
/// The first edge (or any edge during the staging revolutions) hard-resyncs
/// the primary count and back-dates the previous tooth time so the first RPM
/// figure computes to a 10 RPM floor instead of garbage. Later edges merely
/// verify the count, bumping the sync-loss counter on disagreement and
/// optionally snapping the count back.
pub(crate) fn secondary(cfg: &TriggerConfig, state: &mut DecoderState, now: u32) {
    let cur_gap = now.wrapping_sub(state.last_sec_tooth_time);
    if cur_gap < state.sec_filter_time {
        // Rejected edge: re-derive the threshold from engine speed so a
        // mis-adapted filter cannot lock the cam input out permanently.
        state.sec_filter_time = state.revolution_time >> 1;
        return;
    }
    state.last_sec_tooth_time = now;
    state.sec_filter_time = cur_gap >> 2;
    state.sec_tooth_count = state.sec_tooth_count.saturating_add(1);

    if !state.has_sync || state.start_revolutions <= cfg.stage_cycles {
        state.last_tooth_time = now;
        // One tooth gap at 10 RPM.
        state.prev_tooth_time =
            now.wrapping_sub(US_IN_MINUTE / 10 / cfg.trigger_teeth as u32);
        state.tooth_count = cfg.trigger_teeth;
        state.filter_time = 0;
        state.gain_sync();
    } else {
        if state.tooth_count != cfg.trigger_teeth && state.start_revolutions > 2 {
            state.sync_loss_count = state.sync_loss_count.saturating_add(1);
        }
        if cfg.use_resync {
            state.tooth_count = cfg.trigger_teeth;
        }
    }
    state.rev_one = true;
}

pub(crate) fn get_rpm(cfg: &TriggerConfig, state: &mut DecoderState) -> u16 {
    if !state.has_sync {
        return 0;
    }
    let degrees_over = match cfg.trigger_speed {
        TriggerSpeed::Crank => 360,
        TriggerSpeed::Cam => 720,
    };
    if state.last_rpm < cfg.cranking_rpm {
        cranking_rpm(state, cfg.stage_cycles, cfg.trigger_teeth, degrees_over)
    } else {
        std_rpm(state, cfg.cranking_rpm, degrees_over)
    }
}

pub(crate) fn set_end_teeth(cfg: &TriggerConfig, state: &mut DecoderState) {
    let tooth_adder =
        if cfg.spark_mode == SparkMode::Sequential && cfg.trigger_speed == TriggerSpeed::Crank {
            cfg.trigger_teeth
        } else {
            0
        };
    let period = (state.pattern_teeth + tooth_adder) as i32;
    for ch in 0..state.active_channels as usize {
        let mut tooth = (state.end_angle[ch] as i32 - cfg.trigger_angle as i32)
            / state.tooth_angle.max(1) as i32
            - 1;
        while tooth > period {
            tooth -= period;
        }
        while tooth <= 0 {
            tooth += period;
        }
        state.end_tooth[ch] = tooth as u16;
    }
}
