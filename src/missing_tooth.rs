//! Missing-tooth wheel decoder.
//!
//! A wheel with `trigger_teeth` logical positions of which `missing_teeth`
//! consecutive ones are absent. The gap is the angular reference: the first
//! tooth after it is tooth one. Gap recognition compares each gap against the
//! previous one; a missing tooth stretches the gap to (missing + 1) pitches,
//! so 1.5x (one missing) or 2x (two missing) the last gap is a robust
//! threshold at any speed.

use crate::angle::reconstruct_crank_angle;
use crate::config::{Level, SecondaryPattern, SparkMode, TriggerConfig, TriggerSpeed};
use crate::design_parameters::{MAX_RPM, STALL_US_PER_DEGREE_50RPM, US_IN_MINUTE};
use crate::filter::set_filter;
use crate::rpm::{cranking_rpm, std_rpm};
use crate::schedule::{per_tooth_dispatch, IgnitionScheduler};
use crate::state::{DecoderFlags, DecoderState};
use crate::vvt::{record_vvt1, record_vvt2};

pub(crate) fn setup(cfg: &TriggerConfig, state: &mut DecoderState) {
    let span: u32 = match cfg.trigger_speed {
        TriggerSpeed::Crank => 360,
        TriggerSpeed::Cam => 720,
    };
    state.tooth_angle = (span / cfg.trigger_teeth as u32) as u16;
    state.pattern_teeth = cfg.trigger_teeth;
    state.actual_teeth = cfg.trigger_teeth - cfg.missing_teeth;
    // Shortest possible tooth gap at the RPM ceiling.
    state.filter_time = US_IN_MINUTE / MAX_RPM as u32 / cfg.trigger_teeth as u32;
    // Cam input sees at most two edges per revolution.
    state.sec_filter_time = US_IN_MINUTE / MAX_RPM as u32 / 2 / 2;
    state.max_stall_time =
        STALL_US_PER_DEGREE_50RPM * state.tooth_angle as u32 * (cfg.missing_teeth as u32 + 1);
}

/// Crank edge handler.
pub(crate) fn primary(
    cfg: &TriggerConfig,
    state: &mut DecoderState,
    now: u32,
    sec_level: Level,
    sched: &mut dyn IgnitionScheduler,
) {
    let cur_gap = now.wrapping_sub(state.last_tooth_time);
    if cur_gap < state.filter_time {
        return;
    }
    state.tooth_count += 1;
    state.flags.set(DecoderFlags::VALID_TRIGGER);
    state.last_gap = cur_gap;

    let mut is_gap_tooth = false;
    if state.last_tooth_time != 0 && state.prev_tooth_time != 0 {
        // The gap cannot appear in the first three quarters of a synced
        // revolution, so skip the detection arithmetic there once running.
        let attempt = !state.has_sync
            || state.last_rpm < 2000
            || state.tooth_count as u32 >= (3 * state.actual_teeth as u32) >> 2;
        if attempt {
            let last_gap = state.last_tooth_time.wrapping_sub(state.prev_tooth_time);
            let target_gap = if cfg.missing_teeth == 1 {
                ((last_gap as u64 * 3) >> 1) as u32
            } else {
                ((last_gap as u64 * cfg.missing_teeth as u64).min(u32::MAX as u64)) as u32
            };
            if cur_gap > target_gap || state.tooth_count > state.actual_teeth {
                if state.tooth_count < state.actual_teeth && state.has_sync {
                    // Gap before the wheel completed: the signal is bad.
                    state.lose_sync();
                } else {
                    is_gap_tooth = true;
                    if state.has_sync || state.half_sync {
                        state.start_revolutions = state.start_revolutions.saturating_add(
                            match cfg.trigger_speed {
                                TriggerSpeed::Crank => 1,
                                TriggerSpeed::Cam => 2,
                            },
                        );
                    } else {
                        state.start_revolutions = 0;
                    }
                    state.tooth_count = 1;
                    state.rev_one = match cfg.sec_pattern {
                        SecondaryPattern::Poll => sec_level == cfg.poll_level,
                        _ => !state.rev_one,
                    };
                    state.tooth_one_prev_time = state.tooth_one_time;
                    state.tooth_one_time = now;
                    if cfg.is_sequential() {
                        // Sequential outputs need the cycle half; that comes
                        // from the cam unless the wheel itself turns at cam
                        // speed or the cam level is polled.
                        if cfg.sec_pattern == SecondaryPattern::Poll
                            || cfg.trigger_speed == TriggerSpeed::Cam
                            || state.sec_tooth_count > 0
                        {
                            state.gain_sync();
                        } else if !state.has_sync {
                            state.half_sync = true;
                        }
                    } else {
                        state.gain_sync();
                    }
                    // The filter threshold still reflects the stretched gap
                    // interval; it would swallow the next real tooth.
                    state.filter_time = 0;
                    state.flags.clear(DecoderFlags::TOOTH_ANG_CORRECT);
                }
            }
        }
        if !is_gap_tooth {
            set_filter(state, cfg.filter, cur_gap);
            state.flags.set(DecoderFlags::TOOTH_ANG_CORRECT);
        }
    }
    state.prev_tooth_time = state.last_tooth_time;
    state.last_tooth_time = now;

    per_tooth_dispatch(cfg, state, sched);
}

/// Cam edge handler: either a 4-1 wheel or a single tooth per cam revolution.
/// Poll-mode configurations consume no cam edges at all.
pub(crate) fn secondary(cfg: &TriggerConfig, state: &mut DecoderState, now: u32) {
    let cur_gap = now.wrapping_sub(state.last_sec_tooth_time);
    if cur_gap < state.sec_filter_time {
        return;
    }
    match cfg.sec_pattern {
        SecondaryPattern::FourMinusOne => {
            let last_gap = state
                .last_sec_tooth_time
                .wrapping_sub(state.prev_sec_tooth_time);
            let target_gap = ((last_gap as u64 * 3) >> 1) as u32;
            state.prev_sec_tooth_time = state.last_sec_tooth_time;
            state.last_sec_tooth_time = now;
            if cur_gap >= target_gap || state.sec_tooth_count > 3 {
                state.sec_tooth_count = 1;
                state.rev_one = true;
                state.sec_filter_time = 0;
                let angle = reconstruct_crank_angle(cfg, state, now);
                record_vvt1(cfg, state, angle);
            } else {
                state.sec_filter_time = cur_gap >> 2;
                state.sec_tooth_count = state.sec_tooth_count.saturating_add(1);
            }
        }
        SecondaryPattern::Single => {
            state.rev_one = true;
            state.sec_filter_time = cur_gap >> 1;
            state.last_sec_tooth_time = now;
            state.sec_tooth_count = state.sec_tooth_count.saturating_add(1);
            let angle = reconstruct_crank_angle(cfg, state, now);
            record_vvt1(cfg, state, angle);
        }
        SecondaryPattern::Poll => {}
    }
}

/// Second cam input, used purely as a VVT phase reference.
pub(crate) fn tertiary(cfg: &TriggerConfig, state: &mut DecoderState, now: u32) {
    let cur_gap = now.wrapping_sub(state.last_third_tooth_time);
    if cur_gap < state.third_filter_time {
        return;
    }
    state.last_third_tooth_time = now;
    state.third_filter_time = cur_gap >> 1;
    let angle = reconstruct_crank_angle(cfg, state, now);
    record_vvt2(cfg, state, angle);
}

pub(crate) fn get_rpm(cfg: &TriggerConfig, state: &mut DecoderState) -> u16 {
    let degrees_over = match cfg.trigger_speed {
        TriggerSpeed::Crank => 360,
        TriggerSpeed::Cam => 720,
    };
    if state.last_rpm < cfg.cranking_rpm {
        if state.tooth_count != 1 {
            cranking_rpm(state, cfg.stage_cycles, cfg.trigger_teeth, degrees_over)
        } else {
            // The interval ending at tooth one spans the gap; hold the
            // previous figure instead of extrapolating it.
            state.last_rpm
        }
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
        let mut tooth = tooth as u16;
        // Never park an end tooth on the missing slot; it would not fire.
        if tooth > state.actual_teeth && tooth <= state.pattern_teeth {
            tooth = state.actual_teeth;
        }
        let cap = state.actual_teeth + tooth_adder;
        if tooth > cap {
            tooth = cap;
        }
        state.end_tooth[ch] = tooth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cfg_36_1() -> TriggerConfig {
        TriggerConfig::default()
    }

    #[test]
    fn setup_geometry() {
        let cfg = cfg_36_1();
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);
        assert_eq!(state.tooth_angle, 10);
        assert_eq!(state.actual_teeth, 35);
        assert_eq!(state.pattern_teeth, 36);
        // 50 RPM floor across the doubled gap interval.
        assert_eq!(state.max_stall_time, 3333 * 10 * 2);
        assert!(state.filter_time > 0);
    }

    #[test]
    fn cam_speed_wheel_spans_720() {
        let cfg = TriggerConfig {
            trigger_speed: TriggerSpeed::Cam,
            trigger_teeth: 24,
            ..Default::default()
        };
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);
        assert_eq!(state.tooth_angle, 30);
    }

    #[rstest]
    // Plain wasted-spark 36-1, 10 degrees per tooth.
    #[case(SparkMode::WastedSpark, 355, 0, 34)]
    #[case(SparkMode::WastedSpark, 100, 0, 9)]
    // Lands on the missing slot: pulled back to the last physical tooth.
    #[case(SparkMode::WastedSpark, 370, 0, 35)]
    // Wraps below zero onto the last physical tooth.
    #[case(SparkMode::WastedSpark, 5, 0, 35)]
    // Reference offset shifts the mapping.
    #[case(SparkMode::WastedSpark, 355, 90, 25)]
    // Sequential doubles the period; second-revolution angles map past the
    // wheel.
    #[case(SparkMode::Sequential, 355, 0, 34)]
    #[case(SparkMode::Sequential, 715, 0, 70)]
    fn end_tooth_mapping(
        #[case] spark_mode: SparkMode,
        #[case] end_angle: i16,
        #[case] trigger_angle: i16,
        #[case] expected: u16,
    ) {
        let cfg = TriggerConfig {
            spark_mode,
            trigger_angle,
            ..Default::default()
        };
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);
        state.active_channels = 1;
        state.end_angle[0] = end_angle;
        set_end_teeth(&cfg, &mut state);
        assert_eq!(state.end_tooth[0], expected);
    }

    #[test]
    fn four_minus_one_cam_finds_its_gap() {
        let cfg = TriggerConfig {
            sec_pattern: SecondaryPattern::FourMinusOne,
            ..Default::default()
        };
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);

        // Cold start: the first edge reads as the reference.
        secondary(&cfg, &mut state, 1_000_000);
        assert_eq!(state.sec_tooth_count, 1);
        assert!(state.rev_one);
        assert_eq!(state.sec_filter_time, 0);

        // Three even teeth at 40 ms.
        state.rev_one = false;
        for tooth in 2..=4u16 {
            secondary(&cfg, &mut state, 1_000_000 + (tooth as u32 - 1) * 40_000);
            assert_eq!(state.sec_tooth_count, tooth);
        }
        assert!(!state.rev_one);
        // The stretched gap of the missing tooth restarts the count.
        secondary(&cfg, &mut state, 1_000_000 + 3 * 40_000 + 80_000);
        assert_eq!(state.sec_tooth_count, 1);
        assert!(state.rev_one);
    }

    #[test]
    fn cam_noise_is_filtered() {
        let cfg = TriggerConfig {
            sec_pattern: SecondaryPattern::FourMinusOne,
            ..Default::default()
        };
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);
        secondary(&cfg, &mut state, 1_000_000);
        secondary(&cfg, &mut state, 1_040_000);
        assert_eq!(state.sec_filter_time, 10_000);
        // A pulse inside the 25% window changes nothing.
        secondary(&cfg, &mut state, 1_045_000);
        assert_eq!(state.sec_tooth_count, 2);
        assert_eq!(state.last_sec_tooth_time, 1_040_000);
    }

    #[test]
    fn end_tooth_never_on_missing_slot() {
        let cfg = cfg_36_1();
        let mut state = DecoderState::default();
        setup(&cfg, &mut state);
        state.active_channels = 1;
        for end_angle in 0..720 {
            state.end_angle[0] = end_angle;
            set_end_teeth(&cfg, &mut state);
            let tooth = state.end_tooth[0];
            assert!(tooth >= 1 && tooth <= state.actual_teeth, "angle {}", end_angle);
        }
    }
}
