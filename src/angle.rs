//! Integer crank-angle arithmetic. No floating point anywhere; the target may
//! not have an FPU.

use crate::config::{SparkMode, TriggerConfig, TriggerSpeed};
use crate::state::DecoderState;

/// Degrees of crank rotation covered in `elapsed` microseconds, interpolated
/// from the most recent full-revolution time.
pub fn time_to_angle(elapsed: u32, revolution_time: u32) -> i32 {
    if revolution_time == 0 {
        return 0;
    }
    ((elapsed as u64 * 360) / revolution_time as u64) as i32
}

/// Microseconds the crank needs to cover `degrees` at the current speed.
pub fn degrees_to_us(degrees: u32, revolution_time: u32) -> u32 {
    ((degrees as u64 * revolution_time as u64) / 360) as u32
}

/// Wrap an angle into `[0, crank_angle_max)`.
pub fn ignition_limits(angle: i32, crank_angle_max: i32) -> i32 {
    debug_assert!(crank_angle_max > 0);
    angle.rem_euclid(crank_angle_max)
}

/// Tooth-count based crank angle plus elapsed-time interpolation, normalized
/// into `[0, crank_angle_max)`.
///
/// `base` is the angle of the last seen tooth; callers that track a 720
/// degree cycle on a crank-speed wheel add 360 on the second revolution
/// before calling.
pub(crate) fn interpolate_crank_angle(state: &DecoderState, now: u32, base: i32) -> i32 {
    let elapsed = now.wrapping_sub(state.last_tooth_time);
    let angle = base + time_to_angle(elapsed, state.revolution_time);
    ignition_limits(angle, state.crank_angle_max as i32)
}

/// The standard reconstruction shared by the wheel decoders: last tooth index
/// times tooth pitch, the configured reference offset, the 360 degree
/// revolution-two shift for sequential crank-speed patterns, then
/// interpolation.
pub(crate) fn reconstruct_crank_angle(cfg: &TriggerConfig, state: &DecoderState, now: u32) -> i32 {
    let mut base =
        (state.tooth_count as i32 - 1) * state.tooth_angle as i32 + cfg.trigger_angle as i32;
    if cfg.is_sequential() && state.rev_one && cfg.trigger_speed == TriggerSpeed::Crank {
        base += 360;
    }
    interpolate_crank_angle(state, now, base)
}

/// Angle of the tooth that just fired, as handed to the per-tooth ignition
/// patcher. On the second revolution of a sequential crank-speed pattern the
/// tooth index is offset by a full wheel so each channel's end tooth is
/// unique across the cycle.
pub(crate) fn per_tooth_angle(cfg: &TriggerConfig, state: &DecoderState) -> (i32, u16) {
    let crank_angle = ignition_limits(
        (state.tooth_count as i32 - 1) * state.tooth_angle as i32 + cfg.trigger_angle as i32,
        state.crank_angle_max as i32,
    );
    if cfg.spark_mode == SparkMode::Sequential
        && state.rev_one
        && cfg.trigger_speed == TriggerSpeed::Crank
    {
        (crank_angle + 360, cfg.trigger_teeth + state.tooth_count)
    } else {
        (crank_angle, state.tooth_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_time_to_degrees() {
        // 20 ms per revolution: 1 ms is 18 degrees.
        assert_eq!(time_to_angle(1000, 20_000), 18);
        assert_eq!(time_to_angle(0, 20_000), 0);
        assert_eq!(time_to_angle(20_000, 20_000), 360);
        // No revolution time yet: contribute nothing rather than divide by zero.
        assert_eq!(time_to_angle(1000, 0), 0);
    }

    #[test]
    fn degrees_to_microseconds() {
        assert_eq!(degrees_to_us(18, 20_000), 1000);
        assert_eq!(degrees_to_us(360, 20_000), 20_000);
        assert_eq!(degrees_to_us(0, 20_000), 0);
    }

    #[test]
    fn round_trip_is_within_a_degree() {
        let rev = 17_321;
        for deg in [1u32, 45, 90, 179, 359] {
            let us = degrees_to_us(deg, rev);
            let back = time_to_angle(us, rev);
            assert!((back - deg as i32).abs() <= 1, "{} -> {} -> {}", deg, us, back);
        }
    }

    #[test]
    fn limits_wrap_both_ways() {
        assert_eq!(ignition_limits(0, 360), 0);
        assert_eq!(ignition_limits(360, 360), 0);
        assert_eq!(ignition_limits(365, 360), 5);
        assert_eq!(ignition_limits(-5, 360), 355);
        assert_eq!(ignition_limits(-725, 720), 715);
    }

    #[test]
    fn interpolation_normalizes() {
        let state = DecoderState {
            last_tooth_time: 1_000_000,
            revolution_time: 20_000,
            crank_angle_max: 360,
            ..Default::default()
        };
        // Base near the top of the cycle plus elapsed time wraps around.
        assert_eq!(interpolate_crank_angle(&state, 1_001_000, 350), 8);
    }
}
