use crate::design_parameters::{MAX_RPM, US_IN_MINUTE};
use crate::state::DecoderState;

/// Full-revolution RPM from the distance between the two most recent
/// tooth-one sightings. Smooth but a revolution behind.
///
/// `degrees_over` is the span of the tooth-one period: 720 for patterns that
/// repeat once per engine cycle, 360 otherwise. Estimates at or above
/// [`MAX_RPM`] are discarded in favor of the previous figure.
///
/// Also refreshes `revolution_time`, which the angle interpolation and the
/// per-tooth timing patcher run off.
pub(crate) fn std_rpm(state: &mut DecoderState, cranking_rpm: u16, degrees_over: u16) -> u16 {
    if !(state.has_sync || state.half_sync) {
        return 0;
    }
    // A single spurious revolution can produce a huge figure before the
    // engine has actually turned over once.
    if state.last_rpm < cranking_rpm && state.start_revolutions == 0 {
        return 0;
    }
    if state.tooth_one_time == 0 || state.tooth_one_prev_time == 0 {
        return 0;
    }
    let mut revolution_time = state.tooth_one_time.wrapping_sub(state.tooth_one_prev_time);
    if degrees_over == 720 {
        revolution_time /= 2;
    }
    if revolution_time == 0 {
        return state.last_rpm;
    }
    state.revolution_time = revolution_time;
    let rpm = US_IN_MINUTE / revolution_time;
    if rpm >= MAX_RPM as u32 {
        state.last_rpm
    } else {
        rpm as u16
    }
}

/// Two-tooth RPM, extrapolated from the most recent gap. Volatile, but
/// available within a fraction of a revolution, which is all there is while
/// cranking.
///
/// Invalid until `stage_cycles` revolutions have completed and while the
/// decoder is unsynced.
pub(crate) fn cranking_rpm(
    state: &mut DecoderState,
    stage_cycles: u16,
    total_teeth: u16,
    degrees_over: u16,
) -> u16 {
    if state.start_revolutions < stage_cycles || !(state.has_sync || state.half_sync) {
        return 0;
    }
    if state.prev_tooth_time == 0 || state.last_tooth_time <= state.prev_tooth_time {
        return 0;
    }
    let gap = state.last_tooth_time.wrapping_sub(state.prev_tooth_time);
    let mut revolution_time =
        ((gap as u64 * total_teeth as u64).min(u32::MAX as u64)) as u32;
    if degrees_over == 720 {
        revolution_time /= 2;
    }
    if revolution_time == 0 {
        return state.last_rpm;
    }
    state.revolution_time = revolution_time;
    let rpm = US_IN_MINUTE / revolution_time;
    if rpm >= MAX_RPM as u32 {
        state.last_rpm
    } else {
        rpm as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced() -> DecoderState {
        DecoderState {
            has_sync: true,
            start_revolutions: 10,
            ..Default::default()
        }
    }

    #[test]
    fn unsynced_reads_zero() {
        let mut s = DecoderState {
            tooth_one_time: 200_000,
            tooth_one_prev_time: 20_000,
            ..Default::default()
        };
        assert_eq!(std_rpm(&mut s, 400, 360), 0);
        assert_eq!(cranking_rpm(&mut s, 0, 36, 360), 0);
    }

    #[test]
    fn full_revolution_figure() {
        let mut s = synced();
        s.tooth_one_prev_time = 1_000_000;
        s.tooth_one_time = 1_020_000;
        assert_eq!(std_rpm(&mut s, 400, 360), 3000);
        assert_eq!(s.revolution_time, 20_000);
    }

    #[test]
    fn cam_period_spans_two_revolutions() {
        let mut s = synced();
        s.tooth_one_prev_time = 1_000_000;
        s.tooth_one_time = 1_040_000;
        assert_eq!(std_rpm(&mut s, 400, 720), 3000);
        assert_eq!(s.revolution_time, 20_000);
    }

    #[test]
    fn missing_tooth_one_times_read_zero() {
        let mut s = synced();
        s.tooth_one_time = 1_000_000;
        assert_eq!(std_rpm(&mut s, 400, 360), 0);
    }

    #[test]
    fn spike_returns_previous_figure() {
        let mut s = synced();
        s.last_rpm = 2950;
        s.tooth_one_prev_time = 1_000_000;
        // 1 ms per revolution would be 60000 RPM.
        s.tooth_one_time = 1_001_000;
        assert_eq!(std_rpm(&mut s, 400, 360), 2950);
    }

    #[test]
    fn spike_guard_before_first_revolution() {
        let mut s = synced();
        s.start_revolutions = 0;
        s.tooth_one_prev_time = 1_000_000;
        s.tooth_one_time = 1_020_000;
        assert_eq!(std_rpm(&mut s, 400, 360), 0);
    }

    #[test]
    fn cranking_extrapolates_one_gap() {
        let mut s = synced();
        s.prev_tooth_time = 1_000_000;
        s.last_tooth_time = 1_005_000;
        // 5 ms per tooth on a 36 wheel: 180 ms per revolution.
        assert_eq!(cranking_rpm(&mut s, 0, 36, 360), 333);
        assert_eq!(s.revolution_time, 180_000);
    }

    #[test]
    fn cranking_waits_for_stage_cycles() {
        let mut s = synced();
        s.start_revolutions = 1;
        s.prev_tooth_time = 1_000_000;
        s.last_tooth_time = 1_005_000;
        assert_eq!(cranking_rpm(&mut s, 3, 36, 360), 0);
    }
}
