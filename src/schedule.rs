use crate::angle::{degrees_to_us, ignition_limits, per_tooth_angle};
use crate::config::TriggerConfig;
use crate::design_parameters::MIN_CYCLES_FOR_ENDCOMPARE;
use crate::state::{DecoderFlags, DecoderState};

/// Lifecycle of one channel's ignition schedule, as seen by the decoder.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ScheduleState {
    #[default]
    Off,
    /// Armed but the dwell has not started.
    Pending,
    /// Dwell in progress; the end compare is live in the timer.
    Running,
}

/// Seam to the ignition timer-compare scheduler.
///
/// The decoder hands over microsecond delays measured from the tooth edge
/// being processed; the implementation converts them to timer ticks and
/// writes the compare registers. Called from interrupt context, so
/// implementations must not block.
pub trait IgnitionScheduler {
    fn state(&self, channel: usize) -> ScheduleState;

    /// Retarget the live end compare of a running schedule to fire
    /// `delay_us` from now.
    fn set_compare(&mut self, channel: usize, delay_us: u32);

    /// Pre-stage the end compare of a schedule that has not started and mark
    /// it decoder-set, so the scheduler honors it on start.
    fn stage_end_compare(&mut self, channel: usize, delay_us: u32);

    /// End the coil charge immediately (cranking timing lock).
    fn end_coil_charge(&mut self, channel: usize);
}

/// Scheduler stub for configurations without per-tooth ignition.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullScheduler;

impl IgnitionScheduler for NullScheduler {
    fn state(&self, _channel: usize) -> ScheduleState {
        ScheduleState::Off
    }

    fn set_compare(&mut self, _channel: usize, _delay_us: u32) {}

    fn stage_end_compare(&mut self, _channel: usize, _delay_us: u32) {}

    fn end_coil_charge(&mut self, _channel: usize) {}
}

/// Patch the live ignition timing on the tooth that is each channel's last
/// deterministic reference before its spark.
///
/// For every channel whose end tooth equals `tooth`, the remaining angle to
/// the channel's end angle is converted to microseconds at the current speed
/// and either written to the live compare (schedule already running) or
/// pre-staged for the scheduler to pick up. Pre-staging is suppressed for the
/// first few revolutions so spin-up transients never park a stale target in a
/// schedule. While a fixed cranking timing lock holds (the
/// `HAS_FIXED_CRANKING` flag), the timing belongs to the lock and no patches
/// are issued.
pub(crate) fn check_per_tooth(
    state: &mut DecoderState,
    crank_angle: i32,
    tooth: u16,
    sched: &mut dyn IgnitionScheduler,
) {
    if state.flags.check(DecoderFlags::HAS_FIXED_CRANKING) || state.last_rpm == 0 {
        return;
    }
    for ch in 0..state.active_channels as usize {
        if tooth != state.end_tooth[ch] {
            continue;
        }
        let remaining = ignition_limits(
            state.end_angle[ch] as i32 - crank_angle,
            state.crank_angle_max as i32,
        );
        let delay_us = degrees_to_us(remaining as u32, state.revolution_time);
        if sched.state(ch) == ScheduleState::Running {
            sched.set_compare(ch, delay_us);
        } else if state.start_revolutions > MIN_CYCLES_FOR_ENDCOMPARE {
            sched.stage_end_compare(ch, delay_us);
        }
    }
}

/// Per-tooth entry used by the even-wheel primaries: compute the angle of the
/// tooth that just fired and run the patcher, offsetting the tooth index on
/// revolution two of a sequential crank-speed cycle.
pub(crate) fn per_tooth_dispatch(
    cfg: &TriggerConfig,
    state: &mut DecoderState,
    sched: &mut dyn IgnitionScheduler,
) {
    if !cfg.per_tooth_ign || state.last_rpm < cfg.cranking_rpm {
        return;
    }
    let (crank_angle, tooth) = per_tooth_angle(cfg, state);
    check_per_tooth(state, crank_angle, tooth, sched);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        states: [ScheduleState; 8],
        compares: Vec<(usize, u32)>,
        staged: Vec<(usize, u32)>,
    }

    impl IgnitionScheduler for Recorder {
        fn state(&self, channel: usize) -> ScheduleState {
            self.states[channel]
        }

        fn set_compare(&mut self, channel: usize, delay_us: u32) {
            self.compares.push((channel, delay_us));
        }

        fn stage_end_compare(&mut self, channel: usize, delay_us: u32) {
            self.staged.push((channel, delay_us));
        }

        fn end_coil_charge(&mut self, _channel: usize) {}
    }

    fn state() -> DecoderState {
        let mut s = DecoderState::default();
        s.last_rpm = 1000;
        s.revolution_time = 60_000;
        s.crank_angle_max = 360;
        s.active_channels = 4;
        s.start_revolutions = 20;
        s.end_tooth[0] = 34;
        s.end_angle[0] = 355;
        s
    }

    #[test]
    fn running_schedule_gets_live_compare() {
        let mut s = state();
        let mut sched = Recorder::default();
        sched.states[0] = ScheduleState::Running;
        // Tooth at 330 degrees, end angle 355: 25 degrees out.
        check_per_tooth(&mut s, 330, 34, &mut sched);
        assert_eq!(sched.compares, vec![(0, degrees_to_us(25, 60_000))]);
        assert!(sched.staged.is_empty());
    }

    #[test]
    fn idle_schedule_is_prestaged_after_spinup() {
        let mut s = state();
        let mut sched = Recorder::default();
        check_per_tooth(&mut s, 330, 34, &mut sched);
        assert_eq!(sched.staged, vec![(0, degrees_to_us(25, 60_000))]);

        s.start_revolutions = MIN_CYCLES_FOR_ENDCOMPARE;
        let mut early = Recorder::default();
        check_per_tooth(&mut s, 330, 34, &mut early);
        assert!(early.staged.is_empty());
    }

    #[test]
    fn other_teeth_do_nothing() {
        let mut s = state();
        let mut sched = Recorder::default();
        check_per_tooth(&mut s, 100, 12, &mut sched);
        assert!(sched.compares.is_empty() && sched.staged.is_empty());
    }

    #[test]
    fn gated_while_stopped_or_overridden() {
        let mut s = state();
        s.last_rpm = 0;
        let mut sched = Recorder::default();
        sched.states[0] = ScheduleState::Running;
        check_per_tooth(&mut s, 330, 34, &mut sched);
        assert!(sched.compares.is_empty());

        let mut s = state();
        s.flags.set(DecoderFlags::HAS_FIXED_CRANKING);
        check_per_tooth(&mut s, 330, 34, &mut sched);
        assert!(sched.compares.is_empty());
    }

    #[test]
    fn wrapped_remaining_angle() {
        let mut s = state();
        s.end_angle[0] = 5;
        let mut sched = Recorder::default();
        sched.states[0] = ScheduleState::Running;
        // Tooth at 350, end angle 5: 15 degrees through the wrap.
        check_per_tooth(&mut s, 350, 34, &mut sched);
        assert_eq!(sched.compares, vec![(0, degrees_to_us(15, 60_000))]);
    }
}
