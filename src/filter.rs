use crate::config::FilterStrength;
use crate::state::DecoderState;

/// Re-arm the primary noise filter from the gap just accepted.
///
/// Pulses arriving sooner than the resulting fraction of `cur_gap` are
/// dropped by the next handler invocation. Only valid across even-spaced
/// sections of a pattern; the missing-tooth handlers reset the filter to zero
/// right after the gap so the first post-gap tooth is not rejected against a
/// stale threshold.
pub(crate) fn set_filter(state: &mut DecoderState, strength: FilterStrength, cur_gap: u32) {
    state.filter_time = match strength {
        FilterStrength::Off => 0,
        FilterStrength::Weak => cur_gap >> 2,
        FilterStrength::Medium => cur_gap >> 1,
        FilterStrength::Aggressive => ((cur_gap as u64 * 3) >> 2) as u32,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions() {
        let mut s = DecoderState::default();
        set_filter(&mut s, FilterStrength::Weak, 4000);
        assert_eq!(s.filter_time, 1000);
        set_filter(&mut s, FilterStrength::Medium, 4000);
        assert_eq!(s.filter_time, 2000);
        set_filter(&mut s, FilterStrength::Aggressive, 4000);
        assert_eq!(s.filter_time, 3000);
        set_filter(&mut s, FilterStrength::Off, 4000);
        assert_eq!(s.filter_time, 0);
    }

    #[test]
    fn aggressive_does_not_overflow() {
        let mut s = DecoderState::default();
        set_filter(&mut s, FilterStrength::Aggressive, u32::MAX);
        assert_eq!(s.filter_time, ((u32::MAX as u64 * 3) >> 2) as u32);
    }
}
