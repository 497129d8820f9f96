//! Cam phase (VVT) measurement side channel.
//!
//! Each accepted cam reference edge samples the reconstructed crank angle,
//! strips the configured wheel offset, and feeds the result through an
//! integer exponential smoother. Published in half-degree steps.

use crate::config::{TriggerConfig, VvtMode};
use crate::state::DecoderState;

/// First-order exponential smoother on half-degree phase samples.
///
/// `weight` is the share of the prior value in 1/256ths; 0 passes the input
/// through, 255 is near-frozen. Rounding is truncation, matching the
/// half-degree quantization of the published angle.
pub(crate) fn angle_filter(input: i16, weight: u8, prior: i16) -> i16 {
    ((input as i32 * (256 - weight as i32) + prior as i32 * weight as i32) >> 8) as i16
}

/// Reduce a sampled crank angle to a cam phase sample in half-degree steps
/// and blend it into `prior`.
pub(crate) fn phase_sample(cfg: &TriggerConfig, mut crank_angle: i32, prior: i16) -> i16 {
    // Sequential cycles hand in angles up to 720; a sample sitting exactly on
    // a revolution boundary is phase zero, not a full turn.
    while crank_angle >= 360 {
        crank_angle -= 360;
    }
    crank_angle -= cfg.trigger_angle as i32;
    if cfg.vvt.mode == VvtMode::ClosedLoop {
        crank_angle -= cfg.vvt.cl0_duty_angle as i32;
    }
    angle_filter((crank_angle << 1) as i16, cfg.vvt.angle_filter, prior)
}

/// Sample cam 1 phase from the current crank angle. Only meaningful on
/// revolution one, where the cam reference has a fixed relation to the crank
/// reference.
pub(crate) fn record_vvt1(cfg: &TriggerConfig, state: &mut DecoderState, crank_angle: i32) {
    if !cfg.vvt.enabled || !state.rev_one {
        return;
    }
    state.vvt1_angle = phase_sample(cfg, crank_angle, state.vvt1_angle);
}

/// Same measurement for the second cam input.
pub(crate) fn record_vvt2(cfg: &TriggerConfig, state: &mut DecoderState, crank_angle: i32) {
    if !cfg.vvt.enabled || !state.rev_one {
        return;
    }
    state.vvt2_angle = phase_sample(cfg, crank_angle, state.vvt2_angle);
}
