//! Compile-time parameters of the decoder core.

/// Hard ceiling on any published RPM figure. Estimates at or above this are
/// treated as measurement spikes and discarded.
pub const MAX_RPM: u16 = 9000;

/// Microseconds in one minute, the numerator of every RPM calculation.
pub const US_IN_MINUTE: u32 = 60_000_000;

/// Capacity of the tooth/composite log ring buffers.
///
/// The buffer fills once, latches a ready flag and stops recording until the
/// telemetry reader drains it.
pub const TOOTH_LOG_SIZE: usize = 128;

/// Number of ignition channels tracked for end-tooth calculation.
pub const IGN_CHANNELS: usize = 8;

/// Revolutions that must complete before a decoder is allowed to pre-stage an
/// ignition schedule's end compare value. Below this the timer targets would
/// be computed from spin-up transients.
pub const MIN_CYCLES_FOR_ENDCOMPARE: u16 = 6;

/// Microseconds per crank degree at 50 RPM, the stall floor used when sizing
/// `max_stall_time` from tooth pitch.
pub const STALL_US_PER_DEGREE_50RPM: u32 = 3333;

/// Microseconds per degree at 90 RPM, the tighter stall floor for distributor
/// wheels with few teeth.
pub const STALL_US_PER_DEGREE_90RPM: u32 = 1851;

/// Absolute lower bound on the distributor's dynamic stall time (50 RPM worth
/// of one cam revolution half).
pub const DISTRIBUTOR_STALL_FLOOR_US: u32 = 366_667;
