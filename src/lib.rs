//! Crank/cam trigger wheel decoding.
//!
//! Consumes edge-timestamped pulses from toothed trigger wheels on the
//! crankshaft and/or camshaft and maintains three continuously refined
//! outputs: engine RPM, crank angle after TDC (sub-tooth resolution via
//! interval interpolation), and the per-channel ignition "end tooth" used by
//! the spark scheduler as its last deterministic reference.
//!
//! The decoder itself is hardware free. Edge handlers are meant to be called
//! from interrupt context with the captured timestamp; mainline readers go
//! through [`SharedDecoder`] which masks interrupts around multi-word
//! snapshots. All hot-path arithmetic is integer multiply/shift with wrapping
//! timestamps.
#![cfg_attr(not(test), no_std)]

mod angle;
pub use angle::*;
mod config;
pub use config::*;
mod decoder;
pub use decoder::*;
pub mod design_parameters;
mod distributor;
mod dual_wheel;
mod filter;
mod missing_tooth;
mod non360;
mod rpm;
mod schedule;
pub use schedule::*;
mod shared;
pub use shared::*;
mod state;
pub use state::*;
mod tooth_log;
pub use tooth_log::*;
mod vvt;
