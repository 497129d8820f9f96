//! Interrupt-safe sharing of the decoder between edge handlers and mainline.
//!
//! There is one CPU and two contexts: interrupt handlers, which run to
//! completion and preempt everything, and the cooperative mainline. Single
//! words can be read directly from a [`crate::Snapshot`], but any multi-word
//! read (tooth count plus a timestamp, the two tooth-one times) must happen
//! with interrupts masked or it can tear. `critical_section::with` provides
//! that mask portably, and doubles as the exclusion proof for the `RefCell`.
//!
//! Capture into a plain [`crate::Snapshot`] inside the section and do the
//! arithmetic after releasing it; handlers queue behind the mask for the
//! whole closure.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::decoder::Decoder;
use crate::state::Snapshot;

/// A [`Decoder`] behind the platform's interrupt mask.
///
/// Suitable for a `static`: construction is const-compatible via
/// [`SharedDecoder::new`] taking an already-built decoder.
pub struct SharedDecoder {
    cell: Mutex<RefCell<Option<Decoder>>>,
}

impl SharedDecoder {
    /// An empty slot, for `static` initialization before the configuration
    /// is known.
    pub const fn empty() -> Self {
        Self {
            cell: Mutex::new(RefCell::new(None)),
        }
    }

    pub const fn new(decoder: Decoder) -> Self {
        Self {
            cell: Mutex::new(RefCell::new(Some(decoder))),
        }
    }

    /// Install or replace the decoder.
    pub fn install(&self, decoder: Decoder) {
        critical_section::with(|cs| {
            self.cell.borrow(cs).replace(Some(decoder));
        });
    }

    /// Run `f` on the decoder with interrupts masked. Returns `None` if no
    /// decoder has been installed.
    pub fn with<R>(&self, f: impl FnOnce(&mut Decoder) -> R) -> Option<R> {
        critical_section::with(|cs| {
            self.cell.borrow(cs).borrow_mut().as_mut().map(f)
        })
    }

    /// Consistent capture of the published outputs.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.with(|d| d.snapshot())
    }

    /// Mainline RPM read; refreshes the decoder's internal figure.
    pub fn get_rpm(&self) -> u16 {
        self.with(|d| d.get_rpm()).unwrap_or(0)
    }

    /// Mainline crank angle read at time `now`.
    pub fn get_crank_angle(&self, now: u32) -> Option<i32> {
        self.with(|d| d.get_crank_angle(now))
    }

    /// Stall check; on a stall the caller re-runs `setup` via
    /// [`SharedDecoder::with`].
    pub fn is_stalled(&self, now: u32) -> bool {
        self.with(|d| d.is_stalled(now)).unwrap_or(false)
    }
}
