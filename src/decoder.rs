use log::{info, warn};

use crate::angle::reconstruct_crank_angle;
use crate::config::{ConfigError, EdgeSelect, Level, TriggerConfig, TriggerPattern};
use crate::design_parameters::IGN_CHANNELS;
use crate::state::{DecoderFlags, DecoderState, Snapshot, SyncStatus};
use crate::tooth_log::{LogMode, ToothLog};
use crate::{distributor, dual_wheel, missing_tooth, non360};
use crate::{IgnitionScheduler, NullScheduler};

/// One hardware edge, as captured by the platform wrapper: the timestamp from
/// the monotonic microsecond counter plus the instantaneous level of every
/// trigger line at that moment.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Edge {
    pub at: u32,
    pub primary: Level,
    pub secondary: Level,
    pub tertiary: Level,
}

impl Edge {
    pub fn new(at: u32) -> Self {
        Self {
            at,
            primary: Level::Low,
            secondary: Level::Low,
            tertiary: Level::Low,
        }
    }
}

fn edge_selected(select: EdgeSelect, level: Level) -> bool {
    match select {
        EdgeSelect::Rising => level == Level::High,
        EdgeSelect::Falling => level == Level::Low,
        EdgeSelect::Change => true,
    }
}

/// The trigger decoder: one wheel pattern, its working state and the
/// diagnostic tooth log.
///
/// The edge entry points are meant to be called from interrupt context and
/// never block; the read-side operations (`get_rpm`, `get_crank_angle`,
/// `snapshot`) are for mainline and must run inside the
/// [`crate::SharedDecoder`] critical section when interrupts are live.
#[derive(Clone, PartialEq, Debug)]
pub struct Decoder {
    cfg: TriggerConfig,
    state: DecoderState,
    log: ToothLog,
}

impl Decoder {
    pub fn new(cfg: TriggerConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mut decoder = Self {
            cfg,
            state: DecoderState::default(),
            log: ToothLog::default(),
        };
        decoder.setup();
        Ok(decoder)
    }

    /// Reinitialize every piece of working state from the configuration.
    ///
    /// Called at boot, after any configuration change, and by the stall
    /// detector when the engine stops. Depends on nothing but the
    /// configuration, so repeated calls are idempotent.
    pub fn setup(&mut self) {
        self.state = DecoderState::default();
        self.state.crank_angle_max = self.cfg.crank_angle_max();
        self.state.active_channels = self.cfg.n_cylinders.min(IGN_CHANNELS as u8);
        if self.cfg.is_sequential() {
            self.state.flags.set(DecoderFlags::IS_SEQUENTIAL);
        }
        match self.cfg.pattern {
            TriggerPattern::MissingTooth => missing_tooth::setup(&self.cfg, &mut self.state),
            TriggerPattern::DualWheel => dual_wheel::setup(&self.cfg, &mut self.state),
            TriggerPattern::BasicDistributor => distributor::setup(&self.cfg, &mut self.state),
            TriggerPattern::Non360 => non360::setup(&self.cfg, &mut self.state),
        }
        info!(
            "decoder setup: {:?}, {} teeth, {} deg/tooth, stall after {} us",
            self.cfg.pattern, self.state.pattern_teeth, self.state.tooth_angle,
            self.state.max_stall_time
        );
    }

    /// Swap in a new configuration and reinitialize.
    pub fn set_config(&mut self, cfg: TriggerConfig) -> Result<(), ConfigError> {
        if let Err(e) = cfg.validate() {
            warn!("trigger configuration rejected: {}", e);
            return Err(e);
        }
        self.cfg = cfg;
        self.setup();
        Ok(())
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.cfg
    }

    /// Primary (crank) edge entry point.
    ///
    /// Applies the configured edge selection, runs the pattern handler, then
    /// feeds the tooth/composite log if the handler accepted the edge.
    pub fn on_primary_edge(&mut self, edge: Edge, sched: &mut dyn IgnitionScheduler) {
        self.state.flags.clear(DecoderFlags::VALID_TRIGGER);
        self.state.system_tooth_count = self.state.system_tooth_count.wrapping_add(1);
        let selected = edge_selected(self.cfg.primary_edge, edge.primary);
        if selected {
            match self.cfg.pattern {
                TriggerPattern::MissingTooth => missing_tooth::primary(
                    &self.cfg,
                    &mut self.state,
                    edge.at,
                    edge.secondary,
                    sched,
                ),
                TriggerPattern::DualWheel => {
                    dual_wheel::primary(&self.cfg, &mut self.state, edge.at, sched)
                }
                TriggerPattern::BasicDistributor => {
                    distributor::primary(&self.cfg, &mut self.state, edge.at, sched)
                }
                TriggerPattern::Non360 => {
                    non360::primary(&self.cfg, &mut self.state, edge.at, sched)
                }
            }
        }
        if selected && self.state.flags.check(DecoderFlags::VALID_TRIGGER) {
            match self.log.mode() {
                LogMode::Tooth => self.log.push_tooth(self.state.last_gap),
                LogMode::Composite => self.log.push_composite(
                    edge.at,
                    edge.primary,
                    edge.secondary,
                    false,
                    self.state.has_sync,
                ),
                LogMode::Off => {}
            }
        }
    }

    /// Secondary (cam) edge entry point.
    ///
    /// Composite entries are recorded for every cam edge while composite
    /// logging is on, whether or not the handler consumes the edge.
    pub fn on_secondary_edge(&mut self, edge: Edge) {
        // Cam edges always count as valid for logging purposes; the handler's
        // accept/reject decision does not gate the composite capture.
        self.state.flags.set(DecoderFlags::VALID_TRIGGER);
        if edge_selected(self.cfg.secondary_edge, edge.secondary) {
            match self.cfg.pattern {
                TriggerPattern::MissingTooth => {
                    missing_tooth::secondary(&self.cfg, &mut self.state, edge.at)
                }
                TriggerPattern::DualWheel => {
                    dual_wheel::secondary(&self.cfg, &mut self.state, edge.at)
                }
                TriggerPattern::BasicDistributor => {}
                TriggerPattern::Non360 => {
                    non360::secondary(&self.cfg, &mut self.state, edge.at)
                }
            }
        }
        self.log.push_composite(
            edge.at,
            edge.primary,
            edge.secondary,
            true,
            self.state.has_sync,
        );
    }

    /// Tertiary (second cam) edge entry point; VVT phase only.
    pub fn on_tertiary_edge(&mut self, edge: Edge) {
        if edge_selected(self.cfg.tertiary_edge, edge.tertiary) {
            if self.cfg.pattern == TriggerPattern::MissingTooth {
                missing_tooth::tertiary(&self.cfg, &mut self.state, edge.at);
            }
        }
    }

    /// Current RPM in `[0, MAX_RPM]`; 0 while unsynced or under-informed.
    /// Updates the internally held figure that the handlers consult for
    /// cranking and spike decisions.
    pub fn get_rpm(&mut self) -> u16 {
        let rpm = match self.cfg.pattern {
            TriggerPattern::MissingTooth => missing_tooth::get_rpm(&self.cfg, &mut self.state),
            TriggerPattern::DualWheel => dual_wheel::get_rpm(&self.cfg, &mut self.state),
            TriggerPattern::BasicDistributor => distributor::get_rpm(&self.cfg, &mut self.state),
            TriggerPattern::Non360 => non360::get_rpm(&self.cfg, &mut self.state),
        };
        self.state.last_rpm = rpm;
        rpm
    }

    /// Crank angle ATDC in `[0, crank_angle_max)` at time `now`,
    /// interpolating between teeth from the revolution time.
    pub fn get_crank_angle(&self, now: u32) -> i32 {
        match self.cfg.pattern {
            TriggerPattern::MissingTooth | TriggerPattern::DualWheel => {
                reconstruct_crank_angle(&self.cfg, &self.state, now)
            }
            TriggerPattern::BasicDistributor => {
                distributor::get_crank_angle(&self.cfg, &self.state, now)
            }
            TriggerPattern::Non360 => non360::get_crank_angle(&self.cfg, &self.state, now),
        }
    }

    /// Recompute every channel's end tooth from its end angle. Mainline only,
    /// after ignition advance changes.
    pub fn set_end_teeth(&mut self, end_angles: &[i16; IGN_CHANNELS]) {
        self.state.end_angle = *end_angles;
        match self.cfg.pattern {
            TriggerPattern::MissingTooth => missing_tooth::set_end_teeth(&self.cfg, &mut self.state),
            TriggerPattern::DualWheel => dual_wheel::set_end_teeth(&self.cfg, &mut self.state),
            TriggerPattern::BasicDistributor => {
                distributor::set_end_teeth(&self.cfg, &mut self.state)
            }
            TriggerPattern::Non360 => non360::set_end_teeth(&self.cfg, &mut self.state),
        }
    }

    /// No valid primary edge within the decoder's stall window.
    pub fn is_stalled(&self, now: u32) -> bool {
        self.state.last_tooth_time != 0
            && now.wrapping_sub(self.state.last_tooth_time) > self.state.max_stall_time
    }

    /// Consistent multi-word capture of the published outputs. Callers on a
    /// live system take this through [`crate::SharedDecoder::snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rpm: self.state.last_rpm,
            tooth_count: self.state.tooth_count,
            system_tooth_count: self.state.system_tooth_count,
            last_tooth_time: self.state.last_tooth_time,
            rev_one: self.state.rev_one,
            sync: self.state.sync_status(),
            sync_loss_count: self.state.sync_loss_count,
            start_revolutions: self.state.start_revolutions,
            vvt1_angle: self.state.vvt1_angle,
            vvt2_angle: self.state.vvt2_angle,
            flags: self.state.flags,
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.state.sync_status()
    }

    pub fn has_sync(&self) -> bool {
        self.state.has_sync
    }

    /// End tooth currently assigned to `channel`, 0 when never computed.
    pub fn end_tooth(&self, channel: usize) -> u16 {
        self.state.end_tooth[channel]
    }

    /// Filtered cam 1 phase in half-degree steps.
    pub fn cam_angle(&self) -> i16 {
        self.state.vvt1_angle
    }

    /// Cam phases in whole degrees.
    pub fn vvt1_degrees(&self) -> i16 {
        self.state.vvt1_angle >> 1
    }

    pub fn vvt2_degrees(&self) -> i16 {
        self.state.vvt2_angle >> 1
    }

    /// Suppress per-tooth timing patches while a fixed cranking advance
    /// override is commanded. Shares the `HAS_FIXED_CRANKING` flag with
    /// patterns whose configuration locks cranking timing; `setup` restores
    /// the configured value.
    pub fn set_fixed_cranking_override(&mut self, active: bool) {
        if active {
            self.state.flags.set(DecoderFlags::HAS_FIXED_CRANKING);
        } else {
            self.state.flags.clear(DecoderFlags::HAS_FIXED_CRANKING);
        }
    }

    pub fn set_log_mode(&mut self, mode: LogMode) {
        self.log.set_mode(mode);
    }

    pub fn tooth_log(&self) -> &ToothLog {
        &self.log
    }

    pub fn tooth_log_mut(&mut self) -> &mut ToothLog {
        &mut self.log
    }

    pub fn flags(&self) -> DecoderFlags {
        self.state.flags
    }

    /// Feed a primary edge without an ignition scheduler attached.
    pub fn on_primary_edge_unscheduled(&mut self, edge: Edge) {
        let mut sched = NullScheduler;
        self.on_primary_edge(edge, &mut sched);
    }
}

impl Default for Decoder {
    fn default() -> Self {
        // The default configuration is statically valid.
        match Self::new(TriggerConfig::default()) {
            Ok(decoder) => decoder,
            Err(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_primary(at: u32) -> Edge {
        Edge {
            primary: Level::High,
            ..Edge::new(at)
        }
    }

    #[test]
    fn setup_is_idempotent() {
        let mut a = Decoder::default();
        let mut b = Decoder::default();
        // Dirty both, then set up once vs twice.
        for d in [&mut a, &mut b] {
            let mut t = 1_000_000;
            for _ in 0..50 {
                d.on_primary_edge_unscheduled(rising_primary(t));
                t += 5000;
            }
        }
        a.setup();
        b.setup();
        b.setup();
        assert_eq!(a, b);
    }

    #[test]
    fn falling_edge_selection_ignores_rising() {
        let cfg = TriggerConfig {
            primary_edge: EdgeSelect::Falling,
            ..Default::default()
        };
        let mut d = Decoder::new(cfg).unwrap();
        d.on_primary_edge_unscheduled(rising_primary(1_000_000));
        assert_eq!(d.snapshot().tooth_count, 0);
        // The physical edge is still counted.
        assert_eq!(d.snapshot().system_tooth_count, 1);
        d.on_primary_edge_unscheduled(Edge::new(1_005_000));
        assert_eq!(d.snapshot().tooth_count, 1);
    }

    #[test]
    fn stall_query() {
        let mut d = Decoder::default();
        assert!(!d.is_stalled(5_000_000));
        d.on_primary_edge_unscheduled(rising_primary(1_000_000));
        let stall = 1_000_000 + 3333 * 10 * 2;
        assert!(!d.is_stalled(stall));
        assert!(d.is_stalled(stall + 1));
    }

    #[test]
    fn composite_log_records_every_cam_edge() {
        let mut d = Decoder::default();
        d.set_log_mode(LogMode::Composite);
        // Wrong-polarity cam edge: handler skipped, entry still recorded.
        let mut edge = Edge::new(1_000_000);
        edge.secondary = Level::Low;
        d.on_secondary_edge(edge);
        assert_eq!(d.tooth_log().entries().len(), 1);
        assert_eq!(
            d.tooth_log().composite_entries()[0],
            crate::tooth_log::COMPOSITE_TRIG
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = TriggerConfig {
            trigger_teeth: 0,
            ..Default::default()
        };
        assert!(Decoder::new(cfg).is_err());
    }
}
