//! Shared test bench: a decoder, a recording scheduler stand-in and a
//! synthetic edge-stream generator.
#![allow(dead_code)]

use trigger_decoder::design_parameters::IGN_CHANNELS;
use trigger_decoder::{
    Decoder, Edge, IgnitionScheduler, Level, ScheduleState, TriggerConfig,
};

/// Scheduler double that records every decoder interaction.
#[derive(Default)]
pub struct RecordingScheduler {
    pub states: [ScheduleState; IGN_CHANNELS],
    pub compares: Vec<(usize, u32)>,
    pub staged: Vec<(usize, u32)>,
    pub coil_ends: Vec<usize>,
}

impl IgnitionScheduler for RecordingScheduler {
    fn state(&self, channel: usize) -> ScheduleState {
        self.states[channel]
    }

    fn set_compare(&mut self, channel: usize, delay_us: u32) {
        self.compares.push((channel, delay_us));
    }

    fn stage_end_compare(&mut self, channel: usize, delay_us: u32) {
        self.staged.push((channel, delay_us));
    }

    fn end_coil_charge(&mut self, channel: usize) {
        self.coil_ends.push(channel);
    }
}

/// A decoder plus a clock, driven edge by edge.
pub struct Bench {
    pub decoder: Decoder,
    pub sched: RecordingScheduler,
    pub now: u32,
}

impl Bench {
    pub fn new(cfg: TriggerConfig) -> Self {
        Self {
            decoder: Decoder::new(cfg).expect("valid test configuration"),
            sched: RecordingScheduler::default(),
            now: 1_000_000,
        }
    }

    /// Fire a rising primary edge `gap` microseconds after the previous event.
    pub fn primary_after(&mut self, gap: u32) {
        self.now = self.now.wrapping_add(gap);
        let edge = Edge {
            primary: Level::High,
            ..Edge::new(self.now)
        };
        self.decoder.on_primary_edge(edge, &mut self.sched);
    }

    /// Fire a rising primary edge at an absolute timestamp.
    pub fn primary_at(&mut self, at: u32) {
        self.now = at;
        let edge = Edge {
            primary: Level::High,
            ..Edge::new(at)
        };
        self.decoder.on_primary_edge(edge, &mut self.sched);
    }

    /// Fire a rising primary edge while the cam line sits at `cam`, for
    /// poll-mode cycle detection.
    pub fn primary_after_with_cam(&mut self, gap: u32, cam: Level) {
        self.now = self.now.wrapping_add(gap);
        let edge = Edge {
            primary: Level::High,
            secondary: cam,
            ..Edge::new(self.now)
        };
        self.decoder.on_primary_edge(edge, &mut self.sched);
    }

    /// Fire a rising secondary (cam) edge `gap` microseconds later.
    pub fn secondary_after(&mut self, gap: u32) {
        self.now = self.now.wrapping_add(gap);
        let edge = Edge {
            primary: Level::Low,
            secondary: Level::High,
            ..Edge::new(self.now)
        };
        self.decoder.on_secondary_edge(edge);
    }

    /// Fire a rising tertiary (second cam) edge `gap` microseconds later.
    pub fn tertiary_after(&mut self, gap: u32) {
        self.now = self.now.wrapping_add(gap);
        let edge = Edge {
            tertiary: Level::High,
            ..Edge::new(self.now)
        };
        self.decoder.on_tertiary_edge(edge);
    }
}

/// Edge timestamps of a missing-tooth wheel turning at constant speed,
/// starting at `start` with tooth one. Times accumulate from tooth angles the
/// way a real wheel produces them, so gaps carry the natural +-1 us rounding
/// pattern.
pub fn missing_tooth_times(
    start: u32,
    rev_time: u32,
    teeth: u16,
    missing: u16,
    revolutions: u32,
) -> Vec<u32> {
    let mut times = Vec::new();
    for rev in 0..revolutions {
        for tooth in 0..(teeth - missing) {
            let offset =
                (tooth as u64 * rev_time as u64) / teeth as u64 + rev as u64 * rev_time as u64;
            times.push(start.wrapping_add(offset as u32));
        }
    }
    times
}

/// End-angle array with only channel one populated.
pub fn end_angles_ch1(angle: i16) -> [i16; IGN_CHANNELS] {
    let mut angles = [0i16; IGN_CHANNELS];
    angles[0] = angle;
    angles
}
