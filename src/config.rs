use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// Line level on a trigger input, for edge selection, poll-mode cam sensing
/// and composite logging.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum Level {
    #[default]
    Low = 0,
    High = 1,
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Self::Output {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Which decoder runs. Holds no per-decoder state; the dispatch is a plain
/// tag match on every edge.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum TriggerPattern {
    /// Single even-spaced wheel with one or two consecutive missing teeth.
    #[default]
    MissingTooth = 0,
    /// Even-spaced crank wheel plus a cam wheel for the cycle reference.
    DualWheel = 1,
    /// One tooth per cylinder on the cam, no secondary input.
    BasicDistributor = 2,
    /// Dual-wheel variant whose wheel does not span exactly 360 degrees.
    Non360 = 3,
}

/// Whether the primary wheel turns at crank or cam speed.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum TriggerSpeed {
    #[default]
    Crank = 0,
    Cam = 1,
}

/// Secondary (cam) input pattern for the missing-tooth decoder.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum SecondaryPattern {
    /// One tooth per cam revolution.
    #[default]
    Single = 0,
    /// Four-tooth cam wheel with one missing.
    FourMinusOne = 1,
    /// No cam edges; the cam level is polled at each primary tooth one.
    Poll = 2,
}

/// Adaptive noise filter strength, as a fraction of the last accepted gap.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum FilterStrength {
    Off = 0,
    /// 25% of the last tooth gap.
    #[default]
    Weak = 1,
    /// 50%.
    Medium = 2,
    /// 75%.
    Aggressive = 3,
}

/// Which edges of an input are handed to the decoder.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum EdgeSelect {
    #[default]
    Rising = 0,
    Falling = 1,
    Change = 2,
}

#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum SparkMode {
    #[default]
    WastedSpark = 0,
    Single = 1,
    WastedCop = 2,
    Sequential = 3,
}

#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum InjectorLayout {
    #[default]
    Paired = 0,
    Semi = 1,
    Banked = 2,
    Sequential = 3,
}

/// VVT measurement mode.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum VvtMode {
    #[default]
    OnOff = 0,
    OpenLoop = 1,
    ClosedLoop = 2,
}

/// Variable valve timing measurement settings, shared by both cam inputs.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VvtConfig {
    pub enabled: bool,
    pub mode: VvtMode,
    /// Closed-loop zero-duty phase offset, degrees.
    pub cl0_duty_angle: i16,
    /// Exponential angle filter weight of the prior sample, in 1/256ths.
    pub angle_filter: u8,
}

impl Default for VvtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: VvtMode::OnOff,
            cl0_duty_angle: 0,
            angle_filter: 0,
        }
    }
}

/// Static decoder configuration.
///
/// Written by mainline only, and only while the engine is known stopped;
/// every change must be followed by [`crate::Decoder::setup`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub pattern: TriggerPattern,
    pub n_cylinders: u8,
    /// Logical tooth positions on the primary wheel, including missing ones.
    pub trigger_teeth: u16,
    /// Consecutive missing teeth acting as the reference mark (1 or 2).
    pub missing_teeth: u16,
    /// Offset from the wheel reference to TDC, degrees.
    pub trigger_angle: i16,
    pub trigger_speed: TriggerSpeed,
    pub primary_edge: EdgeSelect,
    pub secondary_edge: EdgeSelect,
    pub tertiary_edge: EdgeSelect,
    pub sec_pattern: SecondaryPattern,
    /// Cam level that marks revolution one in poll mode.
    pub poll_level: Level,
    pub filter: FilterStrength,
    /// Revolutions of cranking before per-tooth RPM figures are trusted.
    pub stage_cycles: u16,
    /// Below this RPM the engine is considered cranking.
    pub cranking_rpm: u16,
    pub per_tooth_ign: bool,
    pub spark_mode: SparkMode,
    pub inj_layout: InjectorLayout,
    /// Lock cranking ignition to the distributor tooth.
    pub ign_cranklock: bool,
    /// Snap the dual-wheel primary count whenever the cam reference disagrees.
    pub use_resync: bool,
    /// Wheel-span multiplier for the non-360 pattern.
    pub angle_multiplier: u16,
    pub vvt: VvtConfig,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            pattern: TriggerPattern::MissingTooth,
            n_cylinders: 4,
            trigger_teeth: 36,
            missing_teeth: 1,
            trigger_angle: 0,
            trigger_speed: TriggerSpeed::Crank,
            primary_edge: EdgeSelect::Rising,
            secondary_edge: EdgeSelect::Rising,
            tertiary_edge: EdgeSelect::Rising,
            sec_pattern: SecondaryPattern::Single,
            poll_level: Level::High,
            filter: FilterStrength::Weak,
            stage_cycles: 0,
            cranking_rpm: 400,
            per_tooth_ign: false,
            spark_mode: SparkMode::WastedSpark,
            inj_layout: InjectorLayout::Paired,
            ign_cranklock: false,
            use_resync: true,
            angle_multiplier: 1,
            vvt: VvtConfig::default(),
        }
    }
}

/// Rejected configuration values.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// `trigger_teeth` is zero.
    NoTeeth,
    /// `missing_teeth` is outside `1..=2`, or not fewer than `trigger_teeth`.
    MissingTeeth,
    /// `n_cylinders` is zero.
    NoCylinders,
    /// `angle_multiplier` is zero for the non-360 pattern.
    AngleMultiplier,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::NoTeeth => write!(f, "trigger wheel must have at least one tooth"),
            ConfigError::MissingTeeth => write!(f, "missing tooth count must be 1 or 2"),
            ConfigError::NoCylinders => write!(f, "cylinder count must be nonzero"),
            ConfigError::AngleMultiplier => write!(f, "angle multiplier must be nonzero"),
        }
    }
}

impl TriggerConfig {
    /// Check the parts of the configuration the decoders divide by or index
    /// with. Called by [`crate::Decoder::new`] before any state exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_cylinders == 0 {
            return Err(ConfigError::NoCylinders);
        }
        match self.pattern {
            TriggerPattern::MissingTooth => {
                if self.trigger_teeth == 0 {
                    Err(ConfigError::NoTeeth)
                } else if !(1..=2).contains(&self.missing_teeth)
                    || self.missing_teeth >= self.trigger_teeth
                {
                    Err(ConfigError::MissingTeeth)
                } else {
                    Ok(())
                }
            }
            TriggerPattern::DualWheel => {
                if self.trigger_teeth == 0 {
                    Err(ConfigError::NoTeeth)
                } else {
                    Ok(())
                }
            }
            TriggerPattern::BasicDistributor => Ok(()),
            TriggerPattern::Non360 => {
                if self.trigger_teeth == 0 {
                    Err(ConfigError::NoTeeth)
                } else if self.angle_multiplier == 0 {
                    Err(ConfigError::AngleMultiplier)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Either sequential spark or sequential injection widens the cycle to
    /// 720 degrees.
    pub fn is_sequential(&self) -> bool {
        self.spark_mode == SparkMode::Sequential || self.inj_layout == InjectorLayout::Sequential
    }

    /// Degrees spanned by the repeating cycle: 720 when any output runs
    /// sequentially, 360 otherwise.
    pub fn crank_angle_max(&self) -> u16 {
        if self.is_sequential() {
            720
        } else {
            360
        }
    }
}
