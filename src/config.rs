//! Robot configuration.
//!
//! Task plumbing sizes and network settings are constants. The joint table,
//! gait timing and trigger words live in a versioned JSON document
//! (`config/robot.json`) compiled into the firmware and checked at boot.
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use fugit::MillisDurationU32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::robot::commands::{Trigger, TriggerTable};
use crate::robot::joint::{Joint, JointRole};
use crate::robot::registry::JointRegistry;
use crate::robot::servo::{ErrorTriggers, ServoSettings, MAX_TRANSIT_MS};

pub const CONFIG_VERSION: u32 = 1;
pub const JOINT_COUNT: usize = 8;

/// Configuration shipped with the firmware.
pub const DEFAULT_CONFIG: &str = include_str!("../config/robot.json");

// TASK PLUMBING
pub const MOTION_CHANNEL_SIZE: usize = 4;
pub const PORT: u16 = 1234;
pub const RX_BUF_SIZE: usize = 1024;
pub const TX_BUF_SIZE: usize = 1024;

// SERVO BUS
pub const BUS_BAUDRATE: u32 = 115_200;
/// Pause between servos during bring-up.
pub const BOOT_STEP_MS: u32 = 300;
/// Health check blinks per healthy servo, and the on/off time of each.
pub const LED_FLASHES: u8 = 3;
pub const LED_FLASH_MS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(String),
    #[error("unsupported configuration version {0}")]
    UnsupportedVersion(u32),
    #[error("expected {} joints, found {}", JOINT_COUNT, .0)]
    JointCount(usize),
    #[error("joint id {0} outside 1 - 8")]
    JointId(u8),
    #[error("joint id {0} listed twice")]
    DuplicateId(u8),
    #[error("joint role {0} listed twice")]
    DuplicateRole(JointRole),
    #[error("joint {0}: angle limits must be ordered and within 0 - 240")]
    Limits(u8),
    #[error("joint {id}: waveform swings {low} - {high}, outside limits {lower} - {upper}")]
    Envelope {
        id: u8,
        low: f32,
        high: f32,
        lower: f32,
        upper: f32,
    },
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("{field} of {ms} ms outside 1 - {}", MAX_TRANSIT_MS)]
    Transit { field: &'static str, ms: u32 },
    #[error("phase point {index}: transit of {ms} ms outside 1 - {}", MAX_TRANSIT_MS)]
    PhaseTransit { index: usize, ms: u32 },
    #[error("tabulated walk needs at least one phase point")]
    NoPhasePoints,
    #[error("phase point {0} is out of order or outside one period")]
    PhasePoint(usize),
    #[error("trigger {0} has an empty word")]
    EmptyTrigger(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    pub vin_limits_mv: (u16, u16),
    pub temp_limit_c: u8,
    pub read_timeout_ms: u32,
}

/// Sine-wave walk sampled at the running clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousGait {
    pub duration_ms: u32,
    pub dwell_ms: u32,
    pub transit_ms: u32,
}

impl ContinuousGait {
    pub fn duration(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.duration_ms)
    }

    pub fn dwell(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.dwell_ms)
    }

    pub fn transit(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.transit_ms)
    }
}

/// A precomputed sample time within one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    /// Seconds from the start of the period.
    pub t: f32,
    pub transit_ms: u32,
}

impl PhasePoint {
    pub fn transit(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.transit_ms)
    }
}

/// Walk driven by a fixed table of phase points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedGait {
    pub repeats: u8,
    pub dwell_ms: u32,
    pub points: Vec<PhasePoint>,
}

impl TabulatedGait {
    pub fn dwell(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.dwell_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeTiming {
    pub transit_ms: u32,
    pub settle_ms: u32,
    pub boot_transit_ms: u32,
}

impl HomeTiming {
    pub fn transit(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.transit_ms)
    }

    pub fn settle(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.settle_ms)
    }

    pub fn boot_transit(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.boot_transit_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitConfig {
    /// Seconds per oscillation.
    pub period_s: f32,
    /// Extra attempts for a command that failed on the wire.
    #[serde(default)]
    pub transport_retries: u8,
    pub continuous: ContinuousGait,
    pub tabulated: TabulatedGait,
    pub home: HomeTiming,
}

impl GaitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.period_s > 0.0) {
            return Err(ConfigError::NonPositive("gait.period_s"));
        }
        if self.continuous.duration_ms == 0 {
            return Err(ConfigError::NonPositive("gait.continuous.duration_ms"));
        }
        if self.continuous.dwell_ms == 0 {
            return Err(ConfigError::NonPositive("gait.continuous.dwell_ms"));
        }
        if self.tabulated.dwell_ms == 0 {
            return Err(ConfigError::NonPositive("gait.tabulated.dwell_ms"));
        }
        if self.tabulated.repeats == 0 {
            return Err(ConfigError::NonPositive("gait.tabulated.repeats"));
        }
        for (field, ms) in [
            ("gait.continuous.transit_ms", self.continuous.transit_ms),
            ("gait.home.transit_ms", self.home.transit_ms),
            ("gait.home.boot_transit_ms", self.home.boot_transit_ms),
        ] {
            if !transit_in_range(ms) {
                return Err(ConfigError::Transit { field, ms });
            }
        }
        if self.tabulated.points.is_empty() {
            return Err(ConfigError::NoPhasePoints);
        }

        let mut previous = None;
        for (index, point) in self.tabulated.points.iter().enumerate() {
            let in_period = point.t >= 0.0 && point.t < self.period_s;
            let ordered = previous.map_or(true, |prev| point.t > prev);
            if !in_period || !ordered {
                return Err(ConfigError::PhasePoint(index));
            }
            if !transit_in_range(point.transit_ms) {
                return Err(ConfigError::PhaseTransit {
                    index,
                    ms: point.transit_ms,
                });
            }
            previous = Some(point.t);
        }
        Ok(())
    }
}

/// A move has to take some time, and no longer than the servo allows.
fn transit_in_range(ms: u32) -> bool {
    (1..=MAX_TRANSIT_MS).contains(&ms)
}

/// Root of `config/robot.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub version: u32,
    pub bus: BusConfig,
    pub joints: Vec<Joint>,
    pub gait: GaitConfig,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl RobotConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration compiled into the firmware.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_CONFIG)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        JointRegistry::new(&self.joints)?;
        self.gait.validate()?;
        if let Some(index) = self.triggers.iter().position(|t| t.word.is_empty()) {
            return Err(ConfigError::EmptyTrigger(index));
        }
        Ok(())
    }

    pub fn registry(&self) -> Result<JointRegistry, ConfigError> {
        JointRegistry::new(&self.joints)
    }

    pub fn trigger_table(&self) -> TriggerTable {
        TriggerTable::new(self.triggers.clone())
    }

    /// Bring-up settings for one joint: bus-wide limits plus the joint's own
    /// angle limits, torque on, no LED error triggers.
    pub fn servo_settings(&self, joint: &Joint) -> ServoSettings {
        ServoSettings {
            vin_limits_mv: self.bus.vin_limits_mv,
            temp_limit_c: self.bus.temp_limit_c,
            angle_limits: joint.limits,
            torque_enabled: true,
            led_error_triggers: ErrorTriggers::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::commands::{Action, TextCommand};

    #[test]
    fn builtin_config_loads() {
        let config = RobotConfig::builtin().unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), JOINT_COUNT);

        let front_ankle = registry.get(1).unwrap();
        assert_eq!(front_ankle.role, JointRole::FrontAnkle);
        assert_eq!(front_ankle.home, 145.68);
        assert_eq!(registry.get(6).unwrap().amplitude, -15.0);

        assert_eq!(config.gait.tabulated.points.len(), 7);
        assert_eq!(config.gait.tabulated.repeats, 3);
        assert_eq!(config.gait.continuous.duration().to_millis(), 5000);

        let table = config.trigger_table();
        assert_eq!(
            table.parse("please step ahead"),
            Ok(TextCommand::Action(Action::Forward))
        );
        assert_eq!(
            table.parse("I am hungry"),
            Ok(TextCommand::Action(Action::Clip("banana".to_string())))
        );
    }

    #[test]
    fn settings_carry_joint_limits() {
        let config = RobotConfig::builtin().unwrap();
        let back_knee = config.joints.iter().find(|j| j.id == 6).unwrap();
        let settings = config.servo_settings(back_knee);
        assert_eq!(settings.vin_limits_mv, (5000, 11500));
        assert_eq!(settings.temp_limit_c, 85);
        assert_eq!(settings.angle_limits.lower, 138.0);
        assert!(settings.torque_enabled);
        assert!(!settings.led_error_triggers.any());
    }

    #[test]
    fn rejects_unknown_version() {
        let json = DEFAULT_CONFIG.replacen("\"version\": 1", "\"version\": 2", 1);
        assert_eq!(
            RobotConfig::from_json(&json),
            Err(ConfigError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_clipped_waveform() {
        let json = DEFAULT_CONFIG.replacen(
            "\"lower\": 81.0,  \"upper\": 240.0",
            "\"lower\": 81.0,  \"upper\": 127.0",
            1,
        );
        assert!(matches!(
            RobotConfig::from_json(&json),
            Err(ConfigError::Envelope { id: 2, .. })
        ));
    }

    #[test]
    fn rejects_unordered_phase_points() {
        let mut config = RobotConfig::builtin().unwrap();
        config.gait.tabulated.points.swap(2, 3);
        assert_eq!(config.validate(), Err(ConfigError::PhasePoint(3)));

        let mut config = RobotConfig::builtin().unwrap();
        config.gait.tabulated.points[6].t = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::PhasePoint(6)));
    }

    #[test]
    fn rejects_zero_or_overlong_transits() {
        let mut config = RobotConfig::builtin().unwrap();
        config.gait.continuous.transit_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Transit {
                field: "gait.continuous.transit_ms",
                ms: 0
            })
        );

        let mut config = RobotConfig::builtin().unwrap();
        config.gait.home.transit_ms = 40_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Transit {
                field: "gait.home.transit_ms",
                ms: 40_000
            })
        );

        let mut config = RobotConfig::builtin().unwrap();
        config.gait.home.boot_transit_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Transit {
                field: "gait.home.boot_transit_ms",
                ..
            })
        ));

        let mut config = RobotConfig::builtin().unwrap();
        config.gait.tabulated.points[0].transit_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PhaseTransit { index: 0, ms: 0 })
        );

        // The servo's own ceiling is still accepted.
        let mut config = RobotConfig::builtin().unwrap();
        config.gait.home.boot_transit_ms = MAX_TRANSIT_MS;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_timing() {
        let cases: [(fn(&mut GaitConfig), &str); 5] = [
            (|g| g.period_s = 0.0, "gait.period_s"),
            (|g| g.continuous.duration_ms = 0, "gait.continuous.duration_ms"),
            (|g| g.continuous.dwell_ms = 0, "gait.continuous.dwell_ms"),
            (|g| g.tabulated.dwell_ms = 0, "gait.tabulated.dwell_ms"),
            (|g| g.tabulated.repeats = 0, "gait.tabulated.repeats"),
        ];
        for (edit, field) in cases {
            let mut config = RobotConfig::builtin().unwrap();
            edit(&mut config.gait);
            assert_eq!(config.validate(), Err(ConfigError::NonPositive(field)));
        }

        let mut config = RobotConfig::builtin().unwrap();
        config.gait.period_s = f32::NAN;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("gait.period_s"))
        );
    }

    #[test]
    fn rejects_empty_phase_table() {
        let mut config = RobotConfig::builtin().unwrap();
        config.gait.tabulated.points.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoPhasePoints));
    }

    #[test]
    fn rejects_empty_trigger_word() {
        let mut config = RobotConfig::builtin().unwrap();
        config.triggers[4].word.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyTrigger(4)));
    }

    #[test]
    fn rejects_bad_joint_limits() {
        let mut config = RobotConfig::builtin().unwrap();
        config.joints[3].limits.upper = 250.0;
        let id = config.joints[3].id;
        assert_eq!(config.validate(), Err(ConfigError::Limits(id)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            RobotConfig::from_json("{ \"version\": 1 "),
            Err(ConfigError::Parse(_))
        ));
    }
}
