//! Servo bus contract shared by the sequencer, the boot sequence and the
//! platform binding.
//!
//! Every servo on the robot hangs off one half-duplex serial bus, so the
//! contract is synchronous: a call returns once the frame is on the wire (and,
//! for reads, once the reply has been checked).
use core::fmt::{self, Display};

use fugit::MillisDurationU32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Range of rotation the servo firmware accepts, in degrees.
pub const SERVO_ANGLE_RANGE: f32 = 240.0;
/// Longest move the servo firmware accepts, in milliseconds.
pub const MAX_TRANSIT_MS: u32 = 30_000;

/// Why a bus transaction failed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// Fewer bytes arrived than the reply needs before the deadline.
    Timeout,
    BadChecksum,
    /// Reply header, id or command did not match the request.
    BadFormat,
    /// The serial port itself reported an error.
    Io,
}

impl Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFault::Timeout => f.write_str("received less bytes than expected"),
            TransportFault::BadChecksum => f.write_str("bad checksum"),
            TransportFault::BadFormat => f.write_str("malformed reply"),
            TransportFault::Io => f.write_str("serial port error"),
        }
    }
}

/// Which argument was outside what the servo (or its configuration) allows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    Id(u8),
    Angle(f32),
    AngleLimits { lower: f32, upper: f32 },
    TransitTime(u32),
    VoltageLimits { lower_mv: u16, upper_mv: u16 },
    TemperatureLimit(u8),
}

impl Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Id(id) => write!(f, "id {id} outside 0 - 253"),
            Violation::Angle(angle) => write!(f, "angle {angle} outside the configured limits"),
            Violation::AngleLimits { lower, upper } => {
                write!(f, "angle limits {lower} - {upper} invalid")
            }
            Violation::TransitTime(ms) => write!(f, "transit time {ms} ms outside 0 - 30000"),
            Violation::VoltageLimits { lower_mv, upper_mv } => {
                write!(f, "voltage limits {lower_mv} - {upper_mv} mV invalid")
            }
            Violation::TemperatureLimit(c) => write!(f, "temperature limit {c} C outside 50 - 100"),
        }
    }
}

/// Servo state that makes a command meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalFault {
    TorqueDisabled,
    MotorMode,
}

impl Display for LogicalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalFault::TorqueDisabled => f.write_str("command issued while torque is disabled"),
            LogicalFault::MotorMode => f.write_str("command issued while in motor mode"),
        }
    }
}

/// Coarse class of a [`ServoError`], used to pick the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Validation,
    Logical,
}

/// A failed servo operation. Every variant names the servo it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ServoError {
    #[error("servo {id}: {fault}")]
    Transport { id: u8, fault: TransportFault },
    #[error("servo {id}: {violation}")]
    Validation { id: u8, violation: Violation },
    #[error("servo {id}: {fault}")]
    Logical { id: u8, fault: LogicalFault },
}

impl ServoError {
    pub fn id(&self) -> u8 {
        match *self {
            ServoError::Transport { id, .. }
            | ServoError::Validation { id, .. }
            | ServoError::Logical { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServoError::Transport { .. } => ErrorKind::Transport,
            ServoError::Validation { .. } => ErrorKind::Validation,
            ServoError::Logical { .. } => ErrorKind::Logical,
        }
    }
}

/// Hard rotation limits of one joint, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleLimits {
    pub lower: f32,
    pub upper: f32,
}

impl AngleLimits {
    pub const FULL: AngleLimits = AngleLimits {
        lower: 0.0,
        upper: SERVO_ANGLE_RANGE,
    };

    pub fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, angle: f32) -> bool {
        angle >= self.lower && angle <= self.upper
    }

    /// Limits are usable when ordered and inside the servo's rotation range.
    pub fn is_valid(&self) -> bool {
        self.lower >= 0.0 && self.upper <= SERVO_ANGLE_RANGE && self.lower < self.upper
    }
}

/// Conditions that make a servo flash its LED. Read back at boot, where any
/// set flag means the servo is not fit to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorTriggers {
    pub over_temperature: bool,
    pub over_voltage: bool,
    pub rotor_locked: bool,
}

impl ErrorTriggers {
    pub const NONE: ErrorTriggers = ErrorTriggers {
        over_temperature: false,
        over_voltage: false,
        rotor_locked: false,
    };

    pub fn from_bits(bits: u8) -> Self {
        Self {
            over_temperature: bits & 0b001 != 0,
            over_voltage: bits & 0b010 != 0,
            rotor_locked: bits & 0b100 != 0,
        }
    }

    pub fn bits(self) -> u8 {
        self.over_temperature as u8 | (self.over_voltage as u8) << 1 | (self.rotor_locked as u8) << 2
    }

    pub fn any(self) -> bool {
        self != Self::NONE
    }
}

impl Display for ErrorTriggers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.over_temperature, "over temperature"),
            (self.over_voltage, "over voltage"),
            (self.rotor_locked, "rotor locked"),
        ];
        let mut first = true;
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Everything `configure` writes to a servo during bring-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoSettings {
    pub vin_limits_mv: (u16, u16),
    pub temp_limit_c: u8,
    pub angle_limits: AngleLimits,
    pub torque_enabled: bool,
    pub led_error_triggers: ErrorTriggers,
}

/// Operations the gait code needs from the servo bus.
pub trait ServoBus {
    /// Write voltage, temperature and angle limits, switch to servo mode, set
    /// the torque state and the LED error triggers. Safe to repeat.
    fn configure(&mut self, id: u8, settings: &ServoSettings) -> Result<(), ServoError>;

    /// Command `id` to `angle` degrees over `transit`. With `wait` the move is
    /// only staged and starts on the next move-start broadcast.
    fn move_to(
        &mut self,
        id: u8,
        angle: f32,
        transit: MillisDurationU32,
        wait: bool,
    ) -> Result<(), ServoError>;

    /// Angle the servo actually sits at, which can differ from the commanded
    /// one under load.
    fn physical_angle(&mut self, id: u8) -> Result<f32, ServoError>;

    /// Id reported by the servo hardware.
    fn read_id(&mut self, id: u8) -> Result<u8, ServoError>;

    /// LED error triggers as stored in the servo.
    fn error_triggers(&mut self, id: u8) -> Result<ErrorTriggers, ServoError>;

    fn set_led(&mut self, id: u8, on: bool) -> Result<(), ServoError>;
}

impl<B: ServoBus + ?Sized> ServoBus for &mut B {
    fn configure(&mut self, id: u8, settings: &ServoSettings) -> Result<(), ServoError> {
        (**self).configure(id, settings)
    }

    fn move_to(
        &mut self,
        id: u8,
        angle: f32,
        transit: MillisDurationU32,
        wait: bool,
    ) -> Result<(), ServoError> {
        (**self).move_to(id, angle, transit, wait)
    }

    fn physical_angle(&mut self, id: u8) -> Result<f32, ServoError> {
        (**self).physical_angle(id)
    }

    fn read_id(&mut self, id: u8) -> Result<u8, ServoError> {
        (**self).read_id(id)
    }

    fn error_triggers(&mut self, id: u8) -> Result<ErrorTriggers, ServoError> {
        (**self).error_triggers(id)
    }

    fn set_led(&mut self, id: u8, on: bool) -> Result<(), ServoError> {
        (**self).set_led(id, on)
    }
}
