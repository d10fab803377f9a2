//! Joint identity and waveform parameters.
//!
//! Defines the [`JointRole`] enum naming each servo (ankle or knee of one
//! leg) and the [`Joint`] record loaded from the robot configuration.
use core::fmt::Display;

use serde::{Deserialize, Serialize};

use super::leg::{GaitPhaseGroup, Leg};
use super::servo::AngleLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Ankle,
    Knee,
}

impl Display for JointKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JointKind::Ankle => f.write_str("ankle"),
            JointKind::Knee => f.write_str("knee"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointRole {
    FrontAnkle,
    FrontKnee,
    LeftAnkle,
    LeftKnee,
    BackAnkle,
    BackKnee,
    RightAnkle,
    RightKnee,
}

impl JointRole {
    pub fn leg(self) -> Leg {
        match self {
            JointRole::FrontAnkle | JointRole::FrontKnee => Leg::Front,
            JointRole::LeftAnkle | JointRole::LeftKnee => Leg::Left,
            JointRole::BackAnkle | JointRole::BackKnee => Leg::Back,
            JointRole::RightAnkle | JointRole::RightKnee => Leg::Right,
        }
    }

    pub fn kind(self) -> JointKind {
        match self {
            JointRole::FrontAnkle
            | JointRole::LeftAnkle
            | JointRole::BackAnkle
            | JointRole::RightAnkle => JointKind::Ankle,
            _ => JointKind::Knee,
        }
    }
}

impl Display for JointRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.leg(), self.kind())
    }
}

/// One servo-driven joint.
///
/// `amplitude` is signed: mirrored limbs carry a negative amplitude so the
/// same sine drives them in anti-phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Bus address, 1 to 8.
    pub id: u8,
    pub role: JointRole,
    /// Rest angle in degrees.
    pub home: f32,
    /// Peak deviation from `home` in degrees.
    pub amplitude: f32,
    /// Radians.
    #[serde(default)]
    pub phase: f32,
    pub limits: AngleLimits,
}

impl Joint {
    pub fn group(&self) -> GaitPhaseGroup {
        self.role.leg().group()
    }

    /// Lowest and highest angle the waveform can reach.
    pub fn envelope(&self) -> (f32, f32) {
        let swing = self.amplitude.abs();
        (self.home - swing, self.home + swing)
    }

    /// Whether the whole waveform stays inside the joint's hard limits.
    pub fn envelope_within_limits(&self) -> bool {
        let (low, high) = self.envelope();
        self.limits.contains(low) && self.limits.contains(high)
    }
}
