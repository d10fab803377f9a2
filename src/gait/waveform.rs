//! Per-joint sine waveform.
use core::f32::consts::PI;

use crate::robot::joint::Joint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    /// Mirrored gait: every amplitude is negated.
    Backward,
}

impl Direction {
    fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// `angle(t) = home + amplitude * sin(2π / period * t + phase)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    omega: f32,
    direction: Direction,
}

impl Waveform {
    pub fn new(period_s: f32, direction: Direction) -> Self {
        Self {
            omega: 2.0 * PI / period_s,
            direction,
        }
    }

    /// Target angle of `joint`, in degrees, `t` seconds into the gait.
    pub fn angle(&self, joint: &Joint, t: f32) -> f32 {
        let amplitude = joint.amplitude * self.direction.sign();
        joint.home + amplitude * libm::sinf(self.omega * t + joint.phase)
    }
}
