use core::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Front = 0,
    Left = 1,
    Back = 2,
    Right = 3,
}

impl Display for Leg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Leg::Front => f.write_str("front"),
            Leg::Left => f.write_str("left"),
            Leg::Back => f.write_str("back"),
            Leg::Right => f.write_str("right"),
        }
    }
}

impl Leg {
    /// Legs on the same body axis move in the same batch.
    pub fn group(self) -> GaitPhaseGroup {
        match self {
            Leg::Front | Leg::Back => GaitPhaseGroup::FrontBack,
            Leg::Left | Leg::Right => GaitPhaseGroup::LeftRight,
        }
    }
}

/// Joints commanded together within one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaitPhaseGroup {
    FrontBack,
    LeftRight,
}

impl GaitPhaseGroup {
    /// Order in which the groups are issued at every phase point.
    pub const ORDER: [GaitPhaseGroup; 2] = [GaitPhaseGroup::FrontBack, GaitPhaseGroup::LeftRight];
}

impl Display for GaitPhaseGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GaitPhaseGroup::FrontBack => f.write_str("front+back legs"),
            GaitPhaseGroup::LeftRight => f.write_str("left+right legs"),
        }
    }
}
