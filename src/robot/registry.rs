//! The validated joint table handed to the boot sequence and the sequencer.
use heapless::Vec;

use super::commands::Command;
use super::joint::{Joint, JointRole};
use super::leg::GaitPhaseGroup;
use crate::config::{ConfigError, JOINT_COUNT};
use fugit::MillisDurationU32;

/// All eight joints, sorted by bus id. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct JointRegistry {
    joints: Vec<Joint, JOINT_COUNT>,
}

impl JointRegistry {
    /// Check the table and sort it by id.
    ///
    /// Every joint's waveform envelope must fit inside its hard limits, so a
    /// bad table is refused here rather than mid-stride.
    pub fn new(joints: &[Joint]) -> Result<Self, ConfigError> {
        if joints.len() != JOINT_COUNT {
            return Err(ConfigError::JointCount(joints.len()));
        }

        let mut sorted: Vec<Joint, JOINT_COUNT> = Vec::new();
        for joint in joints {
            if joint.id == 0 || joint.id as usize > JOINT_COUNT {
                return Err(ConfigError::JointId(joint.id));
            }
            if sorted.iter().any(|j| j.id == joint.id) {
                return Err(ConfigError::DuplicateId(joint.id));
            }
            if sorted.iter().any(|j| j.role == joint.role) {
                return Err(ConfigError::DuplicateRole(joint.role));
            }
            if !joint.limits.is_valid() {
                return Err(ConfigError::Limits(joint.id));
            }
            if !joint.envelope_within_limits() {
                let (low, high) = joint.envelope();
                return Err(ConfigError::Envelope {
                    id: joint.id,
                    low,
                    high,
                    lower: joint.limits.lower,
                    upper: joint.limits.upper,
                });
            }
            // Capacity matches the length check above.
            let _ = sorted.push(*joint);
        }
        sorted.sort_unstable_by_key(|joint| joint.id);

        Ok(Self { joints: sorted })
    }

    pub fn get(&self, id: u8) -> Option<&Joint> {
        self.joints.iter().find(|joint| joint.id == id)
    }

    pub fn by_role(&self, role: JointRole) -> Option<&Joint> {
        self.joints.iter().find(|joint| joint.role == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joints of one group, in id order.
    pub fn group(&self, group: GaitPhaseGroup) -> impl Iterator<Item = &Joint> {
        self.joints
            .iter()
            .filter(move |joint| joint.group() == group)
    }

    /// Commands that send every joint back to its home angle, in id order.
    pub fn home_commands(&self, transit: MillisDurationU32) -> impl Iterator<Item = Command> + '_ {
        self.joints
            .iter()
            .map(move |joint| Command::new(joint.id, joint.home, transit))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::robot::servo::AngleLimits;
    use std::vec::Vec as StdVec;

    pub(crate) fn minion_joints() -> [Joint; JOINT_COUNT] {
        let joint = |id, role, home, amplitude, lower| Joint {
            id,
            role,
            home,
            amplitude,
            phase: 0.0,
            limits: AngleLimits::new(lower, 240.0),
        };
        [
            joint(1, JointRole::FrontAnkle, 145.68, 20.0, 0.0),
            joint(2, JointRole::FrontKnee, 115.92, 15.0, 81.0),
            joint(3, JointRole::LeftAnkle, 141.84, 20.0, 0.0),
            joint(4, JointRole::LeftKnee, 155.52, 15.0, 0.0),
            joint(5, JointRole::BackAnkle, 114.52, 20.0, 0.0),
            joint(6, JointRole::BackKnee, 172.08, -15.0, 138.0),
            joint(7, JointRole::RightAnkle, 130.56, -20.0, 0.0),
            joint(8, JointRole::RightKnee, 122.16, -15.0, 0.0),
        ]
    }

    #[test]
    fn groups_partition_the_joints() {
        let mut joints = minion_joints();
        joints.reverse();
        let registry = JointRegistry::new(&joints).unwrap();

        let front_back: StdVec<u8> = registry
            .group(GaitPhaseGroup::FrontBack)
            .map(|j| j.id)
            .collect();
        let left_right: StdVec<u8> = registry
            .group(GaitPhaseGroup::LeftRight)
            .map(|j| j.id)
            .collect();
        assert_eq!(front_back, [1, 2, 5, 6]);
        assert_eq!(left_right, [3, 4, 7, 8]);
        assert_eq!(registry.by_role(JointRole::BackKnee).map(|j| j.id), Some(6));
    }

    #[test]
    fn rejects_envelope_outside_limits() {
        let mut joints = minion_joints();
        joints[1].limits.upper = 127.0;
        match JointRegistry::new(&joints) {
            Err(ConfigError::Envelope { id, .. }) => assert_eq!(id, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_identity() {
        let mut joints = minion_joints();
        joints[3].id = 1;
        assert_eq!(JointRegistry::new(&joints), Err(ConfigError::DuplicateId(1)));

        let mut joints = minion_joints();
        joints[3].id = 9;
        assert_eq!(JointRegistry::new(&joints), Err(ConfigError::JointId(9)));

        let mut joints = minion_joints();
        joints[3].role = JointRole::FrontAnkle;
        assert_eq!(
            JointRegistry::new(&joints),
            Err(ConfigError::DuplicateRole(JointRole::FrontAnkle))
        );

        assert_eq!(
            JointRegistry::new(&minion_joints()[..7]),
            Err(ConfigError::JointCount(7))
        );
    }

    #[test]
    fn rejects_unordered_or_out_of_range_limits() {
        let mut joints = minion_joints();
        joints[5].limits = AngleLimits::new(200.0, 138.0);
        assert_eq!(JointRegistry::new(&joints), Err(ConfigError::Limits(6)));

        let mut joints = minion_joints();
        joints[0].limits.lower = -5.0;
        assert_eq!(JointRegistry::new(&joints), Err(ConfigError::Limits(1)));

        let mut joints = minion_joints();
        joints[7].limits.upper = 241.0;
        assert_eq!(JointRegistry::new(&joints), Err(ConfigError::Limits(8)));
    }

    #[test]
    fn home_commands_cover_every_joint() {
        let registry = JointRegistry::new(&minion_joints()).unwrap();
        let transit = MillisDurationU32::millis(100);
        let commands: StdVec<Command> = registry.home_commands(transit).collect();
        assert_eq!(commands.len(), 8);
        assert_eq!(commands[0], Command::new(1, 145.68, transit));
        assert_eq!(commands[7], Command::new(8, 122.16, transit));
    }
}
