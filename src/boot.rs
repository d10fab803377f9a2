//! Servo bring-up run once at power-on, before any gait is accepted.
//!
//! Every joint is configured in id order, then checked: a servo whose LED
//! error triggers cannot be read, or report any set fault, stops startup.
//! Healthy servos blink their LED before the robot is moved to its home pose.
//! A configuration, health or homing failure on any joint aborts startup; the
//! final position read-back is informational only.
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use log::{info, warn};
use thiserror::Error;

use crate::config::{RobotConfig, BOOT_STEP_MS, JOINT_COUNT, LED_FLASHES, LED_FLASH_MS};
use crate::robot::joint::{Joint, JointRole};
use crate::robot::registry::JointRegistry;
use crate::robot::servo::{ErrorTriggers, ServoBus, ServoError};

const STAMP: &str = "[BOOT]";

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BootError {
    #[error("configuring {role}: {error}")]
    Configure {
        role: JointRole,
        #[source]
        error: ServoError,
    },
    #[error("homing {role}: {error}")]
    Home {
        role: JointRole,
        #[source]
        error: ServoError,
    },
    #[error("servo {expected} answers as id {found}")]
    IdMismatch { expected: u8, found: u8 },
    #[error("health check of {role}: {error}")]
    Health {
        role: JointRole,
        #[source]
        error: ServoError,
    },
    #[error("{role} reports LED error triggers: {triggers}")]
    Unhealthy {
        role: JointRole,
        triggers: ErrorTriggers,
    },
}

/// Physical angle of each joint after homing, `None` where the read failed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BootReport {
    pub angles: Vec<(u8, Option<f32>), JOINT_COUNT>,
}

impl BootReport {
    pub fn unreadable(&self) -> usize {
        self.angles.iter().filter(|(_, angle)| angle.is_none()).count()
    }
}

/// Configure every servo, send the robot home and read back where it landed.
pub async fn bring_up<B, D>(
    bus: &mut B,
    delay: &mut D,
    config: &RobotConfig,
    registry: &JointRegistry,
) -> Result<BootReport, BootError>
where
    B: ServoBus,
    D: DelayNs,
{
    for joint in registry.iter() {
        info!("{STAMP} configuring {} ({})", joint.role, joint.id);
        let settings = config.servo_settings(joint);
        bus.configure(joint.id, &settings)
            .map_err(|error| BootError::Configure {
                role: joint.role,
                error,
            })?;

        match bus.read_id(joint.id) {
            Ok(found) if found != joint.id => {
                return Err(BootError::IdMismatch {
                    expected: joint.id,
                    found,
                })
            }
            Ok(_) => {}
            Err(e) => warn!("{STAMP} could not verify id of {}: {e}", joint.role),
        }
        delay.delay_ms(BOOT_STEP_MS).await;
    }

    for joint in registry.iter() {
        check_health(bus, delay, joint).await?;
    }

    let home = &config.gait.home;
    for joint in registry.iter() {
        bus.move_to(joint.id, joint.home, home.boot_transit(), false)
            .map_err(|error| BootError::Home {
                role: joint.role,
                error,
            })?;
    }
    delay.delay_ms(home.settle().to_millis()).await;

    let mut report = BootReport::default();
    for joint in registry.iter() {
        let angle = match bus.physical_angle(joint.id) {
            Ok(angle) => {
                info!("{STAMP} {} at {angle:.2} (home {:.2})", joint.role, joint.home);
                Some(angle)
            }
            Err(e) => {
                warn!("{STAMP} could not read {}: {e}", joint.role);
                None
            }
        };
        // One entry per joint, capacity matches.
        let _ = report.angles.push((joint.id, angle));
    }

    info!("{STAMP} robot ready");
    Ok(report)
}

/// Read back the LED error triggers and blink a healthy servo's LED.
async fn check_health<B, D>(bus: &mut B, delay: &mut D, joint: &Joint) -> Result<(), BootError>
where
    B: ServoBus,
    D: DelayNs,
{
    let role = joint.role;
    let health = |error| BootError::Health { role, error };

    let triggers = bus.error_triggers(joint.id).map_err(health)?;
    if triggers.any() {
        return Err(BootError::Unhealthy { role, triggers });
    }
    for _ in 0..LED_FLASHES {
        bus.set_led(joint.id, true).map_err(health)?;
        delay.delay_ms(LED_FLASH_MS).await;
        bus.set_led(joint.id, false).map_err(health)?;
        delay.delay_ms(LED_FLASH_MS).await;
    }
    info!("{STAMP} {role} is ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::servo::{ErrorTriggers, TransportFault, Violation};
    use crate::testing::{MockBus, SimTime};
    use embassy_futures::block_on;

    fn setup() -> (RobotConfig, JointRegistry) {
        let config = RobotConfig::builtin().unwrap();
        let registry = config.registry().unwrap();
        (config, registry)
    }

    #[test]
    fn configures_then_homes_every_joint() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let mut bus = MockBus::new();

        let report = block_on(bring_up(&mut bus, &mut &time, &config, &registry)).unwrap();

        let configured: std::vec::Vec<u8> = bus.configured.iter().map(|(id, _)| *id).collect();
        assert_eq!(configured, [1, 2, 3, 4, 5, 6, 7, 8]);
        let (_, front_knee) = bus.configured[1];
        assert_eq!(front_knee.angle_limits.lower, 81.0);
        assert_eq!(front_knee.vin_limits_mv, (5000, 11500));

        assert_eq!(bus.moves.len(), 8);
        assert!(bus.moves.iter().all(|c| c.transit.to_millis() == 1000));
        assert_eq!(report.unreadable(), 0);
        assert_eq!(report.angles[5], (6, Some(172.08)));

        // Three on/off blinks per servo.
        assert_eq!(bus.leds.len(), 8 * 6);
        assert_eq!(&bus.leds[..2], &[(1, true), (1, false)]);

        assert_eq!(time.elapsed_ms(), 8 * 300 + 8 * 3 * 200 + 1000);
    }

    #[test]
    fn configuration_failure_is_fatal() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let error = ServoError::Validation {
            id: 3,
            violation: Violation::TemperatureLimit(85),
        };
        let mut bus = MockBus {
            configure_failure: Some((3, error)),
            ..MockBus::new()
        };

        let result = block_on(bring_up(&mut bus, &mut &time, &config, &registry));
        assert_eq!(
            result,
            Err(BootError::Configure {
                role: JointRole::LeftAnkle,
                error
            })
        );
        assert_eq!(bus.configured.len(), 2);
        assert!(bus.moves.is_empty());
    }

    #[test]
    fn homing_failure_is_fatal() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let error = ServoError::Transport {
            id: 7,
            fault: TransportFault::Io,
        };
        let mut bus = MockBus {
            always_fail: Some((7, error)),
            ..MockBus::new()
        };

        let result = block_on(bring_up(&mut bus, &mut &time, &config, &registry));
        assert_eq!(
            result,
            Err(BootError::Home {
                role: JointRole::RightAnkle,
                error
            })
        );
    }

    #[test]
    fn unreadable_joints_are_reported_not_fatal() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let mut bus = MockBus {
            unreadable: std::vec![4],
            ..MockBus::new()
        };

        let report = block_on(bring_up(&mut bus, &mut &time, &config, &registry)).unwrap();
        assert_eq!(report.unreadable(), 1);
        assert_eq!(report.angles[3], (4, None));
    }

    #[test]
    fn servo_reporting_a_fault_stops_startup() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let triggers = ErrorTriggers {
            over_voltage: true,
            ..ErrorTriggers::NONE
        };
        let mut bus = MockBus {
            triggers: std::vec![(5, triggers)],
            ..MockBus::new()
        };

        let result = block_on(bring_up(&mut bus, &mut &time, &config, &registry));
        assert_eq!(
            result,
            Err(BootError::Unhealthy {
                role: JointRole::BackAnkle,
                triggers
            })
        );
        // Servos 1 - 4 blinked, nothing was moved.
        assert_eq!(bus.leds.len(), 4 * 6);
        assert!(bus.moves.is_empty());
    }

    #[test]
    fn unreadable_health_is_fatal() {
        let (config, registry) = setup();
        let time = SimTime::new();
        let mut bus = MockBus {
            triggers_unreadable: std::vec![1],
            ..MockBus::new()
        };

        let result = block_on(bring_up(&mut bus, &mut &time, &config, &registry));
        assert_eq!(
            result,
            Err(BootError::Health {
                role: JointRole::FrontAnkle,
                error: crate::testing::transport(1)
            })
        );
        assert!(bus.leds.is_empty());
        assert!(bus.moves.is_empty());
    }
}
