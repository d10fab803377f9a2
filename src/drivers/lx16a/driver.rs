//! LX-16A bus servo driver
//! ===========================================================
//!
//! Blocking binding over any `embedded-io` serial port. The servos do not
//! report limit violations, so the driver keeps a per-id copy of what it wrote
//! and refuses out-of-range or meaningless commands before they hit the wire.

use embedded_io::{Read, ReadReady, Write};
use fugit::{MillisDurationU32, TimerDurationU64};
use heapless::LinearMap;
use log::{debug, trace};

use super::protocol as p;
use crate::gait::clock::Clock;
use crate::robot::servo::{
    AngleLimits, ErrorTriggers, LogicalFault, ServoBus, ServoError, ServoSettings, TransportFault,
    Violation,
};

pub const SERVO_TABLE_MAX: usize = 16;

/// What the driver last wrote to one servo.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ServoState {
    limits: AngleLimits,
    torque_enabled: bool,
    motor_mode: bool,
}

impl Default for ServoState {
    fn default() -> Self {
        Self {
            limits: AngleLimits::FULL,
            torque_enabled: true,
            motor_mode: false,
        }
    }
}

pub struct Lx16aBus<T, C> {
    port: T,
    clock: C,
    read_timeout: MillisDurationU32,
    servos: LinearMap<u8, ServoState, SERVO_TABLE_MAX>,
}

impl<T, C> Lx16aBus<T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    pub fn new(port: T, clock: C, read_timeout: MillisDurationU32) -> Self {
        Self {
            port,
            clock,
            read_timeout,
            servos: LinearMap::new(),
        }
    }

    /// Start every move staged with `wait`.
    pub fn start_staged(&mut self) -> Result<(), ServoError> {
        self.send(p::BROADCAST_ID, p::MOVE_START, &[])
    }

    pub fn set_torque(&mut self, id: u8, enabled: bool) -> Result<(), ServoError> {
        check_id(id)?;
        self.send(id, p::LOAD_OR_UNLOAD_WRITE, &[enabled as u8])?;
        self.state_mut(id)?.torque_enabled = enabled;
        Ok(())
    }

    /// Continuous rotation at `speed` (-1000 to 1000).
    pub fn motor_mode(&mut self, id: u8, speed: i16) -> Result<(), ServoError> {
        check_id(id)?;
        let speed = speed.clamp(-1000, 1000) as u16;
        let params = [p::MODE_MOTOR, 0, p::lo_byte(speed), p::hi_byte(speed)];
        self.send(id, p::OR_MOTOR_MODE_WRITE, &params)?;
        self.state_mut(id)?.motor_mode = true;
        Ok(())
    }

    pub fn servo_mode(&mut self, id: u8) -> Result<(), ServoError> {
        check_id(id)?;
        self.send(id, p::OR_MOTOR_MODE_WRITE, &[p::MODE_SERVO, 0, 0, 0])?;
        self.state_mut(id)?.motor_mode = false;
        Ok(())
    }

    pub fn set_angle_limits(&mut self, id: u8, limits: AngleLimits) -> Result<(), ServoError> {
        check_id(id)?;
        if !limits.is_valid() {
            return Err(validation(
                id,
                Violation::AngleLimits {
                    lower: limits.lower,
                    upper: limits.upper,
                },
            ));
        }
        let lower = p::degrees_to_units(limits.lower);
        let upper = p::degrees_to_units(limits.upper);
        let params = [
            p::lo_byte(lower),
            p::hi_byte(lower),
            p::lo_byte(upper),
            p::hi_byte(upper),
        ];
        self.send(id, p::ANGLE_LIMIT_WRITE, &params)?;
        self.state_mut(id)?.limits = limits;
        Ok(())
    }

    pub fn set_vin_limits(&mut self, id: u8, lower_mv: u16, upper_mv: u16) -> Result<(), ServoError> {
        check_id(id)?;
        let (min, max) = p::VIN_RANGE_MV;
        let in_range = |mv: u16| (min..=max).contains(&mv);
        if !in_range(lower_mv) || !in_range(upper_mv) || lower_mv > upper_mv {
            return Err(validation(id, Violation::VoltageLimits { lower_mv, upper_mv }));
        }
        let params = [
            p::lo_byte(lower_mv),
            p::hi_byte(lower_mv),
            p::lo_byte(upper_mv),
            p::hi_byte(upper_mv),
        ];
        self.send(id, p::VIN_LIMIT_WRITE, &params)
    }

    pub fn set_temp_limit(&mut self, id: u8, limit_c: u8) -> Result<(), ServoError> {
        check_id(id)?;
        let (min, max) = p::TEMP_RANGE_C;
        if !(min..=max).contains(&limit_c) {
            return Err(validation(id, Violation::TemperatureLimit(limit_c)));
        }
        self.send(id, p::TEMP_MAX_LIMIT_WRITE, &[limit_c])
    }

    /// Choose which faults make the servo flash its LED.
    pub fn set_led_error_triggers(
        &mut self,
        id: u8,
        triggers: ErrorTriggers,
    ) -> Result<(), ServoError> {
        check_id(id)?;
        self.send(id, p::LED_ERROR_WRITE, &[triggers.bits()])
    }

    fn state(&self, id: u8) -> ServoState {
        self.servos.get(&id).copied().unwrap_or_default()
    }

    fn state_mut(&mut self, id: u8) -> Result<&mut ServoState, ServoError> {
        if !self.servos.contains_key(&id) {
            self.servos
                .insert(id, ServoState::default())
                .map_err(|_| validation(id, Violation::Id(id)))?;
        }
        self.servos
            .get_mut(&id)
            .ok_or_else(|| validation(id, Violation::Id(id)))
    }

    /* ================= wire helpers ============================ */

    fn send(&mut self, id: u8, command: u8, params: &[u8]) -> Result<(), ServoError> {
        let frame = p::encode(id, command, params);
        trace!("[LX16A] tx {:02X?}", frame.as_slice());
        self.clear_rx_buffer().map_err(|fault| transport(id, fault))?;
        self.port
            .write_all(&frame)
            .map_err(|_| transport(id, TransportFault::Io))?;
        self.port
            .flush()
            .map_err(|_| transport(id, TransportFault::Io))
    }

    /// Send a read command and return the reply parameters in `out`.
    fn query<'b>(
        &mut self,
        id: u8,
        command: u8,
        out: &'b mut [u8],
    ) -> Result<&'b [u8], ServoError> {
        self.send(id, command, &[])?;
        self.read_exact_deadline(out)
            .map_err(|fault| transport(id, fault))?;
        trace!("[LX16A] rx {:02X?}", &*out);
        p::decode_reply(out, id, command).map_err(|fault| transport(id, fault))
    }

    /// Drop whatever is left over from an earlier exchange.
    fn clear_rx_buffer(&mut self) -> Result<(), TransportFault> {
        let mut trash = [0u8; 16];
        while self.port.read_ready().map_err(|_| TransportFault::Io)? {
            let n = self
                .port
                .read(&mut trash)
                .map_err(|_| TransportFault::Io)?;
            if n == 0 {
                break;
            }
            debug!("[LX16A] dropped {n} stale bytes");
        }
        Ok(())
    }

    fn read_exact_deadline(&mut self, buf: &mut [u8]) -> Result<(), TransportFault> {
        let timeout = TimerDurationU64::<1_000_000>::millis(u64::from(self.read_timeout.to_millis()));
        let deadline = self.clock.now() + timeout;

        let mut filled = 0;
        while filled < buf.len() {
            if self.port.read_ready().map_err(|_| TransportFault::Io)? {
                let n = self
                    .port
                    .read(&mut buf[filled..])
                    .map_err(|_| TransportFault::Io)?;
                filled += n;
                if n > 0 {
                    continue;
                }
            }
            if self.clock.now() >= deadline {
                return Err(TransportFault::Timeout);
            }
        }
        Ok(())
    }
}

impl<T, C> ServoBus for Lx16aBus<T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    fn configure(&mut self, id: u8, settings: &ServoSettings) -> Result<(), ServoError> {
        let (lower_mv, upper_mv) = settings.vin_limits_mv;
        self.set_vin_limits(id, lower_mv, upper_mv)?;
        self.set_temp_limit(id, settings.temp_limit_c)?;
        self.set_angle_limits(id, settings.angle_limits)?;
        self.servo_mode(id)?;
        self.set_torque(id, settings.torque_enabled)?;
        self.set_led_error_triggers(id, settings.led_error_triggers)
    }

    fn move_to(
        &mut self,
        id: u8,
        angle: f32,
        transit: MillisDurationU32,
        wait: bool,
    ) -> Result<(), ServoError> {
        check_id(id)?;
        let state = self.state(id);
        if !state.torque_enabled {
            return Err(logical(id, LogicalFault::TorqueDisabled));
        }
        if state.motor_mode {
            return Err(logical(id, LogicalFault::MotorMode));
        }
        if !state.limits.contains(angle) {
            return Err(validation(id, Violation::Angle(angle)));
        }
        let transit_ms = transit.to_millis();
        if transit_ms > p::MAX_TRANSIT_MS {
            return Err(validation(id, Violation::TransitTime(transit_ms)));
        }

        let position = p::degrees_to_units(angle);
        let time = transit_ms as u16;
        let params = [
            p::lo_byte(position),
            p::hi_byte(position),
            p::lo_byte(time),
            p::hi_byte(time),
        ];
        let command = if wait {
            p::MOVE_TIME_WAIT_WRITE
        } else {
            p::MOVE_TIME_WRITE
        };
        self.send(id, command, &params)
    }

    fn physical_angle(&mut self, id: u8) -> Result<f32, ServoError> {
        check_id(id)?;
        let mut reply = [0u8; p::FRAME_OVERHEAD + 2];
        let params = self.query(id, p::POS_READ, &mut reply)?;
        let units = i16::from_le_bytes([params[0], params[1]]);
        Ok(p::units_to_degrees(units))
    }

    fn read_id(&mut self, id: u8) -> Result<u8, ServoError> {
        check_id(id)?;
        let mut reply = [0u8; p::FRAME_OVERHEAD + 1];
        let params = self.query(id, p::ID_READ, &mut reply)?;
        Ok(params[0])
    }

    fn error_triggers(&mut self, id: u8) -> Result<ErrorTriggers, ServoError> {
        check_id(id)?;
        let mut reply = [0u8; p::FRAME_OVERHEAD + 1];
        let params = self.query(id, p::LED_ERROR_READ, &mut reply)?;
        Ok(ErrorTriggers::from_bits(params[0]))
    }

    fn set_led(&mut self, id: u8, on: bool) -> Result<(), ServoError> {
        check_id(id)?;
        let param = if on { p::LED_ON } else { p::LED_OFF };
        self.send(id, p::LED_CTRL_WRITE, &[param])
    }
}

fn check_id(id: u8) -> Result<(), ServoError> {
    if id > p::MAX_ID {
        return Err(validation(id, Violation::Id(id)));
    }
    Ok(())
}

fn validation(id: u8, violation: Violation) -> ServoError {
    ServoError::Validation { id, violation }
}

fn logical(id: u8, fault: LogicalFault) -> ServoError {
    ServoError::Logical { id, fault }
}

fn transport(id: u8, fault: TransportFault) -> ServoError {
    ServoError::Transport { id, fault }
}
