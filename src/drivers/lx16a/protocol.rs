// LX-16A serial bus servo protocol constants and framing.

use heapless::Vec;
use micromath::F32Ext;

use crate::robot::servo::TransportFault;

/* ───── Packet anatomy ──────────────────────────────────────────────── */
pub const HDR_BYTE: u8 = 0x55;
pub const HEADER: [u8; 2] = [HDR_BYTE, HDR_BYTE];

/// Indexes within every frame, both directions
pub mod idx {
    pub const ID: usize = 2;
    pub const LENGTH: usize = 3; // bytes from here to the checksum, inclusive
    pub const COMMAND: usize = 4;
    pub const PARAM_0: usize = 5;
}

/// Header, id, length, command and checksum.
pub const FRAME_OVERHEAD: usize = 6;
pub const MAX_PARAMS: usize = 4;
pub const MAX_FRAME_LEN: usize = FRAME_OVERHEAD + MAX_PARAMS;

/* ────────────────── Basic IDs ─────────────────── */
pub const BROADCAST_ID: u8 = 0xFE; // 254
pub const MAX_ID: u8 = 0xFD; // 253

/* ────────────────── Commands ──────────────────── */
pub const MOVE_TIME_WRITE: u8 = 1;
pub const MOVE_TIME_WAIT_WRITE: u8 = 7;
pub const MOVE_START: u8 = 11;
pub const ID_READ: u8 = 14;
pub const ANGLE_LIMIT_WRITE: u8 = 20;
pub const VIN_LIMIT_WRITE: u8 = 22;
pub const TEMP_MAX_LIMIT_WRITE: u8 = 24;
pub const POS_READ: u8 = 28;
pub const OR_MOTOR_MODE_WRITE: u8 = 29;
pub const LOAD_OR_UNLOAD_WRITE: u8 = 31;
pub const LED_CTRL_WRITE: u8 = 33;
pub const LED_ERROR_WRITE: u8 = 35;
pub const LED_ERROR_READ: u8 = 36;

/* ────────────────── Ranges ────────────────────── */
pub const DEGREES_PER_UNIT: f32 = 0.24;
pub use crate::robot::servo::MAX_TRANSIT_MS;
pub const VIN_RANGE_MV: (u16, u16) = (4_500, 12_000);
pub const TEMP_RANGE_C: (u8, u8) = (50, 100);

pub const MODE_SERVO: u8 = 0;
pub const MODE_MOTOR: u8 = 1;

// LED_CTRL parameter, inverted: 0 lights the LED.
pub const LED_ON: u8 = 0;
pub const LED_OFF: u8 = 1;

#[inline]
pub fn lo_byte(w: u16) -> u8 {
    w as u8
}

#[inline]
pub fn hi_byte(w: u16) -> u8 {
    (w >> 8) as u8
}

/// Inverted low byte of the sum of id, length, command and parameters.
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub fn degrees_to_units(degrees: f32) -> u16 {
    F32Ext::round(degrees / DEGREES_PER_UNIT) as u16
}

pub fn units_to_degrees(units: i16) -> f32 {
    f32::from(units) * DEGREES_PER_UNIT
}

/// Build a command frame. `params` holds at most [`MAX_PARAMS`] bytes.
pub fn encode(id: u8, command: u8, params: &[u8]) -> Vec<u8, MAX_FRAME_LEN> {
    let mut frame = Vec::new();
    // Capacity covers the largest command the binding sends.
    let _ = frame.extend_from_slice(&HEADER);
    let _ = frame.push(id);
    let _ = frame.push(params.len() as u8 + 3);
    let _ = frame.push(command);
    let _ = frame.extend_from_slice(&params[..params.len().min(MAX_PARAMS)]);
    let chk = checksum(&frame[idx::ID..]);
    let _ = frame.push(chk);
    frame
}

/// Check a reply frame against the request and return its parameters.
pub fn decode_reply(frame: &[u8], id: u8, command: u8) -> Result<&[u8], TransportFault> {
    if frame.len() < FRAME_OVERHEAD || frame[..2] != HEADER {
        return Err(TransportFault::BadFormat);
    }
    let len = frame[idx::LENGTH] as usize;
    if frame[idx::ID] != id || frame[idx::COMMAND] != command || len + 3 != frame.len() {
        return Err(TransportFault::BadFormat);
    }
    let (body, chk) = frame[idx::ID..].split_at(frame.len() - 3);
    if checksum(body) != chk[0] {
        return Err(TransportFault::BadChecksum);
    }
    Ok(&frame[idx::PARAM_0..frame.len() - 1])
}
