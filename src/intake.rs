//! Turns one line of client text into work for the motion task.
//!
//! "stop" empties the motion queue and raises the stop signal, so neither the
//! running gait nor anything queued behind it keeps the robot walking.
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::robot::commands::{Action, Motion, TextCommand, TriggerTable};

const STAMP: &str = "[INTAKE]";

/// Answer sent back to the client for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Stopping,
    Accepted,
    /// The motion queue is full; the request was dropped.
    Busy,
    Unknown,
}

impl Reply {
    pub fn as_str(self) -> &'static str {
        match self {
            Reply::Stopping => "stopping\n",
            Reply::Accepted => "ok\n",
            Reply::Busy => "busy\n",
            Reply::Unknown => "unknown\n",
        }
    }
}

pub fn dispatch_line<M: RawMutex, const N: usize>(
    line: &str,
    triggers: &TriggerTable,
    motions: &Channel<M, Motion, N>,
    stop: &Signal<M, ()>,
) -> Reply {
    match triggers.parse(line) {
        Ok(TextCommand::Stop) => {
            let dropped = motions.len();
            motions.clear();
            stop.signal(());
            info!("{STAMP} stop requested, {dropped} queued motions dropped");
            Reply::Stopping
        }
        Ok(TextCommand::Action(Action::Clip(key))) => {
            info!("{STAMP} clip {key}");
            Reply::Accepted
        }
        Ok(TextCommand::Action(action)) => match action.motion() {
            Some(motion) if motions.try_send(motion).is_ok() => Reply::Accepted,
            Some(motion) => {
                warn!("{STAMP} motion queue full, dropped {motion:?}");
                Reply::Busy
            }
            None => Reply::Accepted,
        },
        Err(_) => {
            warn!("{STAMP} unrecognised command: {}", line.trim());
            Reply::Unknown
        }
    }
}
