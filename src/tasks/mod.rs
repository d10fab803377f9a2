//! Asynchronous tasks for the Minion firmware.
//!
//! This module contains Embassy async tasks for the robot's runtime, including:
//! - [`motion_task`]: owns the servo bus and runs one gait at a time.
//! - [`net_task`]: manages WiFi, the TCP server and trigger-word intake.
//!
//! Tasks are spawned from `main.rs` and communicate via [`MOTIONS`] and [`STOP`].
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use esp_hal::{uart::Uart, Blocking};

use crate::config::MOTION_CHANNEL_SIZE;
use crate::drivers::lx16a::Lx16aBus;
use crate::gait::clock::{Clock, Instant};
use crate::robot::commands::Motion;

pub mod motion_task;
pub mod net_task;

/// Raised by the network task on "stop"; polled by the sequencer between batches.
pub static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Gait requests from the network task to the motion task.
pub static MOTIONS: Channel<CriticalSectionRawMutex, Motion, MOTION_CHANNEL_SIZE> = Channel::new();

pub type ServoPort = Uart<'static, Blocking>;
pub type ServoBusDriver = Lx16aBus<ServoPort, EmbassyClock>;

/// [`Clock`] backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(embassy_time::Instant::now().as_micros())
    }
}
