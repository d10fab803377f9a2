//! Host-side doubles for the servo bus and the time sources.
use core::cell::Cell;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use fugit::MillisDurationU32;

use crate::gait::clock::{Clock, Instant};
use crate::robot::commands::Command;
use crate::robot::servo::{ErrorTriggers, ServoBus, ServoError, ServoSettings, TransportFault};

/// Simulated monotonic time. Delays advance it instantly.
#[derive(Debug, Default)]
pub struct SimTime {
    micros: Cell<u64>,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.micros.set(self.micros.get() + ms * 1000);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.micros.get() / 1000
    }
}

impl Clock for SimTime {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.micros.get())
    }
}

impl DelayNs for &SimTime {
    async fn delay_ns(&mut self, ns: u32) {
        self.micros.set(self.micros.get() + u64::from(ns) / 1000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(u64::from(ms));
    }
}

pub fn transport(id: u8) -> ServoError {
    ServoError::Transport {
        id,
        fault: TransportFault::Timeout,
    }
}

/// Records every accepted move and replays scripted failures.
#[derive(Default)]
pub struct MockBus<'s> {
    pub moves: Vec<Command>,
    pub configured: Vec<(u8, ServoSettings)>,
    /// Move attempts, including rejected ones.
    pub attempts: usize,
    /// One-shot failures, consumed by the first move to that id.
    pub failures: Vec<(u8, ServoError)>,
    /// Every move to this id fails.
    pub always_fail: Option<(u8, ServoError)>,
    pub configure_failure: Option<(u8, ServoError)>,
    pub unreadable: Vec<u8>,
    /// Error triggers reported by the health check; unlisted ids report none.
    pub triggers: Vec<(u8, ErrorTriggers)>,
    /// Ids whose error triggers cannot be read.
    pub triggers_unreadable: Vec<u8>,
    /// LED writes, in order.
    pub leds: Vec<(u8, bool)>,
    /// Raise the signal once this many moves were accepted.
    pub stop_after: Option<(usize, &'s Signal<NoopRawMutex, ()>)>,
}

impl<'s> MockBus<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joints_moved(&self) -> Vec<u8> {
        self.moves.iter().map(|c| c.joint).collect()
    }
}

impl ServoBus for MockBus<'_> {
    fn configure(&mut self, id: u8, settings: &ServoSettings) -> Result<(), ServoError> {
        if let Some((failing, err)) = self.configure_failure {
            if failing == id {
                return Err(err);
            }
        }
        self.configured.push((id, *settings));
        Ok(())
    }

    fn move_to(
        &mut self,
        id: u8,
        angle: f32,
        transit: MillisDurationU32,
        _wait: bool,
    ) -> Result<(), ServoError> {
        self.attempts += 1;
        if let Some((failing, err)) = self.always_fail {
            if failing == id {
                return Err(err);
            }
        }
        if let Some(index) = self.failures.iter().position(|(failing, _)| *failing == id) {
            return Err(self.failures.remove(index).1);
        }

        self.moves.push(Command::new(id, angle, transit));
        if let Some((count, stop)) = self.stop_after {
            if self.moves.len() == count {
                stop.signal(());
            }
        }
        Ok(())
    }

    fn physical_angle(&mut self, id: u8) -> Result<f32, ServoError> {
        if self.unreadable.contains(&id) {
            return Err(transport(id));
        }
        self.moves
            .iter()
            .rev()
            .find(|c| c.joint == id)
            .map(|c| c.angle)
            .ok_or_else(|| transport(id))
    }

    fn read_id(&mut self, id: u8) -> Result<u8, ServoError> {
        if self.unreadable.contains(&id) {
            return Err(transport(id));
        }
        Ok(id)
    }

    fn error_triggers(&mut self, id: u8) -> Result<ErrorTriggers, ServoError> {
        if self.triggers_unreadable.contains(&id) {
            return Err(transport(id));
        }
        Ok(self
            .triggers
            .iter()
            .find(|(servo, _)| *servo == id)
            .map_or(ErrorTriggers::NONE, |(_, triggers)| *triggers))
    }

    fn set_led(&mut self, id: u8, on: bool) -> Result<(), ServoError> {
        self.leds.push((id, on));
        Ok(())
    }
}
