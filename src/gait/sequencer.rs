//! Time-sequenced gait runner.
//!
//! The sequencer turns the per-joint waveform into batches of [`Command`]s,
//! one batch per [`GaitPhaseGroup`], and pushes them through the servo bus
//! with a dwell between batches. Every run ends with the return-home
//! sequence, whether it completed, was cancelled or aborted.
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use fugit::MillisDurationU32;
use log::{debug, error, info, warn};

use super::clock::Clock;
use super::waveform::{Direction, Waveform};
use crate::config::GaitConfig;
use crate::robot::commands::Command;
use crate::robot::joint::JointRole;
use crate::robot::leg::GaitPhaseGroup;
use crate::robot::registry::JointRegistry;
use crate::robot::servo::{ErrorKind, ServoBus, ServoError};

const STAMP: &str = "[SEQUENCER]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running,
    ReturningHome,
}

/// How the gait part of a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// A command was refused; carries the error of the offending joint.
    Aborted(ServoError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Gait commands accepted by the bus, home commands excluded.
    pub commands: u32,
    /// Joints that could not be sent home.
    pub home_failures: u8,
}

enum Interrupt {
    Cancelled,
    Aborted(ServoError),
}

impl From<Interrupt> for RunOutcome {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => RunOutcome::Cancelled,
            Interrupt::Aborted(err) => RunOutcome::Aborted(err),
        }
    }
}

/// Drives the joints through one gait at a time.
///
/// Holding the sequencer mutably for the whole run is what keeps runs from
/// overlapping. `stop` is polled before each batch and once more before a run
/// is reported complete. Runs never clear it: the owner calls
/// [`clear_stop`](Self::clear_stop) when it accepts a new request, so a stop
/// raised after that point always reaches the run.
pub struct GaitSequencer<'a, M: RawMutex, B, C, D> {
    registry: &'a JointRegistry,
    gait: &'a GaitConfig,
    stop: &'a Signal<M, ()>,
    bus: B,
    clock: C,
    delay: D,
    state: SequencerState,
    issued: u32,
}

impl<'a, M, B, C, D> GaitSequencer<'a, M, B, C, D>
where
    M: RawMutex,
    B: ServoBus,
    C: Clock,
    D: DelayNs,
{
    pub fn new(
        registry: &'a JointRegistry,
        gait: &'a GaitConfig,
        stop: &'a Signal<M, ()>,
        bus: B,
        clock: C,
        delay: D,
    ) -> Self {
        Self {
            registry,
            gait,
            stop,
            bus,
            clock,
            delay,
            state: SequencerState::Idle,
            issued: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Forget a stop raised before the current request was accepted.
    pub fn clear_stop(&self) {
        self.stop.reset();
    }

    /// Walk forward in continuous mode.
    pub async fn forward_motion(&mut self) -> RunReport {
        self.run_continuous(Direction::Forward).await
    }

    /// Walk backward in continuous mode.
    pub async fn backward_motion(&mut self) -> RunReport {
        self.run_continuous(Direction::Backward).await
    }

    /// Walk forward through the configured phase points.
    pub async fn tabulated_walk(&mut self) -> RunReport {
        self.run_tabulated(Direction::Forward).await
    }

    /// Sample the waveform at the running clock until the configured duration
    /// has elapsed. Both groups of one iteration share the same sample time.
    pub async fn run_continuous(&mut self, direction: Direction) -> RunReport {
        let gait = self.gait;
        let waveform = Waveform::new(gait.period_s, direction);
        let transit = gait.continuous.transit();
        let dwell = gait.continuous.dwell();
        info!(
            "{STAMP} continuous {direction:?} walk for {} ms",
            gait.continuous.duration_ms
        );

        self.begin();
        let start = self.clock.now();
        let outcome = loop {
            let elapsed = self.clock.now() - start;
            if elapsed.to_millis() >= u64::from(gait.continuous.duration_ms) {
                break self.end_of_gait();
            }
            let t = elapsed.to_micros() as f32 / 1_000_000.0;

            if let Err(interrupt) = self.step(&waveform, t, transit, dwell).await {
                break interrupt.into();
            }
        };
        self.finish(outcome).await
    }

    /// Run the phase-point table `repeats` times.
    pub async fn run_tabulated(&mut self, direction: Direction) -> RunReport {
        let gait = self.gait;
        let waveform = Waveform::new(gait.period_s, direction);
        let dwell = gait.tabulated.dwell();
        info!(
            "{STAMP} tabulated {direction:?} walk, {} cycles of {} points",
            gait.tabulated.repeats,
            gait.tabulated.points.len()
        );

        self.begin();
        let outcome = 'cycles: {
            for cycle in 0..gait.tabulated.repeats {
                debug!("{STAMP} cycle {}", cycle + 1);
                for point in gait.tabulated.points.iter() {
                    if let Err(interrupt) =
                        self.step(&waveform, point.t, point.transit(), dwell).await
                    {
                        break 'cycles interrupt.into();
                    }
                }
            }
            self.end_of_gait()
        };
        self.finish(outcome).await
    }

    /// Send every joint to its home angle and let the robot settle.
    ///
    /// Each joint is attempted even when an earlier one fails. Returns the
    /// number of joints that could not be sent home.
    pub async fn return_home(&mut self) -> u8 {
        self.set_state(SequencerState::ReturningHome);
        let registry = self.registry;
        let gait = self.gait;
        let home = &gait.home;

        let mut failures = 0;
        for command in registry.home_commands(home.transit()) {
            if let Err(err) = self.dispatch(command) {
                failures += 1;
                error!("{STAMP} could not send {} home: {err}", self.role_of(err.id()));
            }
        }
        self.delay.delay_ms(home.settle().to_millis()).await;

        self.set_state(SequencerState::Idle);
        failures
    }

    fn begin(&mut self) {
        self.issued = 0;
        self.set_state(SequencerState::Running);
    }

    async fn finish(&mut self, outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed => info!("{STAMP} gait completed, {} commands", self.issued),
            RunOutcome::Cancelled => warn!("{STAMP} gait cancelled after {} commands", self.issued),
            RunOutcome::Aborted(err) => error!(
                "{STAMP} gait aborted at {} after {} commands: {err}",
                self.role_of(err.id()),
                self.issued
            ),
        }

        let home_failures = self.return_home().await;
        RunReport {
            outcome,
            commands: self.issued,
            home_failures,
        }
    }

    /// A stop raised during the final dwell still counts.
    fn end_of_gait(&self) -> RunOutcome {
        if self.stop.signaled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        }
    }

    /// Both groups at one sample time, each followed by the dwell.
    async fn step(
        &mut self,
        waveform: &Waveform,
        t: f32,
        transit: MillisDurationU32,
        dwell: MillisDurationU32,
    ) -> Result<(), Interrupt> {
        for group in GaitPhaseGroup::ORDER {
            if self.stop.signaled() {
                return Err(Interrupt::Cancelled);
            }
            self.issue_batch(waveform, group, t, transit)
                .map_err(Interrupt::Aborted)?;
            self.delay.delay_ms(dwell.to_millis()).await;
        }
        Ok(())
    }

    fn issue_batch(
        &mut self,
        waveform: &Waveform,
        group: GaitPhaseGroup,
        t: f32,
        transit: MillisDurationU32,
    ) -> Result<(), ServoError> {
        let registry = self.registry;
        for joint in registry.group(group) {
            let command = Command::new(joint.id, waveform.angle(joint, t), transit);
            self.dispatch(command)?;
            self.issued += 1;
        }
        Ok(())
    }

    /// Send one command, retrying transport failures a bounded number of times.
    fn dispatch(&mut self, command: Command) -> Result<(), ServoError> {
        let retries = self.gait.transport_retries;
        let mut attempt = 0;
        loop {
            match self
                .bus
                .move_to(command.joint, command.angle, command.transit, false)
            {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Transport && attempt < retries => {
                    attempt += 1;
                    warn!("{STAMP} {err}, retry {attempt}/{retries}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn set_state(&mut self, state: SequencerState) {
        debug!("{STAMP} {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn role_of(&self, id: u8) -> RoleName {
        RoleName(self.registry.get(id).map(|joint| joint.role), id)
    }
}

/// Log helper: "front knee (2)" or "servo 9" for ids outside the table.
struct RoleName(Option<JointRole>, u8);

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(role) => write!(f, "{role} ({})", self.1),
            None => write!(f, "servo {}", self.1),
        }
    }
}
