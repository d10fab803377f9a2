//! Motion task for the Minion.
//!
//! Receives [`Motion`] requests from the network task and runs the matching
//! gait on the sequencer. Only one gait runs at a time; requests that arrive
//! meanwhile wait in the channel until a "stop" empties it.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Receiver};
use embassy_time::Delay;
use log::{error, info, warn};

use super::{EmbassyClock, ServoBusDriver, STOP};
use crate::config::{GaitConfig, MOTION_CHANNEL_SIZE};
use crate::gait::sequencer::{GaitSequencer, RunOutcome};
use crate::robot::commands::Motion;
use crate::robot::registry::JointRegistry;

#[embassy_executor::task]
pub async fn motion_task(
    bus: ServoBusDriver,
    registry: &'static JointRegistry,
    gait: &'static GaitConfig,
    receiver: Receiver<'static, CriticalSectionRawMutex, Motion, MOTION_CHANNEL_SIZE>,
) {
    let mut sequencer = GaitSequencer::new(registry, gait, &STOP, bus, EmbassyClock, Delay);

    loop {
        let stamp = "[MOTION_TASK] received";
        let motion = receiver.receive().await;
        // Stops raised from here on belong to this request.
        sequencer.clear_stop();
        if let Some(clip) = motion.accompaniment() {
            info!("[MOTION_TASK] clip {clip}");
        }

        let report = match motion {
            Motion::Forward => {
                info!("{stamp} forward");
                sequencer.forward_motion().await
            }
            Motion::Backward => {
                info!("{stamp} backward");
                sequencer.backward_motion().await
            }
            Motion::TabulatedWalk => {
                info!("{stamp} tabulated walk");
                sequencer.tabulated_walk().await
            }
        };

        match report.outcome {
            RunOutcome::Completed => info!("[MOTION_TASK] {motion:?} done"),
            RunOutcome::Cancelled => warn!("[MOTION_TASK] {motion:?} stopped"),
            RunOutcome::Aborted(err) => error!("[MOTION_TASK] {motion:?} aborted: {err}"),
        }
        if report.home_failures > 0 {
            error!(
                "[MOTION_TASK] {} joints did not return home",
                report.home_failures
            );
        }
    }
}
