//! Library root for the Minion quadruped firmware.
//!
//! Re-exports the main modules: [`robot`], [`gait`], [`config`], [`boot`],
//! [`intake`] and [`drivers`]. The firmware tasks in `tasks` are only built with the `esp32`
//! feature; everything else builds and tests on the host.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod boot;
pub mod config;
pub mod drivers;
pub mod gait;
pub mod intake;
pub mod robot;
#[cfg(feature = "esp32")]
pub mod tasks;

#[cfg(test)]
mod testing;
