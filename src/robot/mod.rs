//! Core robot types.
//!
//! This module defines the main types for the Minion quadruped, including:
//! - [`commands`]: joint commands, motion requests and the trigger-word table.
//! - [`joint`]: joint roles and waveform parameters.
//! - [`leg`]: leg enumeration and gait phase groups.
//! - [`registry`]: the validated joint table.
//! - [`servo`]: the servo bus contract and its errors.
pub mod commands;
pub mod joint;
pub mod leg;
pub mod registry;
pub mod servo;
