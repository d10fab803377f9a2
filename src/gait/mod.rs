//! Gait generation.
//!
//! - [`clock`]: monotonic time source used to sample the waveform.
//! - [`waveform`]: per-joint sine wave and gait direction.
//! - [`sequencer`]: turns the waveform into timed command batches.
pub mod clock;
pub mod sequencer;
pub mod waveform;
