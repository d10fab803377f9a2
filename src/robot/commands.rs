//! Command types for robot control and inter-task communication.
//!
//! Defines the per-joint [`Command`] handed to the servo bus, the [`Motion`]
//! requests consumed by the motion task, and the trigger-word table that turns
//! free text (from the network task) into those requests.
use alloc::{string::String, vec::Vec};
use fugit::MillisDurationU32;
use serde::{Deserialize, Serialize};

/// Word that interrupts a running gait instead of looking up the table.
pub const STOP_WORD: &str = "stop";

/// One move order for one joint. Built per phase point and consumed right
/// away by the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub joint: u8,
    /// Degrees.
    pub angle: f32,
    pub transit: MillisDurationU32,
}

impl Command {
    pub fn new(joint: u8, angle: f32, transit: MillisDurationU32) -> Self {
        Self {
            joint,
            angle,
            transit,
        }
    }
}

/// Gait requests understood by the motion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Forward,
    Backward,
    TabulatedWalk,
}

impl Motion {
    /// Clip played while the motion runs.
    pub fn accompaniment(self) -> Option<&'static str> {
        match self {
            Motion::Forward => Some("whistle"),
            Motion::Backward => Some("ymca"),
            Motion::TabulatedWalk => None,
        }
    }
}

/// What a trigger word asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Forward,
    Backward,
    TabulatedWalk,
    /// Audio clip, by resource key.
    Clip(String),
}

impl Action {
    pub fn motion(&self) -> Option<Motion> {
        match self {
            Action::Forward => Some(Motion::Forward),
            Action::Backward => Some(Motion::Backward),
            Action::TabulatedWalk => Some(Motion::TabulatedWalk),
            Action::Clip(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub word: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    Stop,
    Action(Action),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseCommandError;

/// Ordered trigger words; the first word found in the text wins.
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    triggers: Vec<Trigger>,
}

impl TriggerTable {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Match `text` against the table. Matching is a case-sensitive substring
    /// search, so "hi" also fires on "this".
    pub fn parse(&self, text: &str) -> Result<TextCommand, ParseCommandError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseCommandError);
        }
        if text.contains(STOP_WORD) {
            return Ok(TextCommand::Stop);
        }

        self.triggers
            .iter()
            .find(|trigger| text.contains(trigger.word.as_str()))
            .map(|trigger| TextCommand::Action(trigger.action.clone()))
            .ok_or(ParseCommandError)
    }
}
