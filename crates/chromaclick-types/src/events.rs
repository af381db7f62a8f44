use std::fmt;

use chrono::{DateTime, Local, SubsecRound};

/// Stages a detection cycle walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Capturing,
    RegionClipping,
    Masking,
    BlobSearch,
    MatchFound,
    NoMatch,
    Dispatching,
    Logged,
}

/// One line of the user-facing activity journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ActivityLogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(Local::now(), message)
    }

    /// Second precision; sub-second parts are discarded.
    pub fn at(timestamp: DateTime<Local>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            message: message.into(),
        }
    }
}

impl fmt::Display for ActivityLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}
