//! Operational helpers: logging setup and session-scoped journal/counters.

use std::collections::VecDeque;

use chromaclick_types::{config::OpsConfig, events::ActivityLogEntry, ChromaError, Result};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Entries kept before the oldest is evicted.
pub const ACTIVITY_LOG_CAPACITY: usize = 50;

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ChromaError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ChromaError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Bounded newest-first journal of human-readable events.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityLogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Stamps `message` with the current local time and puts it first.
    pub fn record(&mut self, message: impl Into<String>) {
        self.push(ActivityLogEntry::new(message));
    }

    pub fn push(&mut self, entry: ActivityLogEntry) {
        debug!(message = %entry.message, "activity");
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ActivityLogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Monotonic count of dispatched clicks; only [`ClickCounter::reset`] lowers it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickCounter(u64);

impl ClickCounter {
    pub fn increment(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// State that outlives a single detection cycle.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub counter: ClickCounter,
    pub log: ActivityLog,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counter.reset();
        self.log.reset();
    }
}
