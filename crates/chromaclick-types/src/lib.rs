//! Shared domain types for the ChromaClick project.

pub mod color;
pub mod config;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod profile;

mod errors;

pub use errors::{ChromaError, Result};
