use thiserror::Error;

use crate::geometry::Region;

pub type Result<T, E = ChromaError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum ChromaError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid region {region} for a {width}x{height} frame")]
    InvalidRegion {
        region: Region,
        width: u32,
        height: u32,
    },
    #[error("capture error: {0}")]
    Capture(String),
    #[error("input injection error: {0}")]
    InputInjection(String),
    #[error("profile error: {0}")]
    Profile(String),
    #[error("pipeline error: {0}")]
    Pipeline(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
