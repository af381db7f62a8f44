//! Frame acquisition and pointer injection capabilities.

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use async_trait::async_trait;
use chromaclick_types::{frame::Frame, geometry::Point, ChromaError, Result};
use tracing::info;

#[cfg(feature = "desktop")]
mod desktop;
mod still;

#[cfg(feature = "desktop")]
pub use desktop::DesktopController;
pub use still::StillImageSource;

/// High-level pointer primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    MoveTo { x: u32, y: u32 },
    Click,
}

/// Move to `point`, then press and release the primary button.
pub fn click_at(point: Point) -> Vec<InputAction> {
    vec![
        InputAction::MoveTo {
            x: point.x,
            y: point.y,
        },
        InputAction::Click,
    ]
}

/// Aggregated controller performance counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ControllerMetrics {
    pub last_injection_ms: Option<u64>,
    pub successful_inputs: u64,
    pub failed_inputs: u64,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self) -> Result<Frame>;
}

#[async_trait]
pub trait PointerDriver: Send + Sync {
    async fn inject_actions(&self, actions: Vec<InputAction>) -> Result<()>;
    fn metrics(&self) -> ControllerMetrics;
}

#[async_trait]
impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    async fn capture_frame(&self) -> Result<Frame> {
        (**self).capture_frame().await
    }
}

#[async_trait]
impl<T: PointerDriver + ?Sized> PointerDriver for Box<T> {
    async fn inject_actions(&self, actions: Vec<InputAction>) -> Result<()> {
        (**self).inject_actions(actions).await
    }

    fn metrics(&self) -> ControllerMetrics {
        (**self).metrics()
    }
}

/// In-memory controller for tests and dry runs: serves a fixed frame and
/// records pointer actions instead of performing them.
#[derive(Clone, Default)]
pub struct MockController {
    frame: Option<Frame>,
    reject_input: bool,
    recorded: Arc<Mutex<Vec<InputAction>>>,
    metrics: Arc<Mutex<ControllerMetrics>>,
}

impl MockController {
    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frame: Some(frame),
            ..Self::default()
        }
    }

    /// Every capture fails as if no display were attached.
    pub fn without_display() -> Self {
        Self::default()
    }

    /// Every injection fails as if the host denied input access.
    pub fn rejecting_input(mut self) -> Self {
        self.reject_input = true;
        self
    }

    pub fn recorded_actions(&self) -> Vec<InputAction> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FrameSource for MockController {
    async fn capture_frame(&self) -> Result<Frame> {
        let frame = self
            .frame
            .clone()
            .ok_or_else(|| capture_error("mock controller has no frame loaded"))?;
        info!(
            "Capturing frame using mock controller ({}x{})",
            frame.width(),
            frame.height()
        );
        Ok(frame)
    }
}

#[async_trait]
impl PointerDriver for MockController {
    async fn inject_actions(&self, actions: Vec<InputAction>) -> Result<()> {
        ensure_actions_present(&actions)?;
        let start = Instant::now();
        let mut metrics = self
            .metrics
            .lock()
            .map_err(|_| injection_error("failed to lock metrics"))?;
        if self.reject_input {
            metrics.failed_inputs += 1;
            return Err(injection_error("mock controller rejects input"));
        }
        let mut recorded = self
            .recorded
            .lock()
            .map_err(|_| injection_error("failed to lock recorded actions"))?;
        for action in actions {
            match action {
                InputAction::MoveTo { x, y } => info!("Mock pointer move {} {}", x, y),
                InputAction::Click => info!("Mock primary click"),
            }
            recorded.push(action);
        }
        metrics.last_injection_ms = Some(start.elapsed().as_millis() as u64);
        metrics.successful_inputs += 1;
        Ok(())
    }

    fn metrics(&self) -> ControllerMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Generate an error aligned with capture semantics.
pub fn capture_error(message: impl Into<String>) -> ChromaError {
    ChromaError::Capture(message.into())
}

/// Generate an error aligned with input injection semantics.
pub fn injection_error(message: impl Into<String>) -> ChromaError {
    ChromaError::InputInjection(message.into())
}

/// Helper to ensure there is at least one action queued.
pub fn ensure_actions_present(actions: &[InputAction]) -> Result<()> {
    if actions.is_empty() {
        Err(injection_error("no input actions specified"))
    } else {
        Ok(())
    }
}
