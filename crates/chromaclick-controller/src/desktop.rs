use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chromaclick_types::{config::ControllerConfig, frame::Frame, Result};
use rdev::{Button, EventType};
use tracing::{debug, info};

use crate::{
    capture_error, ensure_actions_present, injection_error, ControllerMetrics, FrameSource,
    InputAction, PointerDriver,
};

/// Captures the primary monitor and drives the system pointer.
pub struct DesktopController {
    settle: Duration,
    metrics: Arc<Mutex<ControllerMetrics>>,
}

impl DesktopController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.click_settle_ms),
            metrics: Arc::new(Mutex::new(ControllerMetrics::default())),
        }
    }

    fn record_success(&self, start: Instant) {
        if let Ok(mut guard) = self.metrics.lock() {
            guard.last_injection_ms = Some(start.elapsed().as_millis() as u64);
            guard.successful_inputs += 1;
        }
    }

    fn record_failure(&self) {
        if let Ok(mut guard) = self.metrics.lock() {
            guard.failed_inputs += 1;
        }
    }
}

fn grab_primary_monitor() -> Result<Frame> {
    let monitors = xcap::Monitor::all()
        .map_err(|err| capture_error(format!("failed to enumerate monitors: {err}")))?;
    let monitor = monitors
        .into_iter()
        .reduce(|best, next| if next.is_primary() { next } else { best })
        .ok_or_else(|| capture_error("no display surface available"))?;
    let image = monitor
        .capture_image()
        .map_err(|err| capture_error(format!("screen capture failed: {err}")))?;
    Frame::from_rgba(image.width(), image.height(), image.as_raw())
}

fn simulate(event: &EventType, settle: Duration) -> Result<()> {
    rdev::simulate(event)
        .map_err(|err| injection_error(format!("host refused {event:?}: {err:?}")))?;
    // Some platforms drop events that arrive back to back.
    thread::sleep(settle);
    Ok(())
}

fn perform(actions: &[InputAction], settle: Duration) -> Result<()> {
    for action in actions {
        match *action {
            InputAction::MoveTo { x, y } => simulate(
                &EventType::MouseMove {
                    x: f64::from(x),
                    y: f64::from(y),
                },
                settle,
            )?,
            InputAction::Click => {
                simulate(&EventType::ButtonPress(Button::Left), settle)?;
                simulate(&EventType::ButtonRelease(Button::Left), settle)?;
            }
        }
        debug!("injected {:?}", action);
    }
    Ok(())
}

#[async_trait]
impl FrameSource for DesktopController {
    async fn capture_frame(&self) -> Result<Frame> {
        let frame = tokio::task::spawn_blocking(grab_primary_monitor)
            .await
            .map_err(|err| capture_error(format!("capture task failed: {err}")))??;
        info!("Captured {}x{} screen frame", frame.width(), frame.height());
        Ok(frame)
    }
}

#[async_trait]
impl PointerDriver for DesktopController {
    async fn inject_actions(&self, actions: Vec<InputAction>) -> Result<()> {
        ensure_actions_present(&actions)?;
        let start = Instant::now();
        let settle = self.settle;
        let outcome = tokio::task::spawn_blocking(move || perform(&actions, settle))
            .await
            .map_err(|err| injection_error(format!("input task failed: {err}")))
            .and_then(|result| result);
        match outcome {
            Ok(()) => {
                self.record_success(start);
                Ok(())
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    fn metrics(&self) -> ControllerMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}
