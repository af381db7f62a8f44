//! Detection pipeline coordinating capture, vision, and pointer dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use chromaclick_controller::{click_at, FrameSource, PointerDriver};
use chromaclick_ops::{ActivityLog, ClickCounter, Session};
use chromaclick_types::{
    config::DetectionSettings,
    events::CycleStage,
    frame::Frame,
    geometry::{Point, Region},
    ChromaError, Result,
};
use chromaclick_vision::{clip_region, match_color, Blob, BlobDetector};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const NO_MATCH_MESSAGE: &str = "No color match found";

/// What a successful pointer dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    pub point: Point,
    /// Counter value after this click.
    pub clicks: u64,
}

/// Moves the pointer and clicks; counts every click that the host accepted.
pub struct ActionDispatcher<P: PointerDriver> {
    driver: P,
}

impl<P: PointerDriver> ActionDispatcher<P> {
    pub fn new(driver: P) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &P {
        &self.driver
    }

    pub async fn dispatch(
        &self,
        point: Point,
        counter: &mut ClickCounter,
    ) -> Result<ActionOutcome> {
        self.driver.inject_actions(click_at(point)).await?;
        let clicks = counter.increment();
        Ok(ActionOutcome { point, clicks })
    }
}

/// Outcome of one detection cycle.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub cycle_id: Uuid,
    pub matched: bool,
    /// Dispatch point in frame coordinates.
    pub centroid: Option<Point>,
    /// Selected blob in frame coordinates.
    pub blob: Option<Blob>,
    /// Area the search ran over.
    pub region: Region,
    pub frame: Arc<Frame>,
}

#[async_trait]
pub trait DetectionRunner {
    async fn detect(&mut self) -> Result<DetectionResult>;
    fn reset(&mut self);
    fn session(&self) -> &Session;
}

pub struct DetectionPipeline<S, P>
where
    S: FrameSource,
    P: PointerDriver,
{
    source: S,
    dispatcher: ActionDispatcher<P>,
    settings: DetectionSettings,
    session: Session,
    last_result: Option<DetectionResult>,
}

impl<S, P> DetectionPipeline<S, P>
where
    S: FrameSource,
    P: PointerDriver,
{
    pub fn new(settings: DetectionSettings, source: S, pointer: P) -> Self {
        Self::with_session(settings, source, pointer, Session::new())
    }

    pub fn with_session(
        settings: DetectionSettings,
        source: S,
        pointer: P,
        session: Session,
    ) -> Self {
        Self {
            source,
            dispatcher: ActionDispatcher::new(pointer),
            settings,
            session,
            last_result: None,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Takes effect on the next cycle.
    pub fn set_settings(&mut self, settings: DetectionSettings) {
        self.settings = settings;
    }

    pub fn pointer(&self) -> &P {
        self.dispatcher.driver()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn clicks(&self) -> u64 {
        self.session.counter.get()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.session.log
    }

    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last_result.as_ref()
    }

    /// Clears the click counter and the activity log.
    pub fn reset(&mut self) {
        self.session.reset();
        info!("Session counters and activity log reset");
    }

    /// Runs one full capture-to-log cycle.
    ///
    /// An invalid region, a failed capture, or a refused click aborts the
    /// cycle with an error and leaves the session untouched.
    pub async fn run_cycle(&mut self) -> Result<DetectionResult> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id);
        let outcome = self.execute(cycle_id).instrument(span).await;
        stage(CycleStage::Idle);
        let result = outcome?;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    async fn execute(&mut self, cycle_id: Uuid) -> Result<DetectionResult> {
        let settings = self.settings;

        stage(CycleStage::Capturing);
        let frame = Arc::new(self.source.capture_frame().await?);

        stage(CycleStage::RegionClipping);
        let region = clip_region(frame.width(), frame.height(), settings.region)?;

        stage(CycleStage::Masking);
        let mask = match_color(&frame, region, settings.color, settings.tolerance);

        stage(CycleStage::BlobSearch);
        let blob = BlobDetector::new(settings.min_area)
            .with_connectivity(settings.connectivity)
            .find_best(&mask)
            .map(|local| local.translate(region.origin()));
        drop(mask);

        let Some(blob) = blob else {
            stage(CycleStage::NoMatch);
            self.session.log.record(NO_MATCH_MESSAGE);
            stage(CycleStage::Logged);
            info!(color = %settings.color, tolerance = settings.tolerance, "no match");
            return Ok(DetectionResult {
                cycle_id,
                matched: false,
                centroid: None,
                blob: None,
                region,
                frame,
            });
        };

        stage(CycleStage::MatchFound);
        let point = blob.centroid.to_point();

        stage(CycleStage::Dispatching);
        let outcome = self
            .dispatcher
            .dispatch(point, &mut self.session.counter)
            .await
            .map_err(|err| {
                warn!("Click at {} failed: {}", point, err);
                err
            })?;

        let message = if settings.region.is_some() {
            format!("Click in region at {}", outcome.point)
        } else {
            format!("Click at {}", outcome.point)
        };
        self.session.log.record(message);
        stage(CycleStage::Logged);
        info!(
            x = point.x,
            y = point.y,
            area = blob.area,
            clicks = outcome.clicks,
            "match dispatched"
        );

        Ok(DetectionResult {
            cycle_id,
            matched: true,
            centroid: Some(point),
            blob: Some(blob),
            region,
            frame,
        })
    }
}

#[async_trait]
impl<S, P> DetectionRunner for DetectionPipeline<S, P>
where
    S: FrameSource,
    P: PointerDriver,
{
    async fn detect(&mut self) -> Result<DetectionResult> {
        self.run_cycle().await
    }

    fn reset(&mut self) {
        DetectionPipeline::reset(self);
    }

    fn session(&self) -> &Session {
        DetectionPipeline::session(self)
    }
}

fn stage(stage: CycleStage) {
    debug!(?stage, "cycle stage");
}

pub fn pipeline_error(message: impl Into<String>) -> ChromaError {
    ChromaError::Pipeline(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromaclick_controller::{InputAction, MockController};
    use chromaclick_types::{color::Color, config::Connectivity};

    fn frame_with_rects(
        width: u32,
        height: u32,
        background: Color,
        rects: &[(Region, Color)],
    ) -> Frame {
        Frame::from_fn(width, height, |x, y| {
            rects
                .iter()
                .find(|(r, _)| r.contains(Point::new(x, y)))
                .map(|(_, c)| *c)
                .unwrap_or(background)
        })
    }

    fn red_square_frame() -> Frame {
        frame_with_rects(
            100,
            100,
            Color::BLACK,
            &[(Region::new(10, 10, 15, 15), Color::RED)],
        )
    }

    fn pipeline(
        frame: Frame,
        settings: DetectionSettings,
    ) -> DetectionPipeline<MockController, MockController> {
        let controller = MockController::with_frame(frame);
        DetectionPipeline::new(settings, controller.clone(), controller)
    }

    fn messages(pipeline: &DetectionPipeline<MockController, MockController>) -> Vec<String> {
        pipeline
            .activity()
            .entries()
            .map(|e| e.message.clone())
            .collect()
    }

    #[tokio::test]
    async fn red_square_end_to_end() {
        let settings = DetectionSettings::new(Color::from_hex("#FF0000").unwrap(), 10);
        let mut pipeline = pipeline(red_square_frame(), settings);

        let result = pipeline.run_cycle().await.expect("cycle");
        assert!(result.matched);
        assert_eq!(result.centroid, Some(Point::new(12, 12)));
        assert_eq!(result.region, Region::full(100, 100));
        assert_eq!(result.frame.width(), 100);
        assert_eq!(pipeline.clicks(), 1);
        assert_eq!(messages(&pipeline), vec!["Click at (12, 12)".to_string()]);
        assert_eq!(
            pipeline.pointer().recorded_actions(),
            vec![InputAction::MoveTo { x: 12, y: 12 }, InputAction::Click]
        );
        assert_eq!(
            pipeline.last_result().map(|r| r.cycle_id),
            Some(result.cycle_id)
        );
    }

    #[tokio::test]
    async fn uniform_frame_logs_no_match() {
        let settings = DetectionSettings::new(Color::RED, 30);
        let mut pipeline = pipeline(Frame::filled(40, 30, Color::new(0, 0, 200)), settings);

        let result = pipeline.run_cycle().await.expect("cycle");
        assert!(!result.matched);
        assert_eq!(result.centroid, None);
        assert_eq!(pipeline.clicks(), 0);
        assert_eq!(messages(&pipeline), vec![NO_MATCH_MESSAGE.to_string()]);
        assert!(pipeline.pointer().recorded_actions().is_empty());
    }

    #[tokio::test]
    async fn region_offsets_centroid_into_frame_coordinates() {
        let frame = frame_with_rects(
            200,
            120,
            Color::WHITE,
            &[
                (Region::new(5, 5, 25, 25), Color::new(0, 200, 0)),
                (Region::new(150, 80, 160, 90), Color::new(0, 200, 0)),
            ],
        );
        let settings = DetectionSettings::new(Color::new(0, 200, 0), 0)
            .with_region(Region::new(100, 60, 200, 120));
        let mut pipeline = pipeline(frame, settings);

        let result = pipeline.run_cycle().await.expect("cycle");
        assert!(result.matched);
        // Pixels 150..160 average to 154.5, truncated.
        assert_eq!(result.centroid, Some(Point::new(154, 84)));
        let blob = result.blob.expect("blob");
        assert_eq!(blob.bounds, Region::new(150, 80, 160, 90));
        assert_eq!(
            messages(&pipeline),
            vec!["Click in region at (154, 84)".to_string()]
        );
    }

    #[tokio::test]
    async fn blob_outside_region_is_not_seen() {
        let settings =
            DetectionSettings::new(Color::RED, 0).with_region(Region::new(50, 50, 100, 100));
        let mut pipeline = pipeline(red_square_frame(), settings);
        let result = pipeline.run_cycle().await.expect("cycle");
        assert!(!result.matched);
        assert_eq!(pipeline.clicks(), 0);
    }

    #[tokio::test]
    async fn invalid_region_aborts_without_side_effects() {
        for region in [Region::new(0, 0, 101, 50), Region::new(30, 10, 30, 40)] {
            let settings = DetectionSettings::new(Color::RED, 10).with_region(region);
            let mut pipeline = pipeline(red_square_frame(), settings);
            let err = pipeline.run_cycle().await.unwrap_err();
            assert!(matches!(err, ChromaError::InvalidRegion { .. }));
            assert_eq!(pipeline.clicks(), 0);
            assert!(pipeline.activity().is_empty());
            assert!(pipeline.pointer().recorded_actions().is_empty());
            assert!(pipeline.last_result().is_none());
        }
    }

    #[tokio::test]
    async fn capture_failure_propagates() {
        let controller = MockController::without_display();
        let mut pipeline = DetectionPipeline::new(
            DetectionSettings::new(Color::RED, 10),
            controller.clone(),
            controller,
        );
        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, ChromaError::Capture(_)));
        assert!(pipeline.activity().is_empty());
    }

    #[tokio::test]
    async fn refused_click_is_an_error_not_a_no_match() {
        let source = MockController::with_frame(red_square_frame());
        let pointer = MockController::default().rejecting_input();
        let mut pipeline =
            DetectionPipeline::new(DetectionSettings::new(Color::RED, 10), source, pointer);
        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, ChromaError::InputInjection(_)));
        assert_eq!(pipeline.clicks(), 0);
        assert!(pipeline.activity().is_empty());
        assert_eq!(pipeline.pointer().metrics().failed_inputs, 1);
    }

    #[tokio::test]
    async fn small_blob_is_ignored() {
        // 2x5 = 10 pixels sits exactly on the threshold.
        let frame = frame_with_rects(
            30,
            30,
            Color::BLACK,
            &[(Region::new(3, 3, 5, 8), Color::RED)],
        );
        let mut pipeline = pipeline(frame, DetectionSettings::new(Color::RED, 0));
        assert!(!pipeline.run_cycle().await.expect("cycle").matched);
    }

    #[tokio::test]
    async fn first_blob_in_scan_order_is_clicked() {
        let frame = frame_with_rects(
            80,
            80,
            Color::BLACK,
            &[
                (Region::new(60, 2, 64, 6), Color::RED),
                (Region::new(0, 30, 50, 80), Color::RED),
            ],
        );
        let mut pipeline = pipeline(frame, DetectionSettings::new(Color::RED, 5));
        let result = pipeline.run_cycle().await.expect("cycle");
        assert_eq!(result.centroid, Some(Point::new(61, 3)));
        assert_eq!(result.blob.map(|b| b.area), Some(16));
    }

    #[tokio::test]
    async fn four_connectivity_splits_diagonal_stroke() {
        // A 12 px diagonal line: one blob under 8-connectivity, twelve 1 px
        // blobs under 4-connectivity.
        let frame = Frame::from_fn(20, 20, |x, y| {
            if x == y && x < 12 {
                Color::RED
            } else {
                Color::BLACK
            }
        });
        let eight = DetectionSettings::new(Color::RED, 0);
        let mut pipeline = pipeline(frame, eight);
        let result = pipeline.run_cycle().await.expect("eight-connected cycle");
        assert_eq!(result.centroid, Some(Point::new(5, 5)));
        assert_eq!(result.blob.map(|b| b.area), Some(12));

        pipeline.set_settings(DetectionSettings {
            connectivity: Connectivity::Four,
            ..eight
        });
        let result = pipeline.run_cycle().await.expect("four-connected cycle");
        assert!(!result.matched);
        assert_eq!(pipeline.clicks(), 1);
        assert_eq!(
            pipeline.activity().latest().map(|e| e.message.as_str()),
            Some(NO_MATCH_MESSAGE)
        );
    }

    #[tokio::test]
    async fn repeated_cycles_are_deterministic_and_counted() {
        let settings = DetectionSettings::new(Color::RED, 10);
        let mut pipeline = pipeline(red_square_frame(), settings);
        let first = pipeline.run_cycle().await.expect("first");
        let second = pipeline.run_cycle().await.expect("second");
        let third = pipeline.run_cycle().await.expect("third");
        assert_eq!(first.centroid, second.centroid);
        assert_eq!(first.blob, third.blob);
        assert_ne!(first.cycle_id, second.cycle_id);
        assert_eq!(pipeline.clicks(), 3);
        assert_eq!(pipeline.activity().len(), 3);
    }

    #[tokio::test]
    async fn reset_clears_session() {
        let mut pipeline = pipeline(red_square_frame(), DetectionSettings::new(Color::RED, 10));
        for _ in 0..4 {
            pipeline.run_cycle().await.expect("cycle");
        }
        assert_eq!(pipeline.clicks(), 4);
        DetectionRunner::reset(&mut pipeline);
        assert_eq!(pipeline.clicks(), 0);
        assert!(pipeline.activity().is_empty());

        let result = pipeline.detect().await.expect("cycle after reset");
        assert!(result.matched);
        assert_eq!(DetectionRunner::session(&pipeline).counter.get(), 1);
    }

    #[tokio::test]
    async fn changed_settings_apply_to_next_cycle() {
        let mut pipeline = pipeline(red_square_frame(), DetectionSettings::new(Color::WHITE, 0));
        assert!(!pipeline.run_cycle().await.expect("cycle").matched);
        pipeline.set_settings(DetectionSettings::new(Color::new(240, 10, 10), 15));
        assert!(pipeline.run_cycle().await.expect("cycle").matched);
        assert_eq!(
            messages(&pipeline),
            vec!["Click at (12, 12)".to_string(), NO_MATCH_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn injected_session_keeps_accumulating() {
        let mut session = Session::new();
        session.counter.increment();
        session.log.record("Click at (1, 1)");
        let controller = MockController::with_frame(red_square_frame());
        let mut pipeline = DetectionPipeline::with_session(
            DetectionSettings::new(Color::RED, 10),
            controller.clone(),
            controller,
            session,
        );
        pipeline.run_cycle().await.expect("cycle");
        assert_eq!(pipeline.clicks(), 2);
        assert_eq!(
            messages(&pipeline),
            vec!["Click at (12, 12)".to_string(), "Click at (1, 1)".to_string()]
        );
    }

    #[tokio::test]
    async fn dispatcher_increments_counter_per_click() {
        let dispatcher = ActionDispatcher::new(MockController::default());
        let mut counter = ClickCounter::default();
        for n in 1..=5u32 {
            let outcome = dispatcher
                .dispatch(Point::new(n, n), &mut counter)
                .await
                .expect("dispatch");
            assert_eq!(outcome.clicks, u64::from(n));
        }
        assert_eq!(counter.get(), 5);
        assert_eq!(dispatcher.driver().recorded_actions().len(), 10);
    }
}
