//! Frame capture loop
//!
//! One loop owns the frame source, the display and the detection pipeline,
//! and runs on its own thread. It ends when the source runs dry (an error)
//! or the display asks to quit (a clean stop); both paths release the source
//! and close the display.

pub mod sequence;

#[cfg(feature = "opencv-capture")]
pub mod opencv;

pub use sequence::ImageSequenceSource;

use crate::config::CaptureConfig;
use crate::error::{ProxError, ProxResult};
use crate::metrics::{FpsCounter, LoopStats};
use crate::pipeline::DetectionPipeline;
use image::RgbImage;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Produces frames for the capture loop
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source has no more frames
    fn read_frame(&mut self) -> ProxResult<Option<RgbImage>>;

    fn release(&mut self) -> ProxResult<()> {
        Ok(())
    }
}

/// What the display wants the loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,
    Quit,
}

/// Shows annotated frames
pub trait FrameDisplay: Send {
    fn show(&mut self, frame: &RgbImage) -> ProxResult<DisplayEvent>;

    fn close(&mut self) -> ProxResult<()> {
        Ok(())
    }
}

/// Display for runs without a window; never asks to quit
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _frame: &RgbImage) -> ProxResult<DisplayEvent> {
        Ok(DisplayEvent::Continue)
    }
}

/// Pick a frame source for `source`: a directory of images, or with
/// `opencv-capture` a camera index or video file.
pub fn open_source(source: &str) -> ProxResult<Box<dyn FrameSource>> {
    let path = Path::new(source);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::from_dir(path)?));
    }

    #[cfg(feature = "opencv-capture")]
    {
        Ok(Box::new(opencv::OpenCvSource::open(source)?))
    }

    #[cfg(not(feature = "opencv-capture"))]
    {
        Err(ProxError::FeatureDisabled("opencv-capture"))
    }
}

/// Window display when enabled, headless otherwise
pub fn open_display(config: &CaptureConfig) -> ProxResult<Box<dyn FrameDisplay>> {
    if !config.display_enabled {
        return Ok(Box::new(HeadlessDisplay));
    }

    #[cfg(feature = "opencv-capture")]
    {
        Ok(Box::new(opencv::OpenCvDisplay::new(&config.window_name)?))
    }

    #[cfg(not(feature = "opencv-capture"))]
    {
        warn!("Built without opencv-capture, running headless");
        Ok(Box::new(HeadlessDisplay))
    }
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    display: Box<dyn FrameDisplay>,
    pipeline: DetectionPipeline,
    fps: FpsCounter,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        display: Box<dyn FrameDisplay>,
        pipeline: DetectionPipeline,
        fps_report_interval: u32,
    ) -> Self {
        Self {
            source,
            display,
            pipeline,
            fps: FpsCounter::new(fps_report_interval),
        }
    }

    /// Process frames until the source is exhausted or the display quits.
    ///
    /// Exhaustion returns [`ProxError::CaptureExhausted`]. Teardown runs on
    /// every exit.
    pub fn run(mut self) -> ProxResult<LoopStats> {
        let mut stats = LoopStats::default();
        let result = self.drive(&mut stats);
        self.teardown();

        info!(
            "Capture loop finished: {} frames, {} detections, {} alerts",
            stats.frames, stats.detections, stats.alerts
        );
        result.map(|()| stats)
    }

    /// Run on a dedicated thread named `capture`
    pub fn spawn(self) -> ProxResult<JoinHandle<ProxResult<LoopStats>>> {
        thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || self.run())
            .map_err(ProxError::from)
    }

    fn drive(&mut self, stats: &mut LoopStats) -> ProxResult<()> {
        loop {
            let mut frame = match self.source.read_frame()? {
                Some(frame) if frame.width() > 0 && frame.height() > 0 => frame,
                _ => return Err(ProxError::CaptureExhausted),
            };

            let report = self.pipeline.process_frame(&mut frame)?;
            stats.record(report.detections.len(), report.alerts_triggered);

            if let Some(fps) = self.fps.tick() {
                info!("FPS: {:.1}", fps);
            }

            if self.display.show(&frame)? == DisplayEvent::Quit {
                debug!("Quit requested after {} frames", stats.frames);
                return Ok(());
            }
        }
    }

    fn teardown(&mut self) {
        if let Err(e) = self.source.release() {
            warn!("Failed to release frame source: {}", e);
        }
        if let Err(e) = self.display.close() {
            warn!("Failed to close display: {}", e);
        }
    }
}
