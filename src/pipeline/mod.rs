//! Per-frame detection, overlay and alert orchestration

use crate::audio::{AlertRequest, AlertSink};
use crate::config::DetectionConfig;
use crate::error::ProxResult;
use crate::inference::{Detector, OutputDecoder};
use crate::overlay;
use crate::preprocessing::Preprocessor;
use crate::proximity::AlertEvaluator;
use crate::utils::{ClassNames, Detection, Suppressor};
use image::RgbImage;
use std::time::{Duration, Instant};
use tracing::debug;

/// What happened to one frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Detections that survived suppression, in suppression order
    pub detections: Vec<Detection>,
    /// Alerts handed to the alert sink
    pub alerts_triggered: usize,
    pub preprocess_time: Duration,
    pub inference_time: Duration,
    pub postprocess_time: Duration,
}

impl FrameReport {
    pub fn total_time(&self) -> Duration {
        self.preprocess_time + self.inference_time + self.postprocess_time
    }
}

/// Runs detection on frames, draws the results onto them and raises
/// proximity alerts.
///
/// Decode, suppression and evaluation run sequentially on the caller's
/// thread. Alerts for one frame reach the sink in suppression order.
pub struct DetectionPipeline {
    preprocessor: Preprocessor,
    detector: Box<dyn Detector>,
    decoder: OutputDecoder,
    suppressor: Suppressor,
    evaluator: AlertEvaluator,
    class_names: ClassNames,
    alerts: Box<dyn AlertSink>,
    frame_index: u64,
}

impl DetectionPipeline {
    /// Fails when the class list does not match the detector's class-score
    /// columns.
    pub fn new(
        detector: Box<dyn Detector>,
        class_names: ClassNames,
        detection: &DetectionConfig,
        evaluator: AlertEvaluator,
        alerts: Box<dyn AlertSink>,
    ) -> ProxResult<Self> {
        detector.layout().check_class_count(class_names.len())?;

        let (input_width, input_height) = detector.input_size();
        debug!(
            "Pipeline using {} detector, {}x{} input, {} classes",
            detector.name(),
            input_width,
            input_height,
            class_names.len()
        );

        Ok(Self {
            preprocessor: Preprocessor::new(input_width, input_height),
            detector,
            decoder: OutputDecoder::new(
                detection.confidence_threshold,
                detection.score_threshold,
                input_width,
                input_height,
            ),
            suppressor: Suppressor::new(detection.score_threshold, detection.nms_threshold),
            evaluator,
            class_names,
            alerts,
            frame_index: 0,
        })
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_index
    }

    /// Detect objects in `frame`, draw them onto it and trigger alerts for
    /// detections judged close.
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> ProxResult<FrameReport> {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let start = Instant::now();
        let (square, blob) = self.preprocessor.process(frame);
        let preprocess_time = start.elapsed();

        let start = Instant::now();
        let output = self.detector.infer(&blob)?;
        let inference_time = start.elapsed();

        let start = Instant::now();
        let candidates = self
            .decoder
            .decode(&output, square.width(), square.height());
        let detections = self.suppressor.suppress(&candidates);

        // Letterboxing anchors the frame at the origin, so square
        // coordinates are frame coordinates
        let mut alerts_triggered = 0;
        for detection in &detections {
            let label = self.class_names.label(detection.class_id);
            overlay::draw_detection(frame, detection, label);

            let decision = self.evaluator.evaluate(detection);
            if decision.should_alert {
                self.alerts.trigger(AlertRequest {
                    frame_index,
                    class_id: detection.class_id,
                    label: label.to_string(),
                    normalized_area: decision.normalized_area,
                });
                alerts_triggered += 1;
            }
        }
        let postprocess_time = start.elapsed();

        debug!(
            "Frame {}: {} candidates, {} detections, {} alerts (pre {:?}, infer {:?}, post {:?})",
            frame_index,
            candidates.len(),
            detections.len(),
            alerts_triggered,
            preprocess_time,
            inference_time,
            postprocess_time
        );

        Ok(FrameReport {
            frame_index,
            detections,
            alerts_triggered,
            preprocess_time,
            inference_time,
            postprocess_time,
        })
    }
}
