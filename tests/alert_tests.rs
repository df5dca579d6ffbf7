//! Proximity decisions and alert playback with a simulated output device

use image::RgbImage;
use ndarray::Array4;
use proxalert::{
    AlertError, AlertEvaluator, AlertPlayer, AlertRequest, AlertWorker, BlockingAlerts,
    ClassNames, Detection, DetectionConfig, DetectionPipeline, Detector, HwParams,
    InferenceError, OutputLayout, PcmBackend, PcmDevice, PcmError, RawOutput, Rect,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use tempfile::NamedTempFile;

#[derive(Clone, Default)]
struct Counters {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    periods: Arc<AtomicUsize>,
}

struct SimDevice {
    params: HwParams,
    counters: Counters,
}

impl PcmDevice for SimDevice {
    fn hw_params(&self) -> HwParams {
        self.params
    }

    fn write_period(&mut self, samples: &[i16]) -> Result<(), PcmError> {
        assert_eq!(samples.len(), self.params.period_samples());
        self.counters.periods.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn recover(&mut self) -> Result<(), PcmError> {
        Ok(())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        Ok(())
    }
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct SimBackend {
    counters: Counters,
}

impl PcmBackend for SimBackend {
    type Device = SimDevice;

    fn open(&self, requested: &HwParams) -> Result<SimDevice, PcmError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SimDevice {
            params: *requested,
            counters: self.counters.clone(),
        })
    }
}

fn params() -> HwParams {
    HwParams::new(44100, 2, 64)
}

fn clip(periods: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let bytes = vec![0u8; periods * params().period_samples() * 2];
    file.write_all(&bytes).unwrap();
    file
}

/// Detector that always reports one large person in the top-left corner
struct LargePersonDetector;

impl Detector for LargePersonDetector {
    fn name(&self) -> &'static str {
        "large-person"
    }

    fn layout(&self) -> OutputLayout {
        OutputLayout::new(3, 7).unwrap()
    }

    fn input_size(&self) -> (u32, u32) {
        (32, 32)
    }

    fn infer(&mut self, _blob: &Array4<f32>) -> Result<RawOutput, InferenceError> {
        let mut output = RawOutput::zeros(self.layout());
        output
            .row_mut(0)
            .unwrap()
            .copy_from_slice(&[16.0, 16.0, 30.0, 30.0, 0.9, 0.9, 0.0]);
        Ok(output)
    }
}

#[test]
fn test_alert_boundary_on_box_area() {
    let evaluator = AlertEvaluator::default();
    let alerting = Detection::new(0, 0.9, Rect::new(0, 0, 3072, 26));
    let quiet = Detection::new(0, 0.9, Rect::new(0, 0, 3072, 25));

    assert!(evaluator.evaluate(&alerting).should_alert);
    assert!(!evaluator.evaluate(&quiet).should_alert);
}

#[test]
fn test_missing_asset_releases_device_without_playing() {
    let backend = SimBackend::default();
    let player = AlertPlayer::new(backend.clone(), "/no/such/alert.raw", params());

    let session = player.open().unwrap();
    let result = session.prepare(player.asset_path());

    assert!(matches!(result, Err(AlertError::AssetMissing { .. })));
    assert_eq!(backend.counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(backend.counters.released.load(Ordering::SeqCst), 1);
    assert_eq!(backend.counters.periods.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pipeline_keeps_running_when_alerts_fail() {
    let backend = SimBackend::default();
    let player = AlertPlayer::new(backend.clone(), "/no/such/alert.raw", params());

    let mut pipeline = DetectionPipeline::new(
        Box::new(LargePersonDetector),
        ClassNames::from_names(["person", "bicycle"]),
        &DetectionConfig::default(),
        AlertEvaluator::new(100, 5),
        Box::new(BlockingAlerts::new(player)),
    )
    .unwrap();

    let mut frame = RgbImage::new(64, 64);
    for expected in 0..3 {
        let report = pipeline.process_frame(&mut frame).unwrap();
        assert_eq!(report.frame_index, expected);
        assert_eq!(report.alerts_triggered, 1);
    }

    // Every failed alert still opened and released its own device
    assert_eq!(backend.counters.opened.load(Ordering::SeqCst), 3);
    assert_eq!(backend.counters.released.load(Ordering::SeqCst), 3);
}

#[test]
fn test_blocking_alert_plays_whole_clip_inline() {
    let asset = clip(5);
    let backend = SimBackend::default();
    let player = AlertPlayer::new(backend.clone(), asset.path(), params());

    let report = player.play_alert().unwrap();
    assert!(report.completed());
    assert_eq!(report.periods_written, 5);
    assert_eq!(backend.counters.periods.load(Ordering::SeqCst), 5);
    assert_eq!(backend.counters.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_queued_alerts_play_in_request_order() {
    let asset = clip(2);
    let backend = SimBackend::default();
    let player = AlertPlayer::new(backend.clone(), asset.path(), params());

    let (tx, rx) = mpsc::channel();
    let mut worker = AlertWorker::spawn_observed(player, 8, tx).unwrap();
    for (frame_index, label) in [(4u64, "person"), (4, "dog"), (5, "person")] {
        worker
            .enqueue(AlertRequest {
                frame_index,
                class_id: 0,
                label: label.to_string(),
                normalized_area: 30,
            })
            .unwrap();
    }
    worker.shutdown();

    let order: Vec<_> = rx
        .iter()
        .map(|o| {
            assert!(o.result.is_ok());
            (o.request.frame_index, o.request.label)
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (4, "person".to_string()),
            (4, "dog".to_string()),
            (5, "person".to_string())
        ]
    );
    assert_eq!(backend.counters.periods.load(Ordering::SeqCst), 6);
}
