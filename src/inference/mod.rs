//! Detector abstraction and YOLOv5 output decoding

use crate::config::ModelConfig;
use crate::error::{ProxError, ProxResult};
use crate::utils::{Candidate, Rect};
use ndarray::Array4;
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "ort-backend")]
pub mod ort_backend;

#[cfg(feature = "ort-backend")]
pub use ort_backend::OrtDetector;

/// Fixed row layout of the detector output tensor.
///
/// Each row holds `[cx, cy, w, h, objectness, class scores...]`, so
/// `dimensions = 5 + num_classes`. The values depend on how the model was
/// exported and are carried with the loaded model rather than hardcoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    rows: usize,
    dimensions: usize,
}

impl OutputLayout {
    /// Offset of the objectness confidence within a row
    pub const OBJECTNESS_OFFSET: usize = 4;
    /// Offset of the first class score within a row
    pub const CLASS_OFFSET: usize = 5;

    pub fn new(rows: usize, dimensions: usize) -> Result<Self, InferenceError> {
        if rows == 0 {
            return Err(InferenceError::InvalidLayout(
                "output rows must be greater than 0".to_string(),
            ));
        }
        if dimensions <= Self::CLASS_OFFSET {
            return Err(InferenceError::InvalidLayout(format!(
                "output dimensions must exceed {}, got {}",
                Self::CLASS_OFFSET,
                dimensions
            )));
        }
        Ok(Self { rows, dimensions })
    }

    /// YOLOv5 exported at 640x640 with the 80 COCO classes
    pub fn yolov5_coco() -> Self {
        Self {
            rows: 25200,
            dimensions: 85,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn num_classes(&self) -> usize {
        self.dimensions - Self::CLASS_OFFSET
    }

    /// Total number of values a conforming output buffer holds
    pub fn len(&self) -> usize {
        self.rows * self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify the class list lines up with the class-score columns
    pub fn check_class_count(&self, class_count: usize) -> Result<(), InferenceError> {
        if class_count != self.num_classes() {
            return Err(InferenceError::InvalidLayout(format!(
                "model emits {} class scores per row but the class list has {} entries",
                self.num_classes(),
                class_count
            )));
        }
        Ok(())
    }
}

/// Flat detector output, validated against its layout on construction
#[derive(Clone, Debug)]
pub struct RawOutput {
    data: Vec<f32>,
    layout: OutputLayout,
}

impl RawOutput {
    pub fn new(data: Vec<f32>, layout: OutputLayout) -> Result<Self, InferenceError> {
        if data.len() != layout.len() {
            return Err(InferenceError::OutputShapeMismatch {
                rows: layout.rows(),
                dimensions: layout.dimensions(),
                actual: data.len(),
            });
        }
        Ok(Self { data, layout })
    }

    /// All-zero output, mostly useful for building fixtures
    pub fn zeros(layout: OutputLayout) -> Self {
        Self {
            data: vec![0.0; layout.len()],
            layout,
        }
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Row `index`, or `None` past the last row
    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        let dims = self.layout.dimensions();
        let start = index.checked_mul(dims)?;
        self.data.get(start..start + dims).map(RowView)
    }

    /// Mutable access to one row's values
    pub fn row_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let dims = self.layout.dimensions();
        let start = index.checked_mul(dims)?;
        self.data.get_mut(start..start + dims)
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.data
            .chunks_exact(self.layout.dimensions())
            .map(RowView)
    }
}

/// One output row
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a>(&'a [f32]);

impl<'a> RowView<'a> {
    pub fn objectness(&self) -> f32 {
        self.0[OutputLayout::OBJECTNESS_OFFSET]
    }

    pub fn class_scores(&self) -> &'a [f32] {
        &self.0[OutputLayout::CLASS_OFFSET..]
    }

    /// Highest class score and its index; the first index wins ties and NaN
    /// scores never win over a real one
    pub fn best_class(&self) -> (usize, f32) {
        let scores = self.class_scores();
        let mut best = (0, scores[0]);
        for (idx, &score) in scores.iter().enumerate().skip(1) {
            if score > best.1 || (best.1.is_nan() && !score.is_nan()) {
                best = (idx, score);
            }
        }
        best
    }

    /// Box as `(cx, cy, w, h)` in detector input pixels
    pub fn center_box(&self) -> (f32, f32, f32, f32) {
        (self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Turns raw YOLOv5 output rows into candidates in source-image pixels
#[derive(Clone, Debug)]
pub struct OutputDecoder {
    confidence_threshold: f32,
    score_threshold: f32,
    input_width: f32,
    input_height: f32,
}

impl OutputDecoder {
    /// `confidence_threshold` gates objectness (rows below it are skipped),
    /// `score_threshold` gates the best class score (must be exceeded).
    pub fn new(
        confidence_threshold: f32,
        score_threshold: f32,
        input_width: u32,
        input_height: u32,
    ) -> Self {
        Self {
            confidence_threshold,
            score_threshold,
            input_width: input_width as f32,
            input_height: input_height as f32,
        }
    }

    /// Decode every row in stride order.
    ///
    /// `image_width`/`image_height` are the dimensions of the (letterboxed)
    /// image the detector input was produced from; boxes are scaled back to
    /// it with independent x and y factors.
    pub fn decode(&self, output: &RawOutput, image_width: u32, image_height: u32) -> Vec<Candidate> {
        let x_factor = image_width as f32 / self.input_width;
        let y_factor = image_height as f32 / self.input_height;
        let dims = output.layout().dimensions();

        output
            .as_slice()
            .par_chunks_exact(dims)
            .filter_map(|row| self.decode_row(RowView(row), x_factor, y_factor))
            .collect()
    }

    fn decode_row(&self, row: RowView<'_>, x_factor: f32, y_factor: f32) -> Option<Candidate> {
        let confidence = row.objectness();
        if confidence < self.confidence_threshold {
            return None;
        }

        let (class_id, max_class_score) = row.best_class();
        if max_class_score <= self.score_threshold {
            return None;
        }

        let (cx, cy, w, h) = row.center_box();
        let rect = Rect::new(
            ((cx - 0.5 * w) * x_factor) as i32,
            ((cy - 0.5 * h) * y_factor) as i32,
            (w * x_factor) as i32,
            (h * y_factor) as i32,
        );

        Some(Candidate::new(class_id, confidence, rect))
    }
}

impl Default for OutputDecoder {
    fn default() -> Self {
        Self::new(0.6, 0.2, 640, 640)
    }
}

/// Black-box object detector producing one fixed-shape output per call
pub trait Detector: Send {
    /// Backend identifier
    fn name(&self) -> &'static str;

    /// Output layout of the loaded model
    fn layout(&self) -> OutputLayout;

    /// Spatial input resolution `(width, height)`
    fn input_size(&self) -> (u32, u32);

    /// Run the detector on an NCHW blob
    fn infer(&mut self, blob: &Array4<f32>) -> Result<RawOutput, InferenceError>;

    /// One throwaway inference so shape problems surface at startup
    fn warm_up(&mut self) -> Result<(), InferenceError> {
        let (width, height) = self.input_size();
        let blob = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        self.infer(&blob).map(|_| ())
    }
}

/// Inference-related errors
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model loading failed: {}", .0.display())]
    ModelLoadError(PathBuf),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid input shape: expected {expected:?}, got {actual:?}")]
    InvalidInputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Output has {actual} values, expected {rows} rows x {dimensions} dimensions")]
    OutputShapeMismatch {
        rows: usize,
        dimensions: usize,
        actual: usize,
    },

    #[error("Invalid output layout: {0}")]
    InvalidLayout(String),

    #[error("ORT runtime error: {0}")]
    OrtError(String),
}

/// Build the configured detector and run its startup shape check
pub fn load_detector(config: &ModelConfig) -> ProxResult<Box<dyn Detector>> {
    #[cfg(feature = "ort-backend")]
    {
        let layout = OutputLayout::new(config.rows, config.dimensions)?;
        let mut detector = OrtDetector::load(
            &config.model_path,
            layout,
            (config.input_width, config.input_height),
            config.accelerator,
        )?;
        detector.warm_up()?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "ort-backend"))]
    {
        let _ = config;
        Err(ProxError::FeatureDisabled("ort-backend"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> OutputLayout {
        // 4 rows, 3 classes
        OutputLayout::new(4, 8).unwrap()
    }

    fn set_row(output: &mut RawOutput, index: usize, values: &[f32]) {
        let row = output.row_mut(index).unwrap();
        row[..values.len()].copy_from_slice(values);
    }

    #[test]
    fn test_layout_validation() {
        assert!(OutputLayout::new(0, 85).is_err());
        assert!(OutputLayout::new(10, 5).is_err());

        let layout = OutputLayout::yolov5_coco();
        assert_eq!(layout.num_classes(), 80);
        assert_eq!(layout.len(), 25200 * 85);
        assert!(layout.check_class_count(80).is_ok());
        assert!(matches!(
            layout.check_class_count(79),
            Err(InferenceError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_raw_output_length_must_match() {
        let layout = small_layout();
        assert!(RawOutput::new(vec![0.0; 32], layout).is_ok());

        match RawOutput::new(vec![0.0; 31], layout) {
            Err(InferenceError::OutputShapeMismatch { actual, .. }) => assert_eq!(actual, 31),
            other => panic!("Expected OutputShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_row_access_is_bounds_checked() {
        let output = RawOutput::zeros(small_layout());
        assert!(output.row(3).is_some());
        assert!(output.row(4).is_none());
        assert!(output.row(usize::MAX).is_none());
        assert_eq!(output.rows().count(), 4);
    }

    #[test]
    fn test_best_class_tie_picks_first() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 0, &[0.0, 0.0, 0.0, 0.0, 0.9, 0.1, 0.7, 0.7]);
        assert_eq!(output.row(0).unwrap().best_class(), (1, 0.7));
    }

    #[test]
    fn test_nan_class_score_does_not_win() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 0, &[100.0, 100.0, 10.0, 10.0, 0.9, f32::NAN, 0.9, 0.3]);
        assert_eq!(output.row(0).unwrap().best_class(), (1, 0.9));

        let candidates = OutputDecoder::default().decode(&output, 640, 640);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
    }

    #[test]
    fn test_low_objectness_rows_are_skipped() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 0, &[320.0, 320.0, 10.0, 10.0, 0.59, 0.9, 0.0, 0.0]);
        set_row(&mut output, 1, &[320.0, 320.0, 10.0, 10.0, 0.6, 0.9, 0.0, 0.0]);

        let candidates = OutputDecoder::default().decode(&output, 640, 640);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence, 0.6);
    }

    #[test]
    fn test_class_score_threshold_is_strict() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 0, &[100.0, 100.0, 10.0, 10.0, 0.9, 0.2, 0.0, 0.0]);
        set_row(&mut output, 2, &[100.0, 100.0, 10.0, 10.0, 0.9, 0.0, 0.0, 0.21]);

        let candidates = OutputDecoder::default().decode(&output, 640, 640);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 2);
    }

    #[test]
    fn test_confidence_is_objectness_not_class_score() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 1, &[100.0, 100.0, 10.0, 10.0, 0.75, 0.0, 0.95, 0.0]);

        let candidates = OutputDecoder::default().decode(&output, 640, 640);
        assert_eq!(candidates[0].confidence, 0.75);
        assert_eq!(candidates[0].class_id, 1);
    }

    #[test]
    fn test_box_scaling_uses_independent_factors() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 0, &[320.0, 320.0, 100.0, 50.0, 0.9, 0.8, 0.0, 0.0]);

        // x factor 2.0, y factor 1.5
        let candidates = OutputDecoder::default().decode(&output, 1280, 960);
        assert_eq!(candidates[0].rect, Rect::new(540, 442, 200, 75));
    }

    #[test]
    fn test_decode_preserves_row_order() {
        let mut output = RawOutput::zeros(small_layout());
        set_row(&mut output, 3, &[10.0, 10.0, 4.0, 4.0, 0.9, 0.0, 0.0, 0.5]);
        set_row(&mut output, 1, &[50.0, 50.0, 4.0, 4.0, 0.8, 0.5, 0.0, 0.0]);

        let candidates = OutputDecoder::default().decode(&output, 640, 640);
        let classes: Vec<usize> = candidates.iter().map(|c| c.class_id).collect();
        assert_eq!(classes, vec![0, 2]);
    }

    #[test]
    fn test_all_zero_output_yields_no_candidates() {
        let output = RawOutput::zeros(small_layout());
        assert!(OutputDecoder::default().decode(&output, 640, 640).is_empty());
    }

    #[test]
    fn test_inference_error_display() {
        let error = InferenceError::OutputShapeMismatch {
            rows: 2,
            dimensions: 6,
            actual: 5,
        };
        assert_eq!(
            error.to_string(),
            "Output has 5 values, expected 2 rows x 6 dimensions"
        );

        let error = InferenceError::ModelLoadError(PathBuf::from("yolov5n.onnx"));
        assert_eq!(error.to_string(), "Model loading failed: yolov5n.onnx");
    }

    #[cfg(not(feature = "ort-backend"))]
    #[test]
    fn test_load_detector_without_backend_feature() {
        let result = load_detector(&ModelConfig::default());
        assert!(matches!(
            result,
            Err(ProxError::FeatureDisabled("ort-backend"))
        ));
    }
}
