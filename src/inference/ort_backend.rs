//! ONNX Runtime detector backend

use super::{Detector, InferenceError, OutputLayout, RawOutput};
use crate::config::Accelerator;
use ndarray::Array4;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the image input of an exported YOLOv5 graph
const INPUT_NAME: &str = "images";

/// ONNX Runtime inference backend
pub struct OrtDetector {
    session: Session,
    layout: OutputLayout,
    input_size: (u32, u32),
    accelerator: Accelerator,
}

impl OrtDetector {
    /// Load a model. The accelerator is a preference; loading falls back to
    /// the CPU provider when it cannot be used.
    pub fn load(
        model_path: &Path,
        layout: OutputLayout,
        input_size: (u32, u32),
        accelerator: Accelerator,
    ) -> Result<Self, InferenceError> {
        if !model_path.exists() {
            return Err(InferenceError::ModelLoadError(model_path.to_path_buf()));
        }

        let (session, accelerator) = Self::create_session(model_path, accelerator)?;
        info!(
            "Loaded {} with {} execution provider",
            model_path.display(),
            accelerator
        );

        Ok(Self {
            session,
            layout,
            input_size,
            accelerator,
        })
    }

    /// Execution provider actually in use
    pub fn accelerator(&self) -> Accelerator {
        self.accelerator
    }

    fn create_session(
        model_path: &Path,
        accelerator: Accelerator,
    ) -> Result<(Session, Accelerator), InferenceError> {
        let session_builder = Session::builder()
            .map_err(|e| {
                InferenceError::OrtError(format!("Failed to create session builder: {}", e))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                InferenceError::OrtError(format!("Failed to set optimization level: {}", e))
            })?
            .with_intra_threads(4)
            .map_err(|e| InferenceError::OrtError(format!("Failed to set intra threads: {}", e)))?;

        #[cfg(feature = "cuda")]
        if accelerator == Accelerator::Cuda {
            use ort::execution_providers::CUDAExecutionProvider;

            let cuda_session = session_builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()]);

            match cuda_session {
                Ok(builder) => match builder.commit_from_file(model_path) {
                    Ok(session) => return Ok((session, Accelerator::Cuda)),
                    Err(e) => {
                        warn!("Failed to load model with CUDA execution provider: {}. Falling back to CPU", e);
                    }
                },
                Err(e) => {
                    warn!("Failed to configure CUDA execution provider: {}. Falling back to CPU", e);
                }
            }
        }

        #[cfg(not(feature = "cuda"))]
        if accelerator == Accelerator::Cuda {
            warn!("Built without the `cuda` feature. Using CPU execution provider");
        }

        let session = session_builder.commit_from_file(model_path).map_err(|e| {
            warn!("Failed to load model with CPU provider: {}", e);
            InferenceError::ModelLoadError(model_path.to_path_buf())
        })?;

        Ok((session, Accelerator::Cpu))
    }

    fn validate_input(&self, blob: &Array4<f32>) -> Result<(), InferenceError> {
        let (width, height) = self.input_size;
        let expected = [1, 3, height as usize, width as usize];
        if blob.shape() != expected {
            return Err(InferenceError::InvalidInputShape {
                expected: expected.to_vec(),
                actual: blob.shape().to_vec(),
            });
        }
        Ok(())
    }
}

impl Detector for OrtDetector {
    fn name(&self) -> &'static str {
        "ort"
    }

    fn layout(&self) -> OutputLayout {
        self.layout
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, blob: &Array4<f32>) -> Result<RawOutput, InferenceError> {
        self.validate_input(blob)?;

        let input = Tensor::from_array(blob.clone())
            .map_err(|e| InferenceError::OrtError(format!("Failed to create input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![INPUT_NAME => input])
            .map_err(|e| InferenceError::InferenceFailed(format!("Session run failed: {}", e)))?;

        let mut output_values = outputs.values();
        let first_output = output_values.next().ok_or_else(|| {
            InferenceError::InferenceFailed("No outputs received from model".to_string())
        })?;

        let output_array = first_output.try_extract_array::<f32>().map_err(|e| {
            InferenceError::OrtError(format!("Failed to extract output tensor: {}", e))
        })?;

        debug!("Detector output shape: {:?}", output_array.shape());
        let data: Vec<f32> = output_array.iter().copied().collect();

        RawOutput::new(data, self.layout)
    }
}
