//! Proxalert
//!
//! Real-time object detection with audible proximity alerts: frames are run
//! through a YOLO-style detector, decoded and suppressed into detections, drawn
//! onto the frame, and any detection whose box is large enough triggers an
//! alert sound.

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod preprocessing;
pub mod proximity;
pub mod utils;

// Re-export commonly used types
pub use audio::{
    AlertError, AlertPlayer, AlertRequest, AlertSink, AlertWorker, BlockingAlerts, HwParams,
    PcmBackend, PcmDevice, PcmError, PlaybackOutcome, PlaybackReport,
};
pub use capture::{CaptureLoop, DisplayEvent, FrameDisplay, FrameSource, HeadlessDisplay};
pub use config::{
    Accelerator, AlertConfig, AlertMode, AppConfig, CaptureConfig, ConfigError, DetectionConfig,
    ModelConfig,
};
pub use error::{ProxError, ProxResult};
pub use inference::{
    Detector, InferenceError, OutputDecoder, OutputLayout, RawOutput, RowView,
};
pub use metrics::{FpsCounter, LoopStats};
pub use pipeline::{DetectionPipeline, FrameReport};
pub use preprocessing::Preprocessor;
pub use proximity::{AlertDecision, AlertEvaluator};
pub use utils::{Candidate, ClassNames, Detection, Rect, Suppressor};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
