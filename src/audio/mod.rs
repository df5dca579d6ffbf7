//! Audible proximity alerts
//!
//! An alert opens the output device, streams the alert clip to it period by
//! period and releases the device again. [`AlertPlayer`] drives one such
//! session; [`AlertWorker`] serializes sessions on a background thread so
//! the frame loop never waits on the sound card.

pub mod asset;
pub mod device;
pub mod player;
pub mod worker;

#[cfg(feature = "cpal-output")]
pub mod cpal_backend;

pub use asset::AlertAsset;
pub use device::{HwParams, PcmBackend, PcmDevice, PcmError, UnavailableBackend};
pub use player::{
    AlertPlayer, OpenedSession, PlaybackOutcome, PlaybackReport, PreparedSession,
};
pub use worker::{AlertOutcome, AlertRequest, AlertSink, AlertWorker, BlockingAlerts};

use std::path::PathBuf;
use thiserror::Error;

/// Output backend used by the binary
#[cfg(feature = "cpal-output")]
pub type DefaultBackend = cpal_backend::CpalBackend;

/// Output backend used by the binary
#[cfg(not(feature = "cpal-output"))]
pub type DefaultBackend = UnavailableBackend;

/// Alert playback errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Alert asset {} could not be opened: {reason}", .path.display())]
    AssetMissing { path: PathBuf, reason: String },

    #[error("Alert asset format not supported: {0}")]
    AssetFormat(String),

    #[error("Failed to read alert asset: {0}")]
    AssetRead(String),

    #[error("Stream underrun could not be recovered")]
    StreamUnderrun,

    #[error("Audio write failed: {0}")]
    Write(String),

    #[error("Alert queue is full")]
    QueueFull,

    #[error("Alert worker stopped: {0}")]
    WorkerStopped(String),
}

impl From<PcmError> for AlertError {
    fn from(err: PcmError) -> Self {
        match err {
            PcmError::Unavailable(msg) => AlertError::DeviceUnavailable(msg),
            PcmError::Underrun => AlertError::StreamUnderrun,
            PcmError::Write(msg) => AlertError::Write(msg),
        }
    }
}
