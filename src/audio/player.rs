//! One-shot alert playback sessions
//!
//! A session moves through `open -> prepare -> play -> close`, encoded in the
//! types: [`AlertPlayer::open`] yields an [`OpenedSession`], which
//! [`OpenedSession::prepare`] turns into a [`PreparedSession`]. The device is
//! held by a [`DeviceGuard`], so it is released on every path, including
//! early returns and panics mid-stream.

use super::asset::AlertAsset;
use super::device::{HwParams, PcmBackend, PcmDevice, PcmError};
use super::AlertError;
use crate::config::AlertConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Owns an open device and releases it exactly once
pub struct DeviceGuard<D: PcmDevice> {
    device: Option<D>,
}

impl<D: PcmDevice> DeviceGuard<D> {
    fn new(device: D) -> Self {
        Self {
            device: Some(device),
        }
    }

    fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    /// Drain pending audio and drop the device. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), PcmError> {
        match self.device.take() {
            Some(mut device) => {
                let drained = device.drain();
                drop(device);
                drained
            }
            None => Ok(()),
        }
    }
}

impl<D: PcmDevice> Drop for DeviceGuard<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Audio device did not drain cleanly: {}", e);
        }
    }
}

/// How a call to [`PreparedSession::play`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The clip ran out (end of file or short read)
    Completed,
    /// A period underran again right after recovery
    UnderrunAbort,
    WriteFailed(String),
    AssetReadFailed(String),
    /// The play deadline passed
    TimedOut,
}

impl fmt::Display for PlaybackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackOutcome::Completed => write!(f, "completed"),
            PlaybackOutcome::UnderrunAbort => write!(f, "stopped after repeated underrun"),
            PlaybackOutcome::WriteFailed(e) => write!(f, "stopped on write failure: {}", e),
            PlaybackOutcome::AssetReadFailed(e) => write!(f, "stopped on read failure: {}", e),
            PlaybackOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub periods_written: u64,
    pub underruns: u32,
    pub outcome: PlaybackOutcome,
}

impl PlaybackReport {
    pub fn completed(&self) -> bool {
        self.outcome == PlaybackOutcome::Completed
    }
}

/// Device acquired, asset not yet opened
pub struct OpenedSession<D: PcmDevice> {
    guard: DeviceGuard<D>,
    requested: HwParams,
    negotiated: HwParams,
}

impl<D: PcmDevice> OpenedSession<D> {
    pub fn requested(&self) -> HwParams {
        self.requested
    }

    pub fn negotiated(&self) -> HwParams {
        self.negotiated
    }

    /// True when the hardware granted a different sample rate than asked
    pub fn rate_adjusted(&self) -> bool {
        self.requested.sample_rate != self.negotiated.sample_rate
    }

    /// Open the alert clip. On failure the device is released before the
    /// error is returned.
    pub fn prepare(self, asset_path: &Path) -> Result<PreparedSession<D>, AlertError> {
        let OpenedSession {
            mut guard,
            negotiated,
            ..
        } = self;

        let asset = match AlertAsset::open(asset_path) {
            Ok(asset) => asset,
            Err(e) => {
                if let Err(release_err) = guard.release() {
                    warn!("Audio device release failed: {}", release_err);
                }
                return Err(e);
            }
        };

        if let Some(spec) = asset.wav_spec() {
            if spec.channels != negotiated.channels || spec.sample_rate != negotiated.sample_rate
            {
                warn!(
                    "Alert clip is {} Hz, {} ch but device runs {}",
                    spec.sample_rate, spec.channels, negotiated
                );
            }
        }

        Ok(PreparedSession {
            guard,
            asset,
            negotiated,
        })
    }

    /// Release the device without playing anything
    pub fn close(mut self) -> Result<(), AlertError> {
        self.guard.release().map_err(AlertError::from)
    }
}

/// Device and asset both open
pub struct PreparedSession<D: PcmDevice> {
    guard: DeviceGuard<D>,
    asset: AlertAsset,
    negotiated: HwParams,
}

impl<D: PcmDevice> PreparedSession<D> {
    /// Stream the clip one period at a time until it runs out.
    ///
    /// A trailing partial period is not played. An underrun is recovered once
    /// and the same period retried; a second underrun on that period stops
    /// playback. Nothing here is fatal to the caller.
    pub fn play(&mut self, deadline: Option<Instant>) -> PlaybackReport {
        let period = self.negotiated.period_samples();
        let mut buf = vec![0i16; period];
        let mut report = PlaybackReport {
            periods_written: 0,
            underruns: 0,
            outcome: PlaybackOutcome::Completed,
        };

        let Some(device) = self.guard.device_mut() else {
            report.outcome = PlaybackOutcome::WriteFailed("device already released".to_string());
            return report;
        };

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                report.outcome = PlaybackOutcome::TimedOut;
                break;
            }

            let read = match self.asset.read_samples(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    report.outcome = PlaybackOutcome::AssetReadFailed(e.to_string());
                    break;
                }
            };
            if read < period {
                break;
            }

            match write_with_recovery(device, &buf, &mut report.underruns) {
                Ok(()) => report.periods_written += 1,
                Err(outcome) => {
                    report.outcome = outcome;
                    break;
                }
            }
        }

        match &report.outcome {
            PlaybackOutcome::Completed => debug!(
                "Alert played {} periods ({} underruns)",
                report.periods_written, report.underruns
            ),
            outcome => warn!(
                "Alert playback {} after {} periods",
                outcome, report.periods_written
            ),
        }

        report
    }

    /// Drain and release the device, then close the asset
    pub fn close(mut self) -> Result<(), AlertError> {
        self.guard.release().map_err(AlertError::from)
    }
}

fn write_with_recovery<D: PcmDevice>(
    device: &mut D,
    samples: &[i16],
    underruns: &mut u32,
) -> Result<(), PlaybackOutcome> {
    match device.write_period(samples) {
        Ok(()) => return Ok(()),
        Err(PcmError::Underrun) => *underruns += 1,
        Err(e) => return Err(PlaybackOutcome::WriteFailed(e.to_string())),
    }

    debug!("Buffer underrun, recovering");
    device
        .recover()
        .map_err(|e| PlaybackOutcome::WriteFailed(format!("recovery failed: {}", e)))?;

    match device.write_period(samples) {
        Ok(()) => Ok(()),
        Err(PcmError::Underrun) => {
            *underruns += 1;
            Err(PlaybackOutcome::UnderrunAbort)
        }
        Err(e) => Err(PlaybackOutcome::WriteFailed(e.to_string())),
    }
}

/// Plays the configured alert clip on a fresh device session per alert
pub struct AlertPlayer<B: PcmBackend> {
    backend: B,
    asset_path: PathBuf,
    requested: HwParams,
    play_timeout: Option<Duration>,
}

impl<B: PcmBackend> AlertPlayer<B> {
    pub fn new(backend: B, asset_path: impl Into<PathBuf>, requested: HwParams) -> Self {
        Self {
            backend,
            asset_path: asset_path.into(),
            requested,
            play_timeout: None,
        }
    }

    pub fn from_config(backend: B, config: &AlertConfig) -> Self {
        let requested = HwParams::new(config.sample_rate, config.channels, config.period_frames);
        Self::new(backend, config.asset_path.clone(), requested)
            .with_play_timeout(config.play_timeout_ms.map(Duration::from_millis))
    }

    /// Bound how long a single alert may play
    pub fn with_play_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.play_timeout = timeout;
        self
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    /// Acquire the output device
    pub fn open(&self) -> Result<OpenedSession<B::Device>, AlertError> {
        let device = self.backend.open(&self.requested)?;
        let negotiated = device.hw_params();
        let session = OpenedSession {
            guard: DeviceGuard::new(device),
            requested: self.requested,
            negotiated,
        };

        if session.rate_adjusted() {
            warn!(
                "Requested {} Hz, device negotiated {} Hz",
                self.requested.sample_rate, negotiated.sample_rate
            );
        }
        debug!("Audio device opened: {}", negotiated);

        Ok(session)
    }

    /// Run one complete alert: open, prepare, play and close.
    ///
    /// Errors are only returned when the session could not be set up. Problems
    /// during playback are reported in the [`PlaybackReport`], and a failed
    /// drain on close is logged.
    pub fn play_alert(&self) -> Result<PlaybackReport, AlertError> {
        let session = self.open()?;
        let mut prepared = session.prepare(&self.asset_path)?;
        let deadline = self.play_timeout.map(|t| Instant::now() + t);
        let report = prepared.play(deadline);
        if let Err(e) = prepared.close() {
            warn!("Alert device did not close cleanly: {}", e);
        }
        info!("Alert finished: {}", report.outcome);
        Ok(report)
    }
}
