//! PCM output device abstraction

use std::fmt;
use thiserror::Error;

/// Stream parameters for interleaved signed 16-bit little-endian PCM.
///
/// Used both for what the alert path asks for and for what the hardware
/// actually granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames transferred per write
    pub period_frames: u32,
}

impl HwParams {
    pub fn new(sample_rate: u32, channels: u16, period_frames: u32) -> Self {
        Self {
            sample_rate,
            channels,
            period_frames,
        }
    }

    /// Interleaved samples in one period
    pub fn period_samples(&self) -> usize {
        self.period_frames as usize * self.channels as usize
    }
}

impl Default for HwParams {
    fn default() -> Self {
        Self::new(44100, 2, 1024)
    }
}

impl fmt::Display for HwParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, S16LE, {} frames/period",
            self.sample_rate, self.channels, self.period_frames
        )
    }
}

/// Device-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PcmError {
    #[error("output device unavailable: {0}")]
    Unavailable(String),

    #[error("buffer underrun")]
    Underrun,

    #[error("device write failed: {0}")]
    Write(String),
}

/// An opened output device. Dropping it releases the hardware.
pub trait PcmDevice {
    /// Parameters the hardware actually accepted
    fn hw_params(&self) -> HwParams;

    /// Queue one period of interleaved samples, blocking while the device
    /// buffer is full. Returns [`PcmError::Underrun`] if the device starved
    /// since the previous write.
    fn write_period(&mut self, samples: &[i16]) -> Result<(), PcmError>;

    /// Reset the device after an underrun so writing can continue
    fn recover(&mut self) -> Result<(), PcmError>;

    /// Block until everything queued has been played
    fn drain(&mut self) -> Result<(), PcmError>;
}

/// Opens output devices. One device is opened per alert and released when
/// the alert ends.
pub trait PcmBackend {
    type Device: PcmDevice;

    /// Open the output device, negotiating the nearest supported parameters
    fn open(&self, requested: &HwParams) -> Result<Self::Device, PcmError>;
}

/// Backend for builds without an audio output feature. Every open fails, so
/// alerts are logged as device-unavailable and detection carries on.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableBackend;

/// Device type of [`UnavailableBackend`]; never constructed
#[derive(Debug)]
pub enum NoDevice {}

impl PcmDevice for NoDevice {
    fn hw_params(&self) -> HwParams {
        match *self {}
    }

    fn write_period(&mut self, _samples: &[i16]) -> Result<(), PcmError> {
        match *self {}
    }

    fn recover(&mut self) -> Result<(), PcmError> {
        match *self {}
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        match *self {}
    }
}

impl PcmBackend for UnavailableBackend {
    type Device = NoDevice;

    fn open(&self, _requested: &HwParams) -> Result<NoDevice, PcmError> {
        Err(PcmError::Unavailable(
            "built without an audio output backend".to_string(),
        ))
    }
}
