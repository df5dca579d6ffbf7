//! Output through the platform audio host

use super::device::{HwParams, PcmBackend, PcmDevice, PcmError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Periods buffered between the writer and the audio callback
const QUEUED_PERIODS: usize = 2;

/// Opens the host's default output device
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalBackend;

/// State shared with the audio callback
struct Shared {
    /// Set once data has been written and cleared by recovery
    expecting: AtomicBool,
    underrun: AtomicBool,
    pending_samples: AtomicUsize,
    stream_error: Mutex<Option<String>>,
}

impl PcmBackend for CpalBackend {
    type Device = CpalDevice;

    fn open(&self, requested: &HwParams) -> Result<CpalDevice, PcmError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PcmError::Unavailable("no default output device".to_string()))?;

        let (config, format) = negotiate(&device, requested)?;
        let negotiated = HwParams::new(config.sample_rate.0, config.channels, requested.period_frames);

        let shared = Arc::new(Shared {
            expecting: AtomicBool::new(false),
            underrun: AtomicBool::new(false),
            pending_samples: AtomicUsize::new(0),
            stream_error: Mutex::new(None),
        });
        let (sender, receiver) = mpsc::sync_channel::<Vec<i16>>(QUEUED_PERIODS);

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, receiver, Arc::clone(&shared)),
            _ => build_stream::<i16>(&device, &config, receiver, Arc::clone(&shared)),
        }?;
        stream
            .play()
            .map_err(|e| PcmError::Unavailable(format!("failed to start stream: {}", e)))?;

        debug!("Opened output stream ({:?}, {})", format, negotiated);

        Ok(CpalDevice {
            _stream: stream,
            sender,
            shared,
            params: negotiated,
        })
    }
}

/// Pick the supported configuration with the requested channel count whose
/// rate range lies closest to the requested rate
fn negotiate(
    device: &cpal::Device,
    requested: &HwParams,
) -> Result<(StreamConfig, SampleFormat), PcmError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| PcmError::Unavailable(e.to_string()))?;

    let target = requested.sample_rate;
    let best = ranges
        .filter(|r| r.channels() == requested.channels)
        .filter(|r| matches!(r.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .map(|r| {
            let rate = target.clamp(r.min_sample_rate().0, r.max_sample_rate().0);
            let distance = rate.abs_diff(target);
            // Prefer native 16-bit when two ranges are equally close
            let rank = if r.sample_format() == SampleFormat::I16 { 0 } else { 1 };
            (distance, rank, rate, r)
        })
        .min_by_key(|(distance, rank, _, _)| (*distance, *rank))
        .ok_or_else(|| {
            PcmError::Unavailable(format!(
                "no {}-channel I16/F32 output configuration",
                requested.channels
            ))
        })?;

    let (_, _, rate, range) = best;
    let supported = range.with_sample_rate(SampleRate(rate));
    let format = supported.sample_format();
    Ok((supported.config(), format))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    receiver: Receiver<Vec<i16>>,
    shared: Arc<Shared>,
) -> Result<Stream, PcmError>
where
    T: SizedSample + FromSample<i16>,
{
    let mut current: Vec<i16> = Vec::new();
    let mut cursor = 0usize;
    let callback_shared = Arc::clone(&shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut starved = false;
                for slot in data.iter_mut() {
                    if cursor >= current.len() {
                        match receiver.try_recv() {
                            Ok(period) => {
                                current = period;
                                cursor = 0;
                            }
                            Err(_) => {
                                starved = true;
                                *slot = T::EQUILIBRIUM;
                                continue;
                            }
                        }
                    }
                    *slot = T::from_sample(current[cursor]);
                    cursor += 1;
                    callback_shared.pending_samples.fetch_sub(1, Ordering::AcqRel);
                }
                if starved && callback_shared.expecting.load(Ordering::Acquire) {
                    callback_shared.underrun.store(true, Ordering::Release);
                }
            },
            move |err| {
                if let Ok(mut slot) = shared.stream_error.lock() {
                    *slot = Some(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| PcmError::Unavailable(format!("failed to build output stream: {}", e)))
}

/// An open output stream. Dropping it stops the stream.
pub struct CpalDevice {
    _stream: Stream,
    sender: SyncSender<Vec<i16>>,
    shared: Arc<Shared>,
    params: HwParams,
}

impl CpalDevice {
    fn period_duration(&self) -> Duration {
        let seconds = self.params.period_frames as f64 / self.params.sample_rate.max(1) as f64;
        Duration::from_secs_f64(seconds)
    }

    fn check_stream(&self) -> Result<(), PcmError> {
        match self.shared.stream_error.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(err) => Err(PcmError::Write(err.clone())),
                None => Ok(()),
            },
            Err(_) => Err(PcmError::Write("stream state poisoned".to_string())),
        }
    }
}

impl PcmDevice for CpalDevice {
    fn hw_params(&self) -> HwParams {
        self.params
    }

    fn write_period(&mut self, samples: &[i16]) -> Result<(), PcmError> {
        self.check_stream()?;
        if self.shared.underrun.load(Ordering::Acquire) {
            return Err(PcmError::Underrun);
        }

        let deadline = Instant::now() + self.period_duration() * 4 + Duration::from_secs(1);
        let mut period = samples.to_vec();
        self.shared
            .pending_samples
            .fetch_add(samples.len(), Ordering::AcqRel);

        loop {
            match self.sender.try_send(period) {
                Ok(()) => break,
                Err(TrySendError::Full(back)) => {
                    if Instant::now() >= deadline {
                        self.shared
                            .pending_samples
                            .fetch_sub(samples.len(), Ordering::AcqRel);
                        return Err(PcmError::Write("output stream stalled".to_string()));
                    }
                    period = back;
                    thread::sleep(Duration::from_millis(2));
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(PcmError::Write("output stream closed".to_string()));
                }
            }
        }

        self.shared.expecting.store(true, Ordering::Release);
        Ok(())
    }

    fn recover(&mut self) -> Result<(), PcmError> {
        self.check_stream()?;
        self.shared.expecting.store(false, Ordering::Release);
        self.shared.underrun.store(false, Ordering::Release);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        let deadline = Instant::now()
            + self.period_duration() * (QUEUED_PERIODS as u32 + 2)
            + Duration::from_millis(500);

        while self.shared.pending_samples.load(Ordering::Acquire) > 0 {
            self.check_stream()?;
            if Instant::now() >= deadline {
                return Err(PcmError::Write("drain timed out".to_string()));
            }
            thread::sleep(Duration::from_millis(5));
        }

        self.shared.expecting.store(false, Ordering::Release);
        Ok(())
    }
}
