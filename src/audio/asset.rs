//! Alert clip reader

use super::AlertError;
use hound::{SampleFormat, WavReader, WavSpec};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// An opened alert clip yielding interleaved S16LE samples.
///
/// RIFF/WAVE files are parsed so the header is never played as audio;
/// anything else is treated as headerless PCM.
pub enum AlertAsset {
    Raw {
        reader: BufReader<File>,
        scratch: Vec<u8>,
    },
    Wav(WavReader<BufReader<File>>),
}

impl AlertAsset {
    pub fn open(path: &Path) -> Result<Self, AlertError> {
        let mut file = File::open(path).map_err(|e| AlertError::AssetMissing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut magic = [0u8; 4];
        let is_wav = match file.read_exact(&mut magic) {
            Ok(()) => &magic == b"RIFF",
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => false,
            Err(e) => {
                return Err(AlertError::AssetMissing {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        file.seek(SeekFrom::Start(0))
            .map_err(|e| AlertError::AssetRead(e.to_string()))?;

        let reader = BufReader::new(file);
        if !is_wav {
            return Ok(AlertAsset::Raw {
                reader,
                scratch: Vec::new(),
            });
        }

        let wav = WavReader::new(reader)
            .map_err(|e| AlertError::AssetFormat(format!("{}: {}", path.display(), e)))?;
        let spec = wav.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AlertError::AssetFormat(format!(
                "{}: expected 16-bit integer samples, found {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        Ok(AlertAsset::Wav(wav))
    }

    /// Header information, for WAV clips
    pub fn wav_spec(&self) -> Option<WavSpec> {
        match self {
            AlertAsset::Raw { .. } => None,
            AlertAsset::Wav(wav) => Some(wav.spec()),
        }
    }

    /// Fill `buf` with the next samples. Returns how many were read; fewer
    /// than `buf.len()` means the clip ended.
    pub fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize, AlertError> {
        match self {
            AlertAsset::Raw { reader, scratch } => {
                scratch.resize(buf.len() * 2, 0);
                let bytes = read_full(reader, scratch)?;
                let samples = bytes / 2;
                for (slot, pair) in buf.iter_mut().zip(scratch[..samples * 2].chunks_exact(2)) {
                    *slot = i16::from_le_bytes([pair[0], pair[1]]);
                }
                Ok(samples)
            }
            AlertAsset::Wav(wav) => {
                let mut samples = wav.samples::<i16>();
                let mut count = 0;
                for slot in buf.iter_mut() {
                    match samples.next() {
                        Some(Ok(sample)) => {
                            *slot = sample;
                            count += 1;
                        }
                        Some(Err(e)) => return Err(AlertError::AssetRead(e.to_string())),
                        None => break,
                    }
                }
                Ok(count)
            }
        }
    }
}

/// Read until `buf` is full or the reader hits end of file
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, AlertError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AlertError::AssetRead(e.to_string())),
        }
    }
    Ok(filled)
}
