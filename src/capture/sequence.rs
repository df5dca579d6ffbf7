//! Frames from a directory of still images

use super::FrameSource;
use crate::error::{ProxError, ProxResult};
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Replays image files in file-name order, then reports exhaustion
#[derive(Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
}

impl ImageSequenceSource {
    /// Every PNG/JPEG file directly inside `dir`, sorted by name
    pub fn from_dir(dir: &Path) -> ProxResult<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ProxError::CaptureError(format!("{}: {}", dir.display(), e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(ProxError::CaptureError(format!(
                "no images found in {}",
                dir.display()
            )));
        }
        debug!("Image sequence with {} frames from {}", paths.len(), dir.display());

        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            pending: paths.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> ProxResult<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let frame = image::open(&path)
            .map_err(|e| ProxError::CaptureError(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        Ok(Some(frame))
    }

    fn release(&mut self) -> ProxResult<()> {
        self.pending.clear();
        Ok(())
    }
}
