//! Camera, video file and window I/O through OpenCV

use super::{DisplayEvent, FrameDisplay, FrameSource};
use crate::error::{ProxError, ProxResult};
use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{highgui, imgproc, videoio};
use tracing::info;

fn capture_err(e: opencv::Error) -> ProxError {
    ProxError::CaptureError(e.to_string())
}

fn display_err(e: opencv::Error) -> ProxError {
    ProxError::DisplayError(e.to_string())
}

/// Camera (by V4L2 index) or video file
pub struct OpenCvSource {
    capture: videoio::VideoCapture,
}

impl OpenCvSource {
    /// A numeric `source` opens that camera index, anything else a file
    pub fn open(source: &str) -> ProxResult<Self> {
        let capture = match source.parse::<i32>() {
            Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_V4L2),
            Err(_) => videoio::VideoCapture::from_file(source, videoio::CAP_ANY),
        }
        .map_err(capture_err)?;

        if !capture.is_opened().map_err(capture_err)? {
            return Err(ProxError::CaptureError(format!(
                "could not open video source {}",
                source
            )));
        }
        info!("Opened video source {}", source);

        Ok(Self { capture })
    }
}

impl FrameSource for OpenCvSource {
    fn read_frame(&mut self) -> ProxResult<Option<RgbImage>> {
        let mut bgr = Mat::default();
        let grabbed = self.capture.read(&mut bgr).map_err(capture_err)?;
        if !grabbed || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB).map_err(capture_err)?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb.data_bytes().map_err(capture_err)?.to_vec();
        RgbImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| ProxError::CaptureError("frame buffer size mismatch".to_string()))
    }

    fn release(&mut self) -> ProxResult<()> {
        self.capture.release().map_err(capture_err)
    }
}

/// HighGUI window; `q` or `Q` requests quit
pub struct OpenCvDisplay {
    window: String,
}

impl OpenCvDisplay {
    pub fn new(window: &str) -> ProxResult<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE).map_err(display_err)?;
        Ok(Self {
            window: window.to_string(),
        })
    }
}

impl FrameDisplay for OpenCvDisplay {
    fn show(&mut self, frame: &RgbImage) -> ProxResult<DisplayEvent> {
        let flat = Mat::from_slice(frame.as_raw()).map_err(display_err)?;
        let rgb = flat
            .reshape(3, frame.height() as i32)
            .map_err(display_err)?;
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(&*rgb, &mut bgr, imgproc::COLOR_RGB2BGR).map_err(display_err)?;

        highgui::imshow(&self.window, &bgr).map_err(display_err)?;
        let key = highgui::wait_key(1).map_err(display_err)?;
        if key == 'q' as i32 || key == 'Q' as i32 {
            Ok(DisplayEvent::Quit)
        } else {
            Ok(DisplayEvent::Continue)
        }
    }

    fn close(&mut self) -> ProxResult<()> {
        highgui::destroy_window(&self.window).map_err(display_err)
    }
}
