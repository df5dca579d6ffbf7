//! Frame preprocessing for the detector input

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Pads frames to a square and converts them into detector blobs
#[derive(Clone, Debug)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    /// Create a new preprocessor with the detector's input dimensions
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Pad a frame to a zero-filled square of side `max(width, height)`,
    /// with the original frame in the top-left corner.
    ///
    /// Because the anchor is the origin, pixel coordinates in the square are
    /// the same as in the source frame.
    pub fn letterbox(&self, frame: &RgbImage) -> RgbImage {
        let side = frame.width().max(frame.height());
        let mut canvas = RgbImage::new(side, side);
        imageops::replace(&mut canvas, frame, 0, 0);
        canvas
    }

    /// Resize to the detector input, scale to [0, 1] and lay out as NCHW
    pub fn to_blob(&self, square: &RgbImage) -> Array4<f32> {
        let resized;
        let source = if square.dimensions() == (self.target_width, self.target_height) {
            square
        } else {
            resized = imageops::resize(
                square,
                self.target_width,
                self.target_height,
                FilterType::Triangle,
            );
            &resized
        };

        Array4::from_shape_fn(
            (1, 3, self.target_height as usize, self.target_width as usize),
            |(_, channel, y, x)| source.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        )
    }

    /// Complete preprocessing: letterbox, then blob. The letterboxed square is
    /// returned too because decoding scales boxes against its dimensions.
    pub fn process(&self, frame: &RgbImage) -> (RgbImage, Array4<f32>) {
        let square = self.letterbox(frame);
        let blob = self.to_blob(&square);
        (square, blob)
    }

    /// Get the target dimensions
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

/// Default preprocessor for 640x640 YOLO models
impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(640, 640)
    }
}
