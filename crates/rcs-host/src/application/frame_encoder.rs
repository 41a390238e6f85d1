//! Frame scaling and encoding.
//!
//! Stream frames are JPEG at the configured quality; screenshots are PNG.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use rcs_core::{EngineError, EngineResult};

/// One raw frame from the capture device, packed 8-bit RGB rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RawFrame {
    /// Builds a frame, checking that the buffer holds exactly
    /// `width * height` pixels.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> EngineResult<Self> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || rgb.len() != expected {
            return Err(EngineError::TransientIo(format!(
                "frame buffer of {} bytes does not match {width}x{height}",
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// A single-colour frame, used by mocks and tests.
    pub fn solid(width: u32, height: u32, pixel: [u8; 3]) -> Self {
        let rgb = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, rgb }
    }

    fn into_image(self) -> EngineResult<RgbImage> {
        let (w, h) = (self.width, self.height);
        RgbImage::from_raw(w, h, self.rgb).ok_or_else(|| {
            EngineError::TransientIo(format!("frame buffer too small for {w}x{h}"))
        })
    }
}

/// Scales `frame` to `target` and JPEG-encodes it at `quality` (1..=100).
pub fn encode_jpeg(frame: RawFrame, target: (u32, u32), quality: u8) -> EngineResult<Vec<u8>> {
    let image = frame.into_image()?;
    let image = if (image.width(), image.height()) != target {
        imageops::resize(&image, target.0, target.1, FilterType::Triangle)
    } else {
        image
    };
    let (w, h) = image.dimensions();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(image.as_raw(), w, h, ExtendedColorType::Rgb8)
        .map_err(|e| EngineError::TransientIo(format!("jpeg encode failed: {e}")))?;
    Ok(out)
}

/// Encodes `frame` losslessly as PNG at its native size.
pub fn encode_png(frame: RawFrame) -> EngineResult<Vec<u8>> {
    let image = frame.into_image()?;
    let (w, h) = image.dimensions();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), w, h, ExtendedColorType::Rgb8)
        .map_err(|e| EngineError::TransientIo(format!("png encode failed: {e}")))?;
    Ok(out)
}
