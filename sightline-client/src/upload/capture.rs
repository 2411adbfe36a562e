use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageResult};

/// Largest frame the pipeline will upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_width: 1280,
            max_height: 720,
        }
    }
}

impl CaptureLimits {
    /// Scales `(width, height)` down to fit, keeping the aspect ratio. Never upscales.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }
        let scale = f64::min(
            f64::from(self.max_width) / f64::from(width),
            f64::from(self.max_height) / f64::from(height),
        );
        let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
        (
            scaled(width).min(self.max_width),
            scaled(height).min(self.max_height),
        )
    }
}

/// Resizes into `limits` and encodes as JPEG at `quality` percent.
pub fn encode_frame(image: &DynamicImage, limits: CaptureLimits, quality: u8) -> ImageResult<Bytes> {
    let (width, height) = limits.fit(image.width(), image.height());
    let rgb = if (width, height) == (image.width(), image.height()) {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(Bytes::from(buf))
}
