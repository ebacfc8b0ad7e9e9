// Image cleanup ahead of OCR
use crate::config::PreprocessConfig;
use crate::model::PreprocessError;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::{debug, warn};

pub struct ImagePreprocessor {
    config: PreprocessConfig,
    auto_rotate: bool,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            auto_rotate: true,
        }
    }

    /// Whether EXIF orientation is applied before the pixel work. The output
    /// PNG carries no EXIF, so this is the last chance to honor it.
    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }

    /// Returns an OCR-friendly PNG, or the original bytes if anything goes wrong.
    pub fn preprocess(&self, bytes: &[u8]) -> Vec<u8> {
        match self.try_preprocess(bytes) {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Image preprocessing failed, using original bytes: {}", e);
                bytes.to_vec()
            }
        }
    }

    /// Same as [`preprocess`](Self::preprocess) but runs the pixel work on the
    /// blocking pool.
    pub async fn preprocess_blocking(&self, bytes: &[u8]) -> Vec<u8> {
        let config = self.config.clone();
        let auto_rotate = self.auto_rotate;
        let input = bytes.to_vec();
        let task = tokio::task::spawn_blocking(move || {
            ImagePreprocessor::new(config)
                .with_auto_rotate(auto_rotate)
                .try_preprocess(&input)
        });

        match task.await {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                warn!("Image preprocessing failed, using original bytes: {}", e);
                bytes.to_vec()
            }
            Err(e) => {
                warn!("{}", PreprocessError::Task(e.to_string()));
                bytes.to_vec()
            }
        }
    }

    /// Orient, resize (shrink only), grayscale, contrast stretch, sharpen,
    /// median denoise.
    pub fn try_preprocess(&self, bytes: &[u8]) -> Result<Vec<u8>, PreprocessError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = if self.auto_rotate {
            decoder.orientation()?
        } else {
            Orientation::NoTransforms
        };
        let mut img = DynamicImage::from_decoder(decoder)?;
        if !matches!(orientation, Orientation::NoTransforms) {
            debug!("Applying EXIF orientation {:?}", orientation);
            img.apply_orientation(orientation);
        }

        let (width, height) = (img.width(), img.height());
        let max = self.config.max_dimension;
        let img = if width > max || height > max {
            debug!("Downsizing chart from {}x{} to fit {}x{}", width, height, max, max);
            img.resize(max, max, FilterType::Lanczos3)
        } else {
            img
        };

        let gray = img.to_luma8();
        let normalized = normalize_contrast(&gray);
        let sharpened = imageproc::filter::sharpen3x3(&normalized);
        let radius = self.config.median_radius;
        let denoised = imageproc::filter::median_filter(&sharpened, radius, radius);

        let mut out = Vec::new();
        DynamicImage::ImageLuma8(denoised).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        debug!("Preprocessed image: {} bytes -> {} bytes", bytes.len(), out.len());
        Ok(out)
    }
}

/// Linearly stretches the luma range to the full 0..=255 span.
pub fn normalize_contrast(gray: &GrayImage) -> GrayImage {
    let (min_val, max_val) = gray.pixels().fold((u8::MAX, u8::MIN), |(min, max), p| {
        (min.min(p.0[0]), max.max(p.0[0]))
    });

    if max_val <= min_val {
        return gray.clone();
    }

    let range = (max_val - min_val) as f32;
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        let stretched = (pixel.0[0] - min_val) as f32 / range * 255.0;
        pixel.0[0] = stretched.round() as u8;
    }
    out
}
