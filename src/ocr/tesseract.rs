// Tesseract command-line adapter
use crate::config::{OcrConfig, Region};
use crate::model::OcrError;
use crate::ocr::traits::{OcrEngine, OcrSession, Recognition, SessionParams};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tracing::{debug, warn};

static OSD_ROTATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^Rotate:\s*(\d+)\s*$").unwrap());

/// Spawns the `tesseract` binary. Each session owns a scratch directory that
/// is removed when the session terminates.
pub struct TesseractEngine {
    binary: String,
    language: String,
    scratch_root: PathBuf,
    next_session: AtomicU64,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            scratch_root: std::env::temp_dir(),
            next_session: AtomicU64::new(1),
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Checks that the binary can be started; returns its version banner.
    pub async fn version(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| OcrError::EngineUnavailable(format!("{}: {}", self.binary, e)))?;
        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner.lines().next().unwrap_or_default().to_string())
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    async fn open_session(&self) -> Result<Box<dyn OcrSession>, OcrError> {
        let seq = self.next_session.fetch_add(1, Ordering::Relaxed);
        let workdir = self
            .scratch_root
            .join(format!("chart-sniper-ocr-{}-{}", std::process::id(), seq));
        tokio::fs::create_dir_all(&workdir).await?;
        debug!("Opened tesseract session in {}", workdir.display());

        Ok(Box::new(TesseractSession {
            binary: self.binary.clone(),
            language: self.language.clone(),
            workdir,
            args: None,
            terminated: false,
        }))
    }
}

pub struct TesseractSession {
    binary: String,
    language: String,
    workdir: PathBuf,
    args: Option<Vec<String>>,
    terminated: bool,
}

#[async_trait::async_trait]
impl OcrSession for TesseractSession {
    async fn configure(&mut self, params: &SessionParams) -> Result<(), OcrError> {
        if params.char_whitelist.is_empty() {
            return Err(OcrError::InvalidConfig("character whitelist is empty".into()));
        }
        if params.page_seg_mode > 13 {
            return Err(OcrError::InvalidConfig(format!(
                "page segmentation mode {} is out of range",
                params.page_seg_mode
            )));
        }

        self.args = Some(vec![
            "-l".into(),
            self.language.clone(),
            "--psm".into(),
            params.page_seg_mode.to_string(),
            "-c".into(),
            format!("tessedit_char_whitelist={}", params.char_whitelist),
            "-c".into(),
            format!("preserve_interword_spaces={}", u8::from(params.preserve_interword_spaces)),
        ]);
        Ok(())
    }

    async fn recognize(
        &mut self,
        image: &[u8],
        region: &Region,
        rotate_auto: bool,
    ) -> Result<Recognition, OcrError> {
        let args = self.args.as_ref().ok_or(OcrError::NotConfigured)?;
        let mut oriented = orient(image, rotate_auto)?;
        if rotate_auto {
            oriented = self.correct_rotation(oriented).await;
        }
        let prepared = crop_region(&oriented, region)?;
        let input = self.workdir.join("input.png");
        tokio::fs::write(&input, &prepared).await?;

        let output = Command::new(&self.binary)
            .arg(&input)
            .arg("stdout")
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OcrError::EngineUnavailable(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(Recognition {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            confidence: None,
        })
    }

    async fn terminate(&mut self) -> Result<(), OcrError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        match tokio::fs::remove_dir_all(&self.workdir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TesseractSession {
    /// Runs orientation detection (`--psm 0`) and turns the page upright.
    /// Detection needs the `osd` language data and enough text; when it
    /// cannot decide, the image is returned as is.
    async fn correct_rotation(&self, img: DynamicImage) -> DynamicImage {
        let page = self.workdir.join("osd.png");
        let written = match encode_png(&img) {
            Ok(bytes) => tokio::fs::write(&page, bytes).await.map_err(OcrError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            debug!("Skipping orientation detection: {}", e);
            return img;
        }

        let output = Command::new(&self.binary)
            .arg(&page)
            .arg("stdout")
            .args(["--psm", "0"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        let detected = match output {
            Ok(out) if out.status.success() => parse_osd_rotation(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                debug!("Orientation detection declined: {}", String::from_utf8_lossy(&out.stderr).trim());
                None
            }
            Err(e) => {
                debug!("Orientation detection not run: {}", e);
                None
            }
        };

        match detected {
            Some(degrees) if degrees != 0 => {
                debug!("Rotating page {} degrees clockwise", degrees);
                rotate_clockwise(img, degrees)
            }
            _ => img,
        }
    }
}

impl Drop for TesseractSession {
    fn drop(&mut self) {
        if !self.terminated {
            warn!("Tesseract session dropped without terminate, cleaning up {}", self.workdir.display());
            let _ = std::fs::remove_dir_all(&self.workdir);
        }
    }
}

/// Applies EXIF orientation (when `rotate_auto`) and crops to `region`,
/// clamped to the image bounds. Returns PNG bytes.
pub fn prepare_region(image: &[u8], region: &Region, rotate_auto: bool) -> Result<Vec<u8>, OcrError> {
    crop_region(&orient(image, rotate_auto)?, region)
}

fn orient(image: &[u8], rotate_auto: bool) -> Result<DynamicImage, OcrError> {
    let mut decoder = ImageReader::new(Cursor::new(image))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = if rotate_auto {
        decoder.orientation()?
    } else {
        Orientation::NoTransforms
    };
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn crop_region(img: &DynamicImage, region: &Region) -> Result<Vec<u8>, OcrError> {
    let (width, height) = (img.width(), img.height());
    if region.left >= width || region.top >= height {
        return Err(OcrError::InvalidConfig(format!(
            "recognition region starts at ({}, {}) outside a {}x{} image",
            region.left, region.top, width, height
        )));
    }
    let crop_w = region.width.min(width - region.left);
    let crop_h = region.height.min(height - region.top);
    encode_png(&img.crop_imm(region.left, region.top, crop_w, crop_h))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

/// Reads the clockwise correction from tesseract's OSD report
/// (`Rotate: 90`). Only right angles are accepted.
pub fn parse_osd_rotation(report: &str) -> Option<u16> {
    let degrees: u16 = OSD_ROTATE_RE.captures(report)?.get(1)?.as_str().parse().ok()?;
    matches!(degrees, 0 | 90 | 180 | 270).then_some(degrees)
}

fn rotate_clockwise(img: DynamicImage, degrees: u16) -> DynamicImage {
    match degrees {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}
