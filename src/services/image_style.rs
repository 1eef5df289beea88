//! Image styles: named derivative recipes
//!
//! A style owns the storage namespace `styles/{name}/` below the files root.
//! Both the full-size download and the derived image of an item live there.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::db::StyleRecord;
use crate::error::{ThumbnailError, ThumbnailResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// Fit inside the box, keeping aspect ratio; never upscales
    Scale,
    /// Fill the box exactly, cropping the overflow
    ScaleAndCrop,
}

impl ScaleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleMode::Scale => "scale",
            ScaleMode::ScaleAndCrop => "scale_and_crop",
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scale" => Ok(ScaleMode::Scale),
            "scale_and_crop" => Ok(ScaleMode::ScaleAndCrop),
            other => anyhow::bail!("Unknown scale mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStyle {
    pub name: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mode: ScaleMode,
}

impl TryFrom<StyleRecord> for ImageStyle {
    type Error = anyhow::Error;

    fn try_from(record: StyleRecord) -> Result<Self> {
        let width = u32::try_from(record.width)
            .ok()
            .filter(|w| *w > 0)
            .with_context(|| format!("Style '{}' has invalid width {}", record.name, record.width))?;
        let height = u32::try_from(record.height)
            .ok()
            .filter(|h| *h > 0)
            .with_context(|| {
                format!("Style '{}' has invalid height {}", record.name, record.height)
            })?;

        Ok(Self {
            mode: record.mode.parse()?,
            name: record.name,
            label: record.label,
            width,
            height,
        })
    }
}

impl From<&ImageStyle> for StyleRecord {
    fn from(style: &ImageStyle) -> Self {
        StyleRecord {
            name: style.name.clone(),
            label: style.label.clone(),
            width: i64::from(style.width),
            height: i64::from(style.height),
            mode: style.mode.as_str().to_string(),
        }
    }
}

impl ImageStyle {
    /// Storage directory of this style, relative to the files root
    pub fn directory(&self) -> String {
        format!("styles/{}", sanitize_filename::sanitize(&self.name))
    }

    /// Relative uri of `filename` inside this style's namespace
    pub fn build_uri(&self, filename: &str) -> String {
        format!("{}/{}", self.directory(), sanitize_filename::sanitize(filename))
    }

    /// Create the style directory below `files_root`
    pub async fn prepare_directory(&self, files_root: &Path) -> ThumbnailResult<PathBuf> {
        let dir = files_root.join(self.directory());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ThumbnailError::storage(dir.display(), e))?;
        Ok(dir)
    }

    /// Derive a styled image from `source` into `dest`, returning the written size.
    ///
    /// The output format follows the extension of `dest`.
    pub async fn create_derivative(&self, source: &Path, dest: &Path) -> ThumbnailResult<u64> {
        let style = self.clone();
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        let location = dest.display().to_string();

        tokio::task::spawn_blocking(move || style.derive_blocking(&source, &dest))
            .await
            .map_err(|e| ThumbnailError::storage(location, e))?
    }

    fn derive_blocking(&self, source: &Path, dest: &Path) -> ThumbnailResult<u64> {
        let location = dest.display().to_string();
        let storage = |e: &dyn fmt::Display| ThumbnailError::storage(&location, e);

        let format = ImageFormat::from_path(dest).map_err(|e| storage(&e))?;

        let decoded = image::io::Reader::open(source)
            .map_err(|e| storage(&e))?
            .with_guessed_format()
            .map_err(|e| storage(&e))?
            .decode()
            .map_err(|e| storage(&e))?;

        let resized = self.apply(decoded);
        let output = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage(&e))?;
        }
        output
            .save_with_format(dest, format)
            .map_err(|e| storage(&e))?;

        let size = std::fs::metadata(dest).map_err(|e| storage(&e))?.len();
        debug!(
            style = %self.name,
            dest = %location,
            width = output.width(),
            height = output.height(),
            size,
            "Derivative written"
        );
        Ok(size)
    }

    fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self.mode {
            ScaleMode::Scale => {
                if image.width() <= self.width && image.height() <= self.height {
                    image
                } else {
                    image.resize(self.width, self.height, FilterType::Lanczos3)
                }
            }
            ScaleMode::ScaleAndCrop => {
                image.resize_to_fill(self.width, self.height, FilterType::Lanczos3)
            }
        }
    }
}
