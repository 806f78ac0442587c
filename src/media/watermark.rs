//! Kennel logo stamped onto every uploaded photo.

use std::path::Path;

use image::{
    RgbaImage,
    imageops::{self, FilterType},
};
use log::{debug, info};

use crate::error::{Result, SiteError};

/// Distance between the logo and the right and bottom edges, in pixels.
pub const MARGIN: u32 = 20;

/// Logo width as a fraction of the output width.
const WIDTH_DIVISOR: u32 = 6;

#[derive(Debug, Clone)]
pub struct Watermark {
    logo: RgbaImage,
}

impl Watermark {
    /// Load the logo from disk. Intended to be called once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let logo = image::open(path).map_err(SiteError::Decode)?.to_rgba8();
        info!(
            "Loaded watermark {} ({}x{})",
            path.display(),
            logo.width(),
            logo.height()
        );
        Ok(Self::from_image(logo))
    }

    #[must_use]
    pub fn from_image(logo: RgbaImage) -> Self {
        Self { logo }
    }

    /// Size of the logo once scaled for a canvas of the given width.
    #[must_use]
    pub fn scaled_size(&self, canvas_width: u32) -> (u32, u32) {
        let width = canvas_width / WIDTH_DIVISOR;
        if self.logo.width() == 0 {
            return (0, 0);
        }
        let height = u64::from(self.logo.height()) * u64::from(width);
        let height = (height + u64::from(self.logo.width()) / 2) / u64::from(self.logo.width());
        (width, u32::try_from(height).unwrap_or(u32::MAX))
    }

    /// Alpha-blend the scaled logo into the bottom-right corner of `canvas`.
    pub fn apply(&self, canvas: &mut RgbaImage) {
        let (width, height) = self.scaled_size(canvas.width());
        if width == 0 || height == 0 {
            debug!("Canvas too small for watermark, skipping");
            return;
        }

        let logo = imageops::resize(&self.logo, width, height, FilterType::Lanczos3);
        let x = i64::from(canvas.width()) - i64::from(width) - i64::from(MARGIN);
        let y = i64::from(canvas.height()) - i64::from(height) - i64::from(MARGIN);
        imageops::overlay(canvas, &logo, x, y);
    }
}
