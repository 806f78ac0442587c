//! Image transform pipeline for uploaded photos.
//!
//! Every upload is center-cropped to the owning record's aspect ratio,
//! resized to a fixed size, stamped with the kennel logo and re-encoded in
//! its original format before it is handed to the object store.

mod transform;
mod watermark;

use crate::error::{Result, SiteError};

pub use transform::{EncodedImage, ImageKind, crop_rect, transform};
pub use watermark::Watermark;

/// Target geometry for a transformed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSpec {
    /// Width divided by height.
    pub aspect_ratio: f64,
    pub width: u32,
    pub height: u32,
}

impl ImageSpec {
    #[must_use]
    pub const fn new(aspect_ratio: f64, width: u32, height: u32) -> Self {
        Self {
            aspect_ratio,
            width,
            height,
        }
    }

    fn validate(self) -> Result<()> {
        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(SiteError::InvalidInput(format!(
                "aspect ratio must be positive, got {}",
                self.aspect_ratio
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SiteError::InvalidInput(format!(
                "output size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}
