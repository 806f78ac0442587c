use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, imageops::FilterType};
use log::debug;

use super::{ImageSpec, Watermark};
use crate::error::{Result, SiteError};

/// Encodings accepted for uploads; output always matches the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    fn from_format(format: ImageFormat) -> Result<Self> {
        match format {
            ImageFormat::Jpeg => Ok(ImageKind::Jpeg),
            ImageFormat::Png => Ok(ImageKind::Png),
            other => Err(SiteError::UnsupportedFormat(format!("{other:?}"))),
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
        }
    }

    #[must_use]
    pub fn content_type(self) -> mime::Mime {
        match self {
            ImageKind::Jpeg => mime::IMAGE_JPEG,
            ImageKind::Png => mime::IMAGE_PNG,
        }
    }
}

/// Transformed image ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Centered crop window `(x, y, width, height)` matching `aspect_ratio`.
///
/// Only the proportionally larger dimension is trimmed, by equal margins on
/// both sides. A source that already has the target ratio yields the full frame.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
pub fn crop_rect(width: u32, height: u32, aspect_ratio: f64) -> (u32, u32, u32, u32) {
    let source_ratio = f64::from(width) / f64::from(height);
    let (crop_width, crop_height) = if source_ratio > aspect_ratio {
        let crop_width = (f64::from(height) * aspect_ratio).round() as u32;
        (crop_width.clamp(1, width), height)
    } else {
        let crop_height = (f64::from(width) / aspect_ratio).round() as u32;
        (width, crop_height.clamp(1, height))
    };

    (
        (width - crop_width) / 2,
        (height - crop_height) / 2,
        crop_width,
        crop_height,
    )
}

/// Crop, resize, watermark and re-encode one uploaded image.
///
/// # Errors
///
/// Returns `Decode` when the bytes are not a readable image and
/// `UnsupportedFormat` when they are an image other than JPEG or PNG.
pub fn transform(raw: &[u8], watermark: &Watermark, spec: ImageSpec) -> Result<EncodedImage> {
    spec.validate()?;

    let reader = ImageReader::new(Cursor::new(raw)).with_guessed_format()?;
    let kind = reader.format().map(ImageKind::from_format).transpose()?;
    let decoded = reader.decode().map_err(SiteError::Decode)?;
    let kind = kind.ok_or_else(|| SiteError::UnsupportedFormat("unknown".to_string()))?;

    let (x, y, width, height) = crop_rect(decoded.width(), decoded.height(), spec.aspect_ratio);
    let cropped = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        debug!(
            "Cropping {}x{} to {}x{} at ({}, {})",
            decoded.width(),
            decoded.height(),
            width,
            height,
            x,
            y
        );
        decoded.crop_imm(x, y, width, height)
    };

    let mut canvas = cropped
        .resize_exact(spec.width, spec.height, FilterType::Lanczos3)
        .to_rgba8();
    watermark.apply(&mut canvas);

    let output = match kind {
        ImageKind::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        ImageKind::Png => DynamicImage::ImageRgba8(canvas),
    };

    let mut bytes = Vec::new();
    output
        .write_to(&mut Cursor::new(&mut bytes), kind.format())
        .map_err(SiteError::Encode)?;

    Ok(EncodedImage {
        kind,
        width: output.width(),
        height: output.height(),
        bytes,
    })
}
