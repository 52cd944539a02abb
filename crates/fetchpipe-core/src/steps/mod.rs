//! Built-in image steps
//!
//! Pixel work is delegated to the `image` crate. Every step accepts JPEG
//! and PNG input and writes its output in the same format.

mod monochrome;
mod resize;
mod thumbnail;

pub use monochrome::Monochrome;
pub use resize::{Resize, MAX_WIDTH};
pub use thumbnail::Thumbnail;

use crate::error::PipelineError;
use crate::registry::{StepArgument, StepToken};
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::path::Path;

/// Input accepted by every built-in step
pub(crate) const RASTER_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Largest width or height decoded or produced by a step
pub(crate) const MAX_DIMENSION: u32 = 16_384;

/// Decoder allocation ceiling (512 MiB)
const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Decode the image at `path`, trusting its content over its name.
///
/// Sources beyond [`MAX_DIMENSION`] or the allocation ceiling fail with
/// `PipelineError::Image` instead of being decoded.
pub(crate) fn open_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    let mut reader = ImageReader::open(path)
        .map_err(|e| PipelineError::io_error(path, e))?
        .with_guessed_format()
        .map_err(|e| PipelineError::io_error(path, e))?;
    reader.limits(decode_limits());
    Ok(reader.decode()?)
}

/// Encode `image` at `path` in the format named by `mime_type`.
pub(crate) fn save_image(
    image: &DynamicImage,
    path: &Path,
    mime_type: &str,
) -> Result<(), PipelineError> {
    let format = ImageFormat::from_mime_type(mime_type).ok_or_else(|| {
        PipelineError::type_mismatch("an encodable image mimetype", mime_type)
    })?;
    image.save_with_format(path, format)?;
    Ok(())
}

/// Height keeping the aspect ratio of `width x height` at `target_width`.
///
/// Truncates like an integer cast, but never below one pixel.
pub(crate) fn proportional_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let ratio = f64::from(target_width) / f64::from(width);
    // Saturating float-to-int cast; the value is non-negative.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (f64::from(height) * ratio) as u32;
    scaled.max(1)
}

/// Reject any argument on a step that takes none.
pub(crate) fn expect_no_argument(token: &StepToken) -> Result<StepArgument, PipelineError> {
    match token.argument() {
        None => Ok(StepArgument::None),
        Some(arg) => Err(PipelineError::invalid_argument(
            token.to_string(),
            format!("step takes no argument, got '{arg}'"),
        )),
    }
}
