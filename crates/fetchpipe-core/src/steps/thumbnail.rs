use super::{expect_no_argument, open_image, proportional_height, save_image, RASTER_MIME_TYPES};
use crate::error::PipelineError;
use crate::registry::{StepArgument, StepToken, Transformation};
use image::imageops::FilterType;
use std::path::Path;

/// Width of every thumbnail, in pixels
pub const THUMBNAIL_WIDTH: u32 = 100;

/// `thumb`: 100 pixels wide, height kept proportional
#[derive(Debug, Clone, Copy, Default)]
pub struct Thumbnail;

impl Transformation for Thumbnail {
    fn name(&self) -> &str {
        "thumb"
    }

    fn accepted_mime_types(&self) -> &[&str] {
        RASTER_MIME_TYPES
    }

    fn decode(&self, token: &StepToken) -> Result<StepArgument, PipelineError> {
        expect_no_argument(token)
    }

    fn apply(
        &self,
        _argument: StepArgument,
        source: &Path,
        destination: &Path,
        mime_type: &str,
    ) -> Result<(), PipelineError> {
        let image = open_image(source)?;
        let height = proportional_height(image.width(), image.height(), THUMBNAIL_WIDTH);
        let thumb = image.resize_exact(THUMBNAIL_WIDTH, height, FilterType::Lanczos3);
        save_image(&thumb, destination, mime_type)
    }
}
