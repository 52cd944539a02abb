use super::{expect_no_argument, open_image, save_image, RASTER_MIME_TYPES};
use crate::error::PipelineError;
use crate::registry::{StepArgument, StepToken, Transformation};
use image::imageops::{self, BiLevel};
use image::DynamicImage;
use std::path::Path;

/// `bw`: 1-bit black and white, error-diffusion dithered
#[derive(Debug, Clone, Copy, Default)]
pub struct Monochrome;

impl Transformation for Monochrome {
    fn name(&self) -> &str {
        "bw"
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
        let mut luma = open_image(source)?.to_luma8();
        imageops::dither(&mut luma, &BiLevel);
        save_image(&DynamicImage::ImageLuma8(luma), destination, mime_type)
    }
}
