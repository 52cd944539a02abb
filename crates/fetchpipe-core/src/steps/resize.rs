use super::{open_image, proportional_height, save_image, MAX_DIMENSION, RASTER_MIME_TYPES};
use crate::error::PipelineError;
use crate::registry::{StepArgument, StepToken, Transformation};
use image::imageops::FilterType;
use std::num::NonZeroU32;
use std::path::Path;

/// Widest output `resize` accepts
pub const MAX_WIDTH: u32 = 8192;

/// `resize:<width>`: scale to `width` pixels, height kept proportional
#[derive(Debug, Clone, Copy, Default)]
pub struct Resize;

impl Transformation for Resize {
    fn name(&self) -> &str {
        "resize"
    }

    fn accepted_mime_types(&self) -> &[&str] {
        RASTER_MIME_TYPES
    }

    fn decode(&self, token: &StepToken) -> Result<StepArgument, PipelineError> {
        let raw = token.argument().ok_or_else(|| {
            PipelineError::invalid_argument(token.to_string(), "missing width, use resize:<width>")
        })?;
        let width = raw.trim().parse::<NonZeroU32>().map_err(|e| {
            PipelineError::invalid_argument(
                token.to_string(),
                format!("width must be a positive integer: {e}"),
            )
        })?;
        if width.get() > MAX_WIDTH {
            return Err(PipelineError::invalid_argument(
                token.to_string(),
                format!("width must be at most {MAX_WIDTH}"),
            ));
        }
        Ok(StepArgument::Width(width))
    }

    fn apply(
        &self,
        argument: StepArgument,
        source: &Path,
        destination: &Path,
        mime_type: &str,
    ) -> Result<(), PipelineError> {
        let StepArgument::Width(width) = argument else {
            return Err(PipelineError::invalid_argument(
                "resize",
                format!("expected a width, got {argument:?}"),
            ));
        };
        let image = open_image(source)?;
        let height = proportional_height(image.width(), image.height(), width.get());
        if height > MAX_DIMENSION {
            return Err(PipelineError::invalid_argument(
                format!("resize:{width}"),
                format!("output height {height} exceeds {MAX_DIMENSION}"),
            ));
        }
        let resized = image.resize_exact(width.get(), height, FilterType::Lanczos3);
        save_image(&resized, destination, mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView};

    fn decode(raw: &str) -> Result<StepArgument, PipelineError> {
        Resize.decode(&raw.parse().unwrap())
    }

    #[test]
    fn decodes_width() {
        assert_eq!(
            decode("resize:640").unwrap(),
            StepArgument::Width(NonZeroU32::new(640).unwrap())
        );
    }

    #[test]
    fn missing_width_is_invalid() {
        let err = decode("resize").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { ref step, .. } if step == "resize"));
    }

    #[test]
    fn malformed_widths_are_invalid() {
        for raw in ["resize:", "resize:abc", "resize:0", "resize:-5", "resize:6.4"] {
            assert!(
                matches!(decode(raw), Err(PipelineError::InvalidArgument { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn widths_are_bounded() {
        assert!(decode(&format!("resize:{MAX_WIDTH}")).is_ok());
        for raw in ["resize:8193", "resize:4000000000"] {
            let err = decode(raw).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidArgument { ref reason, .. } if reason.contains("at most")),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn tall_outputs_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tall.png");
        DynamicImage::new_luma8(1, 4096).save(&source).unwrap();

        let err = Resize
            .apply(decode("resize:8").unwrap(), &source, &dir.path().join("out.png"), "image/png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { .. }));
        assert!(!dir.path().join("out.png").exists());
    }

    #[test]
    fn resizes_proportionally() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.png");
        let destination = dir.path().join("out.png");
        DynamicImage::new_rgba8(1280, 960).save(&source).unwrap();

        let width = decode("resize:640").unwrap();
        Resize
            .apply(width, &source, &destination, "image/png")
            .unwrap();

        assert_eq!(image::open(&destination).unwrap().dimensions(), (640, 480));
    }
}
