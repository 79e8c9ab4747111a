use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::info;

use crate::error::PipelineError;

/// Cut `image` into full-height strips of `height` rows, top to bottom.
///
/// A bottom remainder shorter than `height` is discarded.
pub fn cut_strips(image: &DynamicImage, height: u32) -> Result<Vec<DynamicImage>, PipelineError> {
    if height == 0 {
        return Err(PipelineError::InvalidGrid("strip height must be at least 1".into()));
    }
    let (width, total_height) = (image.width(), image.height());
    let count = total_height / height;
    if total_height % height != 0 {
        info!(
            remainder = total_height % height,
            "Remaining part of the image is less than the strip height; not sliced"
        );
    }
    Ok((0..count)
        .map(|n| image.crop_imm(0, n * height, width, height))
        .collect())
}

/// Write `slice_<n>.bmp` strips of `input` into `output_dir`; returns their paths.
pub fn slice_image(input: &Path, height: u32, output_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input.exists() {
        return Err(PipelineError::missing(input));
    }
    info!("Reading image from {}", input.display());
    let image = image::open(input)?;
    let (width, total_height) = (image.width(), image.height());
    info!("Image size: {width}x{total_height}");
    info!(
        "Total pixels in the input image: {}",
        u64::from(width) * u64::from(total_height)
    );

    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for (n, strip) in cut_strips(&image, height)?.into_iter().enumerate() {
        let path = output_dir.join(format!("slice_{n}.bmp"));
        strip.save(&path)?;
        info!(
            "Saved slice {n} to {} with {} pixels",
            path.display(),
            u64::from(width) * u64::from(height)
        );
        written.push(path);
    }
    if written.is_empty() {
        tracing::warn!("No slices were created.");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{cut_strips, slice_image};
    use image::{DynamicImage, GrayImage, Luma};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, y| Luma([y as u8])))
    }

    #[test]
    fn remainder_rows_are_dropped() {
        let strips = cut_strips(&gradient(4, 10), 3).unwrap();
        assert_eq!(strips.len(), 3);
        assert_eq!(strips[2].height(), 3);
        assert_eq!(strips[1].to_luma8().get_pixel(0, 0)[0], 3);
        assert!(cut_strips(&gradient(4, 10), 0).is_err());
    }

    #[test]
    fn strips_are_written_as_numbered_bitmaps() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.png");
        gradient(6, 8).save(&source).unwrap();
        let out = dir.path().join("slices");
        let written = slice_image(&source, 4, &out).unwrap();
        assert_eq!(written.len(), 2);
        assert!(out.join("slice_0.bmp").exists());
        assert!(out.join("slice_1.bmp").exists());
        let strip = image::open(out.join("slice_1.bmp")).unwrap().to_luma8();
        assert_eq!(strip.dimensions(), (6, 4));
        assert_eq!(strip.get_pixel(0, 0)[0], 4);
    }
}
